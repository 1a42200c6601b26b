//! Bolt connection: handshake, chunked framing and the request/summary
//! exchange for one session
//!
//! Generic over the byte stream so tests can drive it through an in-memory
//! duplex pipe.

use super::message::{BoltRequest, BoltResponse};
use super::packstream::{PackStreamError, PackStreamMap, PackStreamValue};
use super::{BoltError, BoltResult};
use bytes::{BufMut, BytesMut};
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

/// Magic preamble for Bolt protocol (0x6060B017)
pub const BOLT_MAGIC: u32 = 0x6060_B017;

/// Largest payload one chunk can carry
const MAX_CHUNK: usize = u16::MAX as usize;

/// Default cap on one reassembled server message
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Versions proposed in the handshake, most preferred first
const PROPOSED_VERSIONS: [BoltVersion; 4] = [
    BoltVersion::new(4, 4),
    BoltVersion::new(4, 3),
    BoltVersion::new(4, 1),
    BoltVersion::new(4, 0),
];

/// Negotiated protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoltVersion {
    pub major: u8,
    pub minor: u8,
}

impl BoltVersion {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Handshake encoding: `00 00 minor major`
    pub fn to_bytes(self) -> [u8; 4] {
        [0, 0, self.minor, self.major]
    }

    pub fn from_bytes(bytes: [u8; 4]) -> Option<Self> {
        if bytes == [0, 0, 0, 0] {
            None
        } else {
            Some(Self::new(bytes[3], bytes[2]))
        }
    }
}

impl fmt::Display for BoltVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// One Bolt session over a byte stream
pub struct BoltConnection<S> {
    stream: S,
    version: Option<BoltVersion>,
    max_message_size: usize,
}

impl BoltConnection<TcpStream> {
    /// Open a TCP connection to `host:port`
    pub async fn connect(address: &str) -> BoltResult<Self> {
        let stream = TcpStream::connect(address).await?;
        stream.set_nodelay(true)?;
        debug!("Bolt connection opened to {}", address);
        Ok(Self::new(stream))
    }
}

impl<S> BoltConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            version: None,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }

    pub fn with_max_message_size(mut self, limit: usize) -> Self {
        self.max_message_size = limit;
        self
    }

    /// Version agreed during the handshake, if it has happened
    pub fn version(&self) -> Option<BoltVersion> {
        self.version
    }

    /// Send the preamble and proposed versions, read the server's choice
    pub async fn handshake(&mut self) -> BoltResult<BoltVersion> {
        let mut preamble = BytesMut::with_capacity(20);
        preamble.put_u32(BOLT_MAGIC);
        for version in PROPOSED_VERSIONS {
            preamble.put_slice(&version.to_bytes());
        }
        self.stream.write_all(&preamble).await?;
        self.stream.flush().await?;

        let mut reply = [0u8; 4];
        self.stream.read_exact(&mut reply).await?;
        let version = BoltVersion::from_bytes(reply)
            .ok_or_else(|| BoltError::Handshake("server supports none of the proposed versions".to_string()))?;
        if !PROPOSED_VERSIONS.contains(&version) {
            return Err(BoltError::Handshake(format!("server chose unproposed version {}", version)));
        }

        debug!("Bolt version {} negotiated", version);
        self.version = Some(version);
        Ok(version)
    }

    /// Write one message as chunks followed by the end marker
    pub async fn send(&mut self, request: &BoltRequest) -> BoltResult<()> {
        let mut body = BytesMut::new();
        request.encode(&mut body)?;
        trace!("C: {:?}", request.message_type());
        let framed = frame(&body);
        self.stream.write_all(&framed).await?;
        Ok(())
    }

    pub async fn flush(&mut self) -> BoltResult<()> {
        self.stream.flush().await?;
        Ok(())
    }

    /// Read chunks until the end marker and decode the message
    pub async fn recv(&mut self) -> BoltResult<BoltResponse> {
        let mut message = BytesMut::new();
        loop {
            let mut header = [0u8; 2];
            self.stream.read_exact(&mut header).await?;
            let size = u16::from_be_bytes(header) as usize;

            if size == 0 {
                if message.is_empty() {
                    // NOOP keep-alive between messages
                    continue;
                }
                break;
            }

            let start = message.len();
            if start + size > self.max_message_size {
                return Err(PackStreamError::TooLarge(format!(
                    "message exceeds {} bytes",
                    self.max_message_size
                ))
                .into());
            }
            message.resize(start + size, 0);
            self.stream.read_exact(&mut message[start..]).await?;
        }

        let mut bytes = message.freeze();
        let response = BoltResponse::decode(&mut bytes)?;
        trace!("S: {:?}", response);
        Ok(response)
    }

    /// Authenticate with the basic scheme
    pub async fn hello(&mut self, user_agent: &str, principal: &str, credentials: &str) -> BoltResult<PackStreamMap> {
        self.send(&BoltRequest::Hello {
            user_agent: user_agent.to_string(),
            principal: principal.to_string(),
            credentials: credentials.to_string(),
        })
        .await?;
        self.flush().await?;

        match self.recv().await? {
            BoltResponse::Success(meta) => {
                if let Some(server) = meta.get("server").and_then(|v| v.as_str()) {
                    debug!("Bolt HELLO accepted by {}", server);
                }
                Ok(meta)
            }
            BoltResponse::Failure { code, message } if code.starts_with("Neo.ClientError.Security.") => {
                Err(BoltError::Authentication { code, message })
            }
            BoltResponse::Failure { code, message } => Err(BoltError::Failure { code, message }),
            other => Err(BoltError::Protocol(format!("unexpected reply to HELLO: {:?}", other))),
        }
    }

    /// Pipeline RUN and PULL, then stream every record into `on_record`.
    ///
    /// Returns the result field names and the final summary metadata. The
    /// callback sees the field names with each record.
    pub async fn run<F>(
        &mut self,
        query: &str,
        parameters: PackStreamMap,
        mut on_record: F,
    ) -> BoltResult<(Vec<String>, PackStreamMap)>
    where
        F: FnMut(&[String], Vec<PackStreamValue>),
    {
        self.send(&BoltRequest::Run {
            query: query.to_string(),
            parameters,
        })
        .await?;
        self.send(&BoltRequest::Pull { n: -1 }).await?;
        self.flush().await?;

        let fields = match self.recv().await? {
            BoltResponse::Success(meta) => field_names(&meta),
            BoltResponse::Failure { code, message } => {
                return Err(BoltError::Failure { code, message })
            }
            other => return Err(BoltError::Protocol(format!("unexpected reply to RUN: {:?}", other))),
        };

        let mut records = 0usize;
        loop {
            match self.recv().await? {
                BoltResponse::Record(values) => {
                    records += 1;
                    on_record(&fields, values);
                }
                BoltResponse::Success(summary) => {
                    if summary.get("has_more").and_then(bool_of).unwrap_or(false) {
                        return Err(BoltError::Protocol("PULL -1 left records behind".to_string()));
                    }
                    debug!("Bolt stream complete: {} records", records);
                    return Ok((fields, summary));
                }
                BoltResponse::Failure { code, message } => {
                    return Err(BoltError::Failure { code, message })
                }
                BoltResponse::Ignored => {
                    return Err(BoltError::Protocol("PULL was ignored".to_string()))
                }
            }
        }
    }

    /// Say GOODBYE and shut the stream down
    pub async fn close(mut self) -> BoltResult<()> {
        if self.version.is_some() {
            self.send(&BoltRequest::Goodbye).await?;
            self.flush().await?;
        }
        self.stream.shutdown().await?;
        Ok(())
    }
}

/// Split a message body into chunks and append the end marker
pub fn frame(body: &[u8]) -> BytesMut {
    let mut framed = BytesMut::with_capacity(body.len() + 2 * (body.len() / MAX_CHUNK + 2));
    for chunk in body.chunks(MAX_CHUNK) {
        framed.put_u16(chunk.len() as u16);
        framed.put_slice(chunk);
    }
    framed.put_u16(0);
    framed
}

fn field_names(meta: &PackStreamMap) -> Vec<String> {
    meta.get("fields")
        .and_then(|f| f.as_list())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn bool_of(value: &PackStreamValue) -> Option<bool> {
    match value {
        PackStreamValue::Boolean(b) => Some(*b),
        _ => None,
    }
}
