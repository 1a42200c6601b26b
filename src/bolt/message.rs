//! Bolt request and response messages
//!
//! Only the client side of Bolt 4.x is modelled: the requests this crate
//! sends and the summaries/records a server sends back.

use super::packstream::{
    decode_structure_header, encode_structure, PackStreamError, PackStreamMap, PackStreamResult,
    PackStreamValue,
};
use bytes::{Buf, BytesMut};

/// Bolt message signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Hello = 0x01,
    Goodbye = 0x02,
    Reset = 0x0F,
    Run = 0x10,
    Pull = 0x3F,
    Success = 0x70,
    Record = 0x71,
    Ignored = 0x7E,
    Failure = 0x7F,
}

/// Messages sent by the client
#[derive(Debug, Clone, PartialEq)]
pub enum BoltRequest {
    Hello {
        user_agent: String,
        principal: String,
        credentials: String,
    },
    Run {
        query: String,
        parameters: PackStreamMap,
    },
    /// Pull `n` records; -1 pulls everything
    Pull { n: i64 },
    Reset,
    Goodbye,
}

impl BoltRequest {
    pub fn message_type(&self) -> MessageType {
        match self {
            BoltRequest::Hello { .. } => MessageType::Hello,
            BoltRequest::Run { .. } => MessageType::Run,
            BoltRequest::Pull { .. } => MessageType::Pull,
            BoltRequest::Reset => MessageType::Reset,
            BoltRequest::Goodbye => MessageType::Goodbye,
        }
    }

    /// Serialize into an unchunked message body
    pub fn encode(&self, buf: &mut BytesMut) -> PackStreamResult<()> {
        let sig = self.message_type() as u8;
        match self {
            BoltRequest::Hello {
                user_agent,
                principal,
                credentials,
            } => {
                let extra = PackStreamValue::map([
                    ("user_agent", PackStreamValue::String(user_agent.clone())),
                    ("scheme", PackStreamValue::String("basic".to_string())),
                    ("principal", PackStreamValue::String(principal.clone())),
                    ("credentials", PackStreamValue::String(credentials.clone())),
                ]);
                encode_structure(buf, sig, &[extra])
            }
            BoltRequest::Run { query, parameters } => encode_structure(
                buf,
                sig,
                &[
                    PackStreamValue::String(query.clone()),
                    PackStreamValue::Map(parameters.clone()),
                    PackStreamValue::Map(PackStreamMap::new()),
                ],
            ),
            BoltRequest::Pull { n } => {
                let extra = PackStreamValue::map([("n", PackStreamValue::Integer(*n))]);
                encode_structure(buf, sig, &[extra])
            }
            BoltRequest::Reset | BoltRequest::Goodbye => encode_structure(buf, sig, &[]),
        }
    }

    /// Decode a request body (used by test servers)
    pub fn decode<B: Buf>(buf: &mut B) -> PackStreamResult<BoltRequest> {
        let (size, sig) = decode_structure_header(buf)?;
        let mut fields = Vec::with_capacity(size);
        for _ in 0..size {
            fields.push(PackStreamValue::decode(buf)?);
        }
        let text = |map: &PackStreamMap, key: &str| {
            map.get(key).and_then(|v| v.as_str()).unwrap_or_default().to_string()
        };

        match (sig, fields.as_slice()) {
            (0x01, [PackStreamValue::Map(extra)]) => Ok(BoltRequest::Hello {
                user_agent: text(extra, "user_agent"),
                principal: text(extra, "principal"),
                credentials: text(extra, "credentials"),
            }),
            (0x10, [PackStreamValue::String(query), PackStreamValue::Map(parameters), ..]) => {
                Ok(BoltRequest::Run {
                    query: query.clone(),
                    parameters: parameters.clone(),
                })
            }
            (0x3F, [PackStreamValue::Map(extra)]) => Ok(BoltRequest::Pull {
                n: extra.get("n").and_then(|v| v.as_i64()).unwrap_or(-1),
            }),
            (0x3F, []) => Ok(BoltRequest::Pull { n: -1 }),
            (0x0F, []) => Ok(BoltRequest::Reset),
            (0x02, []) => Ok(BoltRequest::Goodbye),
            _ => Err(PackStreamError::InvalidStructure {
                signature: sig,
                reason: format!("unexpected request with {} fields", size),
            }),
        }
    }
}

/// Messages sent by the server
#[derive(Debug, Clone, PartialEq)]
pub enum BoltResponse {
    Success(PackStreamMap),
    Record(Vec<PackStreamValue>),
    Ignored,
    Failure { code: String, message: String },
}

impl BoltResponse {
    /// Decode an unchunked response body
    pub fn decode<B: Buf>(buf: &mut B) -> PackStreamResult<BoltResponse> {
        let (size, sig) = decode_structure_header(buf)?;
        let mut fields = Vec::with_capacity(size);
        for _ in 0..size {
            fields.push(PackStreamValue::decode(buf)?);
        }
        let mut fields = fields.into_iter();

        match sig {
            0x70 => match fields.next() {
                Some(PackStreamValue::Map(meta)) => Ok(BoltResponse::Success(meta)),
                None => Ok(BoltResponse::Success(PackStreamMap::new())),
                Some(_) => Err(invalid(sig, "SUCCESS metadata must be a map")),
            },
            0x71 => match fields.next() {
                Some(PackStreamValue::List(values)) => Ok(BoltResponse::Record(values)),
                _ => Err(invalid(sig, "RECORD data must be a list")),
            },
            0x7E => Ok(BoltResponse::Ignored),
            0x7F => match fields.next() {
                Some(PackStreamValue::Map(meta)) => {
                    let get = |key: &str| {
                        meta.get(key).and_then(|v| v.as_str()).unwrap_or_default().to_string()
                    };
                    Ok(BoltResponse::Failure {
                        code: get("code"),
                        message: get("message"),
                    })
                }
                _ => Err(invalid(sig, "FAILURE metadata must be a map")),
            },
            _ => Err(invalid(sig, "unknown response message")),
        }
    }

    /// Serialize a response body (used by test servers)
    pub fn encode(&self, buf: &mut BytesMut) -> PackStreamResult<()> {
        match self {
            BoltResponse::Success(meta) => {
                encode_structure(buf, MessageType::Success as u8, &[PackStreamValue::Map(meta.clone())])
            }
            BoltResponse::Record(values) => {
                encode_structure(buf, MessageType::Record as u8, &[PackStreamValue::List(values.clone())])
            }
            BoltResponse::Ignored => encode_structure(buf, MessageType::Ignored as u8, &[]),
            BoltResponse::Failure { code, message } => {
                let meta = PackStreamValue::map([
                    ("code", PackStreamValue::String(code.clone())),
                    ("message", PackStreamValue::String(message.clone())),
                ]);
                encode_structure(buf, MessageType::Failure as u8, &[meta])
            }
        }
    }
}

fn invalid(signature: u8, reason: &str) -> PackStreamError {
    PackStreamError::InvalidStructure {
        signature,
        reason: reason.to_string(),
    }
}
