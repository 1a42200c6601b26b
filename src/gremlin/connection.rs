//! WebSocket transport to a Gremlin Server

use super::graphson::GraphSon;
use super::protocol::{status, GremlinRequest, GremlinResponse};
use super::{GremlinError, GremlinResult};
use crate::client::Bindings;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Submits scripts and collects the complete result list
///
/// A submission future may be dropped part way (on timeout); the transport
/// must stay usable and disregard whatever the abandoned request still sends.
#[async_trait]
pub trait GremlinTransport: Send {
    async fn submit(&mut self, script: &str, bindings: &Bindings) -> GremlinResult<Vec<GraphSon>>;

    async fn close(&mut self) -> GremlinResult<()>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Persistent WebSocket connection with SASL PLAIN authentication
pub struct WsTransport {
    stream: WsStream,
    username: String,
    password: String,
    closed: bool,
}

impl WsTransport {
    /// Open the WebSocket to `ws://host:port/gremlin[/db]`
    pub async fn connect(url: &str, username: &str, password: &str) -> GremlinResult<Self> {
        let (stream, response) = connect_async(url).await?;
        info!("Gremlin connection established to {} ({})", url, response.status());
        Ok(Self {
            stream,
            username: username.to_string(),
            password: password.to_string(),
            closed: false,
        })
    }

    async fn send(&mut self, request: &GremlinRequest) -> GremlinResult<()> {
        trace!("Gremlin request {} ({})", request.op, request.request_id);
        self.stream.send(Message::Binary(request.to_frame()?)).await?;
        Ok(())
    }

    /// Next response frame, skipping control frames
    async fn next_response(&mut self) -> GremlinResult<GremlinResponse> {
        loop {
            let message = match self.stream.next().await {
                Some(message) => message?,
                None => {
                    self.closed = true;
                    return Err(GremlinError::ConnectionClosed);
                }
            };
            match message {
                Message::Text(text) => return GremlinResponse::parse(text.as_bytes()),
                Message::Binary(bytes) => return GremlinResponse::parse(&bytes),
                Message::Close(frame) => {
                    debug!("Gremlin server closed the connection: {:?}", frame);
                    self.closed = true;
                    return Err(GremlinError::ConnectionClosed);
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }
}

#[async_trait]
impl GremlinTransport for WsTransport {
    async fn submit(&mut self, script: &str, bindings: &Bindings) -> GremlinResult<Vec<GraphSon>> {
        if self.closed {
            return Err(GremlinError::ConnectionClosed);
        }

        let request_id = Uuid::new_v4();
        self.send(&GremlinRequest::eval(request_id, script, bindings))
            .await?;

        let mut results = Vec::new();
        loop {
            let mut response = self.next_response().await?;
            if !response.is_for(&request_id) {
                debug!(
                    "Discarding frame for abandoned request {:?}",
                    response.request_id()
                );
                continue;
            }

            match response.status.code {
                status::PARTIAL_CONTENT => results.extend(response.take_data()?),
                status::SUCCESS => {
                    results.extend(response.take_data()?);
                    return Ok(results);
                }
                status::NO_CONTENT => return Ok(results),
                status::AUTHENTICATE => {
                    if self.username.is_empty() && self.password.is_empty() {
                        return Err(GremlinError::CredentialsRequired);
                    }
                    debug!("Gremlin server requested authentication");
                    let answer =
                        GremlinRequest::authentication(request_id, &self.username, &self.password);
                    self.send(&answer).await?;
                }
                code => {
                    warn!("Gremlin request failed with status {}", code);
                    return Err(response.into_error());
                }
            }
        }
    }

    async fn close(&mut self) -> GremlinResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.stream.close(None).await {
            Ok(()) | Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
