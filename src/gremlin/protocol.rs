//! Gremlin Server request and response frames

use super::graphson::{encode_bindings, GraphSon};
use super::{GremlinError, GremlinResult};
use crate::client::Bindings;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};
use uuid::Uuid;

/// Mime type announced at the start of every request frame
pub const MIME_TYPE: &str = "application/vnd.gremlin-v3.0+json";

/// Response status codes
pub mod status {
    pub const SUCCESS: u16 = 200;
    pub const NO_CONTENT: u16 = 204;
    pub const PARTIAL_CONTENT: u16 = 206;
    pub const UNAUTHORIZED: u16 = 401;
    pub const AUTHENTICATE: u16 = 407;
}

/// A request message
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GremlinRequest {
    pub request_id: Json,
    pub op: String,
    pub processor: String,
    pub args: Json,
}

impl GremlinRequest {
    /// Script evaluation request
    pub fn eval(request_id: Uuid, gremlin: &str, bindings: &Bindings) -> Self {
        Self {
            request_id: typed_uuid(request_id),
            op: "eval".to_string(),
            processor: String::new(),
            args: json!({
                "gremlin": gremlin,
                "bindings": encode_bindings(bindings),
                "language": "gremlin-groovy",
            }),
        }
    }

    /// SASL PLAIN answer to an authentication challenge
    pub fn authentication(request_id: Uuid, username: &str, password: &str) -> Self {
        let token = format!("\0{}\0{}", username, password);
        Self {
            request_id: typed_uuid(request_id),
            op: "authentication".to_string(),
            processor: String::new(),
            args: json!({
                "sasl": BASE64.encode(token.as_bytes()),
                "saslMechanism": "PLAIN",
            }),
        }
    }

    /// Binary frame: mime length, mime type, JSON body
    pub fn to_frame(&self) -> GremlinResult<Vec<u8>> {
        let body = serde_json::to_vec(self)?;
        let mut frame = Vec::with_capacity(1 + MIME_TYPE.len() + body.len());
        frame.push(MIME_TYPE.len() as u8);
        frame.extend_from_slice(MIME_TYPE.as_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }
}

fn typed_uuid(id: Uuid) -> Json {
    json!({"@type": "g:UUID", "@value": id.to_string()})
}

/// A response message
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GremlinResponse {
    #[serde(default)]
    pub request_id: Option<Json>,
    pub status: ResponseStatus,
    #[serde(default)]
    pub result: ResponseResult,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseStatus {
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub attributes: Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseResult {
    #[serde(default)]
    pub data: Json,
    #[serde(default)]
    pub meta: Json,
}

impl GremlinResponse {
    pub fn parse(bytes: &[u8]) -> GremlinResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Request id as text, whether sent plain or typed
    pub fn request_id(&self) -> Option<String> {
        match self.request_id.as_ref()? {
            Json::String(s) => Some(s.clone()),
            Json::Object(obj) => obj.get("@value").and_then(|v| v.as_str()).map(str::to_string),
            _ => None,
        }
    }

    pub fn is_for(&self, id: &Uuid) -> bool {
        self.request_id()
            .and_then(|s| Uuid::parse_str(&s).ok())
            .is_some_and(|parsed| parsed == *id)
    }

    /// Decoded result elements of this frame
    pub fn take_data(&mut self) -> GremlinResult<Vec<GraphSon>> {
        let data = std::mem::take(&mut self.result.data);
        Ok(match GraphSon::decode(data)? {
            GraphSon::Null => Vec::new(),
            GraphSon::List(items) | GraphSon::Set(items) => items,
            single => vec![single],
        })
    }

    /// `stackTrace` status attribute, if the server sent one
    pub fn stack_trace(&self) -> Option<String> {
        match GraphSon::decode(self.status.attributes.clone()).ok()? {
            GraphSon::Map(entries) => entries.into_iter().find_map(|(k, v)| {
                if k.as_str() == Some("stackTrace") {
                    v.as_str().map(str::to_string)
                } else {
                    None
                }
            }),
            _ => None,
        }
    }

    /// Turn an error status into a server error
    pub fn into_error(self) -> GremlinError {
        GremlinError::Server {
            code: self.status.code,
            stack_trace: self.stack_trace(),
            message: self.status.message,
        }
    }
}
