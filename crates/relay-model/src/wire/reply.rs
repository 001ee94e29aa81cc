use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    Headers,
    domain::{CODE_MISSING, CODE_OK},
    error::{ModelError, ModelResult},
};

/// Payload of a worker reply.
///
/// Variant order matters: an array made only of byte values is binary,
/// an object is structured, a string is text, everything else is coerced to text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyData {
    /// Raw bytes, sent on the wire as an array of numbers `0..=255`.
    Binary(Vec<u8>),
    /// Structured object rendered as a JSON body.
    Object(Map<String, Value>),
    /// Plain text.
    Text(String),
    /// Any other JSON value; rendered as its JSON text.
    Other(Value),
}

impl Default for ReplyData {
    fn default() -> Self {
        ReplyData::Text(String::new())
    }
}

/// HTTP-ready rendering of [`ReplyData`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyBody {
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ReplyData {
    /// Render the payload into a response body.
    pub fn render(&self) -> ModelResult<ReplyBody> {
        let body = match self {
            ReplyData::Binary(bytes) => ReplyBody {
                content_type: "application/octet-stream",
                bytes: bytes.clone(),
            },
            ReplyData::Object(map) => ReplyBody {
                content_type: "application/json",
                bytes: serde_json::to_vec(map).map_err(|e| ModelError::Encode(e.to_string()))?,
            },
            ReplyData::Text(s) => ReplyBody {
                content_type: "text/plain; charset=utf-8",
                bytes: s.as_bytes().to_vec(),
            },
            ReplyData::Other(v) => ReplyBody {
                content_type: "text/plain; charset=utf-8",
                bytes: v.to_string().into_bytes(),
            },
        };
        Ok(body)
    }
}

fn default_code() -> u16 {
    CODE_MISSING
}

/// Reply envelope sent by a worker back through the forwarding device.
///
/// Wire form: `{"code": 200, "data": ..., "hdrs"?: {...}, "nid"?: "..."}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiReply {
    /// HTTP-style status; a missing code is treated as an internal error.
    #[serde(default = "default_code")]
    pub code: u16,
    #[serde(default)]
    pub data: ReplyData,
    #[serde(default, skip_serializing_if = "Headers::is_empty")]
    pub hdrs: Headers,
    /// Identifier of the worker node that served the call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nid: Option<String>,
}

impl ApiReply {
    pub fn new(code: u16, data: ReplyData) -> Self {
        Self {
            code,
            data,
            hdrs: Headers::new(),
            nid: None,
        }
    }

    /// Successful reply carrying `data`.
    pub fn ok(data: ReplyData) -> Self {
        Self::new(CODE_OK, data)
    }

    /// Successful plain-text reply.
    pub fn text(s: impl Into<String>) -> Self {
        Self::ok(ReplyData::Text(s.into()))
    }

    pub fn with_header(mut self, key: impl Into<String>, val: impl Into<String>) -> Self {
        self.hdrs.insert(key, val);
        self
    }

    pub fn with_nid(mut self, nid: impl Into<String>) -> Self {
        self.nid = Some(nid.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.code == CODE_OK
    }

    pub fn encode(&self) -> ModelResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ModelError::Encode(e.to_string()))
    }

    pub fn decode(data: &[u8]) -> ModelResult<Self> {
        serde_json::from_slice(data).map_err(|e| ModelError::Decode(e.to_string()))
    }
}
