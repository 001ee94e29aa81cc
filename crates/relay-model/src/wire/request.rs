use serde::{Deserialize, Serialize};

use crate::{
    VArgs,
    domain::CMD_TERMINATE,
    error::{ModelError, ModelResult},
};

/// Request envelope sent from a connector through the forwarding device to a worker.
///
/// Wire form: `{"cmd": "...", "args"?: [...], "vargs"?: {...}}`.
/// Empty `args` / `vargs` are omitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub cmd: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "VArgs::is_empty")]
    pub vargs: VArgs,
}

impl ApiRequest {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            args: Vec::new(),
            vargs: VArgs::new(),
        }
    }

    /// The reserved shutdown request for a worker pool.
    pub fn terminate() -> Self {
        Self::new(CMD_TERMINATE)
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_vargs(mut self, vargs: VArgs) -> Self {
        self.vargs = vargs;
        self
    }

    /// Returns `true` for the reserved shutdown command.
    pub fn is_terminate(&self) -> bool {
        self.cmd == CMD_TERMINATE
    }

    pub fn encode(&self) -> ModelResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ModelError::Encode(e.to_string()))
    }

    pub fn decode(data: &[u8]) -> ModelResult<Self> {
        serde_json::from_slice(data).map_err(|e| ModelError::Decode(e.to_string()))
    }
}
