use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{ApiName, TimeoutMs};

/// Catalog entry describing one routable API.
///
/// The dispatch layer reads `timeout_ms` when a call does not carry its own
/// timeout. `command` and `image_name` describe how worker pools for the API
/// are started; the dispatcher's worker launcher reads them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSpec {
    /// Routable name, the first path component of an HTTP request.
    pub name: ApiName,
    /// Worker command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Container image the worker pool runs in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
    /// Per-API call timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<TimeoutMs>,
}

impl ApiSpec {
    pub fn new(name: impl Into<ApiName>) -> Self {
        Self {
            name: name.into(),
            command: None,
            image_name: None,
            timeout_ms: None,
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image_name = Some(image.into());
        self
    }

    pub fn with_timeout_ms(mut self, ms: TimeoutMs) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}
