use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Snapshot of one API queue, published in instance heartbeats and on `GET /`.
///
/// Workers attach to `endpoint_out`; producers connect to `endpoint_in`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStatus {
    pub num_outstanding: u64,
    pub mean_outstanding: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_in: Option<SocketAddr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_out: Option<SocketAddr>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_optional() {
        let s: ApiStatus =
            serde_json::from_str(r#"{"numOutstanding":0,"meanOutstanding":0.0}"#).unwrap();
        assert!(s.endpoint_out.is_none());

        let s = ApiStatus {
            endpoint_out: Some("127.0.0.1:4100".parse().unwrap()),
            ..ApiStatus::default()
        };
        let v = serde_json::to_value(s).unwrap();
        assert_eq!(v["endpointOut"], "127.0.0.1:4100");
        assert!(v.get("endpointIn").is_none());
    }
}
