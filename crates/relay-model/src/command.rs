use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ModelError, ModelResult};

/// Closed set of commands carried by the async command channel.
///
/// Serialized as its integer code; unknown integers are rejected at decode time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    BackupCleanup = 1,
    LaunchSession = 2,
    AutoActivate = 3,
    UpdateUserHomeImage = 4,
    RefreshDisks = 5,
    CollectStats = 6,
    UpdateDiskStates = 7,
    TerminateOrDeleteCluster = 8,
    PluginMaintenance = 9,
    ReqResp = 50,
    SessionStatus = 51,
    IsTerminating = 52,
}

impl Command {
    pub const ALL: [Command; 12] = [
        Command::BackupCleanup,
        Command::LaunchSession,
        Command::AutoActivate,
        Command::UpdateUserHomeImage,
        Command::RefreshDisks,
        Command::CollectStats,
        Command::UpdateDiskStates,
        Command::TerminateOrDeleteCluster,
        Command::PluginMaintenance,
        Command::ReqResp,
        Command::SessionStatus,
        Command::IsTerminating,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Command::BackupCleanup => "backup_cleanup",
            Command::LaunchSession => "launch_session",
            Command::AutoActivate => "auto_activate",
            Command::UpdateUserHomeImage => "update_user_home_image",
            Command::RefreshDisks => "refresh_disks",
            Command::CollectStats => "collect_stats",
            Command::UpdateDiskStates => "update_disk_states",
            Command::TerminateOrDeleteCluster => "terminate_or_delete_cluster",
            Command::PluginMaintenance => "plugin_maintenance",
            Command::ReqResp => "req_resp",
            Command::SessionStatus => "session_status",
            Command::IsTerminating => "is_terminating",
        }
    }

    /// Point-to-point commands expect exactly one reply.
    pub fn is_request(self) -> bool {
        matches!(
            self,
            Command::ReqResp | Command::SessionStatus | Command::IsTerminating
        )
    }
}

impl TryFrom<u64> for Command {
    type Error = ModelError;

    fn try_from(code: u64) -> ModelResult<Self> {
        Command::ALL
            .into_iter()
            .find(|c| u64::from(c.code()) == code)
            .ok_or(ModelError::UnknownCommand(code))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Command::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| ModelError::UnknownCommandName(s.to_string()))
    }
}

impl Serialize for Command {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for Command {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let code = u64::deserialize(deserializer)?;
        Command::try_from(code).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_wire_values() {
        assert_eq!(Command::BackupCleanup.code(), 1);
        assert_eq!(Command::PluginMaintenance.code(), 9);
        assert_eq!(Command::ReqResp.code(), 50);
        assert_eq!(Command::IsTerminating.code(), 52);
    }

    #[test]
    fn serializes_as_integer() {
        let json = serde_json::to_string(&Command::CollectStats).unwrap();
        assert_eq!(json, "6");

        let back: Command = serde_json::from_str("51").unwrap();
        assert_eq!(back, Command::SessionStatus);
    }

    #[test]
    fn unknown_integer_is_rejected() {
        assert!(serde_json::from_str::<Command>("10").is_err());
        assert!(matches!(
            Command::try_from(49),
            Err(ModelError::UnknownCommand(49))
        ));
    }

    #[test]
    fn parses_names() {
        assert_eq!(
            "Refresh_Disks".parse::<Command>().unwrap(),
            Command::RefreshDisks
        );
        assert!("reboot".parse::<Command>().is_err());
        for c in Command::ALL {
            assert_eq!(c.to_string().parse::<Command>().unwrap(), c);
        }
    }

    #[test]
    fn request_commands() {
        assert!(Command::SessionStatus.is_request());
        assert!(!Command::RefreshDisks.is_request());
    }
}
