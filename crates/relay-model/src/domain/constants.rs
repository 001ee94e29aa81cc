//! Well-known values shared by the dispatch and cluster layers.

/// Reserved command asking a worker pool to shut down cleanly.
pub const CMD_TERMINATE: &str = ":terminate";

/// Reply code of a successful worker call.
pub const CODE_OK: u16 = 200;

/// Reply code assumed when a worker omits `code`.
pub const CODE_MISSING: u16 = 500;

/// Suffix of the shared-store key holding a cluster's leader record.
pub const LEADER_KEY_SUFFIX: &str = "leader";

/// Infix of the shared-store keys holding instance heartbeats.
pub const INSTANCE_KEY_INFIX: &str = "instance";
