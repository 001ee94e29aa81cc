use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide monotonically increasing connector sequence.
static CONNECTOR_SEQ: AtomicU64 = AtomicU64::new(1);

/// Returns the next connector id.
pub fn next_connector_id() -> u64 {
    CONNECTOR_SEQ.fetch_add(1, Ordering::Relaxed)
}
