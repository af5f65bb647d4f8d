use std::time::Duration;

/// Cursor rows kept behind the scan pointer for fork detection.
pub const CURSOR_RETENTION: u64 = 20;

pub const RPC_TIMEOUT: Duration = Duration::from_secs(30);
