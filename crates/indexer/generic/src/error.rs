/// Why a scan cycle stopped before advancing the cursor.
///
/// Forks are not errors; they surface as `CycleOutcome::Rewound`.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Node unreachable, timed out or returned a JSON-RPC error.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// The node answered without data for a height it has not indexed yet.
    #[error("block {0} is not available yet")]
    BlockNotAvailable(u64),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("database error: {0:?}")]
    Database(eyre::Report),
}

impl ScanError {
    pub fn rpc(e: impl std::fmt::Display) -> Self {
        ScanError::Rpc(e.to_string())
    }

    pub fn decode(e: impl std::fmt::Display) -> Self {
        ScanError::Decode(e.to_string())
    }

    /// Transient node conditions are retried quietly; everything else reaches
    /// the alert channel.
    pub fn should_alert(&self) -> bool {
        matches!(self, ScanError::Decode(_) | ScanError::Database(_))
    }
}

impl From<eyre::Report> for ScanError {
    fn from(e: eyre::Report) -> Self {
        ScanError::Database(e)
    }
}
