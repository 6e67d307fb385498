use thiserror::Error;

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{dataset} payload is {size} bytes (limit {limit})")]
    Capacity {
        dataset: &'static str,
        size: usize,
        limit: usize,
    },

    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("Focus probe failed: {0}")]
    Probe(String),

    #[error("Focus probe timed out after {timeout_ms}ms")]
    ProbeTimeout { timeout_ms: u128 },

    #[error("Lock poisoned")]
    LockPoisoned,

    #[error("Could not determine project directories")]
    NoProjectDirs,
}

impl AppError {
    /// True for failures of the focus probe, which callers retry on the next tick.
    pub fn is_probe_failure(&self) -> bool {
        matches!(self, AppError::Probe(_) | AppError::ProbeTimeout { .. })
    }
}
