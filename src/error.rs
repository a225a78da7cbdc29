use thiserror::Error;

/// Failures reported by a remote ticket source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("ticket service unreachable: {0}")]
    Unavailable(String),

    #[error("ticket service returned HTTP {0}")]
    Status(u16),

    #[error("ticket {0} not found")]
    NotFound(String),

    #[error("unexpected ticket payload: {0}")]
    Malformed(String),
}

impl SourceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SourceError::NotFound(_))
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            SourceError::Status(status.as_u16())
        } else {
            SourceError::Unavailable(err.to_string())
        }
    }
}

/// Failures reading or writing the on-device ticket cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("ticket cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("ticket cache is not a valid ticket list: {0}")]
    Serde(#[from] serde_json::Error),
}
