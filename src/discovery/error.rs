use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Every chart fetch failed, including the last-resort global chart.
    #[error("The catalog is unavailable, retry later")]
    UpstreamUnavailable,

    #[error("A session id or an authenticated user is required")]
    InvalidIdentity,

    #[error("Unrecognized decision '{0}'")]
    InvalidDecision(String),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl DiscoveryError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, DiscoveryError::UpstreamUnavailable)
    }

    /// Metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            DiscoveryError::UpstreamUnavailable => "upstream_unavailable",
            DiscoveryError::InvalidIdentity => "invalid_identity",
            DiscoveryError::InvalidDecision(_) => "invalid_decision",
            DiscoveryError::Store(_) => "store_error",
        }
    }
}
