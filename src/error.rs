use std::fmt;

/// Where a probe was when it gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStage {
    Connecting,
    Sending,
    AwaitingResponse,
}

impl fmt::Display for ProbeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            ProbeStage::Connecting => "connecting",
            ProbeStage::Sending => "sending request",
            ProbeStage::AwaitingResponse => "awaiting response",
        };
        f.write_str(stage)
    }
}

/// Every way a single status query can fail.
///
/// The `Display` text is what ends up in `QueryResult::error_message`, so it is
/// written for humans.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("Could not resolve {0}, trying it as given")]
    AddressResolutionDeferred(String),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Port {0} is closed")]
    PortClosed(u16),
    #[error("Timed out while {0}")]
    Timeout(ProbeStage),
    #[error("{0}")]
    MalformedResponse(String),
    #[error("No query protocol available for {0}")]
    UnsupportedProtocol(String),
    #[error("No Discord invite provided")]
    MissingInvite,
    #[error("Invalid Discord invite format")]
    InvalidInviteFormat,
    #[error("Discord API error: HTTP {0}")]
    ApiError(u16),
    #[error("Invalid or expired Discord invite")]
    InviteExpired,
    #[error("Query failed: {0}")]
    QueryRejected(String),
    #[error("Internal query error: {0}")]
    Internal(String),
}

impl QueryError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        QueryError::MalformedResponse(msg.into())
    }

    /// Failures that say nothing about the server itself, so a plain TCP
    /// reachability check is still worth doing.
    pub fn is_unexpected(&self) -> bool {
        matches!(
            self,
            QueryError::UnsupportedProtocol(_) | QueryError::Internal(_)
        )
    }
}

/// Errors surfaced to the caller instead of being folded into an offline result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Server {0} not found")]
    NotFound(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_causes_read_like_sentences() {
        assert_eq!(
            QueryError::InvalidInviteFormat.to_string(),
            "Invalid Discord invite format"
        );
        assert_eq!(
            QueryError::ApiError(404).to_string(),
            "Discord API error: HTTP 404"
        );
        assert_eq!(QueryError::PortClosed(27015).to_string(), "Port 27015 is closed");
        assert_eq!(
            QueryError::Timeout(ProbeStage::AwaitingResponse).to_string(),
            "Timed out while awaiting response"
        );
    }

    #[test]
    fn only_internal_failures_warrant_fallback() {
        assert!(QueryError::Internal("bind".into()).is_unexpected());
        assert!(QueryError::UnsupportedProtocol("x".into()).is_unexpected());
        assert!(!QueryError::Timeout(ProbeStage::Connecting).is_unexpected());
        assert!(!QueryError::malformed("bad").is_unexpected());
    }
}
