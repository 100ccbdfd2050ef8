/// Shared error type used across all bridge crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A carrier or model WebSocket failed. Terminates the call; no reconnection.
    #[error("transport: {0}")]
    Transport(String),

    /// Malformed JSON or an unrecognized wire event. The call continues;
    /// the offending message is discarded.
    #[error("protocol: {0}")]
    Protocol(String),

    /// A configuration value is missing or invalid, or a tenant/field
    /// store is unreachable (handled via the documented fallback chain).
    #[error("config: {0}")]
    Configuration(String),

    /// A `finalize_reservation` tool-call argument failed validation.
    /// Carries the wire `error_code` so callers can build the tool
    /// result without re-deriving it.
    #[error("tool argument ({code}): {message}")]
    ToolArgument { code: String, message: String },

    /// A reservation-store write failed for a reason other than the
    /// unique-key conflict (which is success, not an error).
    #[error("persistence: {0}")]
    Persistence(String),

    /// Quota/rate-limit style errors from the model channel. Escalated
    /// with distinct log markers; the call ends.
    #[error("budget: {0}")]
    Budget(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
