//! Error taxonomy shared by the client, the CI workflows and the CLI.

/// Errors produced by NiFi client and workflow operations.
#[derive(Debug, thiserror::Error)]
pub enum NifiError {
    /// Missing or malformed argument, raised before any mutating call.
    #[error("invalid input: {0}")]
    Input(String),

    /// The target is not in a state the operation can work with
    /// (no parameter context, not under version control, unknown profile).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A lookup reported that the entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success response from the server.
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// An asynchronous server-side request did not finish in time.
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl NifiError {
    /// Stable name used in structured CLI error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            NifiError::Input(_) => "InputError",
            NifiError::Configuration(_) | NifiError::Config(_) => "ConfigurationError",
            NifiError::NotFound(_) => "NotFoundError",
            NifiError::Api { .. } => "ApiError",
            NifiError::Timeout(_) => "TimeoutError",
            NifiError::Http(_) => "HttpError",
            NifiError::Json(_) => "SerializationError",
            NifiError::Io(_) => "IoError",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, NifiError::NotFound(_) | NifiError::Api { status: 404, .. })
    }

    pub fn input(msg: impl Into<String>) -> Self {
        NifiError::Input(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        NifiError::Configuration(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        NifiError::NotFound(msg.into())
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, NifiError>;
