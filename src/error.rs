//! Error taxonomy for the triage workflow.
//!
//! Errors are grouped by layer: configuration resolution, history
//! persistence, generation, and case orchestration. Generation errors
//! propagate up into the failed case state; store errors never do (remote
//! reads degrade to an empty partition, writes are logged only).

use thiserror::Error;

/// Configuration resolution or persistence failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// History persistence failure.
///
/// `Remote` covers any failure talking to the REST-backed store; `Local`
/// covers filesystem-level failures of the local partition files. Neither
/// variant is allowed to decide a case's outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("remote history store error: {0}")]
    Remote(String),

    #[error("local history store error: {0}")]
    Local(String),
}

/// Failure reported by the generation endpoint or while decoding its reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// No usable API key was configured. Raised before any network call.
    #[error("no generation API key is configured")]
    MissingCredential,

    /// The endpoint rejected the configured credential. Distinguished from
    /// generic failures so callers can force re-authentication.
    #[error("the generation endpoint rejected the configured credential (HTTP {status})")]
    Authentication { status: u16 },

    /// Syntactically valid response with no content payload.
    #[error("the generation endpoint returned an empty response")]
    EmptyResponse,

    /// The content payload is not valid JSON.
    #[error("generation response is not valid JSON: {0}")]
    ResponseParse(String),

    /// The content payload parsed but a required field is absent or mistyped.
    #[error("generation response is missing required field '{field}'")]
    MalformedResponse { field: &'static str },

    /// Transport-level failure (connect, timeout, TLS).
    #[error("generation request failed: {0}")]
    Http(String),

    /// Any other non-success status reported by the endpoint.
    #[error("generation endpoint error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

/// Failure of one triage case, as surfaced to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaseError {
    /// Caller-side: no input selected, or empty text. Never reaches the
    /// generation or history layers.
    #[error("{0}")]
    InvalidInput(String),

    /// A case is already pending for this workspace; at most one generation
    /// may be in flight at a time.
    #[error("a case is already being analyzed; wait for it to finish or reset the workspace")]
    CaseInFlight,

    #[error(transparent)]
    Generation(#[from] GenerationError),
}
