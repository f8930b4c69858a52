//! Request validation errors.

/// Problems with the text submitted for synthesis.
///
/// These are the client's fault and are never retried: no engine is consulted
/// once validation fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Text missing, empty, or whitespace only.
    #[error("No text provided")]
    EmptyText,

    /// The request body could not be decoded.
    #[error("Invalid request body: {0}")]
    MalformedBody(String),
}
