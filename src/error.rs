use thiserror::Error;

/// Failure kinds for remote generation calls.
///
/// Every kind except `Planning` is retryable; `Planning` means both outline
/// model tiers were already exhausted and there is nothing left to try.
#[derive(Debug, Error)]
pub enum GenError {
    #[error("remote generation call failed: {0}")]
    Remote(String),

    #[error("model output did not match the required shape: {0}")]
    MalformedOutput(String),

    #[error("backend responded without an inline image part")]
    NoImageReturned,

    #[error("outline planning failed: {0}")]
    Planning(String),
}

impl From<reqwest::Error> for GenError {
    fn from(e: reqwest::Error) -> Self {
        GenError::Remote(e.to_string())
    }
}
