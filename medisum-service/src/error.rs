use thiserror::Error;

/// Errors raised by the model backend.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("no model directory found (searched: {searched})")]
    NotFound { searched: String },

    #[error("failed to load model: {0}")]
    Load(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

/// Failure kinds of the summary pipeline.
///
/// The HTTP layer maps these to status codes; nothing below it knows about HTTP.
#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("Model not loaded")]
    NotLoaded,

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    GenerationFailure(String),
}

impl From<ModelError> for SummaryError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::NotFound { .. } => SummaryError::NotLoaded,
            other => SummaryError::GenerationFailure(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SummaryError>;
