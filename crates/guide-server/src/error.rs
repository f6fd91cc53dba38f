use guide_core::category::Category;
use guide_core::completion::CompletionError;
use guide_core::error::CommonError;

/// Startup failures. Any of these stops the process before it binds.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("config error: {0}")]
    Config(String),
}

/// Per-request failures of the guide pipeline.
#[derive(Debug, thiserror::Error)]
pub enum GuideError {
    #[error("Missing required fields: type and input")]
    MissingFields,

    #[error("Invalid type '{0}'. Must be one of: {types}", types = valid_types())]
    InvalidCategory(String),

    #[error("rate limit exceeded: try again in ~{retry_after_ms}ms")]
    RateLimited { retry_after_ms: u128 },

    #[error("guide generation failed: {0}")]
    Generation(#[from] CompletionError),
}

impl GuideError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, GuideError::MissingFields | GuideError::InvalidCategory(_))
    }
}

fn valid_types() -> String {
    Category::ALL
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
