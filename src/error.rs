use thiserror::Error;

/// Run-level failures. Only these abort a scan.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Universe fetch failed: {0}")]
    Universe(#[source] ProviderError),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Failures reported by the external collaborators (universe, history,
/// market cap, chart rendering).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no data: {0}")]
    NoData(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed data: {0}")]
    Malformed(String),

    #[error("render error: {0}")]
    Render(String),
}

/// Why a single symbol produced no alert record. Absorbed by the coordinator.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("insufficient history: {valid} valid rows, need {required}")]
    InsufficientHistory { valid: usize, required: usize },

    #[error("{0} timed out")]
    Timeout(&'static str),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("channel rejected message: {0}")]
    Rejected(String),
}
