//! Error taxonomy shared by the dataset, query, and model layers.

/// Errors surfaced by library operations. None of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("source not found: {source_name}")]
    SourceNotFound { source_name: String },

    #[error("could not parse source: {0}")]
    ParseError(String),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("percent {0} is outside [0.01, 0.99]")]
    InvalidRange(f64),

    #[error("unknown aggregation method: {0}")]
    InvalidMethod(String),

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
}

impl AnalyticsError {
    /// Stable machine-readable code for the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalyticsError::SourceNotFound { .. } => "source_not_found",
            AnalyticsError::ParseError(_) => "parse_error",
            AnalyticsError::UnknownColumn(_) => "unknown_column",
            AnalyticsError::InvalidRange(_) => "invalid_range",
            AnalyticsError::InvalidMethod(_) => "invalid_method",
            AnalyticsError::ModelUnavailable(_) => "model_unavailable",
        }
    }

    pub(crate) fn not_found(source_name: impl Into<String>) -> Self {
        AnalyticsError::SourceNotFound {
            source_name: source_name.into(),
        }
    }
}

impl From<csv::Error> for AnalyticsError {
    fn from(e: csv::Error) -> Self {
        AnalyticsError::ParseError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
