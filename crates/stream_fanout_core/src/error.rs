use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("stream event must be a JSON object")]
    NotAnObject,
    #[error("stream event must include Records array")]
    MissingRecords,
    #[error("invalid change record at index {index}: {source}")]
    InvalidRecord {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{name} must be one of `batch` or `items`, got `{value}`")]
    InvalidFailureMode { name: &'static str, value: String },
    #[error("{name} must be a positive integer, got `{value}`")]
    InvalidAttempts { name: &'static str, value: String },
}
