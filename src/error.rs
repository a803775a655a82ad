use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Snapshot serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Required columns not found: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("{0}")]
    Other(String),
}
