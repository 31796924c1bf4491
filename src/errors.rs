use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataHubError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Upstream error: {0}")]
    UpstreamError(String),

    #[error("Transport error: {0}")]
    TransportError(#[from] reqwest::Error),

    #[error("Persistence error: {0}")]
    PersistenceError(#[from] mongodb::error::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Date parsing error: {0}")]
    DateError(#[from] chrono::ParseError),

    #[error("BSON error: {0}")]
    BsonError(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, DataHubError>;

impl From<mongodb::bson::ser::Error> for DataHubError {
    fn from(e: mongodb::bson::ser::Error) -> Self {
        DataHubError::BsonError(e.to_string())
    }
}

impl From<mongodb::bson::de::Error> for DataHubError {
    fn from(e: mongodb::bson::de::Error) -> Self {
        DataHubError::BsonError(e.to_string())
    }
}

impl From<String> for DataHubError {
    fn from(s: String) -> Self {
        DataHubError::Unknown(s)
    }
}
