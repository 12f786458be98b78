use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("malformed query: {0}")]
    MalformedQuery(&'static str),
    #[error("invalid financial facts: {0}")]
    InvalidFinancialFacts(String),
    #[error("unknown rate table version: {0}")]
    UnknownRateTable(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("other: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl From<anyhow::Error> for CoreError {
    fn from(value: anyhow::Error) -> Self {
        Self::Other(value.to_string())
    }
}
