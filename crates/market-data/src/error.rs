use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("HTTP request to the market data API failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to deserialize market data response: {0}")]
    Deserialization(String),

    #[error("The market data API returned invalid data: {0}")]
    InvalidData(String),

    #[error("The market data API returned an error: status {0}: {1}")]
    Api(u16, String),
}
