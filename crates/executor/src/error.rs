use core_types::OrderSide;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Not enough position to sell. Required: {required}, Available: {available}")]
    InsufficientPosition {
        required: Decimal,
        available: Decimal,
    },

    #[error("No opposing liquidity for {side} order on token '{token_id}'")]
    NoLiquidity { token_id: String, side: OrderSide },

    #[error("Simulated fill price {price} lies outside the valid (0, 1) range")]
    InvalidPrice { price: Decimal },

    #[error("Limit order for token '{0}' is missing its limit price")]
    MissingLimitPrice(String),

    #[error("Live order routing is not implemented yet; run in paper mode")]
    LiveUnsupported,

    #[error("Market data error: {0}")]
    MarketData(#[from] market_data::MarketDataError),

    #[error("Database error: {0}")]
    Store(#[from] database::StoreError),
}
