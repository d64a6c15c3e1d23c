//! # Meridian Market Data Crate
//!
//! This crate is the application's window onto the market venue. It defines
//! the abstract `MarketDataSource` trait that the execution path consumes,
//! and a concrete `ClobClient` that fetches order-book snapshots from a
//! CLOB-style REST API.
//!
//! ## Architectural Principles
//!
//! - **Port & Adapter:** The rest of the system only ever sees the
//!   `MarketDataSource` trait, so tests can substitute a static book and the
//!   venue can be swapped without touching the execution code.
//! - **Normalization at the Boundary:** The venue returns prices as decimal
//!   strings in whatever order it likes. This crate parses them into
//!   `Decimal` and sorts both sides best-first before anything downstream
//!   sees the snapshot.

use async_trait::async_trait;
use core_types::{OrderBook, PriceLevel};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;

use crate::responses::{ApiErrorResponse, RawBook, RawLevel};

pub mod error;
pub mod responses;

pub use error::MarketDataError;

/// The generic, abstract interface to an order-book snapshot provider.
/// This trait is the contract the execution router uses, allowing the
/// underlying implementation (live or mock) to be swapped out.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetches a point-in-time bid/ask snapshot for one outcome token.
    async fn get_order_book(&self, token_id: &str) -> Result<OrderBook, MarketDataError>;
}

/// A concrete `MarketDataSource` over a CLOB REST API.
#[derive(Debug, Clone)]
pub struct ClobClient {
    client: reqwest::Client,
    base_url: String,
}

impl ClobClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, MarketDataError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn parse_level(raw: &RawLevel) -> Result<PriceLevel, MarketDataError> {
        let price = Decimal::from_str(&raw.price)
            .map_err(|e| MarketDataError::Deserialization(format!("price {:?}: {e}", raw.price)))?;
        let size = Decimal::from_str(&raw.size)
            .map_err(|e| MarketDataError::Deserialization(format!("size {:?}: {e}", raw.size)))?;
        Ok(PriceLevel { price, size })
    }
}

#[async_trait]
impl MarketDataSource for ClobClient {
    async fn get_order_book(&self, token_id: &str) -> Result<OrderBook, MarketDataError> {
        let url = format!("{}/book", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("token_id", token_id)])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&text)
                .map(|e| e.error)
                .unwrap_or(text);
            return Err(MarketDataError::Api(status.as_u16(), message));
        }

        let raw: RawBook = serde_json::from_str(&text)
            .map_err(|e| MarketDataError::Deserialization(e.to_string()))?;

        let mut bids = raw
            .bids
            .iter()
            .map(Self::parse_level)
            .collect::<Result<Vec<_>, _>>()?;
        let mut asks = raw
            .asks
            .iter()
            .map(Self::parse_level)
            .collect::<Result<Vec<_>, _>>()?;

        // Best-first: highest bid, lowest ask.
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));

        tracing::debug!(
            token_id,
            bid_levels = bids.len(),
            ask_levels = asks.len(),
            "fetched order book snapshot"
        );

        Ok(OrderBook {
            token_id: token_id.to_string(),
            bids,
            asks,
        })
    }
}
