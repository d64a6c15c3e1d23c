use serde::Deserialize;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub market_data: MarketData,
    pub execution: Execution,
}

/// Connection parameters for the order-book snapshot endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketData {
    /// Base URL of the CLOB REST API (e.g. "https://clob.polymarket.com").
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

/// Parameters for the trade execution path.
#[derive(Debug, Clone, Deserialize)]
pub struct Execution {
    /// The mode new orders are tagged with unless overridden on the CLI:
    /// "paper" or "live".
    pub default_mode: String,
}
