use serde::Deserialize;

/// One raw price level as returned by the CLOB book endpoint. Prices and
/// sizes arrive as decimal strings, e.g. `{"price": "0.45", "size": "120"}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawLevel {
    pub price: String,
    pub size: String,
}

/// The raw response from `GET /book?token_id=...`.
///
/// The venue orders bids ascending and asks descending; we re-sort to
/// best-first rather than trusting the wire ordering.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBook {
    #[serde(default)]
    pub bids: Vec<RawLevel>,
    #[serde(default)]
    pub asks: Vec<RawLevel>,
}

/// Represents an error response from the CLOB API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: String,
}
