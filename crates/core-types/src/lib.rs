pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{ExecutionMode, OrderKind, OrderSide, OrderStatus, RunStatus};
pub use error::CoreError;
pub use structs::{
    ExecutionRecord, Fill, Order, OrderBook, Position, PriceLevel, RunSummary, TradeIntent,
    TradePlan,
};
