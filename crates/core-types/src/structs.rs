use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::enums::{ExecutionMode, OrderKind, OrderSide, OrderStatus, RunStatus};
use crate::error::CoreError;

/// A single trade instruction inside a plan. Immutable input; never
/// persisted as-is (the resulting `Order` row is the durable record).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeIntent {
    /// The outcome token to trade, as issued by the market venue.
    pub token_id: String,
    /// Human-readable outcome label (e.g. "YES").
    pub outcome: String,
    pub side: OrderSide,
    pub kind: OrderKind,
    /// Collateral to commit, in quote-currency units.
    pub size: Decimal,
    /// Limit price as a probability in (0, 1). Required iff `kind` is LIMIT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A batch of trade intents submitted as one idempotent unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradePlan {
    pub plan_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub trades: Vec<TradeIntent>,
}

impl TradePlan {
    /// Structural validation of a deserialized plan. Runs at the CLI
    /// boundary so the engine can assume well-formed input.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.plan_id.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "plan_id".to_string(),
                "must not be empty".to_string(),
            ));
        }
        if self.trades.is_empty() {
            return Err(CoreError::InvalidInput(
                "trades".to_string(),
                "plan must contain at least one trade".to_string(),
            ));
        }
        for (idx, trade) in self.trades.iter().enumerate() {
            if trade.size <= Decimal::ZERO {
                return Err(CoreError::InvalidInput(
                    format!("trades[{idx}].size"),
                    format!("must be positive, got {}", trade.size),
                ));
            }
            match (trade.kind, trade.price) {
                (OrderKind::Limit, None) => {
                    return Err(CoreError::InvalidInput(
                        format!("trades[{idx}].price"),
                        "limit orders require a price".to_string(),
                    ));
                }
                (OrderKind::Limit, Some(price)) => {
                    if price <= Decimal::ZERO || price >= Decimal::ONE {
                        return Err(CoreError::InvalidInput(
                            format!("trades[{idx}].price"),
                            format!("must lie strictly inside (0, 1), got {price}"),
                        ));
                    }
                }
                (OrderKind::Market, Some(_)) => {
                    return Err(CoreError::InvalidInput(
                        format!("trades[{idx}].price"),
                        "market orders must not carry a price".to_string(),
                    ));
                }
                (OrderKind::Market, None) => {}
            }
        }
        Ok(())
    }
}

/// A persisted order row. Created once per trade intent; the only mutation
/// is the `Open -> Filled` status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: Uuid,
    /// The plan this order is attributed to for position accounting. Always
    /// the original plan id, even for re-executed plans.
    pub plan_id: String,
    pub token_id: String,
    pub outcome: String,
    pub side: OrderSide,
    pub kind: OrderKind,
    /// Collateral committed, in quote-currency units.
    pub size: Decimal,
    /// Limit price; `None` for market orders.
    pub limit_price: Option<Decimal>,
    pub status: OrderStatus,
    pub mode: ExecutionMode,
    pub created_at: DateTime<Utc>,
}

/// A persisted fill. Immutable; at most one per order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub fill_id: Uuid,
    pub order_id: Uuid,
    /// Outcome tokens received or delivered, `size / price`.
    pub quantity: Decimal,
    /// Execution price in (0, 1).
    pub price: Decimal,
    pub executed_at: DateTime<Utc>,
}

/// A derived position snapshot for one token + outcome + mode. Never
/// stored; recomputed on demand from the fill history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub token_id: String,
    pub outcome: String,
    /// Net tokens held: bought minus sold. Positive means long.
    pub net_quantity: Decimal,
    /// Weighted-average price of the open side of the position.
    pub avg_price: Decimal,
    /// P&L locked in by fills that closed quantity, in collateral units.
    pub realized_pnl: Decimal,
}

/// One row of an order-book snapshot, best-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

/// A point-in-time order-book snapshot for a single outcome token.
/// Both sides are ordered best-first: bids descending, asks ascending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    pub token_id: String,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

impl OrderBook {
    /// The highest price a buyer is currently offering.
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|level| level.price)
    }

    /// The lowest price a seller is currently asking.
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|level| level.price)
    }
}

/// The result of a successful plan execution, also stored on the
/// execution-history record as its summary payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub plan_id: String,
    pub orders_placed: usize,
    pub orders_filled: usize,
    pub orders_open: usize,
    pub orders_failed: usize,
    /// Total realized P&L across every token + outcome the plan touched.
    pub total_realized_pnl: Decimal,
    pub positions: Vec<Position>,
}

/// The immutable audit trail of a plan submission. The primary key doubles
/// as the idempotency key: its existence blocks re-execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// The audit key. Equal to the plan id for a first execution; a
    /// distinctly-suffixed variant for explicit re-executions.
    pub plan_id: String,
    /// The submitted plan, stored verbatim for replay and debugging.
    pub payload: JsonValue,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub summary: Option<JsonValue>,
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn market_buy(size: Decimal) -> TradeIntent {
        TradeIntent {
            token_id: "tok-1".to_string(),
            outcome: "YES".to_string(),
            side: OrderSide::Buy,
            kind: OrderKind::Market,
            size,
            price: None,
            note: None,
        }
    }

    #[test]
    fn validate_accepts_well_formed_plan() {
        let plan = TradePlan {
            plan_id: "plan-1".to_string(),
            description: None,
            trades: vec![market_buy(dec!(50))],
        };
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_trade_list() {
        let plan = TradePlan {
            plan_id: "plan-1".to_string(),
            description: None,
            trades: vec![],
        };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_positive_size() {
        let plan = TradePlan {
            plan_id: "plan-1".to_string(),
            description: None,
            trades: vec![market_buy(dec!(0))],
        };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn validate_rejects_limit_without_price() {
        let mut intent = market_buy(dec!(10));
        intent.kind = OrderKind::Limit;
        let plan = TradePlan {
            plan_id: "plan-1".to_string(),
            description: None,
            trades: vec![intent],
        };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn validate_rejects_limit_price_outside_unit_interval() {
        let mut intent = market_buy(dec!(10));
        intent.kind = OrderKind::Limit;
        intent.price = Some(dec!(1.00));
        let plan = TradePlan {
            plan_id: "plan-1".to_string(),
            description: None,
            trades: vec![intent],
        };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn plan_json_uses_uppercase_side_and_kind() {
        let json = r#"{
            "plan_id": "plan-7",
            "trades": [
                {
                    "token_id": "tok-1",
                    "outcome": "YES",
                    "side": "BUY",
                    "kind": "LIMIT",
                    "size": "90",
                    "price": "0.45"
                }
            ]
        }"#;
        let plan: TradePlan = serde_json::from_str(json).expect("plan should deserialize");
        assert_eq!(plan.trades[0].side, OrderSide::Buy);
        assert_eq!(plan.trades[0].kind, OrderKind::Limit);
        assert_eq!(plan.trades[0].price, Some(dec!(0.45)));
        assert!(plan.validate().is_ok());
    }
}
