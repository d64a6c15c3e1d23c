use crate::error::ExecutorError;
use core_types::{ExecutionMode, OrderSide, Position};
use database::{MarketFill, TradeStore};
use rust_decimal::Decimal;
use std::sync::Arc;

/// The result of checking whether a sell is covered by existing position.
#[derive(Debug, Clone, Copy)]
pub struct SellCheck {
    pub valid: bool,
    /// Net quantity currently held, zero when no position exists.
    pub available: Decimal,
}

/// Computes read-only position snapshots for one token + outcome + mode by
/// aggregating the persisted fill history on demand.
///
/// There is intentionally no maintained running total: every read reflects
/// whatever fills have committed. A cached counter would have to be updated
/// inside the same transaction as each fill insert to preserve that
/// read-after-write guarantee.
#[derive(Clone)]
pub struct PositionLedger {
    store: Arc<dyn TradeStore>,
}

impl PositionLedger {
    pub fn new(store: Arc<dyn TradeStore>) -> Self {
        Self { store }
    }

    /// Aggregates all fills for the key into a position snapshot, or `None`
    /// when nothing has ever filled.
    pub async fn calculate_position(
        &self,
        token_id: &str,
        outcome: &str,
        mode: ExecutionMode,
    ) -> Result<Option<Position>, ExecutorError> {
        let fills = self
            .store
            .get_fills_for_market(token_id, outcome, mode)
            .await?;
        Ok(aggregate_fills(token_id, outcome, &fills))
    }

    /// `valid` iff a position exists, is long, and covers `required`.
    pub async fn validate_sell(
        &self,
        token_id: &str,
        outcome: &str,
        mode: ExecutionMode,
        required: Decimal,
    ) -> Result<SellCheck, ExecutorError> {
        let position = self.calculate_position(token_id, outcome, mode).await?;
        let available = position.map_or(Decimal::ZERO, |p| p.net_quantity);
        Ok(SellCheck {
            valid: available > Decimal::ZERO && available >= required,
            available,
        })
    }
}

/// The pure fold behind `calculate_position`.
///
/// - net quantity = bought − sold.
/// - average price = weighted basis of the open side: BUY cost basis when
///   net ≥ 0 (including fully closed), SELL proceeds basis when net < 0.
/// - realized P&L is taken over the closed quantity `min(bought, sold)`:
///   proceeds attributable to the closed quantity minus cost pro-rated by
///   the closed/bought ratio.
pub fn aggregate_fills(token_id: &str, outcome: &str, fills: &[MarketFill]) -> Option<Position> {
    if fills.is_empty() {
        return None;
    }

    let mut bought_qty = Decimal::ZERO;
    let mut bought_cost = Decimal::ZERO;
    let mut sold_qty = Decimal::ZERO;
    let mut sold_proceeds = Decimal::ZERO;

    for fill in fills {
        match fill.side {
            OrderSide::Buy => {
                bought_qty += fill.quantity;
                bought_cost += fill.quantity * fill.price;
            }
            OrderSide::Sell => {
                sold_qty += fill.quantity;
                sold_proceeds += fill.quantity * fill.price;
            }
        }
    }

    let net_quantity = bought_qty - sold_qty;
    let closed_qty = bought_qty.min(sold_qty);

    let realized_pnl = if closed_qty > Decimal::ZERO {
        let proceeds_on_closed = sold_proceeds * closed_qty / sold_qty;
        let cost_on_closed = bought_cost * closed_qty / bought_qty;
        proceeds_on_closed - cost_on_closed
    } else {
        Decimal::ZERO
    };

    let avg_price = if net_quantity >= Decimal::ZERO {
        if bought_qty > Decimal::ZERO {
            bought_cost / bought_qty
        } else {
            Decimal::ZERO
        }
    } else {
        sold_proceeds / sold_qty
    };

    Some(Position {
        token_id: token_id.to_string(),
        outcome: outcome.to_string(),
        net_quantity,
        avg_price,
        realized_pnl,
    })
}
