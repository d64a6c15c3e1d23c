use crate::error::ExecutorError;
use core_types::{OrderBook, OrderKind, OrderSide, TradeIntent};
use rust_decimal::Decimal;

/// The outcome of simulating one trade intent against one book snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedFill {
    /// Execution price: always the opposing top-of-book, never worse.
    pub price: Decimal,
    /// Outcome tokens exchanged, `size / price`.
    pub quantity: Decimal,
}

/// Decides whether and at what price/quantity a trade intent executes
/// against a market snapshot.
///
/// Zero-slippage model: a fill always happens at the opposing top-of-book
/// price, in full, regardless of the level's posted size. `Ok(None)` means
/// a limit order that does not cross and rests on the book.
///
/// This function is pure: no persistence, no position lookups, no I/O.
pub fn simulate_fill(
    intent: &TradeIntent,
    book: &OrderBook,
) -> Result<Option<SimulatedFill>, ExecutorError> {
    let fill_price = match (intent.kind, intent.side) {
        (OrderKind::Market, OrderSide::Buy) => top_of_book(book, OrderSide::Buy, intent)?,
        (OrderKind::Market, OrderSide::Sell) => top_of_book(book, OrderSide::Sell, intent)?,
        (OrderKind::Limit, OrderSide::Buy) => {
            let best_ask = top_of_book(book, OrderSide::Buy, intent)?;
            let limit = limit_price(intent)?;
            if limit >= best_ask {
                // Crosses the spread: favorable execution at the ask, not
                // at the limit price itself.
                best_ask
            } else {
                return Ok(None);
            }
        }
        (OrderKind::Limit, OrderSide::Sell) => {
            let best_bid = top_of_book(book, OrderSide::Sell, intent)?;
            let limit = limit_price(intent)?;
            if limit <= best_bid {
                best_bid
            } else {
                return Ok(None);
            }
        }
    };

    // Outcome-token prices are probabilities; anything outside (0, 1) means
    // the snapshot itself is malformed.
    if fill_price <= Decimal::ZERO || fill_price >= Decimal::ONE {
        return Err(ExecutorError::InvalidPrice { price: fill_price });
    }

    let quantity = intent.size / fill_price;

    Ok(Some(SimulatedFill {
        price: fill_price,
        quantity,
    }))
}

/// The opposing top-of-book price for the given order side: best ask for a
/// buy, best bid for a sell.
fn top_of_book(
    book: &OrderBook,
    side: OrderSide,
    intent: &TradeIntent,
) -> Result<Decimal, ExecutorError> {
    let price = match side {
        OrderSide::Buy => book.best_ask(),
        OrderSide::Sell => book.best_bid(),
    };
    price.ok_or_else(|| ExecutorError::NoLiquidity {
        token_id: intent.token_id.clone(),
        side,
    })
}

fn limit_price(intent: &TradeIntent) -> Result<Decimal, ExecutorError> {
    intent
        .price
        .ok_or_else(|| ExecutorError::MissingLimitPrice(intent.token_id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::PriceLevel;
    use rust_decimal_macros::dec;

    fn book(bids: &[(Decimal, Decimal)], asks: &[(Decimal, Decimal)]) -> OrderBook {
        OrderBook {
            token_id: "tok-1".to_string(),
            bids: bids
                .iter()
                .map(|&(price, size)| PriceLevel { price, size })
                .collect(),
            asks: asks
                .iter()
                .map(|&(price, size)| PriceLevel { price, size })
                .collect(),
        }
    }

    fn intent(side: OrderSide, kind: OrderKind, size: Decimal, price: Option<Decimal>) -> TradeIntent {
        TradeIntent {
            token_id: "tok-1".to_string(),
            outcome: "YES".to_string(),
            side,
            kind,
            size,
            price,
            note: None,
        }
    }

    #[test]
    fn market_buy_fills_at_best_ask() {
        let book = book(&[(dec!(0.40), dec!(500))], &[(dec!(0.45), dec!(500))]);
        let fill = simulate_fill(
            &intent(OrderSide::Buy, OrderKind::Market, dec!(90), None),
            &book,
        )
        .expect("simulation should succeed")
        .expect("market order should fill");
        assert_eq!(fill.price, dec!(0.45));
        assert_eq!(fill.quantity, dec!(200));
    }

    #[test]
    fn market_sell_fills_at_best_bid() {
        let book = book(&[(dec!(0.40), dec!(500))], &[(dec!(0.45), dec!(500))]);
        let fill = simulate_fill(
            &intent(OrderSide::Sell, OrderKind::Market, dec!(40), None),
            &book,
        )
        .expect("simulation should succeed")
        .expect("market order should fill");
        assert_eq!(fill.price, dec!(0.40));
        assert_eq!(fill.quantity, dec!(100));
    }

    #[test]
    fn market_buy_with_no_asks_reports_no_liquidity() {
        let book = book(&[(dec!(0.40), dec!(500))], &[]);
        let err = simulate_fill(
            &intent(OrderSide::Buy, OrderKind::Market, dec!(10), None),
            &book,
        )
        .unwrap_err();
        assert!(matches!(err, ExecutorError::NoLiquidity { .. }));
    }

    #[test]
    fn market_sell_with_no_bids_reports_no_liquidity() {
        let book = book(&[], &[(dec!(0.45), dec!(500))]);
        let err = simulate_fill(
            &intent(OrderSide::Sell, OrderKind::Market, dec!(10), None),
            &book,
        )
        .unwrap_err();
        assert!(matches!(err, ExecutorError::NoLiquidity { .. }));
    }

    #[test]
    fn aggressive_limit_buy_fills_at_ask_not_limit() {
        let book = book(&[(dec!(0.40), dec!(500))], &[(dec!(0.45), dec!(500))]);
        let fill = simulate_fill(
            &intent(OrderSide::Buy, OrderKind::Limit, dec!(90), Some(dec!(0.50))),
            &book,
        )
        .expect("simulation should succeed")
        .expect("crossing limit should fill");
        assert_eq!(fill.price, dec!(0.45));
    }

    #[test]
    fn passive_limit_buy_rests() {
        let book = book(&[(dec!(0.40), dec!(500))], &[(dec!(0.45), dec!(500))]);
        let outcome = simulate_fill(
            &intent(OrderSide::Buy, OrderKind::Limit, dec!(90), Some(dec!(0.40))),
            &book,
        )
        .expect("simulation should succeed");
        assert!(outcome.is_none());
    }

    #[test]
    fn limit_sell_crosses_at_bid() {
        let book = book(&[(dec!(0.40), dec!(500))], &[(dec!(0.45), dec!(500))]);
        let fill = simulate_fill(
            &intent(OrderSide::Sell, OrderKind::Limit, dec!(40), Some(dec!(0.38))),
            &book,
        )
        .expect("simulation should succeed")
        .expect("crossing limit should fill");
        assert_eq!(fill.price, dec!(0.40));
        assert_eq!(fill.quantity, dec!(100));
    }

    #[test]
    fn limit_sell_above_bid_rests() {
        let book = book(&[(dec!(0.40), dec!(500))], &[(dec!(0.45), dec!(500))]);
        let outcome = simulate_fill(
            &intent(OrderSide::Sell, OrderKind::Limit, dec!(40), Some(dec!(0.42))),
            &book,
        )
        .expect("simulation should succeed");
        assert!(outcome.is_none());
    }

    #[test]
    fn malformed_book_price_is_rejected() {
        // A "probability" of 1.2 can only come from corrupt market data.
        let book = book(&[], &[(dec!(1.2), dec!(500))]);
        let err = simulate_fill(
            &intent(OrderSide::Buy, OrderKind::Market, dec!(10), None),
            &book,
        )
        .unwrap_err();
        assert!(matches!(err, ExecutorError::InvalidPrice { .. }));
    }
}
