use crate::error::ExecutorError;
use crate::positions::PositionLedger;
use crate::simulator::simulate_fill;
use chrono::Utc;
use core_types::{ExecutionMode, Fill, Order, OrderSide, OrderStatus, TradeIntent};
use database::TradeStore;
use market_data::MarketDataSource;
use std::sync::Arc;
use uuid::Uuid;

/// What became of one routed trade intent.
#[derive(Debug, Clone)]
pub enum TradeOutcome {
    /// The trade executed; the order and its fill were persisted atomically.
    Filled { order: Order, fill: Fill },
    /// A limit order that did not cross; persisted as `open` with no fill.
    Resting { order: Order },
}

impl TradeOutcome {
    pub fn order(&self) -> &Order {
        match self {
            TradeOutcome::Filled { order, .. } => order,
            TradeOutcome::Resting { order } => order,
        }
    }
}

/// The per-trade entry point: applies side-specific preconditions, runs the
/// fill simulation against a fresh snapshot, and persists the result.
///
/// Side effects are strictly limited to the one order (plus at most one
/// fill) created per call. Errors propagate unchanged with zero writes.
pub struct ExecutionRouter {
    store: Arc<dyn TradeStore>,
    market_data: Arc<dyn MarketDataSource>,
    ledger: PositionLedger,
    mode: ExecutionMode,
}

impl ExecutionRouter {
    pub fn new(
        store: Arc<dyn TradeStore>,
        market_data: Arc<dyn MarketDataSource>,
        mode: ExecutionMode,
    ) -> Self {
        let ledger = PositionLedger::new(store.clone());
        Self {
            store,
            market_data,
            ledger,
            mode,
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// The position ledger sharing this router's store, used by the plan
    /// engine to assemble run summaries.
    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    /// Executes one trade intent on behalf of a plan.
    ///
    /// `plan_id` is the attribution key written onto the order row: always
    /// the original plan id, even when the surrounding run is an explicit
    /// re-execution under a different audit key.
    pub async fn execute_trade(
        &self,
        plan_id: &str,
        intent: &TradeIntent,
    ) -> Result<TradeOutcome, ExecutorError> {
        if self.mode == ExecutionMode::Live {
            // Live routing needs credential management and order signing;
            // both are future-phase. Refuse before any side effect.
            return Err(ExecutorError::LiveUnsupported);
        }

        if intent.side == OrderSide::Sell {
            self.check_sell_position(intent).await?;
        }

        let book = self.market_data.get_order_book(&intent.token_id).await?;

        match simulate_fill(intent, &book)? {
            Some(simulated) => {
                let order = self.build_order(plan_id, intent, OrderStatus::Filled);
                let fill = Fill {
                    fill_id: Uuid::new_v4(),
                    order_id: order.order_id,
                    quantity: simulated.quantity,
                    price: simulated.price,
                    executed_at: Utc::now(),
                };

                self.store.execute_trade_transaction(&order, &fill).await?;

                tracing::info!(
                    plan_id,
                    token_id = %intent.token_id,
                    side = %intent.side,
                    price = %fill.price,
                    quantity = %fill.quantity,
                    "trade filled"
                );

                Ok(TradeOutcome::Filled { order, fill })
            }
            None => {
                let order = self.build_order(plan_id, intent, OrderStatus::Open);
                self.store.create_order(&order).await?;

                tracing::info!(
                    plan_id,
                    token_id = %intent.token_id,
                    side = %intent.side,
                    limit_price = ?intent.price,
                    "limit order did not cross; resting"
                );

                Ok(TradeOutcome::Resting { order })
            }
        }
    }

    /// Gates a sell on the currently-held position before anything is
    /// simulated or written.
    ///
    /// The required quantity is valued at the current best bid; the actual
    /// fill recomputes its own price independently, so the book can move
    /// between this check and the fill. That race is a known limitation.
    async fn check_sell_position(&self, intent: &TradeIntent) -> Result<(), ExecutorError> {
        let book = self.market_data.get_order_book(&intent.token_id).await?;
        let best_bid = book.best_bid().ok_or_else(|| ExecutorError::NoLiquidity {
            token_id: intent.token_id.clone(),
            side: OrderSide::Sell,
        })?;

        let required = intent.size / best_bid;
        let check = self
            .ledger
            .validate_sell(&intent.token_id, &intent.outcome, self.mode, required)
            .await?;

        if !check.valid {
            return Err(ExecutorError::InsufficientPosition {
                required,
                available: check.available,
            });
        }
        Ok(())
    }

    fn build_order(&self, plan_id: &str, intent: &TradeIntent, status: OrderStatus) -> Order {
        Order {
            order_id: Uuid::new_v4(),
            plan_id: plan_id.to_string(),
            token_id: intent.token_id.clone(),
            outcome: intent.outcome.clone(),
            side: intent.side,
            kind: intent.kind,
            size: intent.size,
            limit_price: intent.price,
            status,
            mode: self.mode,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use core_types::{ExecutionRecord, OrderBook, OrderKind, PriceLevel};
    use database::{MarketFill, StoreError};
    use market_data::MarketDataError;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::Value as JsonValue;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// A market data source that always serves the same snapshot.
    struct StaticBook {
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
    }

    impl StaticBook {
        fn new(bids: &[(Decimal, Decimal)], asks: &[(Decimal, Decimal)]) -> Self {
            Self {
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
    }

    #[async_trait]
    impl MarketDataSource for StaticBook {
        async fn get_order_book(&self, token_id: &str) -> Result<OrderBook, MarketDataError> {
            Ok(OrderBook {
                token_id: token_id.to_string(),
                bids: self.bids.clone(),
                asks: self.asks.clone(),
            })
        }
    }

    /// An in-memory `TradeStore` honoring the transactional contract, with
    /// a switch to make the order+fill transaction fail before commit.
    #[derive(Default)]
    struct MemoryStore {
        orders: Mutex<Vec<Order>>,
        fills: Mutex<Vec<Fill>>,
        records: Mutex<Vec<ExecutionRecord>>,
        fail_trade_transaction: AtomicBool,
    }

    #[async_trait]
    impl TradeStore for MemoryStore {
        async fn create_order(&self, order: &Order) -> Result<(), StoreError> {
            self.orders.lock().unwrap().push(order.clone());
            Ok(())
        }

        async fn create_fill(&self, fill: &Fill) -> Result<(), StoreError> {
            self.fills.lock().unwrap().push(fill.clone());
            Ok(())
        }

        async fn execute_trade_transaction(
            &self,
            order: &Order,
            fill: &Fill,
        ) -> Result<(), StoreError> {
            if self.fail_trade_transaction.load(Ordering::SeqCst) {
                // Simulated crash between the order and fill inserts: the
                // rollback leaves neither row behind.
                return Err(StoreError::Database(sqlx::Error::PoolClosed));
            }
            let mut orders = self.orders.lock().unwrap();
            let mut fills = self.fills.lock().unwrap();
            orders.push(order.clone());
            fills.push(fill.clone());
            Ok(())
        }

        async fn get_orders_by_plan(&self, plan_id: &str) -> Result<Vec<Order>, StoreError> {
            Ok(self
                .orders
                .lock()
                .unwrap()
                .iter()
                .filter(|o| o.plan_id == plan_id)
                .cloned()
                .collect())
        }

        async fn get_fills_for_market(
            &self,
            token_id: &str,
            outcome: &str,
            mode: ExecutionMode,
        ) -> Result<Vec<MarketFill>, StoreError> {
            let orders = self.orders.lock().unwrap();
            let fills = self.fills.lock().unwrap();
            Ok(fills
                .iter()
                .filter_map(|fill| {
                    orders
                        .iter()
                        .find(|o| {
                            o.order_id == fill.order_id
                                && o.token_id == token_id
                                && o.outcome == outcome
                                && o.mode == mode
                        })
                        .map(|order| MarketFill {
                            side: order.side,
                            quantity: fill.quantity,
                            price: fill.price,
                            executed_at: fill.executed_at,
                        })
                })
                .collect())
        }

        async fn insert_execution_record(
            &self,
            record: &ExecutionRecord,
        ) -> Result<(), StoreError> {
            let mut records = self.records.lock().unwrap();
            if records.iter().any(|r| r.plan_id == record.plan_id) {
                return Err(StoreError::DuplicatePlan(record.plan_id.clone()));
            }
            records.push(record.clone());
            Ok(())
        }

        async fn complete_execution_record(
            &self,
            _plan_id: &str,
            _summary: &JsonValue,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn fail_execution_record(
            &self,
            _plan_id: &str,
            _error_message: &str,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn get_execution_record(
            &self,
            plan_id: &str,
        ) -> Result<Option<ExecutionRecord>, StoreError> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.plan_id == plan_id)
                .cloned())
        }
    }

    fn intent(
        side: OrderSide,
        kind: OrderKind,
        size: Decimal,
        price: Option<Decimal>,
    ) -> TradeIntent {
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

    fn router_over(
        store: Arc<MemoryStore>,
        bids: &[(Decimal, Decimal)],
        asks: &[(Decimal, Decimal)],
    ) -> ExecutionRouter {
        ExecutionRouter::new(
            store,
            Arc::new(StaticBook::new(bids, asks)),
            ExecutionMode::Paper,
        )
    }

    #[tokio::test]
    async fn market_buy_persists_order_and_fill_together() {
        let store = Arc::new(MemoryStore::default());
        let router = router_over(
            store.clone(),
            &[(dec!(0.40), dec!(500))],
            &[(dec!(0.45), dec!(500))],
        );

        let outcome = router
            .execute_trade(
                "plan-1",
                &intent(OrderSide::Buy, OrderKind::Market, dec!(90), None),
            )
            .await
            .expect("trade should execute");

        let TradeOutcome::Filled { order, fill } = outcome else {
            panic!("expected a filled outcome");
        };
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(fill.price, dec!(0.45));
        assert_eq!(fill.quantity, dec!(200));
        assert_eq!(store.orders.lock().unwrap().len(), 1);
        assert_eq!(store.fills.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn passive_limit_buy_rests_with_no_fill() {
        let store = Arc::new(MemoryStore::default());
        let router = router_over(
            store.clone(),
            &[(dec!(0.40), dec!(500))],
            &[(dec!(0.45), dec!(500))],
        );

        let outcome = router
            .execute_trade(
                "plan-1",
                &intent(OrderSide::Buy, OrderKind::Limit, dec!(90), Some(dec!(0.40))),
            )
            .await
            .expect("trade should execute");

        assert!(matches!(outcome, TradeOutcome::Resting { .. }));
        assert_eq!(store.orders.lock().unwrap()[0].status, OrderStatus::Open);
        assert!(store.fills.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sell_without_position_is_gated_before_any_write() {
        let store = Arc::new(MemoryStore::default());
        let router = router_over(
            store.clone(),
            &[(dec!(0.40), dec!(500))],
            &[(dec!(0.45), dec!(500))],
        );

        let err = router
            .execute_trade(
                "plan-1",
                &intent(OrderSide::Sell, OrderKind::Market, dec!(40), None),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ExecutorError::InsufficientPosition { available, .. } if available == Decimal::ZERO
        ));
        assert!(store.orders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sell_covered_by_prior_buy_executes() {
        let store = Arc::new(MemoryStore::default());
        let router = router_over(
            store.clone(),
            &[(dec!(0.40), dec!(500))],
            &[(dec!(0.45), dec!(500))],
        );

        router
            .execute_trade(
                "plan-1",
                &intent(OrderSide::Buy, OrderKind::Market, dec!(90), None),
            )
            .await
            .expect("buy should execute");

        // 200 tokens held; selling 40 collateral at bid 0.40 needs 100.
        let outcome = router
            .execute_trade(
                "plan-1",
                &intent(OrderSide::Sell, OrderKind::Market, dec!(40), None),
            )
            .await
            .expect("covered sell should execute");

        let TradeOutcome::Filled { fill, .. } = outcome else {
            panic!("expected a filled outcome");
        };
        assert_eq!(fill.price, dec!(0.40));
        assert_eq!(fill.quantity, dec!(100));
    }

    #[tokio::test]
    async fn sell_gating_counts_fills_seeded_outside_the_router() {
        let store = Arc::new(MemoryStore::default());

        // A filled buy recorded by an earlier run of some other plan.
        let order = Order {
            order_id: uuid::Uuid::new_v4(),
            plan_id: "plan-0".to_string(),
            token_id: "tok-1".to_string(),
            outcome: "YES".to_string(),
            side: OrderSide::Buy,
            kind: OrderKind::Market,
            size: dec!(60),
            limit_price: None,
            status: OrderStatus::Filled,
            mode: ExecutionMode::Paper,
            created_at: chrono::Utc::now(),
        };
        store.create_order(&order).await.unwrap();
        store
            .create_fill(&Fill {
                fill_id: uuid::Uuid::new_v4(),
                order_id: order.order_id,
                quantity: dec!(150),
                price: dec!(0.40),
                executed_at: chrono::Utc::now(),
            })
            .await
            .unwrap();

        let router = router_over(
            store.clone(),
            &[(dec!(0.40), dec!(500))],
            &[(dec!(0.45), dec!(500))],
        );

        // Selling 40 collateral at the 0.40 bid needs 100 of the 150 held.
        let outcome = router
            .execute_trade(
                "plan-1",
                &intent(OrderSide::Sell, OrderKind::Market, dec!(40), None),
            )
            .await
            .expect("covered sell should execute");
        assert!(matches!(outcome, TradeOutcome::Filled { .. }));
    }

    #[tokio::test]
    async fn failed_transaction_leaves_no_rows() {
        let store = Arc::new(MemoryStore::default());
        store.fail_trade_transaction.store(true, Ordering::SeqCst);
        let router = router_over(
            store.clone(),
            &[(dec!(0.40), dec!(500))],
            &[(dec!(0.45), dec!(500))],
        );

        let err = router
            .execute_trade(
                "plan-1",
                &intent(OrderSide::Buy, OrderKind::Market, dec!(90), None),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ExecutorError::Store(_)));
        assert!(store.orders.lock().unwrap().is_empty());
        assert!(store.fills.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn live_mode_is_refused_before_side_effects() {
        let store = Arc::new(MemoryStore::default());
        let router = ExecutionRouter::new(
            store.clone(),
            Arc::new(StaticBook::new(&[], &[(dec!(0.45), dec!(500))])),
            ExecutionMode::Live,
        );

        let err = router
            .execute_trade(
                "plan-1",
                &intent(OrderSide::Buy, OrderKind::Market, dec!(90), None),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ExecutorError::LiveUnsupported));
        assert!(store.orders.lock().unwrap().is_empty());
    }
}
