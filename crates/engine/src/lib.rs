//! # Meridian Engine Crate
//!
//! The top-level orchestrator for trade-plan execution. `PlanEngine` is the
//! sole entry point the CLI talks to: it enforces plan-level idempotency,
//! drives every trade in a plan sequentially through the
//! [`executor::ExecutionRouter`], assembles the run summary, and maintains
//! the immutable execution-history audit trail.
//!
//! ## Guarantees
//!
//! - **At-most-once:** an execution-history record is created as the first
//!   committed write; its primary key is the idempotency key. A plan id
//!   with an existing record, whatever its terminal state, is rejected as
//!   a duplicate unless re-execution is explicitly requested.
//! - **Fail-fast, per-trade atomicity:** trades run strictly in plan order;
//!   the first error aborts the remainder. Earlier trades stay committed:
//!   there is no transaction spanning the whole plan, and a long
//!   transaction against a live market would act on stale snapshots.
//! - **Audit trail:** the history record always reaches a terminal state:
//!   `completed` with the summary attached, or `failed` with the error
//!   message, regardless of which trade broke.

use chrono::Utc;
use core_types::{ExecutionRecord, OrderStatus, Position, RunStatus, RunSummary, TradePlan};
use database::{StoreError, TradeStore};
use executor::{ExecutionRouter, PositionLedger};
use rust_decimal::Decimal;
use std::sync::Arc;

pub mod error;

pub use error::EngineError;

/// The central orchestrator for trade-plan execution.
pub struct PlanEngine {
    store: Arc<dyn TradeStore>,
    router: ExecutionRouter,
}

impl PlanEngine {
    /// Creates a new `PlanEngine`. The store is shared with the router so
    /// summaries read exactly what the router committed.
    pub fn new(store: Arc<dyn TradeStore>, router: ExecutionRouter) -> Self {
        Self { store, router }
    }

    /// The position ledger backing this engine, for read-only lookups.
    pub fn ledger(&self) -> &PositionLedger {
        self.router.ledger()
    }

    /// Executes a validated trade plan, at most once per plan id.
    ///
    /// With `reexecute` set, an already-executed plan runs again under a
    /// fresh, distinctly-suffixed audit key; the orders it creates are
    /// still attributed to the original plan id, keeping position
    /// accounting continuous across runs.
    pub async fn execute_trade_plan(
        &self,
        plan: &TradePlan,
        reexecute: bool,
    ) -> Result<RunSummary, EngineError> {
        let record_id = match self.store.get_execution_record(&plan.plan_id).await? {
            Some(existing) if !reexecute => {
                tracing::warn!(
                    plan_id = %plan.plan_id,
                    status = %existing.status,
                    "rejecting duplicate plan submission"
                );
                return Err(EngineError::DuplicatePlan(plan.plan_id.clone()));
            }
            Some(_) => {
                // Re-execution mints a new audit key instead of reusing the
                // idempotency key. Audit identity and order-attribution
                // identity are distinct concepts: the former governs
                // at-most-once, the latter position continuity.
                let record_id = format!("{}-rerun-{}", plan.plan_id, Utc::now().timestamp());
                tracing::info!(
                    plan_id = %plan.plan_id,
                    %record_id,
                    "re-execution requested; minting fresh audit record"
                );
                record_id
            }
            None => plan.plan_id.clone(),
        };

        let record = ExecutionRecord {
            plan_id: record_id.clone(),
            payload: serde_json::to_value(plan)?,
            status: RunStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            summary: None,
            error_message: None,
        };

        // First committed write. If two processes race on a fresh plan id,
        // the history table's primary key decides the winner and the loser
        // sees a duplicate.
        self.store
            .insert_execution_record(&record)
            .await
            .map_err(|e| match e {
                StoreError::DuplicatePlan(id) => EngineError::DuplicatePlan(id),
                other => EngineError::Store(other),
            })?;

        match self.run_trades(plan).await {
            Ok(summary) => {
                let summary_json = serde_json::to_value(&summary)?;
                self.store
                    .complete_execution_record(&record_id, &summary_json)
                    .await?;
                tracing::info!(
                    plan_id = %plan.plan_id,
                    orders_placed = summary.orders_placed,
                    orders_filled = summary.orders_filled,
                    total_realized_pnl = %summary.total_realized_pnl,
                    "plan completed"
                );
                Ok(summary)
            }
            Err(err) => {
                tracing::error!(plan_id = %plan.plan_id, error = %err, "plan failed");
                if let Err(update_err) = self
                    .store
                    .fail_execution_record(&record_id, &err.to_string())
                    .await
                {
                    // The primary error is what the caller needs; the
                    // bookkeeping failure only gets logged.
                    tracing::error!(
                        %record_id,
                        error = %update_err,
                        "could not mark execution record as failed"
                    );
                }
                Err(err)
            }
        }
    }

    /// Read-only audit lookup for the CLI.
    pub async fn get_execution_history(
        &self,
        plan_id: &str,
    ) -> Result<Option<ExecutionRecord>, EngineError> {
        Ok(self.store.get_execution_record(plan_id).await?)
    }

    /// Runs every trade sequentially, in plan order, failing fast on the
    /// first error. Ordering matters: it determines which sell validations
    /// see which prior buys as available position.
    async fn run_trades(&self, plan: &TradePlan) -> Result<RunSummary, EngineError> {
        for (index, intent) in plan.trades.iter().enumerate() {
            tracing::debug!(
                plan_id = %plan.plan_id,
                trade = index + 1,
                total = plan.trades.len(),
                token_id = %intent.token_id,
                side = %intent.side,
                kind = %intent.kind,
                "executing trade"
            );
            self.router.execute_trade(&plan.plan_id, intent).await?;
        }
        self.build_summary(plan).await
    }

    async fn build_summary(&self, plan: &TradePlan) -> Result<RunSummary, EngineError> {
        let orders = self.store.get_orders_by_plan(&plan.plan_id).await?;

        let orders_filled = orders
            .iter()
            .filter(|o| o.status == OrderStatus::Filled)
            .count();
        let orders_open = orders
            .iter()
            .filter(|o| o.status == OrderStatus::Open)
            .count();
        let orders_failed = orders
            .iter()
            .filter(|o| o.status == OrderStatus::Failed)
            .count();

        // Distinct token+outcome pairs in first-touched order.
        let mut markets: Vec<(String, String)> = Vec::new();
        for order in &orders {
            let key = (order.token_id.clone(), order.outcome.clone());
            if !markets.contains(&key) {
                markets.push(key);
            }
        }

        let mut positions: Vec<Position> = Vec::new();
        for (token_id, outcome) in &markets {
            if let Some(position) = self
                .ledger()
                .calculate_position(token_id, outcome, self.router.mode())
                .await?
            {
                positions.push(position);
            }
        }

        let total_realized_pnl: Decimal = positions.iter().map(|p| p.realized_pnl).sum();

        Ok(RunSummary {
            plan_id: plan.plan_id.clone(),
            orders_placed: orders.len(),
            orders_filled,
            orders_open,
            orders_failed,
            total_realized_pnl,
            positions,
        })
    }
}
