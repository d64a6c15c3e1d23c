use crate::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{
    ExecutionMode, ExecutionRecord, Fill, Order, OrderKind, OrderSide, OrderStatus, RunStatus,
};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// One fill joined to the side of its owning order. This is the raw input
/// to position aggregation: everything a position is, is a fold over these.
#[derive(Debug, Clone)]
pub struct MarketFill {
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub executed_at: DateTime<Utc>,
}

/// The persistence port for orders, fills, and execution history.
///
/// Components receive this as `Arc<dyn TradeStore>` so tests can substitute
/// an in-memory implementation. The contract every implementation must
/// honor: `execute_trade_transaction` is atomic (order and fill land
/// together or not at all), and `insert_execution_record` surfaces a
/// primary-key collision as `StoreError::DuplicatePlan`.
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Inserts a single order row. Used for resting limit orders, which
    /// have no fill to pair with.
    async fn create_order(&self, order: &Order) -> Result<(), StoreError>;

    /// Inserts a single fill row linked to an existing order.
    async fn create_fill(&self, fill: &Fill) -> Result<(), StoreError>;

    /// Persists an executed trade as one atomic unit: inserts the order
    /// with status `open`, inserts the linked fill, then flips the order to
    /// `filled`. Any failure rolls back all three steps.
    async fn execute_trade_transaction(&self, order: &Order, fill: &Fill)
        -> Result<(), StoreError>;

    /// All orders attributed to a plan, oldest first.
    async fn get_orders_by_plan(&self, plan_id: &str) -> Result<Vec<Order>, StoreError>;

    /// All fills for one token + outcome + mode, joined to their order's
    /// side, oldest first.
    async fn get_fills_for_market(
        &self,
        token_id: &str,
        outcome: &str,
        mode: ExecutionMode,
    ) -> Result<Vec<MarketFill>, StoreError>;

    /// Inserts a fresh `running` execution record. A unique-key violation
    /// means another submission won the race and is reported as
    /// `DuplicatePlan`.
    async fn insert_execution_record(&self, record: &ExecutionRecord) -> Result<(), StoreError>;

    /// Marks a record `completed` and attaches the run summary.
    async fn complete_execution_record(
        &self,
        plan_id: &str,
        summary: &JsonValue,
    ) -> Result<(), StoreError>;

    /// Marks a record `failed` and attaches the error message.
    async fn fail_execution_record(
        &self,
        plan_id: &str,
        error_message: &str,
    ) -> Result<(), StoreError>;

    async fn get_execution_record(
        &self,
        plan_id: &str,
    ) -> Result<Option<ExecutionRecord>, StoreError>;
}

/// The `DbRepository` provides a high-level, application-specific interface
/// to the database. It encapsulates all SQL queries and data access logic.
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: PgPool,
}

/// This struct represents a row fetched from the `orders` table.
#[derive(FromRow, Debug, Clone)]
struct DbOrder {
    order_id: Uuid,
    plan_id: String,
    token_id: String,
    outcome: String,
    side: String,
    order_kind: String,
    size: Decimal,
    limit_price: Option<Decimal>,
    order_status: String,
    execution_mode: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<DbOrder> for Order {
    type Error = StoreError;

    fn try_from(row: DbOrder) -> Result<Self, Self::Error> {
        Ok(Order {
            order_id: row.order_id,
            plan_id: row.plan_id,
            token_id: row.token_id,
            outcome: row.outcome,
            side: OrderSide::from_str(&row.side).map_err(|e| StoreError::Decode(e.to_string()))?,
            kind: OrderKind::from_str(&row.order_kind)
                .map_err(|e| StoreError::Decode(e.to_string()))?,
            size: row.size,
            limit_price: row.limit_price,
            status: OrderStatus::from_str(&row.order_status)
                .map_err(|e| StoreError::Decode(e.to_string()))?,
            mode: ExecutionMode::from_str(&row.execution_mode)
                .map_err(|e| StoreError::Decode(e.to_string()))?,
            created_at: row.created_at,
        })
    }
}

/// A fill row joined with its order's side, for position aggregation.
#[derive(FromRow, Debug, Clone)]
struct DbMarketFill {
    side: String,
    quantity: Decimal,
    fill_price: Decimal,
    executed_at: DateTime<Utc>,
}

impl TryFrom<DbMarketFill> for MarketFill {
    type Error = StoreError;

    fn try_from(row: DbMarketFill) -> Result<Self, Self::Error> {
        Ok(MarketFill {
            side: OrderSide::from_str(&row.side).map_err(|e| StoreError::Decode(e.to_string()))?,
            quantity: row.quantity,
            price: row.fill_price,
            executed_at: row.executed_at,
        })
    }
}

/// This struct represents a row fetched from the `execution_history` table.
#[derive(FromRow, Debug, Clone)]
struct DbExecutionRecord {
    plan_id: String,
    payload: JsonValue,
    run_status: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    summary: Option<JsonValue>,
    error_message: Option<String>,
}

impl TryFrom<DbExecutionRecord> for ExecutionRecord {
    type Error = StoreError;

    fn try_from(row: DbExecutionRecord) -> Result<Self, Self::Error> {
        Ok(ExecutionRecord {
            plan_id: row.plan_id,
            payload: row.payload,
            status: RunStatus::from_str(&row.run_status)
                .map_err(|e| StoreError::Decode(e.to_string()))?,
            started_at: row.started_at,
            completed_at: row.completed_at,
            summary: row.summary,
            error_message: row.error_message,
        })
    }
}

impl DbRepository {
    /// Creates a new `DbRepository` with a shared database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_order<'e, E>(executor: E, order: &Order, status: OrderStatus) -> Result<(), StoreError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO orders (
                order_id, plan_id, token_id, outcome, side, order_kind,
                size, limit_price, order_status, execution_mode, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(order.order_id)
        .bind(&order.plan_id)
        .bind(&order.token_id)
        .bind(&order.outcome)
        .bind(order.side.as_str())
        .bind(order.kind.as_str())
        .bind(order.size)
        .bind(order.limit_price)
        .bind(status.as_str())
        .bind(order.mode.as_str())
        .bind(order.created_at)
        .execute(executor)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TradeStore for DbRepository {
    async fn create_order(&self, order: &Order) -> Result<(), StoreError> {
        Self::insert_order(&self.pool, order, order.status).await
    }

    async fn create_fill(&self, fill: &Fill) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO fills (fill_id, order_id, quantity, fill_price, executed_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(fill.fill_id)
        .bind(fill.order_id)
        .bind(fill.quantity)
        .bind(fill.price)
        .bind(fill.executed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn execute_trade_transaction(
        &self,
        order: &Order,
        fill: &Fill,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // Insert as `open`, attach the fill, then flip to `filled`. The
        // transaction guarantees no observer ever sees an orphan of either.
        Self::insert_order(&mut *tx, order, OrderStatus::Open).await?;

        sqlx::query(
            r#"
            INSERT INTO fills (fill_id, order_id, quantity, fill_price, executed_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(fill.fill_id)
        .bind(fill.order_id)
        .bind(fill.quantity)
        .bind(fill.price)
        .bind(fill.executed_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE orders SET order_status = $1 WHERE order_id = $2")
            .bind(OrderStatus::Filled.as_str())
            .bind(order.order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_orders_by_plan(&self, plan_id: &str) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, DbOrder>(
            r#"
            SELECT order_id, plan_id, token_id, outcome, side, order_kind,
                   size, limit_price, order_status, execution_mode, created_at
            FROM orders
            WHERE plan_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(plan_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn get_fills_for_market(
        &self,
        token_id: &str,
        outcome: &str,
        mode: ExecutionMode,
    ) -> Result<Vec<MarketFill>, StoreError> {
        let rows = sqlx::query_as::<_, DbMarketFill>(
            r#"
            SELECT o.side, f.quantity, f.fill_price, f.executed_at
            FROM fills AS f
            JOIN orders AS o ON f.order_id = o.order_id
            WHERE o.token_id = $1 AND o.outcome = $2 AND o.execution_mode = $3
            ORDER BY f.executed_at ASC
            "#,
        )
        .bind(token_id)
        .bind(outcome)
        .bind(mode.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MarketFill::try_from).collect()
    }

    async fn insert_execution_record(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO execution_history (plan_id, payload, run_status, started_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&record.plan_id)
        .bind(&record.payload)
        .bind(record.status.as_str())
        .bind(record.started_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
                StoreError::DuplicatePlan(record.plan_id.clone())
            } else {
                StoreError::Database(e)
            }
        })?;
        Ok(())
    }

    async fn complete_execution_record(
        &self,
        plan_id: &str,
        summary: &JsonValue,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE execution_history
            SET run_status = $1, completed_at = NOW(), summary = $2
            WHERE plan_id = $3
            "#,
        )
        .bind(RunStatus::Completed.as_str())
        .bind(summary)
        .bind(plan_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fail_execution_record(
        &self,
        plan_id: &str,
        error_message: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE execution_history
            SET run_status = $1, completed_at = NOW(), error_message = $2
            WHERE plan_id = $3
            "#,
        )
        .bind(RunStatus::Failed.as_str())
        .bind(error_message)
        .bind(plan_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_execution_record(
        &self,
        plan_id: &str,
    ) -> Result<Option<ExecutionRecord>, StoreError> {
        let row = sqlx::query_as::<_, DbExecutionRecord>(
            r#"
            SELECT plan_id, payload, run_status, started_at, completed_at, summary, error_message
            FROM execution_history
            WHERE plan_id = $1
            "#,
        )
        .bind(plan_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ExecutionRecord::try_from).transpose()
    }
}
