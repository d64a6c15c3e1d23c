//! # Meridian Database Crate
//!
//! This crate acts as a high-level, application-specific interface to the
//! PostgreSQL database. It is the system's "permanent archive": orders,
//! fills, and the execution-history audit trail all live here.
//!
//! ## Architectural Principles
//!
//! - **Port & Adapter:** The `TradeStore` trait is the persistence port the
//!   execution path consumes; `DbRepository` is the PostgreSQL adapter.
//!   Tests swap in an in-memory implementation without touching SQL.
//! - **Unit-of-Work Transactions:** Mutations are scoped to one logical
//!   unit: one order+fill pair, or one history-record write. There is
//!   deliberately no transaction spanning a whole plan.
//! - **Asynchronous & Pooled:** All operations are asynchronous and share a
//!   connection pool (`PgPool`).
//!
//! ## Public API
//!
//! - `connect`: The async function to establish the database connection pool.
//! - `run_migrations`: A utility to apply database migrations, ensuring the schema is up-to-date.
//! - `TradeStore`: The persistence port.
//! - `DbRepository`: The PostgreSQL implementation of the port.
//! - `StoreError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod repository;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, run_migrations};
pub use error::StoreError;
pub use repository::{DbRepository, MarketFill, TradeStore};
