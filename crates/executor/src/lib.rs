//! # Meridian Executor Crate
//!
//! This crate provides the core components for trade execution and position
//! accounting: the pure fill simulator, the position ledger, and the
//! `ExecutionRouter` that ties preconditions, simulation, and persistence
//! together for a single trade.
//!
//! ## Architectural Principles
//!
//! - **State vs. Logic Decoupling:** `simulate_fill` is a pure calculator
//!   that decides whether and at what price a trade executes without
//!   touching any state. The `ExecutionRouter` is the only component that
//!   persists its results, and it does so through the injected store.
//! - **Explicit Dependencies:** The router receives its store and market
//!   data source as trait objects at construction, so every piece of this
//!   crate is unit-testable against in-memory fakes.
//!
//! ## Public API
//!
//! - `ExecutionRouter`: the per-trade entry point.
//! - `TradeOutcome`: what became of a routed trade.
//! - `simulate_fill` / `SimulatedFill`: the zero-slippage fill model.
//! - `PositionLedger`: on-demand position aggregation and sell validation.
//! - `ExecutorError`: the specific error types returned from this crate.

// Declare the modules that constitute this crate.
pub mod error;
pub mod positions;
pub mod router;
pub mod simulator;

// Re-export the key components to provide a clean, public-facing API.
pub use error::ExecutorError;
pub use positions::{aggregate_fills, PositionLedger, SellCheck};
pub use router::{ExecutionRouter, TradeOutcome};
pub use simulator::{simulate_fill, SimulatedFill};
