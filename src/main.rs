use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::Table;
use core_types::{ExecutionMode, RunSummary, TradePlan};
use database::connection::{connect, run_migrations};
use database::DbRepository;
use engine::PlanEngine;
use executor::{ExecutionRouter, PositionLedger};
use market_data::ClobClient;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// The main entry point for the Meridian trade-plan executor.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (DATABASE_URL lives there).
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse command-line arguments
    let cli = Cli::parse();

    let config = configuration::load_config().context("Failed to load config.toml")?;

    // Initialize the database connection and run migrations
    let db_pool = connect().await.context("Failed to connect to the database")?;
    run_migrations(&db_pool)
        .await
        .context("Failed to run database migrations")?;

    let store = Arc::new(DbRepository::new(db_pool));

    // Execute the appropriate command
    match cli.command {
        Commands::Execute(args) => handle_execute(args, store, &config).await,
        Commands::History(args) => handle_history(args, store).await,
        Commands::Positions(args) => handle_positions(args, store, &config).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// A single-user trade-plan executor for prediction-market outcome tokens.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a trade plan from a JSON file.
    Execute(ExecuteArgs),

    /// Show the execution-history record for a plan.
    History(HistoryArgs),

    /// Show the current position for one outcome token.
    Positions(PositionsArgs),
}

#[derive(Parser)]
struct ExecuteArgs {
    /// Path to the trade-plan JSON file.
    #[arg(long)]
    plan: PathBuf,

    /// Re-execute a plan that already ran, under a fresh audit record.
    #[arg(long)]
    reexecute: bool,

    /// Route orders live instead of paper-simulating them.
    #[arg(long)]
    live: bool,
}

#[derive(Parser)]
struct HistoryArgs {
    /// The plan id to look up.
    #[arg(long)]
    plan_id: String,
}

#[derive(Parser)]
struct PositionsArgs {
    /// The outcome token to aggregate.
    #[arg(long)]
    token_id: String,

    /// The outcome label (e.g. "YES").
    #[arg(long)]
    outcome: String,
}

// ==============================================================================
// Command Logic
// ==============================================================================

/// Loads, validates, and executes a trade plan, then renders the summary.
async fn handle_execute(
    args: ExecuteArgs,
    store: Arc<DbRepository>,
    config: &configuration::Config,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.plan)
        .with_context(|| format!("Failed to read plan file {}", args.plan.display()))?;
    let plan: TradePlan = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse plan file {}", args.plan.display()))?;
    plan.validate().context("Plan failed validation")?;

    let mode = if args.live {
        ExecutionMode::Live
    } else {
        ExecutionMode::from_str(&config.execution.default_mode)
            .map_err(|e| anyhow::anyhow!("Invalid execution.default_mode: {e}"))?
    };

    // Live routing is future-phase. Fail here, before an audit record is
    // created under this plan id; the router enforces the same guard.
    if mode == ExecutionMode::Live {
        anyhow::bail!("Live order routing is not implemented yet; omit --live to paper trade.");
    }

    tracing::info!(
        plan_id = %plan.plan_id,
        trades = plan.trades.len(),
        mode = %mode,
        "executing trade plan"
    );

    let market_data = Arc::new(ClobClient::new(
        &config.market_data.base_url,
        Duration::from_secs(config.market_data.request_timeout_secs),
    )?);
    let router = ExecutionRouter::new(store.clone(), market_data, mode);
    let plan_engine = PlanEngine::new(store, router);

    let summary = plan_engine.execute_trade_plan(&plan, args.reexecute).await?;
    render_summary(&summary);
    Ok(())
}

/// Renders the audit record for a plan, including its stored payload.
async fn handle_history(args: HistoryArgs, store: Arc<DbRepository>) -> anyhow::Result<()> {
    use database::TradeStore;

    let Some(record) = store.get_execution_record(&args.plan_id).await? else {
        println!("No execution record found for plan '{}'.", args.plan_id);
        return Ok(());
    };

    println!("Plan:       {}", record.plan_id);
    println!("Status:     {}", record.status);
    println!("Started:    {}", record.started_at);
    match record.completed_at {
        Some(completed_at) => println!("Completed:  {completed_at}"),
        None => println!("Completed:  -"),
    }
    if let Some(error_message) = &record.error_message {
        println!("Error:      {error_message}");
    }
    if let Some(summary) = &record.summary {
        println!("Summary:    {}", serde_json::to_string_pretty(summary)?);
    }
    println!("Payload:    {}", serde_json::to_string_pretty(&record.payload)?);
    Ok(())
}

/// Renders the current aggregated position for one token + outcome.
async fn handle_positions(
    args: PositionsArgs,
    store: Arc<DbRepository>,
    config: &configuration::Config,
) -> anyhow::Result<()> {
    let mode = ExecutionMode::from_str(&config.execution.default_mode)
        .map_err(|e| anyhow::anyhow!("Invalid execution.default_mode: {e}"))?;

    let ledger = PositionLedger::new(store);
    let Some(position) = ledger
        .calculate_position(&args.token_id, &args.outcome, mode)
        .await?
    else {
        println!(
            "No fills recorded for token '{}' outcome '{}'.",
            args.token_id, args.outcome
        );
        return Ok(());
    };

    let mut table = Table::new();
    table.set_header(vec![
        "Token",
        "Outcome",
        "Net Quantity",
        "Avg Price",
        "Realized P&L",
    ]);
    table.add_row(vec![
        position.token_id.clone(),
        position.outcome.clone(),
        position.net_quantity.to_string(),
        position.avg_price.round_dp(4).to_string(),
        position.realized_pnl.round_dp(4).to_string(),
    ]);
    println!("{table}");
    Ok(())
}

fn render_summary(summary: &RunSummary) {
    println!(
        "Plan '{}' completed: {} orders placed ({} filled, {} open, {} failed).",
        summary.plan_id,
        summary.orders_placed,
        summary.orders_filled,
        summary.orders_open,
        summary.orders_failed
    );
    println!(
        "Total realized P&L: {}",
        summary.total_realized_pnl.round_dp(4)
    );

    if summary.positions.is_empty() {
        return;
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Token",
        "Outcome",
        "Net Quantity",
        "Avg Price",
        "Realized P&L",
    ]);
    for position in &summary.positions {
        table.add_row(vec![
            position.token_id.clone(),
            position.outcome.clone(),
            position.net_quantity.to_string(),
            position.avg_price.round_dp(4).to_string(),
            position.realized_pnl.round_dp(4).to_string(),
        ]);
    }
    println!("{table}");
}
