//! StockCalculator - Main Entry Point
//!
//! Computes the gain or loss of a stock trade after a broker's fees and
//! prints the result as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use rust_decimal::Decimal;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use stock_calculator::config::load_config;
use stock_calculator::TransactionCalculator;

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Broker to use (defaults to settings.default_broker)
    #[arg(short, long, env = "STOCK_CALCULATOR_BROKER")]
    broker: Option<String>,

    /// Number of shares
    #[arg(long, required_unless_present = "list_brokers")]
    shares: Option<Decimal>,

    /// Price per share when buying
    #[arg(long, required_unless_present = "list_brokers")]
    buy_price: Option<Decimal>,

    /// Price per share when selling
    #[arg(long, required_unless_present = "list_brokers")]
    sell_price: Option<Decimal>,

    /// Include the per-fee breakdown
    #[arg(long)]
    details: bool,

    /// Print the configured broker names and exit
    #[arg(long)]
    list_brokers: bool,
}

fn main() -> Result<()> {
    // Load environment variables from .env file if present, before clap reads env
    dotenvy::dotenv().ok();

    // Parse command line arguments
    let args = Args::parse();

    let config = load_config(Some(&args.config)).context("failed to load configuration")?;

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.settings.log_level);
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Configuration file: {}", args.config);

    let catalog = config.catalog().context("invalid broker configuration")?;

    if args.list_brokers {
        for name in catalog.names() {
            println!("{name}");
        }
        return Ok(());
    }

    let broker_name = args.broker.as_deref().unwrap_or(&config.settings.default_broker);
    let calculator = TransactionCalculator::builder()
        .broker(catalog.get(broker_name)?)
        .display_scale(config.settings.display_scale)
        .build()?;

    let shares = args.shares.context("--shares is required")?;
    let buy_price = args.buy_price.context("--buy-price is required")?;
    let sell_price = args.sell_price.context("--sell-price is required")?;
    let include_breakdown = args.details || config.settings.include_breakdown;

    info!(broker = broker_name, %shares, %buy_price, %sell_price, "Computing transaction");

    let result = calculator.compute(shares, buy_price, sell_price, include_breakdown)?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
