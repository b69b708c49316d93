//! StockCalculator Library
//!
//! Computes the profit or loss of a stock trade after applying a broker's
//! schedule of transaction fees, using exact decimal arithmetic.

pub mod broker;
pub mod calculator;
pub mod common;
pub mod config;

// Re-export commonly used types
pub use broker::{Broker, BrokerCatalog, Expression, FeeDefinition, FeeTreatment, Formula, Scope};
pub use calculator::{
    ComputationResult, FeeResult, TransactionCalculator, TransactionCalculatorBuilder,
    TransactionDetails, TransactionSideResult,
};
pub use common::errors::{CalculatorError, Result};
pub use common::types::Side;
pub use config::types::AppConfig;
