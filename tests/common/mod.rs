//! Common test utilities and fixtures

#![allow(dead_code)]

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use stock_calculator::broker::presets;
use stock_calculator::{Broker, Expression, FeeDefinition, TransactionCalculator};

/// Tolerance used when comparing against published COL Financial figures
pub const MAX_DIFF: Decimal = dec!(0.0003);

/// Default trade inputs: 8000 shares bought at 1.35, sold at 1.40
pub const SHARES: Decimal = dec!(8000);
pub const BUY_PRICE: Decimal = dec!(1.35);
pub const SELL_PRICE: Decimal = dec!(1.40);

/// Calculator backed by the built-in COL Financial schedule
pub fn col_calculator() -> TransactionCalculator {
    TransactionCalculator::new(presets::col_financial().expect("preset must build"))
}

/// Broker with no fees at all
pub fn fee_free_broker() -> Broker {
    Broker::new("Fee Free")
}

/// Broker where the second buy fee is defined in terms of the first
pub fn cascading_broker(first: FeeDefinition, second: FeeDefinition) -> Broker {
    let mut broker = Broker::new("Cascading");
    broker
        .add_buy_fee(first)
        .and_then(|b| b.add_buy_fee(second))
        .expect("fees must register");
    broker
}

pub fn flat(name: &str, amount: Decimal) -> FeeDefinition {
    FeeDefinition::new(name, name, Expression::constant(amount))
}

pub fn rate_of(name: &str, variable: &str, rate: Decimal) -> FeeDefinition {
    FeeDefinition::new(name, name, Expression::rate_of(variable, rate))
}

/// Assert two decimals are within `MAX_DIFF` of each other
pub fn assert_close(actual: Decimal, expected: Decimal) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= MAX_DIFF,
        "expected {expected} ± {MAX_DIFF}, got {actual} (diff {diff})"
    );
}
