//! Result records produced by the calculator

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::types::Side;

/// Computed amount of one fee for one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeResult {
    pub name: String,
    pub description: String,
    pub value: Decimal,
}

/// Gross amount, fee breakdown and net amount of one side of a trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSideResult {
    pub side: Side,
    pub gross_trade_amt: Decimal,
    /// Fees in evaluation order
    pub fees: Vec<FeeResult>,
    pub total_fees: Decimal,
    pub net_trade_amt: Decimal,
}

impl TransactionSideResult {
    /// Look up a fee by name
    pub fn fee(&self, name: &str) -> Option<&FeeResult> {
        self.fees.iter().find(|fee| fee.name == name)
    }
}

/// Per-side breakdown attached when requested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDetails {
    pub buy: TransactionSideResult,
    pub sell: TransactionSideResult,
}

/// Outcome of a round-trip trade after fees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputationResult {
    /// Net sell amount minus net buy amount
    pub gain: Decimal,
    /// `netSell / netBuy * 100 - 100`
    pub gain_percent: Decimal,
    /// Net buy amount per share
    pub actual_buy_price: Decimal,
    /// Net sell amount per share
    pub actual_sell_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<TransactionDetails>,
}

impl ComputationResult {
    /// True when the trade made money after fees
    pub fn is_profitable(&self) -> bool {
        self.gain > Decimal::ZERO
    }
}
