//! Types shared by the registry and the calculator

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::errors::CalculatorError;

/// Transaction side a fee applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
    #[serde(alias = "DEP")]
    Deposit,
    #[serde(alias = "DIV")]
    Dividend,
}

impl Side {
    /// All sides in declaration order
    pub const ALL: [Side; 4] = [Side::Buy, Side::Sell, Side::Deposit, Side::Dividend];
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
            Side::Deposit => write!(f, "DEPOSIT"),
            Side::Dividend => write!(f, "DIVIDEND"),
        }
    }
}

impl FromStr for Side {
    type Err = CalculatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            "DEP" | "DEPOSIT" => Ok(Side::Deposit),
            "DIV" | "DIVIDEND" => Ok(Side::Dividend),
            other => Err(CalculatorError::Configuration(format!(
                "unknown transaction side: {other}"
            ))),
        }
    }
}
