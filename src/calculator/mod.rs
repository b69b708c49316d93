//! Transaction calculator
//!
//! ```text
//! shares × buy price ──► BUY fees (in order) ──► net buy  ─┐
//!                                                          ├─► gain, gain %, actual prices
//! shares × sell price ─► SELL fees (in order) ─► net sell ─┘
//! ```
//!
//! All intermediate values are exact [`rust_decimal::Decimal`]s. Rounding to a
//! display scale, if configured, happens once when the result is assembled.

mod transaction;
mod types;

pub use transaction::{TransactionCalculator, TransactionCalculatorBuilder};
pub use types::{ComputationResult, FeeResult, TransactionDetails, TransactionSideResult};
