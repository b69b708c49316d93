//! Broker registry
//!
//! A [`Broker`] owns an ordered fee schedule per transaction [`Side`].
//! Each [`FeeDefinition`] pairs a name with an [`Expression`] evaluated
//! against a [`Scope`] holding `grossTradeAmt` and every fee computed
//! before it on the same side.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use stock_calculator::broker::{Broker, Expression, FeeDefinition};
//! use stock_calculator::Side;
//!
//! let mut broker = Broker::new("Example");
//! broker
//!     .register_fee_on_sides(
//!         FeeDefinition::new("commission", "Commission", Expression::rate_of_gross(dec!(0.001))),
//!         &[Side::Buy, Side::Sell],
//!     )
//!     .unwrap();
//! assert_eq!(broker.fees_for(Side::Sell).len(), 1);
//! ```
//!
//! [`Side`]: crate::common::types::Side

mod catalog;
mod expression;
mod formula;
pub mod presets;
mod registry;

pub use catalog::BrokerCatalog;
pub use expression::{Expression, Scope, GROSS_TRADE_AMT};
pub use formula::Formula;
pub use registry::{Broker, FeeDefinition, FeeTreatment};

pub(crate) use expression::{checked_add, checked_div, checked_mul, checked_sub};
