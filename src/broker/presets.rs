//! Built-in broker fee schedules

use rust_decimal_macros::dec;

use super::expression::Expression;
use super::registry::{Broker, FeeDefinition};
use crate::common::errors::Result;
use crate::common::types::Side;

pub const COL_FINANCIAL: &str = "COL Financial";

/// COL Financial (Philippines) trade charges
///
/// - Commission: 0.25% of gross, minimum 20
/// - VAT: 12% of commission
/// - PSE transaction fee: 0.005% of gross
/// - SCCP fee: 0.01% of gross
/// - Sales tax: 0.5% of gross, sell side only
pub fn col_financial() -> Result<Broker> {
    let both = [Side::Buy, Side::Sell];
    let mut broker = Broker::new(COL_FINANCIAL);

    broker
        .register_fee_on_sides(
            FeeDefinition::new(
                "commission",
                "Commission",
                Expression::max_of_rate_or_minimum(dec!(0.0025), dec!(20)),
            ),
            &both,
        )?
        .register_fee_on_sides(
            FeeDefinition::new(
                "vat",
                "Value Added Tax (VAT)",
                Expression::rate_of("commission", dec!(0.12)),
            ),
            &both,
        )?
        .register_fee_on_sides(
            FeeDefinition::new(
                "pseTransFee",
                "Philippine Stock Exchange Transaction Fee (PSE Trans Fee)",
                Expression::rate_of_gross(dec!(0.00005)),
            ),
            &both,
        )?
        .register_fee_on_sides(
            FeeDefinition::new(
                "sccp",
                "Securities Clearing Corporation of The Philippines Fee (SCCP)",
                Expression::rate_of_gross(dec!(0.0001)),
            ),
            &both,
        )?
        .add_sell_fee(FeeDefinition::new(
            "salesTax",
            "Sales Tax",
            Expression::rate_of_gross(dec!(0.005)),
        ))?;

    Ok(broker)
}

/// All built-in brokers
pub fn all() -> Result<Vec<Broker>> {
    Ok(vec![col_financial()?])
}
