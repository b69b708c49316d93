//! Round-trip trade computation over a broker's fee schedule

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::{debug, trace};

use super::types::{ComputationResult, FeeResult, TransactionDetails, TransactionSideResult};
use crate::broker::{
    checked_add, checked_div, checked_mul, checked_sub, Broker, BrokerCatalog, FeeTreatment, Scope,
};
use crate::common::errors::{CalculatorError, Result};
use crate::common::types::Side;

/// Computes the gain or loss of a round-trip trade with a broker's fees
///
/// Stateless apart from the shared, read-only broker, so one calculator can
/// serve any number of threads.
#[derive(Debug, Clone)]
pub struct TransactionCalculator {
    broker: Arc<Broker>,
    /// Decimal places applied to output values; `None` keeps them exact
    display_scale: Option<u32>,
}

impl TransactionCalculator {
    pub fn new(broker: impl Into<Arc<Broker>>) -> Self {
        Self {
            broker: broker.into(),
            display_scale: None,
        }
    }

    pub fn builder() -> TransactionCalculatorBuilder {
        TransactionCalculatorBuilder::default()
    }

    /// Calculator for a broker looked up by name
    pub fn from_catalog(catalog: &BrokerCatalog, name: &str) -> Result<Self> {
        Ok(Self::new(catalog.get(name)?))
    }

    /// Compute gain, gain percent and actual per-share prices
    ///
    /// # Arguments
    /// * `share_count` - Number of shares bought and later sold (must be > 0)
    /// * `buy_price` - Price per share when buying
    /// * `sell_price` - Price per share when selling
    /// * `include_breakdown` - Attach per-side fee details to the result
    pub fn compute(
        &self,
        share_count: Decimal,
        buy_price: Decimal,
        sell_price: Decimal,
        include_breakdown: bool,
    ) -> Result<ComputationResult> {
        if share_count <= Decimal::ZERO {
            return Err(CalculatorError::InvalidQuantity(share_count));
        }
        for (side, price) in [(Side::Buy, buy_price), (Side::Sell, sell_price)] {
            if price < Decimal::ZERO {
                return Err(CalculatorError::InvalidPrice { side, price });
            }
        }

        let gross_buy = checked_mul(share_count, buy_price, "gross buy amount")?;
        let buy = self.evaluate_side(Side::Buy, gross_buy)?;

        let gross_sell = checked_mul(share_count, sell_price, "gross sell amount")?;
        let sell = self.evaluate_side(Side::Sell, gross_sell)?;

        let gain = checked_sub(sell.net_trade_amt, buy.net_trade_amt, "gain")?;
        let ratio = checked_div(sell.net_trade_amt, buy.net_trade_amt, "gain percent")?;
        let gain_percent = checked_sub(
            checked_mul(ratio, dec!(100), "gain percent")?,
            dec!(100),
            "gain percent",
        )?;
        let actual_buy_price = checked_div(buy.net_trade_amt, share_count, "actual buy price")?;
        let actual_sell_price = checked_div(sell.net_trade_amt, share_count, "actual sell price")?;

        debug!(
            broker = self.broker.name(),
            %share_count,
            %gain,
            %gain_percent,
            "Computed transaction"
        );

        let details = include_breakdown.then(|| TransactionDetails {
            buy: self.side_for_display(buy),
            sell: self.side_for_display(sell),
        });

        Ok(ComputationResult {
            gain: self.for_display(gain),
            gain_percent: self.for_display(gain_percent),
            actual_buy_price: self.for_display(actual_buy_price),
            actual_sell_price: self.for_display(actual_sell_price),
            details,
        })
    }

    /// Evaluate one side's fee schedule against a gross amount
    ///
    /// Fees run in registration order; each fee's value is bound under its
    /// name before the next one is evaluated. Values are exact.
    pub fn evaluate_side(&self, side: Side, gross_trade_amt: Decimal) -> Result<TransactionSideResult> {
        let definitions = self.broker.fees_for(side);
        let mut scope = Scope::new(gross_trade_amt);
        let mut fees = Vec::with_capacity(definitions.len());
        let mut total_fees = Decimal::ZERO;

        for definition in definitions {
            let value = definition.formula().evaluate(&scope)?;
            trace!(%side, fee = definition.name(), %value, "Evaluated fee");

            scope.bind(definition.name(), value);
            total_fees = checked_add(total_fees, value, definition.name())?;
            fees.push(FeeResult {
                name: definition.name().to_string(),
                description: definition.description().to_string(),
                value,
            });
        }

        let net_trade_amt = match self.broker.fee_treatment(side) {
            FeeTreatment::AddToAmount => checked_add(gross_trade_amt, total_fees, "net amount")?,
            FeeTreatment::DeductFromAmount => checked_sub(gross_trade_amt, total_fees, "net amount")?,
        };

        debug!(
            broker = self.broker.name(),
            %side,
            gross = %gross_trade_amt,
            total_fees = %total_fees,
            net = %net_trade_amt,
            "Evaluated side"
        );

        Ok(TransactionSideResult {
            side,
            gross_trade_amt,
            fees,
            total_fees,
            net_trade_amt,
        })
    }

    fn for_display(&self, value: Decimal) -> Decimal {
        match self.display_scale {
            Some(dp) => value.round_dp(dp),
            None => value.normalize(),
        }
    }

    fn side_for_display(&self, side: TransactionSideResult) -> TransactionSideResult {
        TransactionSideResult {
            side: side.side,
            gross_trade_amt: self.for_display(side.gross_trade_amt),
            fees: side
                .fees
                .into_iter()
                .map(|fee| FeeResult {
                    value: self.for_display(fee.value),
                    ..fee
                })
                .collect(),
            total_fees: self.for_display(side.total_fees),
            net_trade_amt: self.for_display(side.net_trade_amt),
        }
    }
}

/// Builder for [`TransactionCalculator`]
///
/// A broker is mandatory; `build` fails with
/// [`CalculatorError::InvalidBroker`] without one.
#[derive(Debug, Default)]
pub struct TransactionCalculatorBuilder {
    broker: Option<Arc<Broker>>,
    display_scale: Option<u32>,
}

impl TransactionCalculatorBuilder {
    pub fn broker(mut self, broker: impl Into<Arc<Broker>>) -> Self {
        self.broker = Some(broker.into());
        self
    }

    pub fn display_scale(mut self, dp: Option<u32>) -> Self {
        self.display_scale = dp;
        self
    }

    pub fn build(self) -> Result<TransactionCalculator> {
        let broker = self
            .broker
            .ok_or_else(|| CalculatorError::InvalidBroker("broker must be specified".to_string()))?;
        Ok(TransactionCalculator {
            broker,
            display_scale: self.display_scale,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{Expression, FeeDefinition};

    fn flat_fee_broker() -> Broker {
        let mut broker = Broker::new("Flat");
        broker
            .register_fee_on_sides(
                FeeDefinition::new("fee", "Flat fee", Expression::constant(dec!(10))),
                &[Side::Buy, Side::Sell],
            )
            .unwrap();
        broker
    }

    #[test]
    fn test_builder_requires_broker() {
        let err = TransactionCalculator::builder().build().unwrap_err();
        assert!(matches!(err, CalculatorError::InvalidBroker(_)));
    }

    #[test]
    fn test_from_catalog() {
        let catalog = BrokerCatalog::with_presets().unwrap();
        let calc = TransactionCalculator::from_catalog(&catalog, "COL Financial").unwrap();
        let result = calc.compute(dec!(8000), dec!(1.35), dec!(1.40), false).unwrap();
        assert_eq!(result.gain, dec!(279.10));

        assert!(matches!(
            TransactionCalculator::from_catalog(&catalog, "Nobody"),
            Err(CalculatorError::InvalidBroker(_))
        ));
    }

    #[test]
    fn test_non_positive_share_count() {
        let calc = TransactionCalculator::new(flat_fee_broker());
        for shares in [Decimal::ZERO, dec!(-5)] {
            assert_eq!(
                calc.compute(shares, dec!(1), dec!(2), false),
                Err(CalculatorError::InvalidQuantity(shares))
            );
        }
    }

    #[test]
    fn test_negative_price() {
        let calc = TransactionCalculator::new(flat_fee_broker());
        assert_eq!(
            calc.compute(dec!(10), dec!(1), dec!(-1), false),
            Err(CalculatorError::InvalidPrice {
                side: Side::Sell,
                price: dec!(-1)
            })
        );
    }

    #[test]
    fn test_flat_fees() {
        let calc = TransactionCalculator::new(flat_fee_broker());
        let result = calc.compute(dec!(100), dec!(1), dec!(2), true).unwrap();

        // buy: 100 + 10, sell: 200 - 10
        assert_eq!(result.gain, dec!(80));
        assert_eq!(result.actual_buy_price, dec!(1.1));
        assert_eq!(result.actual_sell_price, dec!(1.9));

        let details = result.details.unwrap();
        assert_eq!(details.buy.net_trade_amt, dec!(110));
        assert_eq!(details.sell.net_trade_amt, dec!(190));
        assert_eq!(details.sell.fee("fee").map(|f| f.value), Some(dec!(10)));
    }

    #[test]
    fn test_zero_net_buy_has_no_gain_percent() {
        let calc = TransactionCalculator::new(Broker::new("Free"));
        assert!(matches!(
            calc.compute(dec!(100), Decimal::ZERO, dec!(1), false),
            Err(CalculatorError::DivisionByZero(_))
        ));
    }

    #[test]
    fn test_display_scale_rounds_only_output() {
        let calc = TransactionCalculator::builder()
            .broker(flat_fee_broker())
            .display_scale(Some(2))
            .build()
            .unwrap();
        // net buy = 3 * 1 + 10 = 13, actual buy = 13 / 3 = 4.333...
        let result = calc.compute(dec!(3), dec!(1), dec!(10), false).unwrap();
        assert_eq!(result.actual_buy_price, dec!(4.33));
        assert_eq!(result.gain, dec!(7));
    }

    #[test]
    fn test_evaluate_other_sides() {
        let mut broker = Broker::new("Dividends");
        broker
            .register_fee(
                Side::Dividend,
                FeeDefinition::new("withholding", "Withholding tax", Expression::rate_of_gross(dec!(0.1))),
            )
            .unwrap();
        let calc = TransactionCalculator::new(broker);

        let dividend = calc.evaluate_side(Side::Dividend, dec!(500)).unwrap();
        assert_eq!(dividend.total_fees, dec!(50));
        assert_eq!(dividend.net_trade_amt, dec!(450));

        let deposit = calc.evaluate_side(Side::Deposit, dec!(500)).unwrap();
        assert!(deposit.fees.is_empty());
        assert_eq!(deposit.net_trade_amt, dec!(500));
    }
}
