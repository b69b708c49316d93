//! Typed fee expressions and their evaluation scope

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::formula::Formula;
use crate::common::errors::{CalculatorError, Result};

/// Scope name bound to the gross amount of the side being evaluated
pub const GROSS_TRADE_AMT: &str = "grossTradeAmt";

/// Variables visible to an expression
///
/// Seeded with [`GROSS_TRADE_AMT`]; every evaluated fee binds its name
/// so later fees on the same side can read it.
#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    values: HashMap<String, Decimal>,
}

impl Scope {
    /// Create a scope holding only the gross trade amount
    pub fn new(gross_trade_amt: Decimal) -> Self {
        let mut values = HashMap::new();
        values.insert(GROSS_TRADE_AMT.to_string(), gross_trade_amt);
        Self { values }
    }

    /// Look up a variable, failing on names that were never bound
    pub fn get(&self, name: &str) -> Result<Decimal> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| CalculatorError::UnknownVariable(name.to_string()))
    }

    /// Bind (or rebind) a variable
    pub fn bind(&mut self, name: impl Into<String>, value: Decimal) {
        self.values.insert(name.into(), value);
    }

    pub fn gross_trade_amt(&self) -> Result<Decimal> {
        self.get(GROSS_TRADE_AMT)
    }
}

/// Formula producing a fee amount from the current scope
///
/// The common broker schedules are covered by the typed variants.
/// [`Expression::Formula`] accepts arbitrary arithmetic restricted to
/// the scope's variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expression {
    /// A flat amount
    Constant { value: Decimal },
    /// `rate * grossTradeAmt`
    RateOfGross { rate: Decimal },
    /// `rate * <variable>`, e.g. VAT on commission
    RateOf { variable: String, rate: Decimal },
    /// `max(rate * grossTradeAmt, minimum)`, e.g. a commission with a floor
    MaxOfRateOrMinimum { rate: Decimal, minimum: Decimal },
    /// Free-form arithmetic such as `max(0.0025 * grossTradeAmt, 20)`
    Formula { source: Formula },
}

impl Expression {
    pub fn constant(value: Decimal) -> Self {
        Self::Constant { value }
    }

    pub fn rate_of_gross(rate: Decimal) -> Self {
        Self::RateOfGross { rate }
    }

    pub fn rate_of(variable: impl Into<String>, rate: Decimal) -> Self {
        Self::RateOf {
            variable: variable.into(),
            rate,
        }
    }

    pub fn max_of_rate_or_minimum(rate: Decimal, minimum: Decimal) -> Self {
        Self::MaxOfRateOrMinimum { rate, minimum }
    }

    /// Parse a free-form formula
    pub fn formula(source: &str) -> Result<Self> {
        Ok(Self::Formula {
            source: Formula::parse(source)?,
        })
    }

    /// Evaluate against exactly the given scope
    pub fn evaluate(&self, scope: &Scope) -> Result<Decimal> {
        match self {
            Expression::Constant { value } => Ok(*value),
            Expression::RateOfGross { rate } => {
                checked_mul(*rate, scope.gross_trade_amt()?, "rate of gross")
            }
            Expression::RateOf { variable, rate } => {
                checked_mul(*rate, scope.get(variable)?, variable)
            }
            Expression::MaxOfRateOrMinimum { rate, minimum } => {
                let amount = checked_mul(*rate, scope.gross_trade_amt()?, "rate of gross")?;
                Ok(amount.max(*minimum))
            }
            Expression::Formula { source } => source.evaluate(scope),
        }
    }

    /// Scope names this expression reads
    pub fn references(&self) -> Vec<String> {
        match self {
            Expression::Constant { .. } => Vec::new(),
            Expression::RateOfGross { .. } | Expression::MaxOfRateOrMinimum { .. } => {
                vec![GROSS_TRADE_AMT.to_string()]
            }
            Expression::RateOf { variable, .. } => vec![variable.clone()],
            Expression::Formula { source } => source.variables(),
        }
    }
}

pub(crate) fn checked_add(a: Decimal, b: Decimal, context: &str) -> Result<Decimal> {
    a.checked_add(b)
        .ok_or_else(|| CalculatorError::ArithmeticOverflow(format!("{context}: {a} + {b}")))
}

pub(crate) fn checked_sub(a: Decimal, b: Decimal, context: &str) -> Result<Decimal> {
    a.checked_sub(b)
        .ok_or_else(|| CalculatorError::ArithmeticOverflow(format!("{context}: {a} - {b}")))
}

pub(crate) fn checked_mul(a: Decimal, b: Decimal, context: &str) -> Result<Decimal> {
    a.checked_mul(b)
        .ok_or_else(|| CalculatorError::ArithmeticOverflow(format!("{context}: {a} * {b}")))
}

pub(crate) fn checked_div(a: Decimal, b: Decimal, context: &str) -> Result<Decimal> {
    if b.is_zero() {
        return Err(CalculatorError::DivisionByZero(format!("{context}: {a} / 0")));
    }
    a.checked_div(b)
        .ok_or_else(|| CalculatorError::ArithmeticOverflow(format!("{context}: {a} / {b}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn scope() -> Scope {
        let mut scope = Scope::new(dec!(10800));
        scope.bind("commission", dec!(27));
        scope
    }

    #[test]
    fn test_constant() {
        assert_eq!(Expression::constant(dec!(20)).evaluate(&scope()).unwrap(), dec!(20));
    }

    #[test]
    fn test_rate_of_gross() {
        let expr = Expression::rate_of_gross(dec!(0.00005));
        assert_eq!(expr.evaluate(&scope()).unwrap(), dec!(0.54));
    }

    #[test]
    fn test_rate_of_named_value() {
        let expr = Expression::rate_of("commission", dec!(0.12));
        assert_eq!(expr.evaluate(&scope()).unwrap(), dec!(3.24));
    }

    #[test]
    fn test_max_of_rate_or_minimum() {
        let expr = Expression::max_of_rate_or_minimum(dec!(0.0025), dec!(20));
        assert_eq!(expr.evaluate(&scope()).unwrap(), dec!(27));

        // 0.0025 * 4000 = 10, below the floor
        let small = Scope::new(dec!(4000));
        assert_eq!(expr.evaluate(&small).unwrap(), dec!(20));
    }

    #[test]
    fn test_unknown_variable() {
        let expr = Expression::rate_of("vat", dec!(0.5));
        assert_eq!(
            expr.evaluate(&scope()),
            Err(CalculatorError::UnknownVariable("vat".to_string()))
        );
    }

    #[test]
    fn test_references() {
        assert!(Expression::constant(dec!(1)).references().is_empty());
        assert_eq!(
            Expression::rate_of("commission", dec!(0.12)).references(),
            vec!["commission".to_string()]
        );
        assert_eq!(
            Expression::rate_of_gross(dec!(0.1)).references(),
            vec![GROSS_TRADE_AMT.to_string()]
        );
    }

    #[test]
    fn test_checked_div_by_zero() {
        assert!(matches!(
            checked_div(dec!(1), Decimal::ZERO, "test"),
            Err(CalculatorError::DivisionByZero(_))
        ));
    }

    #[test]
    fn test_expression_deserialize_tagged() {
        let expr: Expression =
            serde_json::from_str(r#"{"kind": "rate_of", "variable": "commission", "rate": "0.12"}"#)
                .unwrap();
        assert_eq!(expr, Expression::rate_of("commission", dec!(0.12)));

        let expr: Expression =
            serde_json::from_str(r#"{"kind": "formula", "source": "0.12 * commission"}"#).unwrap();
        assert_eq!(expr.evaluate(&scope()).unwrap(), dec!(3.24));
    }
}
