//! Per-broker fee registry

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::expression::{Expression, GROSS_TRADE_AMT};
use crate::common::errors::{CalculatorError, Result};
use crate::common::types::Side;

/// A named fee formula
///
/// Immutable once built; the registry hands out shared references only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeDefinition {
    name: String,
    description: String,
    formula: Expression,
}

impl FeeDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, formula: Expression) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            formula,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn formula(&self) -> &Expression {
        &self.formula
    }
}

/// How a side's total fees adjust its gross amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeTreatment {
    /// Fees increase the amount (cost of a buy)
    AddToAmount,
    /// Fees reduce the amount (proceeds of a sell)
    DeductFromAmount,
}

impl FeeTreatment {
    /// Treatment used when a broker does not configure one
    pub fn default_for(side: Side) -> Self {
        match side {
            Side::Buy | Side::Deposit => FeeTreatment::AddToAmount,
            Side::Sell | Side::Dividend => FeeTreatment::DeductFromAmount,
        }
    }
}

/// A stock broker and its ordered fee schedule per transaction side
///
/// Fees are evaluated in registration order, so a fee may reference any fee
/// registered before it on the same side (VAT on commission, for example).
#[derive(Debug, Clone, PartialEq)]
pub struct Broker {
    name: String,
    fees_by_side: HashMap<Side, Vec<FeeDefinition>>,
    treatments: HashMap<Side, FeeTreatment>,
}

impl Broker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fees_by_side: HashMap::new(),
            treatments: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a fee to a side's schedule
    ///
    /// Fails with [`CalculatorError::DuplicateFeeName`] if the side already has
    /// a fee with that name, leaving the schedule untouched.
    pub fn register_fee(&mut self, side: Side, definition: FeeDefinition) -> Result<&mut Self> {
        self.ensure_unique(side, definition.name())?;
        debug!(broker = %self.name, %side, fee = definition.name(), "Registered fee");
        self.fees_by_side.entry(side).or_default().push(definition);
        Ok(self)
    }

    /// Append several fees to one side, all or nothing
    pub fn register_fees(&mut self, side: Side, definitions: Vec<FeeDefinition>) -> Result<&mut Self> {
        if definitions.is_empty() {
            return Err(CalculatorError::InvalidArity(format!(
                "no fee definitions supplied for {side} on broker '{}'",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for definition in &definitions {
            self.ensure_unique(side, definition.name())?;
            if !seen.insert(definition.name()) {
                return Err(self.duplicate(side, definition.name()));
            }
        }

        for definition in definitions {
            self.register_fee(side, definition)?;
        }
        Ok(self)
    }

    /// Register the same fee on several sides, all or nothing
    pub fn register_fee_on_sides(&mut self, definition: FeeDefinition, sides: &[Side]) -> Result<&mut Self> {
        if sides.is_empty() {
            return Err(CalculatorError::InvalidArity(format!(
                "fee '{}' must be registered on at least one side",
                definition.name()
            )));
        }

        let mut seen = HashSet::new();
        for side in sides {
            self.ensure_unique(*side, definition.name())?;
            if !seen.insert(*side) {
                return Err(self.duplicate(*side, definition.name()));
            }
        }

        for side in sides {
            self.register_fee(*side, definition.clone())?;
        }
        Ok(self)
    }

    pub fn add_buy_fee(&mut self, definition: FeeDefinition) -> Result<&mut Self> {
        self.register_fee(Side::Buy, definition)
    }

    pub fn add_sell_fee(&mut self, definition: FeeDefinition) -> Result<&mut Self> {
        self.register_fee(Side::Sell, definition)
    }

    /// Fees for a side in registration order (empty when none registered)
    pub fn fees_for(&self, side: Side) -> &[FeeDefinition] {
        self.fees_by_side
            .get(&side)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn buy_fees(&self) -> &[FeeDefinition] {
        self.fees_for(Side::Buy)
    }

    pub fn sell_fees(&self) -> &[FeeDefinition] {
        self.fees_for(Side::Sell)
    }

    /// Every side that has fees, in [`Side::ALL`] order
    pub fn fees(&self) -> impl Iterator<Item = (Side, &[FeeDefinition])> + '_ {
        Side::ALL
            .into_iter()
            .map(|side| (side, self.fees_for(side)))
            .filter(|(_, fees)| !fees.is_empty())
    }

    /// Override how a side's fees adjust its gross amount
    pub fn with_fee_treatment(mut self, side: Side, treatment: FeeTreatment) -> Self {
        self.treatments.insert(side, treatment);
        self
    }

    pub fn fee_treatment(&self, side: Side) -> FeeTreatment {
        self.treatments
            .get(&side)
            .copied()
            .unwrap_or_else(|| FeeTreatment::default_for(side))
    }

    /// Check that every formula only reads `grossTradeAmt` or a fee registered
    /// earlier on the same side
    pub fn validate(&self) -> Result<()> {
        for (side, fees) in self.fees() {
            let mut known: HashSet<&str> = HashSet::from([GROSS_TRADE_AMT]);
            for fee in fees {
                if let Some(missing) = fee
                    .formula()
                    .references()
                    .into_iter()
                    .find(|name| !known.contains(name.as_str()))
                {
                    return Err(CalculatorError::UnknownVariable(format!(
                        "{missing} (referenced by {side} fee '{}' on broker '{}')",
                        fee.name(),
                        self.name
                    )));
                }
                known.insert(fee.name());
            }
        }
        Ok(())
    }

    fn ensure_unique(&self, side: Side, name: &str) -> Result<()> {
        if self.fees_for(side).iter().any(|fee| fee.name() == name) {
            return Err(self.duplicate(side, name));
        }
        Ok(())
    }

    fn duplicate(&self, side: Side, name: &str) -> CalculatorError {
        CalculatorError::DuplicateFeeName {
            broker: self.name.clone(),
            side,
            name: name.to_string(),
        }
    }
}
