//! Configuration types

use serde::{Deserialize, Serialize};

use crate::broker::{presets, Broker, BrokerCatalog, Expression, FeeDefinition, FeeTreatment};
use crate::common::errors::Result;
use crate::common::types::Side;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
    /// Brokers defined in addition to the built-in ones
    #[serde(default)]
    pub brokers: Vec<BrokerConfig>,
}

impl AppConfig {
    /// Build the broker catalog: built-in presets (unless disabled) plus
    /// every configured broker
    pub fn catalog(&self) -> Result<BrokerCatalog> {
        let mut catalog = if self.settings.include_presets {
            BrokerCatalog::with_presets()?
        } else {
            BrokerCatalog::new()
        };
        for broker in &self.brokers {
            catalog.insert(broker.to_broker()?)?;
        }
        Ok(catalog)
    }
}

/// A broker's fee schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub name: String,
    /// Fees in evaluation order
    #[serde(default)]
    pub fees: Vec<FeeConfig>,
    /// Overrides for how fees adjust a side's gross amount
    #[serde(default)]
    pub treatments: Vec<TreatmentConfig>,
}

impl BrokerConfig {
    /// Build and validate the broker this config describes
    pub fn to_broker(&self) -> Result<Broker> {
        let mut broker = Broker::new(&self.name);
        for fee in &self.fees {
            broker.register_fee_on_sides(
                FeeDefinition::new(&fee.name, &fee.description, fee.formula.clone()),
                &fee.sides,
            )?;
        }
        for treatment in &self.treatments {
            broker = broker.with_fee_treatment(treatment.side, treatment.treatment);
        }
        broker.validate()?;
        Ok(broker)
    }
}

/// One fee, registered on every listed side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub sides: Vec<Side>,
    pub formula: Expression,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentConfig {
    pub side: Side,
    pub treatment: FeeTreatment,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Broker used when none is named on the command line
    #[serde(default = "default_broker")]
    pub default_broker: String,
    /// Decimal places for output values (unset = exact)
    #[serde(default)]
    pub display_scale: Option<u32>,
    /// Attach the per-fee breakdown to results
    #[serde(default)]
    pub include_breakdown: bool,
    /// Register the built-in brokers
    #[serde(default = "default_include_presets")]
    pub include_presets: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            default_broker: default_broker(),
            display_scale: None,
            include_breakdown: false,
            include_presets: default_include_presets(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_broker() -> String {
    presets::COL_FINANCIAL.to_string()
}

fn default_include_presets() -> bool {
    true
}
