//! Brokers looked up by name

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use super::presets;
use super::registry::Broker;
use crate::common::errors::{CalculatorError, Result};

/// Read-only set of configured brokers
///
/// Populated once at startup; brokers are shared with calculators via `Arc`.
#[derive(Debug, Clone, Default)]
pub struct BrokerCatalog {
    brokers: BTreeMap<String, Arc<Broker>>,
}

impl BrokerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog seeded with the built-in brokers
    pub fn with_presets() -> Result<Self> {
        let mut catalog = Self::new();
        for broker in presets::all()? {
            catalog.insert(broker)?;
        }
        Ok(catalog)
    }

    /// Add a broker, rejecting names that are already taken
    pub fn insert(&mut self, broker: Broker) -> Result<Arc<Broker>> {
        if self.brokers.contains_key(broker.name()) {
            return Err(CalculatorError::Configuration(format!(
                "broker '{}' is already configured",
                broker.name()
            )));
        }
        broker.validate()?;

        let name = broker.name().to_string();
        let broker = Arc::new(broker);
        self.brokers.insert(name.clone(), Arc::clone(&broker));
        info!(broker = %name, "Broker added to catalog");
        Ok(broker)
    }

    pub fn get(&self, name: &str) -> Result<Arc<Broker>> {
        self.brokers
            .get(name)
            .cloned()
            .ok_or_else(|| CalculatorError::InvalidBroker(format!("unknown broker '{name}'")))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.brokers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.brokers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brokers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::presets::COL_FINANCIAL;

    #[test]
    fn test_presets_available() {
        let catalog = BrokerCatalog::with_presets().unwrap();
        assert_eq!(catalog.names().collect::<Vec<_>>(), vec![COL_FINANCIAL]);
        assert_eq!(catalog.get(COL_FINANCIAL).unwrap().name(), COL_FINANCIAL);
    }

    #[test]
    fn test_unknown_broker() {
        let catalog = BrokerCatalog::new();
        assert!(catalog.is_empty());
        assert!(matches!(catalog.get("Nobody"), Err(CalculatorError::InvalidBroker(_))));
    }

    #[test]
    fn test_duplicate_broker_rejected() {
        let mut catalog = BrokerCatalog::with_presets().unwrap();
        let result = catalog.insert(Broker::new(COL_FINANCIAL));
        assert!(matches!(result, Err(CalculatorError::Configuration(_))));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get(COL_FINANCIAL).unwrap().buy_fees().len(), 4);
    }
}
