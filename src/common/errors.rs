//! Error types for the fee engine

use rust_decimal::Decimal;
use thiserror::Error;

use super::types::Side;

/// Result type alias using our CalculatorError
pub type Result<T> = std::result::Result<T, CalculatorError>;

/// Main error type for registry and calculator operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalculatorError {
    /// No broker was supplied, or the requested broker does not exist
    #[error("Invalid broker: {0}")]
    InvalidBroker(String),

    /// Share count must be strictly positive
    #[error("Invalid share count: {0} (must be greater than zero)")]
    InvalidQuantity(Decimal),

    /// Prices must not be negative
    #[error("Invalid {side} price: {price} (must not be negative)")]
    InvalidPrice { side: Side, price: Decimal },

    /// A fee with the same name is already registered for the side
    #[error("Duplicate fee name '{name}' for {side} on broker '{broker}'")]
    DuplicateFeeName {
        broker: String,
        side: Side,
        name: String,
    },

    /// A batch registration was called without anything to register
    #[error("Invalid arity: {0}")]
    InvalidArity(String),

    /// An expression referenced a name missing from its evaluation scope
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    /// A formula string could not be parsed
    #[error("Formula parse error at position {position}: {message}")]
    FormulaParse { position: usize, message: String },

    /// Division by a zero decimal
    #[error("Division by zero: {0}")]
    DivisionByZero(String),

    /// Decimal arithmetic exceeded the representable range
    #[error("Arithmetic overflow: {0}")]
    ArithmeticOverflow(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<config::ConfigError> for CalculatorError {
    fn from(err: config::ConfigError) -> Self {
        CalculatorError::Configuration(err.to_string())
    }
}
