//! Error types for research-core

use thiserror::Error;

/// Result type alias for research-core
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while validating or decoding domain values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Ticker symbol is empty or contains unsupported characters
    #[error("Invalid symbol: {0:?}")]
    InvalidSymbol(String),

    /// A stored or supplied token does not name a known variant
    #[error("Unknown {kind} token: {value:?}")]
    UnknownToken {
        /// Which enumeration was being decoded
        kind: &'static str,
        /// The offending token
        value: String,
    },

    /// User configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
