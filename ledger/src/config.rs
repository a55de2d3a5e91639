//! Ledger configuration.

use wtt_common::{Result, WttError, MAX_DECIMALS};

/// Construction-time ledger configuration.
///
/// These three values become the token metadata and never change after the
/// ledger is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Token name.
    pub name: String,
    /// Token symbol.
    pub symbol: String,
    /// Decimal precision.
    pub decimals: u8,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            name: "Wrapped Thunder Token".to_string(),
            symbol: "WTT".to_string(),
            decimals: 18,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("WTT_NAME") {
            config.name = name;
        }

        if let Ok(symbol) = std::env::var("WTT_SYMBOL") {
            config.symbol = symbol;
        }

        if let Ok(decimals) = std::env::var("WTT_DECIMALS") {
            if let Ok(decimals) = decimals.parse() {
                config.decimals = decimals;
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(WttError::ConfigurationError(
                "Token name cannot be empty".to_string(),
            ));
        }

        if self.symbol.trim().is_empty() {
            return Err(WttError::ConfigurationError(
                "Token symbol cannot be empty".to_string(),
            ));
        }

        if self.decimals > MAX_DECIMALS {
            return Err(WttError::ConfigurationError(format!(
                "Decimals cannot exceed {}",
                MAX_DECIMALS
            )));
        }

        Ok(())
    }
}
