//! Immutable token metadata.

use serde::{Deserialize, Serialize};

use crate::config::LedgerConfig;

/// Name, symbol and precision, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    name: String,
    symbol: String,
    decimals: u8,
}

impl TokenMetadata {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }
}

impl From<&LedgerConfig> for TokenMetadata {
    fn from(config: &LedgerConfig) -> Self {
        Self::new(config.name.clone(), config.symbol.clone(), config.decimals)
    }
}
