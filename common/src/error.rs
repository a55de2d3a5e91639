//! Error types for the wrapped token ledger.

use crate::{Address, Wad};
use thiserror::Error;

/// Main error type for ledger operations.
///
/// Every failure aborts the whole operation: the ledger state and the
/// notification journal are identical before and after a failed call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WttError {
    /// Withdraw or transfer exceeds the available balance.
    #[error("Insufficient balance for {account}: required {required}, available {available}")]
    InsufficientBalance {
        account: Address,
        required: Wad,
        available: Wad,
    },

    /// Delegated transfer exceeds the remaining allowance.
    #[error("Insufficient allowance for {spender} on {owner}: required {required}, available {available}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        required: Wad,
        available: Wad,
    },

    /// A balance or allowance step would exceed the integer width.
    #[error("Arithmetic overflow: {context}")]
    ArithmeticOverflow { context: String },

    /// The outbound native transfer of a withdraw was rejected.
    #[error("Native transfer of {amount} to {recipient} failed: {reason}")]
    NativeTransferFailed {
        recipient: Address,
        amount: Wad,
        reason: String,
    },

    /// Mutating call made while a withdraw is handing control to external code.
    #[error("Reentrant call to {operation} rejected")]
    ReentrantCall { operation: &'static str },

    /// Malformed account address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Malformed or out-of-range amount.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A scenario assertion did not hold.
    #[error("Scenario failed: {0}")]
    ScenarioFailed(String),
}

impl WttError {
    /// Check if this error is retryable.
    ///
    /// Balance and allowance shortfalls need a state change first, so only
    /// the control-transfer failures qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WttError::ReentrantCall { .. } | WttError::NativeTransferFailed { .. }
        )
    }

    /// Get a stable error code for reporting.
    pub fn error_code(&self) -> &'static str {
        match self {
            WttError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            WttError::InsufficientAllowance { .. } => "INSUFFICIENT_ALLOWANCE",
            WttError::ArithmeticOverflow { .. } => "ARITHMETIC_OVERFLOW",
            WttError::NativeTransferFailed { .. } => "NATIVE_TRANSFER_FAILED",
            WttError::ReentrantCall { .. } => "REENTRANT_CALL",
            WttError::InvalidAddress(_) => "INVALID_ADDRESS",
            WttError::InvalidAmount(_) => "INVALID_AMOUNT",
            WttError::ConfigurationError(_) => "CONFIGURATION_ERROR",
            WttError::ScenarioFailed(_) => "SCENARIO_FAILED",
        }
    }

    /// Build an overflow error for the given step.
    pub fn overflow(context: impl Into<String>) -> Self {
        WttError::ArithmeticOverflow {
            context: context.into(),
        }
    }
}

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, WttError>;
