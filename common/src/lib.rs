//! WTT Common Types
//!
//! Shared types for the wrapped native token ledger: account identifiers,
//! base-unit amounts and the error taxonomy.

pub mod identifiers;
pub mod amount;
pub mod error;

pub use identifiers::*;
pub use amount::*;
pub use error::*;
