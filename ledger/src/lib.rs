//! WTT Ledger Engine
//!
//! Custodies a chain's native asset and issues a fungible token against it
//! at a fixed 1:1 rate, with owner-approved third-party spending.

pub mod engine;
pub mod balance;
pub mod allowance;
pub mod journal;
pub mod metadata;
pub mod config;
pub mod guard;
pub mod native;

pub use engine::{LedgerSnapshot, WrappedLedger};
pub use config::LedgerConfig;
pub use journal::{Event, EventLog, EventRecord};
pub use metadata::TokenMetadata;
pub use native::{CallContext, NativeHost, NativeTransferError, ReceiveHook, SimulatedChain};
