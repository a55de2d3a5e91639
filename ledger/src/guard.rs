//! Busy flag for operations that hand control to external code.

use wtt_common::{Result, WttError};

/// Tracks whether an operation is currently transferring control outward.
///
/// While active, every mutating ledger entry point is rejected. Queries are
/// still allowed.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    active: Option<&'static str>,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail if an outward call is in flight.
    pub fn ensure_idle(&self, operation: &'static str) -> Result<()> {
        match self.active {
            Some(_) => Err(WttError::ReentrantCall { operation }),
            None => Ok(()),
        }
    }

    /// Mark `operation` as holding the flag.
    pub fn enter(&mut self, operation: &'static str) -> Result<()> {
        self.ensure_idle(operation)?;
        self.active = Some(operation);
        Ok(())
    }

    /// Release the flag.
    pub fn exit(&mut self) {
        self.active = None;
    }

    /// Name of the operation holding the flag, if any.
    pub fn holder(&self) -> Option<&'static str> {
        self.active
    }
}
