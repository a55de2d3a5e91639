//! Per-account balance tracking.

use std::collections::HashMap;

use wtt_common::{Address, Wad};

/// Token balances keyed by account.
///
/// Absent entries read as zero, and writing zero removes the entry, so an
/// account that was emptied is indistinguishable from one never seen.
#[derive(Debug, Clone, Default)]
pub struct BalanceBook {
    balances: HashMap<Address, Wad>,
}

impl BalanceBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the balance of an account.
    pub fn get(&self, account: &Address) -> Wad {
        self.balances.get(account).copied().unwrap_or(Wad::ZERO)
    }

    /// Overwrite the balance of an account.
    pub fn set(&mut self, account: Address, balance: Wad) {
        if balance.is_zero() {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, balance);
        }
    }

    /// Sum of all balances, or `None` if it does not fit.
    pub fn total(&self) -> Option<Wad> {
        self.balances
            .values()
            .try_fold(Wad::ZERO, |acc, balance| acc.checked_add(*balance))
    }

    /// Iterate over accounts holding a non-zero balance.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Wad)> {
        self.balances.iter()
    }

    /// Number of accounts holding a non-zero balance.
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}
