//! Owner-approved spending allowances.

use std::collections::HashMap;

use wtt_common::{Address, Result, Wad, WttError};

/// Remaining amounts each spender may move out of each owner's balance.
#[derive(Debug, Clone, Default)]
pub struct AllowanceBook {
    allowances: HashMap<(Address, Address), Wad>,
}

impl AllowanceBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the allowance of `spender` over `owner`'s balance.
    pub fn get(&self, owner: &Address, spender: &Address) -> Wad {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(Wad::ZERO)
    }

    /// Overwrite an allowance. Not additive.
    pub fn set(&mut self, owner: Address, spender: Address, amount: Wad) {
        if amount.is_zero() {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), amount);
        }
    }

    /// Compute the allowance left after `spender` moves `amount` of `owner`'s funds.
    ///
    /// Does not mutate. The unlimited sentinel comes back unchanged.
    pub fn remaining_after(&self, owner: &Address, spender: &Address, amount: Wad) -> Result<Wad> {
        let current = self.get(owner, spender);
        if current.is_unlimited() {
            return Ok(current);
        }

        current
            .checked_sub(amount)
            .ok_or(WttError::InsufficientAllowance {
                owner: *owner,
                spender: *spender,
                required: amount,
                available: current,
            })
    }

    /// Iterate over non-zero allowances as `((owner, spender), amount)`.
    pub fn iter(&self) -> impl Iterator<Item = (&(Address, Address), &Wad)> {
        self.allowances.iter()
    }
}
