//! A third-party contract that holds wrapped tokens for its own callers.
//!
//! It wraps native value into the ledger under its own address and keeps a
//! per-caller record of what it holds for whom.

use std::collections::HashMap;

use tracing::{info, warn};

use wtt_common::{Address, Result, Wad, WttError};
use wtt_ledger::{SimulatedChain, WrappedLedger};

/// Notification emitted by the custodian itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustodianEvent {
    /// Value was unwrapped and forwarded to a caller.
    Unwrapped { amount: Wad },
}

/// Contract account wrapping and unwrapping on behalf of callers.
#[derive(Debug)]
pub struct Custodian {
    address: Address,
    records: HashMap<Address, Wad>,
    events: Vec<CustodianEvent>,
}

impl Custodian {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            records: HashMap::new(),
            events: Vec::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Amount held on behalf of `caller`.
    pub fn record(&self, caller: &Address) -> Wad {
        self.records.get(caller).copied().unwrap_or(Wad::ZERO)
    }

    #[allow(dead_code)]
    pub fn events(&self) -> &[CustodianEvent] {
        &self.events
    }

    /// Total native value forwarded to callers so far.
    pub fn unwrapped_total(&self) -> Wad {
        self.events
            .iter()
            .map(|event| match event {
                CustodianEvent::Unwrapped { amount } => *amount,
            })
            .fold(Wad::ZERO, |acc, amount| acc.checked_add(amount).unwrap_or(Wad::MAX))
    }

    /// Take `value` from `caller`, wrap it in the ledger and record it.
    pub fn wrap(
        &mut self,
        chain: &mut SimulatedChain,
        ledger: &mut WrappedLedger,
        caller: Address,
        value: Wad,
    ) -> Result<()> {
        let recorded = self
            .record(&caller)
            .checked_add(value)
            .ok_or_else(|| WttError::overflow("custodian record"))?;

        let custodian = self.address;
        chain.call_payable(caller, custodian, value, |chain, ctx| {
            chain.deposit(ledger, custodian, ctx.value)
        })?;

        self.records.insert(caller, recorded);
        info!(caller = %caller, amount = %value, "Custodian wrapped");
        Ok(())
    }

    /// Unwrap `amount` from the ledger and forward the native value to `caller`.
    ///
    /// If `caller` refuses the forwarded value, the custodian wraps it again.
    /// The ledger journal then keeps the Withdrawal and Deposit pair, since
    /// notifications already delivered to watchers cannot be taken back.
    /// The caller's record is restored only once the value is wrapped again.
    pub fn unwrap(
        &mut self,
        chain: &mut SimulatedChain,
        ledger: &mut WrappedLedger,
        caller: Address,
        amount: Wad,
    ) -> Result<()> {
        let recorded = self.record(&caller);
        let remaining = recorded
            .checked_sub(amount)
            .ok_or(WttError::InsufficientBalance {
                account: caller,
                required: amount,
                available: recorded,
            })?;

        // Record first, then call out.
        self.records.insert(caller, remaining);

        if let Err(e) = chain.withdraw(ledger, self.address, amount) {
            self.records.insert(caller, recorded);
            return Err(e);
        }

        if let Err(e) = chain.transfer_native(ledger, self.address, caller, amount) {
            warn!(caller = %caller, error = %e, "Forwarding failed, re-wrapping");
            chain.deposit(ledger, self.address, amount)?;
            self.records.insert(caller, recorded);
            return Err(e);
        }

        self.events.push(CustodianEvent::Unwrapped { amount });
        info!(caller = %caller, amount = %amount, "Custodian unwrapped");
        Ok(())
    }
}
