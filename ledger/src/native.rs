//! Native-value primitives the ledger relies on.
//!
//! The hosting environment owns native balances and the identity of the
//! caller. [`SimulatedChain`] is an in-memory host used by the simulator and
//! tests; a real deployment supplies its own [`NativeHost`].

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, warn};

use wtt_common::{Address, Result, Wad, WttError};

use crate::engine::WrappedLedger;

/// Caller identity plus native value attached to the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// Account invoking the operation.
    pub caller: Address,
    /// Native value supplied with the call.
    pub value: Wad,
}

impl CallContext {
    pub fn new(caller: Address, value: Wad) -> Self {
        Self { caller, value }
    }
}

/// Failure of an outbound native transfer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NativeTransferError {
    /// Sender does not hold enough native value.
    #[error("sender holds {available}, cannot send {required}")]
    InsufficientFunds { required: Wad, available: Wad },

    /// Recipient balance would overflow.
    #[error("recipient balance overflow")]
    Overflow,

    /// Recipient code refused the value.
    #[error("recipient rejected value: {0}")]
    Rejected(String),
}

/// Sends native value out of the ledger's custody.
///
/// Sending may run code belonging to the recipient, which can call back into
/// the ledger. That is why the ledger is handed over by mutable reference.
pub trait NativeHost {
    /// Move `amount` from the ledger's custody to `to`.
    fn send_value(
        &mut self,
        ledger: &mut WrappedLedger,
        to: &Address,
        amount: Wad,
    ) -> std::result::Result<(), NativeTransferError>;
}

/// Code that runs when an account receives native value.
///
/// Returning `Err` rejects the value. A hook that rejects must do so before
/// touching the ledger: the chain restores native balances, not ledger state.
pub trait ReceiveHook {
    fn on_receive(
        &mut self,
        chain: &mut SimulatedChain,
        ledger: &mut WrappedLedger,
        from: &Address,
        amount: Wad,
    ) -> std::result::Result<(), String>;
}

/// In-memory native-value host.
pub struct SimulatedChain {
    ledger_address: Address,
    balances: HashMap<Address, Wad>,
    hooks: HashMap<Address, Box<dyn ReceiveHook>>,
}

impl SimulatedChain {
    /// Create a chain whose ledger custody lives at `ledger_address`.
    pub fn new(ledger_address: Address) -> Self {
        Self {
            ledger_address,
            balances: HashMap::new(),
            hooks: HashMap::new(),
        }
    }

    /// Address holding the ledger's native custody.
    pub fn ledger_address(&self) -> Address {
        self.ledger_address
    }

    /// Native balance of an account.
    pub fn native_balance(&self, account: &Address) -> Wad {
        self.balances.get(account).copied().unwrap_or(Wad::ZERO)
    }

    /// Native value custodied by the ledger.
    pub fn custody(&self) -> Wad {
        self.native_balance(&self.ledger_address)
    }

    /// Create native value out of thin air for an account.
    pub fn fund(&mut self, account: Address, amount: Wad) -> Result<()> {
        let funded = self
            .native_balance(&account)
            .checked_add(amount)
            .ok_or_else(|| WttError::overflow("native funding"))?;
        self.balances.insert(account, funded);
        debug!(account = %account, amount = %amount, "Funded account");
        Ok(())
    }

    /// Install code to run whenever `account` receives value.
    pub fn register_hook(&mut self, account: Address, hook: Box<dyn ReceiveHook>) {
        self.hooks.insert(account, hook);
    }

    /// Remove the receive hook of `account`.
    pub fn remove_hook(&mut self, account: &Address) -> Option<Box<dyn ReceiveHook>> {
        self.hooks.remove(account)
    }

    /// Call `deposit` with `value` attached.
    pub fn deposit(&mut self, ledger: &mut WrappedLedger, caller: Address, value: Wad) -> Result<()> {
        let ledger_address = self.ledger_address;
        self.call_payable(caller, ledger_address, value, |_, ctx| ledger.deposit(ctx))
    }

    /// Send plain value to the ledger, which routes to its receive entry point.
    pub fn send_to_ledger(
        &mut self,
        ledger: &mut WrappedLedger,
        caller: Address,
        value: Wad,
    ) -> Result<()> {
        let ledger_address = self.ledger_address;
        self.call_payable(caller, ledger_address, value, |_, ctx| ledger.receive(ctx))
    }

    /// Call `withdraw` as `caller`.
    pub fn withdraw(&mut self, ledger: &mut WrappedLedger, caller: Address, amount: Wad) -> Result<()> {
        ledger.withdraw(self, &caller, amount)
    }

    /// Send native value between two accounts, running the recipient's hook.
    pub fn transfer_native(
        &mut self,
        ledger: &mut WrappedLedger,
        from: Address,
        to: Address,
        amount: Wad,
    ) -> Result<()> {
        self.send_with_hooks(ledger, from, to, amount)
            .map_err(|e| WttError::NativeTransferFailed {
                recipient: to,
                amount,
                reason: e.to_string(),
            })
    }

    /// Move `value` from `caller` to `recipient`, then run `call` as `caller`.
    ///
    /// This is how value is attached to a call into contract code: no
    /// receive hook runs. If `call` fails, native balances go back to what
    /// they were before the value moved.
    pub fn call_payable<F>(
        &mut self,
        caller: Address,
        recipient: Address,
        value: Wad,
        call: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut Self, &CallContext) -> Result<()>,
    {
        let before = self.balances.clone();

        self.move_value(caller, recipient, value)
            .map_err(|e| WttError::NativeTransferFailed {
                recipient,
                amount: value,
                reason: e.to_string(),
            })?;

        let ctx = CallContext::new(caller, value);
        if let Err(e) = call(self, &ctx) {
            self.balances = before;
            return Err(e);
        }

        Ok(())
    }

    fn send_with_hooks(
        &mut self,
        ledger: &mut WrappedLedger,
        from: Address,
        to: Address,
        amount: Wad,
    ) -> std::result::Result<(), NativeTransferError> {
        let before = self.balances.clone();
        self.move_value(from, to, amount)?;

        if let Some(mut hook) = self.hooks.remove(&to) {
            let outcome = hook.on_receive(self, ledger, &from, amount);
            self.hooks.entry(to).or_insert(hook);

            if let Err(reason) = outcome {
                warn!(recipient = %to, amount = %amount, reason = %reason, "Recipient rejected value");
                self.balances = before;
                return Err(NativeTransferError::Rejected(reason));
            }
        }

        Ok(())
    }

    fn move_value(
        &mut self,
        from: Address,
        to: Address,
        amount: Wad,
    ) -> std::result::Result<(), NativeTransferError> {
        let available = self.native_balance(&from);
        let debited = available
            .checked_sub(amount)
            .ok_or(NativeTransferError::InsufficientFunds {
                required: amount,
                available,
            })?;

        if from == to {
            return Ok(());
        }

        let credited = self
            .native_balance(&to)
            .checked_add(amount)
            .ok_or(NativeTransferError::Overflow)?;

        self.balances.insert(from, debited);
        self.balances.insert(to, credited);
        Ok(())
    }
}

impl NativeHost for SimulatedChain {
    fn send_value(
        &mut self,
        ledger: &mut WrappedLedger,
        to: &Address,
        amount: Wad,
    ) -> std::result::Result<(), NativeTransferError> {
        let from = self.ledger_address;
        self.send_with_hooks(ledger, from, *to, amount)
    }
}
