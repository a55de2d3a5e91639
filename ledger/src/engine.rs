//! Core ledger engine implementation.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use wtt_common::{Address, Result, Wad, WttError};

use crate::allowance::AllowanceBook;
use crate::balance::BalanceBook;
use crate::config::LedgerConfig;
use crate::guard::ReentrancyGuard;
use crate::journal::{Event, EventLog, EventRecord};
use crate::metadata::TokenMetadata;
use crate::native::{CallContext, NativeHost};

/// Custodies native value and tracks the 1:1 wrapped token.
///
/// Every mutating operation either completes with its notification appended
/// or fails leaving balances, allowances and the journal untouched. State is
/// committed before control can pass to external code.
#[derive(Debug)]
pub struct WrappedLedger {
    metadata: TokenMetadata,
    balances: BalanceBook,
    allowances: AllowanceBook,
    journal: EventLog,
    guard: ReentrancyGuard,
}

impl WrappedLedger {
    /// Create a ledger with the given metadata.
    pub fn new(metadata: TokenMetadata) -> Self {
        Self {
            metadata,
            balances: BalanceBook::new(),
            allowances: AllowanceBook::new(),
            journal: EventLog::new(),
            guard: ReentrancyGuard::new(),
        }
    }

    /// Create a ledger from validated configuration.
    pub fn from_config(config: &LedgerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(TokenMetadata::from(config)))
    }

    /// Wrap the native value attached to the call into the caller's balance.
    #[instrument(skip_all, fields(caller = %ctx.caller, amount = %ctx.value))]
    pub fn deposit(&mut self, ctx: &CallContext) -> Result<()> {
        self.guard.ensure_idle("deposit")?;

        let credited = self
            .balances
            .get(&ctx.caller)
            .checked_add(ctx.value)
            .ok_or_else(|| WttError::overflow("deposit credit"))?;
        self.balances
            .total()
            .and_then(|supply| supply.checked_add(ctx.value))
            .ok_or_else(|| WttError::overflow("total supply"))?;

        self.balances.set(ctx.caller, credited);
        self.journal.append(Event::Deposit {
            dst: ctx.caller,
            wad: ctx.value,
        });

        info!(balance = %credited, "Deposited");
        Ok(())
    }

    /// Entry point for plain native value sent to the ledger. Same contract as [`deposit`](Self::deposit).
    pub fn receive(&mut self, ctx: &CallContext) -> Result<()> {
        self.deposit(ctx)
    }

    /// Burn `amount` of the caller's balance and send the native value back.
    ///
    /// The balance is decremented before the host is asked to send, and the
    /// busy flag stays raised while the host runs recipient code. If the send
    /// fails the decrement is undone and nothing is journaled.
    #[instrument(skip_all, fields(caller = %caller, amount = %amount))]
    pub fn withdraw<H>(&mut self, host: &mut H, caller: &Address, amount: Wad) -> Result<()>
    where
        H: NativeHost + ?Sized,
    {
        self.guard.ensure_idle("withdraw")?;

        let available = self.balances.get(caller);
        let remaining = available.checked_sub(amount).ok_or_else(|| {
            warn!(available = %available, "Withdraw exceeds balance");
            WttError::InsufficientBalance {
                account: *caller,
                required: amount,
                available,
            }
        })?;

        self.guard.enter("withdraw")?;
        self.balances.set(*caller, remaining);

        let sent = host.send_value(self, caller, amount);
        self.guard.exit();

        if let Err(e) = sent {
            // Mutations were blocked while the guard was up, so this restores
            // the exact pre-call balance.
            self.balances.set(*caller, available);
            warn!(error = %e, "Native transfer failed, withdraw rolled back");
            return Err(WttError::NativeTransferFailed {
                recipient: *caller,
                amount,
                reason: e.to_string(),
            });
        }

        self.journal.append(Event::Withdrawal {
            src: *caller,
            wad: amount,
        });

        info!(balance = %remaining, "Withdrew");
        Ok(())
    }

    /// Move `amount` from the caller to `dst`.
    #[instrument(skip_all, fields(caller = %caller, dst = %dst, amount = %amount))]
    pub fn transfer(&mut self, caller: &Address, dst: &Address, amount: Wad) -> Result<()> {
        self.guard.ensure_idle("transfer")?;
        self.move_balance(caller, caller, dst, amount)
    }

    /// Move `amount` from `owner` to `dst` on behalf of `spender`.
    ///
    /// A spender other than the owner needs enough allowance, which is
    /// reduced by `amount` unless it is the unlimited sentinel.
    #[instrument(skip_all, fields(spender = %spender, owner = %owner, dst = %dst, amount = %amount))]
    pub fn transfer_from(
        &mut self,
        spender: &Address,
        owner: &Address,
        dst: &Address,
        amount: Wad,
    ) -> Result<()> {
        self.guard.ensure_idle("transfer_from")?;
        self.move_balance(spender, owner, dst, amount)
    }

    /// Set the allowance of `spender` over `owner`'s balance to `amount`.
    ///
    /// Overwrites the previous value without checking it.
    #[instrument(skip_all, fields(owner = %owner, spender = %spender, amount = %amount))]
    pub fn approve(&mut self, owner: &Address, spender: &Address, amount: Wad) -> Result<()> {
        self.guard.ensure_idle("approve")?;

        self.allowances.set(*owner, *spender, amount);
        self.journal.append(Event::Approval {
            src: *owner,
            guy: *spender,
            wad: amount,
        });

        info!("Approved");
        Ok(())
    }

    /// Balance of an account.
    pub fn balance_of(&self, account: &Address) -> Wad {
        self.balances.get(account)
    }

    /// Remaining allowance of `spender` over `owner`'s balance.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Wad {
        self.allowances.get(owner, spender)
    }

    /// Sum of all balances.
    pub fn total_supply(&self) -> Wad {
        // Deposits refuse to push the sum past u128 and transfers preserve it.
        self.balances.total().unwrap_or(Wad::MAX)
    }

    pub fn name(&self) -> &str {
        self.metadata.name()
    }

    pub fn symbol(&self) -> &str {
        self.metadata.symbol()
    }

    pub fn decimals(&self) -> u8 {
        self.metadata.decimals()
    }

    pub fn metadata(&self) -> &TokenMetadata {
        &self.metadata
    }

    /// Notification journal.
    pub fn events(&self) -> &EventLog {
        &self.journal
    }

    /// Subscribe to notifications appended from now on.
    pub fn subscribe(&mut self) -> broadcast::Receiver<EventRecord> {
        self.journal.subscribe()
    }

    /// Accounts holding a non-zero balance.
    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &Wad)> {
        self.balances.iter()
    }

    /// Check that balances add up to the native value held in custody.
    pub fn verify_integrity(&self, custody: Wad) -> bool {
        match self.balances.total() {
            Some(total) => total == custody,
            None => false,
        }
    }

    /// Point-in-time view for reporting, sorted by account.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let mut balances: Vec<BalanceEntry> = self
            .balances
            .iter()
            .map(|(account, balance)| BalanceEntry {
                account: *account,
                balance: *balance,
            })
            .collect();
        balances.sort_by_key(|entry| entry.account);

        let mut allowances: Vec<AllowanceEntry> = self
            .allowances
            .iter()
            .map(|((owner, spender), amount)| AllowanceEntry {
                owner: *owner,
                spender: *spender,
                amount: *amount,
            })
            .collect();
        allowances.sort_by_key(|entry| (entry.owner, entry.spender));

        LedgerSnapshot {
            metadata: self.metadata.clone(),
            total_supply: self.total_supply(),
            balances,
            allowances,
        }
    }

    /// Shared body of `transfer` and `transfer_from`.
    ///
    /// All new values are computed before anything is written, so a failure
    /// at any check leaves state untouched.
    fn move_balance(
        &mut self,
        spender: &Address,
        owner: &Address,
        dst: &Address,
        amount: Wad,
    ) -> Result<()> {
        let available = self.balances.get(owner);
        let debited = available.checked_sub(amount).ok_or_else(|| {
            warn!(available = %available, "Transfer exceeds balance");
            WttError::InsufficientBalance {
                account: *owner,
                required: amount,
                available,
            }
        })?;

        let allowance = if spender != owner {
            let remaining = self
                .allowances
                .remaining_after(owner, spender, amount)
                .map_err(|e| {
                    warn!(error = %e, "Transfer exceeds allowance");
                    e
                })?;
            Some(remaining)
        } else {
            None
        };

        let credited = if dst == owner {
            None
        } else {
            let credited = self
                .balances
                .get(dst)
                .checked_add(amount)
                .ok_or_else(|| WttError::overflow("transfer credit"))?;
            Some(credited)
        };

        // Self-transfer nets to zero: only write when the accounts differ.
        if let Some(credited) = credited {
            self.balances.set(*owner, debited);
            self.balances.set(*dst, credited);
        }

        if let Some(remaining) = allowance {
            self.allowances.set(*owner, *spender, remaining);
        }

        self.journal.append(Event::Transfer {
            src: *owner,
            dst: *dst,
            wad: amount,
        });

        info!("Transferred");
        Ok(())
    }
}

/// Balance line of a [`LedgerSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub account: Address,
    pub balance: Wad,
}

/// Allowance line of a [`LedgerSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceEntry {
    pub owner: Address,
    pub spender: Address,
    pub amount: Wad,
}

/// Serializable view of the whole ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Token metadata.
    pub metadata: TokenMetadata,
    /// Sum of balances.
    pub total_supply: Wad,
    /// Non-zero balances, sorted by account.
    pub balances: Vec<BalanceEntry>,
    /// Non-zero allowances, sorted by owner then spender.
    pub allowances: Vec<AllowanceEntry>,
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::native::{ReceiveHook, SimulatedChain};

    fn ether(s: &str) -> Wad {
        Wad::parse_decimal(s, 18).unwrap()
    }

    fn setup() -> (SimulatedChain, WrappedLedger) {
        let chain = SimulatedChain::new(Address::from_label("wtt"));
        let ledger = WrappedLedger::from_config(&LedgerConfig::default()).unwrap();
        (chain, ledger)
    }

    fn funded(chain: &mut SimulatedChain, label: &str, amount: &str) -> Address {
        let account = Address::from_label(label);
        chain.fund(account, ether(amount)).unwrap();
        account
    }

    #[test]
    fn test_token_base_info() {
        let (_, ledger) = setup();
        assert_eq!(ledger.name(), "Wrapped Thunder Token");
        assert_eq!(ledger.symbol(), "WTT");
        assert_eq!(ledger.decimals(), 18);
        assert_eq!(ledger.total_supply(), Wad::ZERO);
    }

    #[test]
    fn test_deposit_and_withdraw() {
        let (mut chain, mut ledger) = setup();
        let dora = funded(&mut chain, "dora", "100");
        assert_eq!(ledger.balance_of(&dora), Wad::ZERO);

        chain.deposit(&mut ledger, dora, ether("3.14")).unwrap();
        assert_eq!(ledger.balance_of(&dora), ether("3.14"));
        assert_eq!(
            ledger.events().last().unwrap().event,
            Event::Deposit { dst: dora, wad: ether("3.14") }
        );

        chain.withdraw(&mut ledger, dora, ether("1.618")).unwrap();
        assert_eq!(
            ledger.events().last().unwrap().event,
            Event::Withdrawal { src: dora, wad: ether("1.618") }
        );

        assert_eq!(ledger.balance_of(&dora), ether("1.522"));
        assert_eq!(ledger.total_supply(), ether("1.522"));
        assert_eq!(chain.custody(), ether("1.522"));
        assert_eq!(chain.native_balance(&dora), ether("98.478"));
        assert!(ledger.verify_integrity(chain.custody()));
    }

    #[test]
    fn test_deposit_withdraw_round_trip() {
        let (mut chain, mut ledger) = setup();
        let abby = funded(&mut chain, "abby", "5");

        chain.deposit(&mut ledger, abby, ether("5")).unwrap();
        chain.withdraw(&mut ledger, abby, ether("5")).unwrap();

        assert_eq!(chain.native_balance(&abby), ether("5"));
        assert_eq!(ledger.balance_of(&abby), Wad::ZERO);
        assert_eq!(ledger.accounts().count(), 0);
    }

    #[test]
    fn test_zero_deposit_succeeds() {
        let (mut chain, mut ledger) = setup();
        let abby = Address::from_label("abby");

        chain.deposit(&mut ledger, abby, Wad::ZERO).unwrap();
        assert_eq!(ledger.balance_of(&abby), Wad::ZERO);
        assert_eq!(ledger.events().len(), 1);
    }

    #[test]
    fn test_deposit_overflow_is_checked() {
        let mut ledger = WrappedLedger::new(TokenMetadata::new("T", "T", 0));
        let abby = Address::from_label("abby");

        ledger.deposit(&CallContext::new(abby, Wad::MAX)).unwrap();
        let err = ledger.deposit(&CallContext::new(abby, Wad::new(1))).unwrap_err();

        assert_eq!(err.error_code(), "ARITHMETIC_OVERFLOW");
        assert_eq!(ledger.balance_of(&abby), Wad::MAX);
        assert_eq!(ledger.events().len(), 1);
    }

    #[test]
    fn test_deposit_rejects_total_supply_overflow() {
        let mut ledger = WrappedLedger::new(TokenMetadata::new("T", "T", 0));
        let abby = Address::from_label("abby");
        let bena = Address::from_label("bena");

        ledger.deposit(&CallContext::new(abby, Wad::MAX)).unwrap();
        let err = ledger.deposit(&CallContext::new(bena, Wad::new(1))).unwrap_err();

        assert_eq!(err.error_code(), "ARITHMETIC_OVERFLOW");
        assert_eq!(ledger.balance_of(&bena), Wad::ZERO);
        assert_eq!(ledger.total_supply(), Wad::MAX);
        assert_eq!(ledger.events().len(), 1);
    }

    #[test]
    fn test_receive_acts_as_deposit() {
        let (mut chain, mut ledger) = setup();
        let abby = funded(&mut chain, "abby", "10");

        chain.send_to_ledger(&mut ledger, abby, ether("2.718")).unwrap();

        assert_eq!(ledger.balance_of(&abby), ether("2.718"));
        assert_eq!(
            ledger.events().last().unwrap().event,
            Event::Deposit { dst: abby, wad: ether("2.718") }
        );
        assert!(ledger.verify_integrity(chain.custody()));
    }

    #[test]
    fn test_withdraw_more_than_balance_fails() {
        let (mut chain, mut ledger) = setup();
        let abby = funded(&mut chain, "abby", "10");
        chain.deposit(&mut ledger, abby, ether("1")).unwrap();
        let events_before = ledger.events().len();

        let err = chain
            .withdraw(&mut ledger, abby, ether("1").checked_add(Wad::new(1)).unwrap())
            .unwrap_err();

        assert!(matches!(err, WttError::InsufficientBalance { .. }));
        assert_eq!(ledger.balance_of(&abby), ether("1"));
        assert_eq!(chain.custody(), ether("1"));
        assert_eq!(ledger.events().len(), events_before);
    }

    #[test]
    fn test_approve_and_transfer() {
        let (mut chain, mut ledger) = setup();
        let chris = funded(&mut chain, "chris", "100");
        let bena = Address::from_label("bena");
        let dora = Address::from_label("dora");
        let evie = Address::from_label("evie");

        chain.deposit(&mut ledger, chris, ether("99.9")).unwrap();
        let balance = ledger.balance_of(&chris);

        ledger.approve(&chris, &evie, Wad::UNLIMITED).unwrap();
        assert_eq!(
            ledger.events().last().unwrap().event,
            Event::Approval { src: chris, guy: evie, wad: Wad::UNLIMITED }
        );

        let approved = ether("0.330366");
        ledger.approve(&chris, &bena, approved).unwrap();

        let amount = ether("0.110001");
        ledger.transfer(&chris, &dora, amount).unwrap();
        ledger.transfer_from(&bena, &chris, &dora, amount).unwrap();
        ledger.transfer_from(&evie, &chris, &dora, amount).unwrap();
        assert_eq!(
            ledger.events().last().unwrap().event,
            Event::Transfer { src: chris, dst: dora, wad: amount }
        );

        assert_eq!(ledger.balance_of(&dora), ether("0.330003"));
        assert_eq!(
            ledger.balance_of(&chris),
            balance.checked_sub(ether("0.330003")).unwrap()
        );
        assert_eq!(
            ledger.allowance(&chris, &bena),
            approved.checked_sub(amount).unwrap()
        );
        assert_eq!(ledger.allowance(&chris, &evie), Wad::UNLIMITED);
        assert!(ledger.verify_integrity(chain.custody()));
    }

    #[test]
    fn test_transfer_from_over_allowance_fails() {
        let (mut chain, mut ledger) = setup();
        let chris = funded(&mut chain, "chris", "10");
        let bena = Address::from_label("bena");
        let dora = Address::from_label("dora");

        chain.deposit(&mut ledger, chris, ether("10")).unwrap();
        ledger.approve(&chris, &bena, ether("1")).unwrap();
        let events_before = ledger.events().len();

        let err = ledger
            .transfer_from(&bena, &chris, &dora, ether("1.5"))
            .unwrap_err();

        assert!(matches!(err, WttError::InsufficientAllowance { .. }));
        assert_eq!(ledger.balance_of(&chris), ether("10"));
        assert_eq!(ledger.balance_of(&dora), Wad::ZERO);
        assert_eq!(ledger.allowance(&chris, &bena), ether("1"));
        assert_eq!(ledger.events().len(), events_before);
    }

    #[test]
    fn test_balance_checked_before_allowance() {
        let (mut chain, mut ledger) = setup();
        let chris = funded(&mut chain, "chris", "1");
        let bena = Address::from_label("bena");

        chain.deposit(&mut ledger, chris, ether("1")).unwrap();

        let err = ledger
            .transfer_from(&bena, &chris, &bena, ether("2"))
            .unwrap_err();
        assert_eq!(err.error_code(), "INSUFFICIENT_BALANCE");
    }

    #[test]
    fn test_owner_transfer_from_skips_allowance() {
        let (mut chain, mut ledger) = setup();
        let chris = funded(&mut chain, "chris", "3");
        let dora = Address::from_label("dora");

        chain.deposit(&mut ledger, chris, ether("3")).unwrap();
        ledger.transfer_from(&chris, &chris, &dora, ether("2")).unwrap();

        assert_eq!(ledger.balance_of(&dora), ether("2"));
        assert_eq!(ledger.allowance(&chris, &chris), Wad::ZERO);
    }

    #[test]
    fn test_self_transfer_is_neutral() {
        let (mut chain, mut ledger) = setup();
        let abby = funded(&mut chain, "abby", "4");
        chain.deposit(&mut ledger, abby, ether("4")).unwrap();

        ledger.transfer(&abby, &abby, ether("4")).unwrap();
        assert_eq!(ledger.balance_of(&abby), ether("4"));

        let err = ledger.transfer(&abby, &abby, ether("5")).unwrap_err();
        assert_eq!(err.error_code(), "INSUFFICIENT_BALANCE");
        assert_eq!(ledger.balance_of(&abby), ether("4"));
    }

    #[test]
    fn test_spender_self_transfer_consumes_allowance() {
        let (mut chain, mut ledger) = setup();
        let chris = funded(&mut chain, "chris", "3");
        let bena = Address::from_label("bena");

        chain.deposit(&mut ledger, chris, ether("3")).unwrap();
        ledger.approve(&chris, &bena, ether("1")).unwrap();
        ledger.transfer_from(&bena, &chris, &chris, ether("0.4")).unwrap();

        assert_eq!(ledger.balance_of(&chris), ether("3"));
        assert_eq!(ledger.allowance(&chris, &bena), ether("0.6"));
        assert_eq!(ledger.total_supply(), ether("3"));
        assert_eq!(
            ledger.events().last().unwrap().event,
            Event::Transfer { src: chris, dst: chris, wad: ether("0.4") }
        );
    }

    #[test]
    fn test_approve_overwrites() {
        let (_, mut ledger) = setup();
        let chris = Address::from_label("chris");
        let bena = Address::from_label("bena");

        ledger.approve(&chris, &bena, ether("7")).unwrap();
        ledger.approve(&chris, &bena, ether("7")).unwrap();
        assert_eq!(ledger.allowance(&chris, &bena), ether("7"));

        ledger.approve(&chris, &bena, ether("2")).unwrap();
        assert_eq!(ledger.allowance(&chris, &bena), ether("2"));
        assert_eq!(ledger.events().len(), 3);
    }

    struct Refuse;

    impl ReceiveHook for Refuse {
        fn on_receive(
            &mut self,
            _chain: &mut SimulatedChain,
            _ledger: &mut WrappedLedger,
            _from: &Address,
            _amount: Wad,
        ) -> std::result::Result<(), String> {
            Err("cannot accept funds".to_string())
        }
    }

    #[test]
    fn test_rejected_native_transfer_rolls_back() {
        let (mut chain, mut ledger) = setup();
        let abby = funded(&mut chain, "abby", "3");
        chain.deposit(&mut ledger, abby, ether("3")).unwrap();
        chain.register_hook(abby, Box::new(Refuse));
        let events_before = ledger.events().len();

        let err = chain.withdraw(&mut ledger, abby, ether("1")).unwrap_err();

        assert!(matches!(err, WttError::NativeTransferFailed { .. }));
        assert_eq!(ledger.balance_of(&abby), ether("3"));
        assert_eq!(chain.custody(), ether("3"));
        assert_eq!(ledger.events().len(), events_before);
        assert!(ledger.verify_integrity(chain.custody()));
    }

    /// Tries to withdraw again every time value arrives.
    struct Drainer {
        attacker: Address,
        outcomes: Rc<RefCell<Vec<Result<()>>>>,
        observed_balance: Rc<RefCell<Option<Wad>>>,
    }

    impl ReceiveHook for Drainer {
        fn on_receive(
            &mut self,
            chain: &mut SimulatedChain,
            ledger: &mut WrappedLedger,
            _from: &Address,
            amount: Wad,
        ) -> std::result::Result<(), String> {
            *self.observed_balance.borrow_mut() = Some(ledger.balance_of(&self.attacker));
            let outcome = ledger.withdraw(chain, &self.attacker, amount);
            self.outcomes.borrow_mut().push(outcome);
            Ok(())
        }
    }

    #[test]
    fn test_reentrant_withdraw_cannot_drain() {
        let (mut chain, mut ledger) = setup();
        let victim = funded(&mut chain, "victim", "10");
        let attacker = funded(&mut chain, "attacker", "1");
        chain.deposit(&mut ledger, victim, ether("10")).unwrap();
        chain.deposit(&mut ledger, attacker, ether("1")).unwrap();

        let outcomes = Rc::new(RefCell::new(Vec::new()));
        let observed = Rc::new(RefCell::new(None));
        chain.register_hook(
            attacker,
            Box::new(Drainer {
                attacker,
                outcomes: outcomes.clone(),
                observed_balance: observed.clone(),
            }),
        );

        chain.withdraw(&mut ledger, attacker, ether("1")).unwrap();

        // The balance was already debited when control reached the hook.
        assert_eq!(*observed.borrow(), Some(Wad::ZERO));
        assert_eq!(
            outcomes.borrow().as_slice(),
            &[Err(WttError::ReentrantCall { operation: "withdraw" })]
        );
        assert_eq!(chain.native_balance(&attacker), ether("1"));
        assert_eq!(ledger.balance_of(&victim), ether("10"));
        assert_eq!(chain.custody(), ether("10"));
        assert!(ledger.verify_integrity(chain.custody()));
    }

    /// Tries every other mutating entry point while value is in flight.
    struct Meddler {
        attacker: Address,
        codes: Rc<RefCell<Vec<&'static str>>>,
    }

    impl ReceiveHook for Meddler {
        fn on_receive(
            &mut self,
            _chain: &mut SimulatedChain,
            ledger: &mut WrappedLedger,
            _from: &Address,
            amount: Wad,
        ) -> std::result::Result<(), String> {
            let other = Address::from_label("other");
            let attempts = [
                ledger.deposit(&CallContext::new(self.attacker, amount)),
                ledger.transfer(&self.attacker, &other, amount),
                ledger.transfer_from(&self.attacker, &self.attacker, &other, amount),
                ledger.approve(&self.attacker, &other, amount),
            ];
            for attempt in attempts {
                if let Err(e) = attempt {
                    self.codes.borrow_mut().push(e.error_code());
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_mutations_blocked_during_withdraw() {
        let (mut chain, mut ledger) = setup();
        let attacker = funded(&mut chain, "attacker", "2");
        chain.deposit(&mut ledger, attacker, ether("2")).unwrap();

        let codes = Rc::new(RefCell::new(Vec::new()));
        chain.register_hook(
            attacker,
            Box::new(Meddler {
                attacker,
                codes: codes.clone(),
            }),
        );

        chain.withdraw(&mut ledger, attacker, ether("1")).unwrap();

        assert_eq!(codes.borrow().as_slice(), &["REENTRANT_CALL"; 4]);
        assert_eq!(ledger.balance_of(&attacker), ether("1"));
        assert!(ledger.verify_integrity(chain.custody()));
    }

    #[test]
    fn test_snapshot_is_sorted_and_complete() {
        let (mut chain, mut ledger) = setup();
        let abby = funded(&mut chain, "abby", "1");
        let bena = funded(&mut chain, "bena", "2");
        chain.deposit(&mut ledger, abby, ether("1")).unwrap();
        chain.deposit(&mut ledger, bena, ether("2")).unwrap();
        ledger.approve(&abby, &bena, ether("0.5")).unwrap();

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.total_supply, ether("3"));
        assert_eq!(snapshot.balances.len(), 2);
        assert!(snapshot.balances[0].account < snapshot.balances[1].account);
        assert_eq!(snapshot.allowances.len(), 1);
        assert_eq!(snapshot.metadata.symbol(), "WTT");

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: LedgerSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[tokio::test]
    async fn test_subscribers_see_operations_in_order() {
        let (mut chain, mut ledger) = setup();
        let abby = funded(&mut chain, "abby", "1");
        let bena = Address::from_label("bena");
        let mut watcher = ledger.subscribe();

        chain.deposit(&mut ledger, abby, ether("1")).unwrap();
        assert!(ledger.transfer(&abby, &bena, ether("2")).is_err());
        ledger.transfer(&abby, &bena, ether("1")).unwrap();

        let first = watcher.recv().await.unwrap();
        let second = watcher.recv().await.unwrap();
        assert_eq!(first.event.name(), "Deposit");
        assert_eq!(second.event.name(), "Transfer");
        assert_eq!(second.sequence, 1);
    }

    mod invariants {
        use proptest::prelude::*;

        use super::{setup, Address, Wad};

        #[derive(Debug, Clone)]
        enum Op {
            Deposit(usize, u64),
            Withdraw(usize, u64),
            Transfer(usize, usize, u64),
            Approve(usize, usize, u64),
            ApproveUnlimited(usize, usize),
            TransferFrom(usize, usize, usize, u64),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0..4usize, 0..1_000u64).prop_map(|(a, w)| Op::Deposit(a, w)),
                (0..4usize, 0..1_000u64).prop_map(|(a, w)| Op::Withdraw(a, w)),
                (0..4usize, 0..4usize, 0..1_000u64).prop_map(|(a, b, w)| Op::Transfer(a, b, w)),
                (0..4usize, 0..4usize, 0..1_000u64).prop_map(|(a, b, w)| Op::Approve(a, b, w)),
                (0..4usize, 0..4usize).prop_map(|(a, b)| Op::ApproveUnlimited(a, b)),
                (0..4usize, 0..4usize, 0..4usize, 0..1_000u64)
                    .prop_map(|(s, o, d, w)| Op::TransferFrom(s, o, d, w)),
            ]
        }

        proptest! {
            #[test]
            fn supply_matches_custody(ops in proptest::collection::vec(op(), 1..60)) {
                let (mut chain, mut ledger) = setup();
                let actors: Vec<Address> = (0..4)
                    .map(|i| Address::from_label(&format!("actor-{}", i)))
                    .collect();
                for actor in &actors {
                    chain.fund(*actor, Wad::new(2_000)).unwrap();
                }

                for op in ops {
                    let before = ledger.snapshot();
                    let events_before = ledger.events().len();

                    let result = match op {
                        Op::Deposit(a, w) => chain.deposit(&mut ledger, actors[a], Wad::new(w.into())),
                        Op::Withdraw(a, w) => chain.withdraw(&mut ledger, actors[a], Wad::new(w.into())),
                        Op::Transfer(a, b, w) => ledger.transfer(&actors[a], &actors[b], Wad::new(w.into())),
                        Op::Approve(a, b, w) => ledger.approve(&actors[a], &actors[b], Wad::new(w.into())),
                        Op::ApproveUnlimited(a, b) => ledger.approve(&actors[a], &actors[b], Wad::UNLIMITED),
                        Op::TransferFrom(s, o, d, w) => {
                            let unlimited = ledger.allowance(&actors[o], &actors[s]).is_unlimited();
                            let result = ledger.transfer_from(&actors[s], &actors[o], &actors[d], Wad::new(w.into()));
                            if unlimited {
                                prop_assert!(ledger.allowance(&actors[o], &actors[s]).is_unlimited());
                            }
                            result
                        }
                    };

                    match result {
                        Ok(()) => prop_assert_eq!(ledger.events().len(), events_before + 1),
                        Err(_) => {
                            prop_assert_eq!(ledger.snapshot(), before);
                            prop_assert_eq!(ledger.events().len(), events_before);
                        }
                    }

                    prop_assert!(ledger.verify_integrity(chain.custody()));
                    prop_assert_eq!(ledger.total_supply(), chain.custody());
                }
            }
        }
    }
}
