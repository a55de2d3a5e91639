//! Simulation controller.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::broadcast;
use tracing::{debug, info};

use wtt_common::{Address, Result, Wad, WttError};
use wtt_ledger::{EventRecord, LedgerConfig, SimulatedChain, WrappedLedger};

use crate::actors::ActorDirectory;
use crate::metrics::SimulationMetrics;
use crate::scenario::{AssertCondition, Scenario, ScenarioStep};
use crate::third_party::Custodian;

/// Native value every actor starts with.
const INITIAL_FUNDING: &str = "1000";

/// Highest precision at which every actor's funding still fits in base units.
const MAX_SIMULATION_DECIMALS: u8 = 30;

/// Drives scenarios against a ledger on a simulated chain.
pub struct SimulationController {
    chain: SimulatedChain,
    ledger: WrappedLedger,
    custodian: Custodian,
    actors: ActorDirectory,
    rng: StdRng,
    metrics: SimulationMetrics,
}

impl SimulationController {
    /// Create a new simulation controller.
    pub fn new(config: &LedgerConfig, actor_count: usize, seed: Option<u64>) -> Result<Self> {
        if config.decimals > MAX_SIMULATION_DECIMALS {
            return Err(WttError::ConfigurationError(format!(
                "simulation supports at most {} decimals, got {}",
                MAX_SIMULATION_DECIMALS, config.decimals
            )));
        }

        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            chain: SimulatedChain::new(Address::from_label("wtt-ledger")),
            ledger: WrappedLedger::from_config(config)?,
            custodian: Custodian::new(Address::from_label("custodian")),
            actors: ActorDirectory::create(actor_count),
            rng,
            metrics: SimulationMetrics::new(),
        })
    }

    /// Give every actor its starting native balance.
    pub fn initialize(&mut self) -> Result<()> {
        let funding = Wad::parse_decimal(INITIAL_FUNDING, self.ledger.decimals())?;

        for actor in self.actors.iter() {
            self.chain.fund(actor.address, funding)?;
            debug!(actor = %actor.name, address = %actor.address, "Funded actor");
        }

        info!(
            actors = self.actors.len(),
            funding = INITIAL_FUNDING,
            "Simulation initialized"
        );
        Ok(())
    }

    /// Watch ledger notifications.
    pub fn subscribe(&mut self) -> broadcast::Receiver<EventRecord> {
        self.ledger.subscribe()
    }

    /// Run a scenario, checking ledger integrity after every step.
    pub fn run_scenario(&mut self, scenario: &Scenario) -> Result<()> {
        info!("Running scenario: {} - {}", scenario.name, scenario.description);

        for (index, step) in scenario.steps.iter().enumerate() {
            self.execute_step(step).map_err(|e| {
                WttError::ScenarioFailed(format!("step {} of {}: {}", index + 1, scenario.name, e))
            })?;
            self.check_integrity()?;
        }

        Ok(())
    }

    pub fn ledger(&self) -> &WrappedLedger {
        &self.ledger
    }

    pub fn chain(&self) -> &SimulatedChain {
        &self.chain
    }

    pub fn custodian(&self) -> &Custodian {
        &self.custodian
    }

    /// Get simulation metrics.
    pub fn metrics(&self) -> &SimulationMetrics {
        &self.metrics
    }

    fn execute_step(&mut self, step: &ScenarioStep) -> Result<()> {
        match step {
            ScenarioStep::Assert { condition } => self.check(condition),
            ScenarioStep::ExpectFailure { step, code } => match self.execute_step(step) {
                Ok(()) => Err(WttError::ScenarioFailed(format!(
                    "expected {}, step succeeded",
                    code
                ))),
                Err(e) if e.error_code() == code.as_str() => Ok(()),
                Err(e) => Err(WttError::ScenarioFailed(format!(
                    "expected {}, got {}",
                    code,
                    e.error_code()
                ))),
            },
            ScenarioStep::Random { operations } => self.run_random(*operations),
            operation => self.apply(operation),
        }
    }

    /// Perform one operation and count its outcome.
    fn apply(&mut self, step: &ScenarioStep) -> Result<()> {
        let kind = operation_kind(step);
        let outcome = self.perform(step);

        match &outcome {
            Ok(()) => self.metrics.record_success(kind),
            Err(e) => {
                debug!(kind, error = %e, "Operation failed");
                self.metrics.record_failure(kind, e.error_code());
            }
        }

        outcome
    }

    fn perform(&mut self, step: &ScenarioStep) -> Result<()> {
        match step {
            ScenarioStep::Fund { account, amount } => {
                let account = self.resolve(account)?;
                let amount = self.amount(amount)?;
                self.chain.fund(account, amount)
            }
            ScenarioStep::Deposit { account, amount } => {
                let account = self.resolve(account)?;
                let amount = self.amount(amount)?;
                self.chain.deposit(&mut self.ledger, account, amount)
            }
            ScenarioStep::Send { account, amount } => {
                let account = self.resolve(account)?;
                let amount = self.amount(amount)?;
                self.chain.send_to_ledger(&mut self.ledger, account, amount)
            }
            ScenarioStep::Withdraw { account, amount } => {
                let account = self.resolve(account)?;
                let amount = self.amount(amount)?;
                self.chain.withdraw(&mut self.ledger, account, amount)
            }
            ScenarioStep::Transfer { from, to, amount } => {
                let from = self.resolve(from)?;
                let to = self.resolve(to)?;
                let amount = self.amount(amount)?;
                self.ledger.transfer(&from, &to, amount)
            }
            ScenarioStep::TransferFrom {
                spender,
                owner,
                to,
                amount,
            } => {
                let spender = self.resolve(spender)?;
                let owner = self.resolve(owner)?;
                let to = self.resolve(to)?;
                let amount = self.amount(amount)?;
                self.ledger.transfer_from(&spender, &owner, &to, amount)
            }
            ScenarioStep::Approve {
                owner,
                spender,
                amount,
            } => {
                let owner = self.resolve(owner)?;
                let spender = self.resolve(spender)?;
                let amount = self.amount(amount)?;
                self.ledger.approve(&owner, &spender, amount)
            }
            ScenarioStep::CustodianWrap { account, amount } => {
                let account = self.resolve(account)?;
                let amount = self.amount(amount)?;
                self.custodian
                    .wrap(&mut self.chain, &mut self.ledger, account, amount)
            }
            ScenarioStep::CustodianUnwrap { account, amount } => {
                let account = self.resolve(account)?;
                let amount = self.amount(amount)?;
                self.custodian
                    .unwrap(&mut self.chain, &mut self.ledger, account, amount)
            }
            other => Err(WttError::ScenarioFailed(format!(
                "{:?} is not an operation",
                other
            ))),
        }
    }

    fn check(&self, condition: &AssertCondition) -> Result<()> {
        let (what, actual, expected) = match condition {
            AssertCondition::BalanceEquals { account, amount } => (
                format!("balance of {}", account),
                self.ledger.balance_of(&self.resolve(account)?),
                self.amount(amount)?,
            ),
            AssertCondition::AllowanceEquals {
                owner,
                spender,
                amount,
            } => (
                format!("allowance of {} over {}", spender, owner),
                self.ledger
                    .allowance(&self.resolve(owner)?, &self.resolve(spender)?),
                self.amount(amount)?,
            ),
            AssertCondition::TotalSupplyEquals { amount } => (
                "total supply".to_string(),
                self.ledger.total_supply(),
                self.amount(amount)?,
            ),
            AssertCondition::NativeBalanceEquals { account, amount } => (
                format!("native balance of {}", account),
                self.chain.native_balance(&self.resolve(account)?),
                self.amount(amount)?,
            ),
            AssertCondition::CustodianRecordEquals { account, amount } => (
                format!("custodian record of {}", account),
                self.custodian.record(&self.resolve(account)?),
                self.amount(amount)?,
            ),
            AssertCondition::LastEvent { name, amount } => {
                let last = self
                    .ledger
                    .events()
                    .last()
                    .ok_or_else(|| WttError::ScenarioFailed("no events recorded".to_string()))?;
                if last.event.name() != name.as_str() {
                    return Err(WttError::ScenarioFailed(format!(
                        "last event is {}, expected {}",
                        last.event.name(),
                        name
                    )));
                }
                (
                    format!("{} amount", name),
                    last.event.wad(),
                    self.amount(amount)?,
                )
            }
        };

        if actual != expected {
            let decimals = self.ledger.decimals();
            return Err(WttError::ScenarioFailed(format!(
                "{} is {}, expected {}",
                what,
                actual.to_decimal_string(decimals),
                expected.to_decimal_string(decimals)
            )));
        }

        Ok(())
    }

    fn check_integrity(&self) -> Result<()> {
        let custody = self.chain.custody();
        if !self.ledger.verify_integrity(custody) {
            return Err(WttError::ScenarioFailed(format!(
                "total supply {} does not match custody {}",
                self.ledger.total_supply(),
                custody
            )));
        }
        Ok(())
    }

    /// Random operation mix. Individual failures are expected and counted.
    fn run_random(&mut self, operations: usize) -> Result<()> {
        if self.actors.is_empty() {
            return Err(WttError::ScenarioFailed(
                "random run needs at least one actor".to_string(),
            ));
        }

        for _ in 0..operations {
            let step = self.random_step();
            let _ = self.apply(&step);
            self.check_integrity()?;
        }

        info!(
            operations,
            successful = self.metrics.successful_operations,
            failed = self.metrics.failed_operations,
            "Random run complete"
        );
        Ok(())
    }

    fn random_step(&mut self) -> ScenarioStep {
        let a = self.random_actor();
        let b = self.random_actor();
        let c = self.random_actor();
        let (a_name, a_address) = (a.0, a.1);

        match self.rng.gen_range(0..9) {
            0 => ScenarioStep::Deposit {
                amount: self.random_amount(self.chain.native_balance(&a_address)),
                account: a_name,
            },
            1 => ScenarioStep::Send {
                amount: self.random_amount(self.chain.native_balance(&a_address)),
                account: a_name,
            },
            2 => ScenarioStep::Withdraw {
                amount: self.random_amount(self.ledger.balance_of(&a_address)),
                account: a_name,
            },
            3 => ScenarioStep::Transfer {
                amount: self.random_amount(self.ledger.balance_of(&a_address)),
                from: a_name,
                to: b.0,
            },
            4 => ScenarioStep::Approve {
                amount: if self.rng.gen_bool(0.2) {
                    "unlimited".to_string()
                } else {
                    self.random_amount(self.ledger.balance_of(&a_address))
                },
                owner: a_name,
                spender: b.0,
            },
            5 | 6 => ScenarioStep::TransferFrom {
                amount: self.random_amount(self.ledger.allowance(&a_address, &b.1).min(
                    self.ledger.balance_of(&a_address),
                )),
                spender: b.0,
                owner: a_name,
                to: c.0,
            },
            7 => ScenarioStep::CustodianWrap {
                amount: self.random_amount(self.chain.native_balance(&a_address)),
                account: a_name,
            },
            _ => ScenarioStep::CustodianUnwrap {
                amount: self.random_amount(self.custodian.record(&a_address)),
                account: a_name,
            },
        }
    }

    fn random_actor(&mut self) -> (String, Address) {
        let index = self.rng.gen_range(0..self.actors.len());
        match self.actors.get(index) {
            Some(actor) => (actor.name.clone(), actor.address),
            None => ("custodian".to_string(), self.custodian.address()),
        }
    }

    /// Amount up to 120% of `reference`, so some attempts overdraw.
    fn random_amount(&mut self, reference: Wad) -> String {
        let bound = reference.units().saturating_mul(6) / 5;
        let units = self.rng.gen_range(0..=bound);
        Wad::new(units).to_decimal_string(self.ledger.decimals())
    }

    fn resolve(&self, name: &str) -> Result<Address> {
        match name {
            "custodian" => Ok(self.custodian.address()),
            "ledger" => Ok(self.chain.ledger_address()),
            other => self.actors.resolve(other),
        }
    }

    fn amount(&self, amount: &str) -> Result<Wad> {
        match amount {
            "unlimited" => Ok(Wad::UNLIMITED),
            other => Wad::parse_decimal(other, self.ledger.decimals()),
        }
    }
}

/// Metric label for an operation step.
fn operation_kind(step: &ScenarioStep) -> &'static str {
    match step {
        ScenarioStep::Fund { .. } => "fund",
        ScenarioStep::Deposit { .. } => "deposit",
        ScenarioStep::Send { .. } => "receive",
        ScenarioStep::Withdraw { .. } => "withdraw",
        ScenarioStep::Transfer { .. } => "transfer",
        ScenarioStep::TransferFrom { .. } => "transfer_from",
        ScenarioStep::Approve { .. } => "approve",
        ScenarioStep::CustodianWrap { .. } => "custodian_wrap",
        ScenarioStep::CustodianUnwrap { .. } => "custodian_unwrap",
        ScenarioStep::ExpectFailure { .. } => "expect_failure",
        ScenarioStep::Random { .. } => "random",
        ScenarioStep::Assert { .. } => "assert",
    }
}
