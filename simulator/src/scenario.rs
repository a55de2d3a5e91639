//! Simulation scenarios.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// A simulation scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Steps in the scenario.
    pub steps: Vec<ScenarioStep>,
}

/// A step in a scenario.
///
/// Accounts are actor names (`dora`), `custodian`, `ledger`, or hex
/// addresses. Amounts are human decimal strings at the token's precision;
/// `unlimited` stands for the unlimited-allowance sentinel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScenarioStep {
    /// Mint native value to an account.
    Fund { account: String, amount: String },
    /// Call deposit with attached value.
    Deposit { account: String, amount: String },
    /// Send plain value to the ledger.
    Send { account: String, amount: String },
    /// Withdraw wrapped balance back to native value.
    Withdraw { account: String, amount: String },
    /// Direct transfer.
    Transfer {
        from: String,
        to: String,
        amount: String,
    },
    /// Delegated transfer.
    TransferFrom {
        spender: String,
        owner: String,
        to: String,
        amount: String,
    },
    /// Set an allowance.
    Approve {
        owner: String,
        spender: String,
        amount: String,
    },
    /// Wrap through the third-party custodian.
    CustodianWrap { account: String, amount: String },
    /// Unwrap through the third-party custodian.
    CustodianUnwrap { account: String, amount: String },
    /// Run a step that must fail with the given error code.
    ExpectFailure {
        step: Box<ScenarioStep>,
        code: String,
    },
    /// Run a seeded random mix of operations.
    Random { operations: usize },
    /// Assert a condition.
    Assert { condition: AssertCondition },
}

/// Conditions that can be asserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AssertCondition {
    /// Wrapped balance equals.
    BalanceEquals { account: String, amount: String },
    /// Allowance equals.
    AllowanceEquals {
        owner: String,
        spender: String,
        amount: String,
    },
    /// Total supply equals.
    TotalSupplyEquals { amount: String },
    /// Native balance equals.
    NativeBalanceEquals { account: String, amount: String },
    /// Custodian record for an account equals.
    CustodianRecordEquals { account: String, amount: String },
    /// Most recent ledger event has this name and amount.
    LastEvent { name: String, amount: String },
}

fn s(value: &str) -> String {
    value.to_string()
}

impl Scenario {
    /// Names of the built-in scenarios.
    pub const BUILT_IN: [&'static str; 5] = [
        "deposit-withdraw",
        "approve-transfer",
        "receive-fallback",
        "wrap-unwrap",
        "random",
    ];

    /// Load a built-in scenario by name, or a JSON scenario file by path.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        match name {
            "deposit-withdraw" => Ok(Self::deposit_withdraw()),
            "approve-transfer" => Ok(Self::approve_transfer()),
            "receive-fallback" => Ok(Self::receive_fallback()),
            "wrap-unwrap" => Ok(Self::wrap_unwrap()),
            "random" => Ok(Self::random(500)),
            path if Path::new(path).is_file() => Self::from_file(path),
            _ => Err(anyhow::anyhow!("Unknown scenario: {}", name)),
        }
    }

    /// Read a scenario from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Wrap then partially unwrap.
    fn deposit_withdraw() -> Self {
        Self {
            name: s("deposit-withdraw"),
            description: s("Deposit 3.14 then withdraw 1.618"),
            steps: vec![
                ScenarioStep::Deposit { account: s("dora"), amount: s("3.14") },
                ScenarioStep::Assert {
                    condition: AssertCondition::BalanceEquals { account: s("dora"), amount: s("3.14") },
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::LastEvent { name: s("Deposit"), amount: s("3.14") },
                },
                ScenarioStep::Withdraw { account: s("dora"), amount: s("1.618") },
                ScenarioStep::Assert {
                    condition: AssertCondition::LastEvent { name: s("Withdrawal"), amount: s("1.618") },
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::BalanceEquals { account: s("dora"), amount: s("1.522") },
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::TotalSupplyEquals { amount: s("1.522") },
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::NativeBalanceEquals { account: s("dora"), amount: s("998.478") },
                },
                ScenarioStep::ExpectFailure {
                    step: Box::new(ScenarioStep::Withdraw {
                        account: s("dora"),
                        amount: s("1.522000000000000001"),
                    }),
                    code: s("INSUFFICIENT_BALANCE"),
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::BalanceEquals { account: s("dora"), amount: s("1.522") },
                },
            ],
        }
    }

    /// Limited and unlimited allowances spent side by side.
    fn approve_transfer() -> Self {
        Self {
            name: s("approve-transfer"),
            description: s("Direct transfer plus limited and unlimited delegated transfers"),
            steps: vec![
                ScenarioStep::Deposit { account: s("chris"), amount: s("999.9") },
                ScenarioStep::Approve { owner: s("chris"), spender: s("evie"), amount: s("unlimited") },
                ScenarioStep::Approve { owner: s("chris"), spender: s("bena"), amount: s("0.330366") },
                ScenarioStep::Transfer { from: s("chris"), to: s("dora"), amount: s("0.110001") },
                ScenarioStep::TransferFrom {
                    spender: s("bena"),
                    owner: s("chris"),
                    to: s("dora"),
                    amount: s("0.110001"),
                },
                ScenarioStep::TransferFrom {
                    spender: s("evie"),
                    owner: s("chris"),
                    to: s("dora"),
                    amount: s("0.110001"),
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::BalanceEquals { account: s("dora"), amount: s("0.330003") },
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::BalanceEquals { account: s("chris"), amount: s("999.569997") },
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::AllowanceEquals {
                        owner: s("chris"),
                        spender: s("bena"),
                        amount: s("0.220365"),
                    },
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::AllowanceEquals {
                        owner: s("chris"),
                        spender: s("evie"),
                        amount: s("unlimited"),
                    },
                },
                ScenarioStep::ExpectFailure {
                    step: Box::new(ScenarioStep::TransferFrom {
                        spender: s("bena"),
                        owner: s("chris"),
                        to: s("dora"),
                        amount: s("0.330366"),
                    }),
                    code: s("INSUFFICIENT_ALLOWANCE"),
                },
            ],
        }
    }

    /// Plain value sent to the ledger is wrapped.
    fn receive_fallback() -> Self {
        Self {
            name: s("receive-fallback"),
            description: s("Sending native value to the ledger acts as deposit"),
            steps: vec![
                ScenarioStep::Send { account: s("abby"), amount: s("2.718") },
                ScenarioStep::Assert {
                    condition: AssertCondition::BalanceEquals { account: s("abby"), amount: s("2.718") },
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::LastEvent { name: s("Deposit"), amount: s("2.718") },
                },
            ],
        }
    }

    /// A contract wraps for its caller, then unwraps part of it.
    fn wrap_unwrap() -> Self {
        Self {
            name: s("wrap-unwrap"),
            description: s("Third-party custodian wraps 17 and unwraps 6"),
            steps: vec![
                ScenarioStep::CustodianWrap { account: s("deployer"), amount: s("17") },
                ScenarioStep::Assert {
                    condition: AssertCondition::CustodianRecordEquals { account: s("deployer"), amount: s("17") },
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::BalanceEquals { account: s("custodian"), amount: s("17") },
                },
                ScenarioStep::CustodianUnwrap { account: s("deployer"), amount: s("6") },
                ScenarioStep::Assert {
                    condition: AssertCondition::CustodianRecordEquals { account: s("deployer"), amount: s("11") },
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::BalanceEquals { account: s("custodian"), amount: s("11") },
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::NativeBalanceEquals { account: s("deployer"), amount: s("989") },
                },
                ScenarioStep::ExpectFailure {
                    step: Box::new(ScenarioStep::CustodianUnwrap { account: s("deployer"), amount: s("12") }),
                    code: s("INSUFFICIENT_BALANCE"),
                },
            ],
        }
    }

    /// Random operation mix with integrity checked after every step.
    pub fn random(operations: usize) -> Self {
        Self {
            name: s("random"),
            description: format!("{} random ledger operations", operations),
            steps: vec![ScenarioStep::Random { operations }],
        }
    }
}
