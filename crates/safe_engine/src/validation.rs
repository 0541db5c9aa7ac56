//! Ordered business rules for a pending Safe edit
//!
//! Each mode has a fixed rule list. Rules run in order and the first failure
//! is the only one reported.

use crate::fixed::Amount;
use crate::math::percent_of;
use crate::state::{AccountStatus, Balances, LiquidationData, OperationMode, PendingEdit};
use crate::valuation::Valuation;

/// Repaying more than this share of the owed debt, without repaying all of
/// it, would leave dust behind.
pub const RESIDUAL_REPAY_PERCENT: u64 = 95;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rule {
    WalletConnected,
    ProxyDeployed,
    CollateralBalance,
    BorrowHeadroom,
    NonEmptyEdit,
    UnlockWithinCollateral,
    RepayWithinOwed,
    NoResidualDebt,
    RepayBalance,
    DebtFloor,
    SafetyRatio,
    GlobalDebtCeiling,
    CollateralDebtCeiling,
    CollateralEntered,
    PerSafeDebtCeiling,
}

const CREATE_RULES: &[Rule] = &[
    Rule::WalletConnected,
    Rule::ProxyDeployed,
    Rule::DebtFloor,
    Rule::SafetyRatio,
    Rule::GlobalDebtCeiling,
    Rule::CollateralDebtCeiling,
    Rule::CollateralEntered,
];

const DEPOSIT_BORROW_RULES: &[Rule] = &[
    Rule::WalletConnected,
    Rule::ProxyDeployed,
    Rule::CollateralBalance,
    Rule::BorrowHeadroom,
    Rule::NonEmptyEdit,
    Rule::DebtFloor,
    Rule::SafetyRatio,
    Rule::GlobalDebtCeiling,
    Rule::CollateralDebtCeiling,
    Rule::PerSafeDebtCeiling,
];

const REPAY_WITHDRAW_RULES: &[Rule] = &[
    Rule::WalletConnected,
    Rule::ProxyDeployed,
    Rule::NonEmptyEdit,
    Rule::UnlockWithinCollateral,
    Rule::RepayWithinOwed,
    Rule::NoResidualDebt,
    Rule::RepayBalance,
    Rule::DebtFloor,
    Rule::SafetyRatio,
    Rule::GlobalDebtCeiling,
    Rule::CollateralDebtCeiling,
    Rule::PerSafeDebtCeiling,
];

/// Rules checked for `mode`, highest priority first
pub fn rules_for(mode: OperationMode) -> &'static [Rule] {
    match mode {
        OperationMode::Create => CREATE_RULES,
        OperationMode::DepositBorrow => DEPOSIT_BORROW_RULES,
        OperationMode::RepayWithdraw => REPAY_WITHDRAW_RULES,
    }
}

/// Everything a rule may look at. Built from the same snapshot the
/// valuation was computed from.
#[derive(Clone, Copy, Debug)]
pub struct ValidationInput<'a> {
    pub mode: OperationMode,
    pub edit: &'a PendingEdit,
    pub valuation: &'a Valuation,
    /// Collateral locked in the existing Safe
    pub safe_collateral: Amount,
    pub balances: &'a Balances,
    pub data: &'a LiquidationData,
    pub account: AccountStatus,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub rule: Rule,
    pub message: String,
}

impl Rule {
    /// `Some(message)` when the rule fails
    pub fn check(self, input: &ValidationInput<'_>) -> Option<String> {
        let edit = input.edit;
        let v = input.valuation;
        let data = input.data;

        match self {
            Rule::WalletConnected => {
                (!input.account.wallet_connected).then(|| "Connect Wallet".to_string())
            }
            Rule::ProxyDeployed => (!input.account.proxy_deployed)
                .then(|| "Create an account to continue".to_string()),
            Rule::CollateralBalance => (edit.left_input > input.balances.eth)
                .then(|| "Insufficient balance".to_string()),
            Rule::BorrowHeadroom => (edit.right_input > v.available_debt)
                .then(|| "RAI borrowed cannot exceed available amount".to_string()),
            Rule::NonEmptyEdit => {
                let prompt = match input.mode {
                    OperationMode::RepayWithdraw => {
                        "Please enter the amount of ETH to free or the amount of RAI to repay"
                    }
                    OperationMode::Create | OperationMode::DepositBorrow => {
                        "Please enter the amount of ETH to be deposited or amount of RAI to be borrowed"
                    }
                };
                edit.is_empty().then(|| prompt.to_string())
            }
            Rule::UnlockWithinCollateral => (edit.left_input > input.safe_collateral)
                .then(|| "ETH to unlock cannot exceed available amount".to_string()),
            Rule::RepayWithinOwed => (edit.right_input > v.owed_debt)
                .then(|| "RAI to repay cannot exceed owed amount".to_string()),
            Rule::NoResidualDebt => {
                let repay = edit.right_input;
                let near_full = percent_of(repay, v.owed_debt)
                    .map(|pct| pct > Amount::from_int(RESIDUAL_REPAY_PERCENT))
                    .unwrap_or(false);
                (!repay.is_zero() && repay < v.owed_debt && near_full).then(|| {
                    format!(
                        "You can only repay a minimum of {} RAI to avoid leaving residual values",
                        v.owed_debt.truncate(4)
                    )
                })
            }
            Rule::RepayBalance => {
                let repay = edit.right_input;
                (!repay.is_zero() && repay > input.balances.coin)
                    .then(|| "Insufficient RAI balance to repay".to_string())
            }
            Rule::DebtFloor => {
                (!v.total_debt.is_zero() && v.total_debt < data.debt_floor).then(|| {
                    format!(
                        "The resulting debt should be at least {} RAI or zero",
                        data.debt_floor.ceil()
                    )
                })
            }
            Rule::SafetyRatio => (!v.is_safe).then(|| {
                format!(
                    "Too much debt, below {}% collateralization ratio",
                    data.safety_c_ratio.mul_int(100)
                )
            }),
            Rule::GlobalDebtCeiling => (v.total_debt > data.global_debt_ceiling)
                .then(|| "Cannot exceed global debt ceiling".to_string()),
            Rule::CollateralDebtCeiling => (v.total_debt > data.debt_ceiling)
                .then(|| "Cannot exceed RAI debt ceiling".to_string()),
            Rule::CollateralEntered => {
                edit.left_input.is_zero().then(|| "Enter ETH Amount".to_string())
            }
            Rule::PerSafeDebtCeiling => (v.total_debt >= data.per_safe_debt_ceiling).then(|| {
                format!(
                    "Individual safe can't have more than {} RAI of debt",
                    data.per_safe_debt_ceiling
                )
            }),
        }
    }
}

/// Run the rules for the input's mode, stopping at the first failure
pub fn validate(input: &ValidationInput<'_>) -> Option<Violation> {
    rules_for(input.mode).iter().find_map(|&rule| {
        rule.check(input).map(|message| {
            log::debug!("rule {:?} failed: {}", rule, message);
            Violation { rule, message }
        })
    })
}

/// Like `validate`, keeping only the message
pub fn first_error(input: &ValidationInput<'_>) -> Option<String> {
    validate(input).map(|v| v.message)
}
