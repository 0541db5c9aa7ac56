//! Proxy action selection for a validated edit
//!
//! Picks which proxy call the submission layer builds. Amounts are WAD
//! integers, as the proxy contracts expect.

use crate::fixed::{Amount, Precision, U512};
use crate::state::{OperationMode, PendingEdit};
use crate::valuation::Valuation;
use thiserror::Error;

pub const ETH_A: &str = "ETH-A";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SafeAction {
    OpenLockEthAndGenerateDebt {
        collateral: U512,
        collateral_type: String,
        debt: U512,
    },
    GenerateDebt {
        safe_id: String,
        debt: U512,
    },
    LockEth {
        safe_id: String,
        collateral: U512,
    },
    LockEthAndGenerateDebt {
        safe_id: String,
        collateral: U512,
        debt: U512,
    },
    RepayAllDebtAndFreeEth {
        safe_id: String,
        collateral: U512,
    },
    RepayAllDebt {
        safe_id: String,
    },
    RepayDebt {
        safe_id: String,
        debt: U512,
    },
    FreeEth {
        safe_id: String,
        collateral: U512,
    },
    RepayDebtAndFreeEth {
        safe_id: String,
        collateral: U512,
        debt: U512,
    },
    /// Withdraw collateral left in the engine after a liquidation
    ExitEth {
        safe_id: String,
        amount: U512,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("no safe id")]
    MissingSafeId,
    #[error("internal collateral balance is zero")]
    NothingToCollect,
    #[error("edit moves neither collateral nor debt")]
    EmptyEdit,
    #[error("no incentive campaign id")]
    MissingCampaignId,
}

pub(crate) fn wad(amount: Amount) -> U512 {
    amount.to_fixed(Precision::Wad)
}

/// Select the proxy action for `edit`
///
/// A `safe_id` of `None` in deposit/borrow mode opens a new Safe, like create.
pub fn plan_action(
    mode: OperationMode,
    safe_id: Option<&str>,
    edit: &PendingEdit,
    valuation: &Valuation,
) -> Result<SafeAction, PlanError> {
    let collateral = wad(edit.left_input);
    let debt = wad(edit.right_input);

    match (mode, safe_id) {
        (OperationMode::Create, _) | (OperationMode::DepositBorrow, None) => {
            Ok(SafeAction::OpenLockEthAndGenerateDebt {
                collateral,
                collateral_type: ETH_A.to_string(),
                debt,
            })
        }
        (OperationMode::DepositBorrow, Some(id)) => {
            let safe_id = id.to_string();
            match (collateral.is_zero(), debt.is_zero()) {
                (true, true) => Err(PlanError::EmptyEdit),
                (true, false) => Ok(SafeAction::GenerateDebt { safe_id, debt }),
                (false, true) => Ok(SafeAction::LockEth {
                    safe_id,
                    collateral,
                }),
                (false, false) => Ok(SafeAction::LockEthAndGenerateDebt {
                    safe_id,
                    collateral,
                    debt,
                }),
            }
        }
        (OperationMode::RepayWithdraw, None) => Err(PlanError::MissingSafeId),
        (OperationMode::RepayWithdraw, Some(id)) => {
            let safe_id = id.to_string();
            let closes_debt = valuation.total_debt.is_zero();
            let empties_safe = closes_debt && valuation.total_collateral.is_zero();

            match (collateral.is_zero(), debt.is_zero()) {
                (true, true) => Err(PlanError::EmptyEdit),
                (false, false) if empties_safe => Ok(SafeAction::RepayAllDebtAndFreeEth {
                    safe_id,
                    collateral,
                }),
                (true, false) if closes_debt => Ok(SafeAction::RepayAllDebt { safe_id }),
                (true, false) => Ok(SafeAction::RepayDebt { safe_id, debt }),
                (false, true) => Ok(SafeAction::FreeEth {
                    safe_id,
                    collateral,
                }),
                (false, false) => Ok(SafeAction::RepayDebtAndFreeEth {
                    safe_id,
                    collateral,
                    debt,
                }),
            }
        }
    }
}

/// Exit the collateral a Safe holds in the engine but not as locked collateral
pub fn plan_collect(
    safe_id: Option<&str>,
    internal_collateral_balance: Amount,
) -> Result<SafeAction, PlanError> {
    let safe_id = safe_id.ok_or(PlanError::MissingSafeId)?;
    let amount = wad(internal_collateral_balance);
    if amount.is_zero() {
        return Err(PlanError::NothingToCollect);
    }
    Ok(SafeAction::ExitEth {
        safe_id: safe_id.to_string(),
        amount,
    })
}
