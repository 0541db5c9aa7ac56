//! Valuation and validation over a single snapshot

use crate::fixed::Amount;
use crate::state::{AccountStatus, Balances, LiquidationData, OperationMode, PendingEdit, SafeState};
use crate::validation::{validate, ValidationInput, Violation};
use crate::valuation::{value_safe, Valuation};

/// Fetched on-chain state. `data` stays `None` until the first fetch lands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub safe: Option<SafeState>,
    pub data: Option<LiquidationData>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assessment {
    pub valuation: Valuation,
    pub error: Option<Violation>,
}

/// Value the edit and run the mode's rules against the same snapshot
///
/// Returns `None` while liquidation data has not been fetched.
pub fn assess(
    snapshot: &Snapshot,
    edit: &PendingEdit,
    mode: OperationMode,
    balances: &Balances,
    account: AccountStatus,
) -> Option<Assessment> {
    let data = snapshot.data.as_ref()?;
    let valuation = value_safe(snapshot.safe.as_ref(), edit, mode, data);

    let error = validate(&ValidationInput {
        mode,
        edit,
        valuation: &valuation,
        safe_collateral: snapshot.safe.map(|s| s.collateral).unwrap_or(Amount::ZERO),
        balances,
        data,
        account,
    });

    Some(Assessment { valuation, error })
}
