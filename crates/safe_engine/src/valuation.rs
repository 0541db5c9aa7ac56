//! Safe valuation - pure functions over one input snapshot

use crate::fixed::Amount;
use crate::state::{LiquidationData, OperationMode, PendingEdit, SafeState};
use std::fmt;

/// Collateralization ratio in percent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollateralRatio {
    Finite(Amount),
    /// No debt
    Infinite,
}

impl fmt::Display for CollateralRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollateralRatio::Finite(pct) => write!(f, "{}%", pct.truncate(2)),
            CollateralRatio::Infinite => f.write_str("∞%"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LiquidationPrice {
    /// No debt or no collateral
    None,
    Price(Amount),
    /// Above the current spot price: the position is already liquidatable
    Invalid(Amount),
}

impl fmt::Display for LiquidationPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiquidationPrice::None => f.write_str("$0"),
            LiquidationPrice::Price(p) => write!(f, "${}", p.truncate(2)),
            LiquidationPrice::Invalid(_) => f.write_str("Invalid"),
        }
    }
}

/// Projected position after a pending edit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Valuation {
    pub total_collateral: Amount,
    pub total_debt: Amount,
    pub collateral_ratio: CollateralRatio,
    pub liquidation_price: LiquidationPrice,
    pub is_safe: bool,
    /// Borrow headroom
    pub available_debt: Amount,
    /// Debt currently owed by the existing Safe
    pub owed_debt: Amount,
}

/// Value a Safe after applying `edit` in `mode`
///
/// `safe` is `None` when no Safe exists yet; create mode ignores it.
pub fn value_safe(
    safe: Option<&SafeState>,
    edit: &PendingEdit,
    mode: OperationMode,
    data: &LiquidationData,
) -> Valuation {
    let existing = match mode {
        OperationMode::Create => None,
        OperationMode::DepositBorrow | OperationMode::RepayWithdraw => safe,
    };

    let prior_collateral = existing.map(|s| s.collateral).unwrap_or(Amount::ZERO);
    let owed_debt = existing.map(SafeState::owed_debt).unwrap_or(Amount::ZERO);
    let normalized_debt = existing.map(|s| s.debt).unwrap_or(Amount::ZERO);

    let total_collateral = combine(prior_collateral, edit.left_input, mode);
    let total_debt = combine(owed_debt, edit.right_input, mode);

    let valuation = Valuation {
        total_collateral,
        total_debt,
        collateral_ratio: collateral_ratio(total_collateral, total_debt, data),
        liquidation_price: liquidation_price(total_collateral, total_debt, data),
        is_safe: is_safe(total_collateral, total_debt, data),
        available_debt: available_debt(total_collateral, normalized_debt, data),
        owed_debt,
    };

    log::trace!("valued {:?} edit {:?}: {:?}", mode, edit, valuation);
    valuation
}

/// Prior value plus or minus the delta; a reduction past zero floors at zero
/// and is left for validation to reject.
pub fn combine(prior: Amount, delta: Amount, mode: OperationMode) -> Amount {
    if mode.is_reducing() {
        prior.saturating_sub(delta)
    } else {
        prior.saturating_add(delta)
    }
}

/// `collateral * liquidationPrice * liquidationCRatio / debt * 100`
///
/// The feed's liquidation price already divides out the liquidation ratio,
/// so multiplying it back yields collateral value over debt value.
pub fn collateral_ratio(
    total_collateral: Amount,
    total_debt: Amount,
    data: &LiquidationData,
) -> CollateralRatio {
    let collateral_value = total_collateral
        .mul(data.current_price.liquidation_price)
        .mul(data.liquidation_c_ratio);

    match collateral_value.checked_div(total_debt) {
        Some(ratio) => CollateralRatio::Finite(ratio.mul_int(100)),
        None => CollateralRatio::Infinite,
    }
}

/// Price at which `collateral * price == debt * redemptionPrice * liquidationCRatio`
pub fn liquidation_price(
    total_collateral: Amount,
    total_debt: Amount,
    data: &LiquidationData,
) -> LiquidationPrice {
    if total_debt.is_zero() {
        return LiquidationPrice::None;
    }

    let required = total_debt
        .mul(data.current_redemption_price)
        .mul(data.liquidation_c_ratio);

    match required.checked_div(total_collateral) {
        None => LiquidationPrice::None,
        Some(price) if price > data.current_price.value => LiquidationPrice::Invalid(price),
        Some(price) => LiquidationPrice::Price(price),
    }
}

/// `debt <= collateral * safetyPrice`; true while no safety price is known
pub fn is_safe(total_collateral: Amount, total_debt: Amount, data: &LiquidationData) -> bool {
    match data.current_price.safety_price {
        Some(safety_price) => total_debt <= total_collateral.mul(safety_price),
        None => true,
    }
}

/// `collateral * safetyPrice / accumulatedRate - debt`, floored at zero
pub fn available_debt(
    total_collateral: Amount,
    normalized_debt: Amount,
    data: &LiquidationData,
) -> Amount {
    let Some(safety_price) = data.current_price.safety_price else {
        return Amount::ZERO;
    };

    match total_collateral
        .mul(safety_price)
        .checked_div(data.accumulated_rate)
    {
        Some(max_debt) => max_debt.saturating_sub(normalized_debt),
        None => Amount::ZERO,
    }
}
