//! Snapshot types read by the valuation engine

use crate::fixed::{Amount, FixedPointError};
use serde::{Deserialize, Deserializer, Serialize};

/// One on-chain Safe
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeState {
    pub collateral: Amount,
    /// Normalized debt, before the accumulated rate is applied
    pub debt: Amount,
    /// Rate the snapshot was read at
    pub accumulated_rate: Amount,
}

impl SafeState {
    /// Debt currently owed: `debt * accumulated_rate`
    pub fn owed_debt(&self) -> Amount {
        self.debt.mul(self.accumulated_rate)
    }
}

/// User-entered deltas
///
/// `left_input` is ETH to deposit or withdraw, `right_input` the coin to
/// borrow or repay, depending on the mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PendingEdit {
    pub left_input: Amount,
    pub right_input: Amount,
}

impl PendingEdit {
    pub fn new(left_input: Amount, right_input: Amount) -> Self {
        Self {
            left_input,
            right_input,
        }
    }

    /// Parse both fields; a blank field counts as zero
    pub fn parse(left: &str, right: &str) -> Result<Self, FixedPointError> {
        Ok(Self {
            left_input: Amount::parse_input(left)?,
            right_input: Amount::parse_input(right)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.left_input.is_zero() && self.right_input.is_zero()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    /// Open a new Safe
    Create,
    DepositBorrow,
    RepayWithdraw,
}

impl OperationMode {
    /// Whether the edit moves collateral and debt downwards
    pub fn is_reducing(self) -> bool {
        match self {
            OperationMode::Create | OperationMode::DepositBorrow => false,
            OperationMode::RepayWithdraw => true,
        }
    }
}

/// Collateral price feed values
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentPrice {
    /// Oracle (OSM) spot price
    pub value: Amount,
    /// Absent until the first price update
    #[serde(default, deserialize_with = "blank_as_none")]
    pub safety_price: Option<Amount>,
    pub liquidation_price: Amount,
}

/// System-level parameters for one collateral type
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidationData {
    pub accumulated_rate: Amount,
    pub current_price: CurrentPrice,
    pub current_redemption_price: Amount,
    /// Eight-hourly redemption rate
    pub current_redemption_rate: Amount,
    pub debt_floor: Amount,
    /// Collateral type debt ceiling
    pub debt_ceiling: Amount,
    pub global_debt: Amount,
    pub global_debt_ceiling: Amount,
    pub per_safe_debt_ceiling: Amount,
    pub liquidation_c_ratio: Amount,
    pub safety_c_ratio: Amount,
    pub liquidation_penalty: Amount,
    pub total_annualized_stability_fee: Amount,
}

/// Wallet balances of the connected account
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Balances {
    pub eth: Amount,
    pub coin: Amount,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccountStatus {
    pub wallet_connected: bool,
    pub proxy_deployed: bool,
}

impl AccountStatus {
    pub fn ready() -> Self {
        Self {
            wallet_connected: true,
            proxy_deployed: true,
        }
    }
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<Amount>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        Some(s) if !s.trim().is_empty() => s.parse().map(Some).map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}
