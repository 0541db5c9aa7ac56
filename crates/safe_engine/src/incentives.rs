//! Liquidity-incentive form helpers and proxy action planning

use crate::actions::{wad, PlanError};
use crate::fixed::{Amount, U512};

/// Share of the quoted amounts accepted as a minimum: 10% slippage
const MIN_AMOUNT_NUMERATOR: u64 = 9;
const MIN_AMOUNT_DENOMINATOR: u64 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncentiveEdit {
    /// Provide ETH and coin to the pool and stake the LP tokens
    Deposit { eth: Amount, coin: Amount },
    /// Unstake and remove this many LP tokens
    Withdraw { lp: Amount },
}

/// Proxy call for an incentives operation. Amounts are WAD integers and
/// `min_amounts` is `[coin, eth]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IncentiveAction {
    ProvideLiquidityStake {
        eth: U512,
        coin: U512,
        min_amounts: [U512; 2],
    },
    GetRewards {
        campaign_id: String,
    },
    WithdrawHarvestRemoveLiquidity {
        lp: U512,
        campaign_id: String,
        min_amounts: [U512; 2],
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IncentiveBalances {
    pub eth: Amount,
    pub coin: Amount,
    pub staked: Amount,
}

/// First failing check for an incentives edit, or `None`
pub fn validate_incentive(edit: &IncentiveEdit, balances: &IncentiveBalances) -> Option<String> {
    match *edit {
        IncentiveEdit::Deposit { eth, coin } => {
            let checks: [(bool, &str); 3] = [
                (
                    eth.is_zero() || coin.is_zero(),
                    "Please enter the amount of ETH/RAI to be deposited",
                ),
                (eth > balances.eth, "Deposited ETH cannot exceed available amount."),
                (coin > balances.coin, "Deposited RAI cannot exceed available amount."),
            ];
            first_failure(&checks)
        }
        IncentiveEdit::Withdraw { lp } => {
            let checks: [(bool, &str); 2] = [
                (lp.is_zero(), "Please enter the amount of UniPool to withdraw"),
                (
                    lp > balances.staked,
                    "UniPool withdrawn amount cannot exceed available Staked Balance, \
                     Click on Max to get the available Staked Balance to be withdrawn",
                ),
            ];
            first_failure(&checks)
        }
    }
}

fn first_failure(checks: &[(bool, &str)]) -> Option<String> {
    checks
        .iter()
        .find(|(failed, _)| *failed)
        .map(|(_, message)| message.to_string())
}

/// Whether the proxy may already spend `coin` on the owner's behalf
pub fn has_coin_allowance(allowance: Option<Amount>, coin: Amount) -> bool {
    allowance.map(|a| a >= coin).unwrap_or(false)
}

/// Amount of the other pool token matching `amount` at `price`
pub fn paired_amount(amount: Amount, price: Amount) -> Amount {
    amount.mul(price)
}

fn with_slippage(amount: Amount) -> Amount {
    amount.mul_int(MIN_AMOUNT_NUMERATOR).div_int(MIN_AMOUNT_DENOMINATOR)
}

/// Minimum `(coin, eth)` the pool must take on deposit
pub fn deposit_min_amounts(eth: Amount, coin: Amount) -> (Amount, Amount) {
    (with_slippage(coin), with_slippage(eth))
}

/// Minimum `(coin, eth)` returned when removing `lp` tokens
pub fn withdraw_min_amounts(
    lp: Amount,
    coin_reserve: Amount,
    eth_reserve: Amount,
    lp_supply: Amount,
) -> (Amount, Amount) {
    let share = |reserve: Amount| {
        lp.mul(reserve)
            .checked_div(lp_supply)
            .map(with_slippage)
            .unwrap_or(Amount::ZERO)
    };
    (share(coin_reserve), share(eth_reserve))
}

fn campaign(campaign_id: Option<&str>) -> Result<String, PlanError> {
    match campaign_id.map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(PlanError::MissingCampaignId),
    }
}

/// Add liquidity and stake the LP tokens in the current campaign
pub fn plan_incentive_deposit(eth: Amount, coin: Amount) -> Result<IncentiveAction, PlanError> {
    if eth.is_zero() && coin.is_zero() {
        return Err(PlanError::EmptyEdit);
    }
    let (min_coin, min_eth) = deposit_min_amounts(eth, coin);
    Ok(IncentiveAction::ProvideLiquidityStake {
        eth: wad(eth),
        coin: wad(coin),
        min_amounts: [wad(min_coin), wad(min_eth)],
    })
}

pub fn plan_incentive_claim(campaign_id: Option<&str>) -> Result<IncentiveAction, PlanError> {
    Ok(IncentiveAction::GetRewards {
        campaign_id: campaign(campaign_id)?,
    })
}

/// Unstake `lp`, harvest rewards and remove the liquidity
pub fn plan_incentive_withdraw(
    lp: Amount,
    campaign_id: Option<&str>,
    coin_reserve: Amount,
    eth_reserve: Amount,
    lp_supply: Amount,
) -> Result<IncentiveAction, PlanError> {
    let campaign_id = campaign(campaign_id)?;
    if lp.is_zero() {
        return Err(PlanError::EmptyEdit);
    }
    let (min_coin, min_eth) = withdraw_min_amounts(lp, coin_reserve, eth_reserve, lp_supply);
    Ok(IncentiveAction::WithdrawHarvestRemoveLiquidity {
        lp: wad(lp),
        campaign_id,
        min_amounts: [wad(min_coin), wad(min_eth)],
    })
}
