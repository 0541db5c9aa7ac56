//! The two read paths being reconciled

use anyhow::Result;
use async_trait::async_trait;
use safe_engine::{Amount, LiquidationData};

/// One Safe as both paths can report it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeRecord {
    pub safe_id: String,
    pub safe_handler: String,
    pub collateral: Amount,
    /// Normalized debt
    pub debt: Amount,
    /// Collateral held by the handler in the engine but not locked
    pub internal_collateral_balance: Amount,
}

/// Account-level state for one owner
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserState {
    pub safes: Vec<SafeRecord>,
    pub coin_balance: Amount,
    pub proxy: Option<String>,
    /// Coin the proxy may spend; `None` when never approved
    pub coin_allowance: Option<Amount>,
}

/// Coin/WETH Uniswap pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniswapPair {
    pub reserve0: Amount,
    pub reserve1: Amount,
    /// `reserve0 / reserve1`
    pub token0_price: Amount,
    /// `reserve1 / reserve0`
    pub token1_price: Amount,
    pub total_supply: Amount,
}

/// One staking campaign
///
/// Timestamps and durations are integer seconds kept as decimal strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Campaign {
    pub campaign_number: String,
    pub campaign_address: String,
    pub reward_token: String,
    pub reward_rate: Amount,
    pub reward_per_token_stored: Amount,
    pub total_supply: Amount,
    pub period_finish: String,
    pub last_updated_time: String,
    pub rewards_duration: String,
}

/// Owner's position in one campaign
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncentiveBalance {
    /// Campaign contract
    pub address: String,
    pub owner: String,
    pub stake_balance: Amount,
    pub reward: Amount,
    pub user_reward_per_token_paid: Amount,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncentivesState {
    pub pair: UniswapPair,
    pub campaigns: Vec<Campaign>,
    pub balances: Vec<IncentiveBalance>,
}

#[async_trait]
pub trait StateSource: Send + Sync {
    /// Label used in logs
    fn name(&self) -> &'static str;

    async fn liquidation_data(&self) -> Result<LiquidationData>;

    async fn user_state(&self, owner: &str) -> Result<UserState>;

    async fn incentives(&self, owner: &str) -> Result<IncentivesState>;
}
