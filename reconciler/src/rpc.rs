//! Contract read path over JSON-RPC

use crate::config::{Config, Contracts};
use crate::source::{
    Campaign, IncentiveBalance, IncentivesState, SafeRecord, StateSource, UniswapPair, UserState,
};
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::sol;
use anyhow::{Context, Result};
use async_trait::async_trait;
use safe_engine::{Amount, CurrentPrice, LiquidationData, Precision};
use std::fmt;

/// Seconds in a 365-day year
pub const SECONDS_PER_YEAR: u64 = 31_536_000;
/// Seconds in eight hours
pub const EIGHT_HOURS: u64 = 28_800;

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract ISafeEngine {
        function collateralTypes(bytes32 collateralType) external view returns (
            uint256 debtAmount,
            uint256 accumulatedRate,
            uint256 safetyPrice,
            uint256 debtCeiling,
            uint256 debtFloor,
            uint256 liquidationPrice
        );
        function safes(bytes32 collateralType, address safe) external view returns (
            uint256 lockedCollateral,
            uint256 generatedDebt
        );
        function tokenCollateral(bytes32 collateralType, address account) external view returns (uint256);
        function globalDebt() external view returns (uint256);
        function globalDebtCeiling() external view returns (uint256);
        function safeDebtCeiling() external view returns (uint256);
    }
}

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract IOracleRelayer {
        function redemptionPrice() external returns (uint256);
        function redemptionRate() external view returns (uint256);
        function collateralTypes(bytes32 collateralType) external view returns (
            address orcl,
            uint256 safetyCRatio,
            uint256 liquidationCRatio
        );
    }
}

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract ITaxCollector {
        function globalStabilityFee() external view returns (uint256);
        function collateralTypes(bytes32 collateralType) external view returns (
            uint256 stabilityFee,
            uint256 updateTime
        );
    }
}

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract ILiquidationEngine {
        function collateralTypes(bytes32 collateralType) external view returns (
            address collateralAuctionHouse,
            uint256 liquidationPenalty,
            uint256 liquidationQuantity
        );
    }
}

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract IProxyRegistry {
        function proxies(address owner) external view returns (address);
    }
}

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract IGetSafes {
        function getSafesAsc(address manager, address guy) external view returns (
            uint256[] ids,
            address[] safes,
            bytes32[] collateralTypes
        );
    }
}

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract IErc20 {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
    }
}

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract IUniswapV2Pair {
        function getReserves() external view returns (
            uint112 reserve0,
            uint112 reserve1,
            uint32 blockTimestampLast
        );
        function totalSupply() external view returns (uint256);
    }
}

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract IStakingRewardsFactory {
        function totalCampaignCount() external view returns (uint256);
        function stakingRewardsInfo(uint256 campaign) external view returns (
            address stakingRewards,
            uint256 rewardAmount
        );
    }
}

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract IStakingRewards {
        function rewardsToken() external view returns (address);
        function rewardRate() external view returns (uint256);
        function rewardPerTokenStored() external view returns (uint256);
        function totalSupply() external view returns (uint256);
        function periodFinish() external view returns (uint256);
        function lastUpdateTime() external view returns (uint256);
        function rewardsDuration() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function rewards(address account) external view returns (uint256);
        function userRewardPerTokenPaid(address account) external view returns (uint256);
    }
}

struct Addresses {
    safe_engine: Address,
    oracle_relayer: Address,
    tax_collector: Address,
    liquidation_engine: Address,
    safe_manager: Address,
    get_safes: Address,
    proxy_registry: Address,
    coin: Address,
    incentives: Option<IncentiveAddresses>,
}

struct IncentiveAddresses {
    coin_uniswap_pair: Address,
    staking_rewards_factory: Address,
}

impl Addresses {
    fn parse(c: &Contracts) -> Result<Self> {
        let addr = |name: &str, s: &str| -> Result<Address> {
            s.parse().context(format!("Invalid {} address: {}", name, s))
        };
        Ok(Self {
            safe_engine: addr("safe_engine", &c.safe_engine)?,
            oracle_relayer: addr("oracle_relayer", &c.oracle_relayer)?,
            tax_collector: addr("tax_collector", &c.tax_collector)?,
            liquidation_engine: addr("liquidation_engine", &c.liquidation_engine)?,
            safe_manager: addr("safe_manager", &c.safe_manager)?,
            get_safes: addr("get_safes", &c.get_safes)?,
            proxy_registry: addr("proxy_registry", &c.proxy_registry)?,
            coin: addr("coin", &c.coin)?,
            incentives: match &c.incentives {
                Some(i) => Some(IncentiveAddresses {
                    coin_uniswap_pair: addr("coin_uniswap_pair", &i.coin_uniswap_pair)?,
                    staking_rewards_factory: addr(
                        "staking_rewards_factory",
                        &i.staking_rewards_factory,
                    )?,
                }),
                None => None,
            },
        })
    }
}

pub struct RpcSource {
    provider: DynProvider,
    addresses: Addresses,
    collateral_type: B256,
}

/// Encode a collateral label like `ETH-A` as a right-padded bytes32
pub fn collateral_type_id(label: &str) -> B256 {
    B256::right_padding_from(label.as_bytes())
}

fn fixed<T: fmt::Display>(raw: T, precision: Precision) -> Result<Amount> {
    Amount::from_fixed_str(&raw.to_string(), precision)
        .context(format!("Value {} out of range", raw))
}

/// Spot price of the collateral in USD
pub fn spot_price(liquidation_price: Amount, liquidation_c_ratio: Amount, redemption_price: Amount) -> Amount {
    liquidation_price.mul(liquidation_c_ratio).mul(redemption_price)
}

/// `(reserve0 / reserve1, reserve1 / reserve0)`, zero for an empty side
pub fn pair_prices(reserve0: Amount, reserve1: Amount) -> (Amount, Amount) {
    (
        reserve0.checked_div(reserve1).unwrap_or(Amount::ZERO),
        reserve1.checked_div(reserve0).unwrap_or(Amount::ZERO),
    )
}

/// Per-second fee compounded over a year
pub fn annualized_fee(global_fee: Amount, collateral_fee: Amount) -> Amount {
    global_fee.saturating_add(collateral_fee).pow(SECONDS_PER_YEAR)
}

/// Per-second redemption rate compounded over eight hours
pub fn eight_hourly_rate(per_second: Amount) -> Amount {
    per_second.pow(EIGHT_HOURS)
}

impl RpcSource {
    pub fn new(config: &Config) -> Result<Self> {
        let url = config
            .rpc_url
            .parse()
            .context(format!("Invalid RPC URL: {}", config.rpc_url))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();

        Ok(Self {
            provider,
            addresses: Addresses::parse(&config.contracts)?,
            collateral_type: collateral_type_id(&config.collateral_type),
        })
    }
}

#[async_trait]
impl StateSource for RpcSource {
    fn name(&self) -> &'static str {
        "rpc"
    }

    async fn liquidation_data(&self) -> Result<LiquidationData> {
        let a = &self.addresses;
        let ct = self.collateral_type;
        let engine = ISafeEngine::new(a.safe_engine, self.provider.clone());
        let relayer = IOracleRelayer::new(a.oracle_relayer, self.provider.clone());
        let tax = ITaxCollector::new(a.tax_collector, self.provider.clone());
        let liquidation = ILiquidationEngine::new(a.liquidation_engine, self.provider.clone());

        let collateral = engine
            .collateralTypes(ct)
            .call()
            .await
            .context("safeEngine.collateralTypes() call failed")?;
        let global_debt = engine
            .globalDebt()
            .call()
            .await
            .context("safeEngine.globalDebt() call failed")?;
        let global_debt_ceiling = engine
            .globalDebtCeiling()
            .call()
            .await
            .context("safeEngine.globalDebtCeiling() call failed")?;
        let safe_debt_ceiling = engine
            .safeDebtCeiling()
            .call()
            .await
            .context("safeEngine.safeDebtCeiling() call failed")?;
        let redemption_price = relayer
            .redemptionPrice()
            .call()
            .await
            .context("oracleRelayer.redemptionPrice() call failed")?;
        let redemption_rate = relayer
            .redemptionRate()
            .call()
            .await
            .context("oracleRelayer.redemptionRate() call failed")?;
        let ratios = relayer
            .collateralTypes(ct)
            .call()
            .await
            .context("oracleRelayer.collateralTypes() call failed")?;
        let global_fee = tax
            .globalStabilityFee()
            .call()
            .await
            .context("taxCollector.globalStabilityFee() call failed")?;
        let fee = tax
            .collateralTypes(ct)
            .call()
            .await
            .context("taxCollector.collateralTypes() call failed")?;
        let penalty = liquidation
            .collateralTypes(ct)
            .call()
            .await
            .context("liquidationEngine.collateralTypes() call failed")?;

        let liquidation_price = fixed(collateral.liquidationPrice, Precision::Ray)?;
        let safety_price = fixed(collateral.safetyPrice, Precision::Ray)?;
        let liquidation_c_ratio = fixed(ratios.liquidationCRatio, Precision::Ray)?;
        let current_redemption_price = fixed(redemption_price, Precision::Ray)?;

        let data = LiquidationData {
            accumulated_rate: fixed(collateral.accumulatedRate, Precision::Ray)?,
            current_price: CurrentPrice {
                value: spot_price(liquidation_price, liquidation_c_ratio, current_redemption_price),
                safety_price: (!safety_price.is_zero()).then_some(safety_price),
                liquidation_price,
            },
            current_redemption_price,
            current_redemption_rate: eight_hourly_rate(fixed(redemption_rate, Precision::Ray)?),
            debt_floor: fixed(collateral.debtFloor, Precision::Rad)?,
            debt_ceiling: fixed(collateral.debtCeiling, Precision::Rad)?,
            global_debt: fixed(global_debt, Precision::Rad)?,
            global_debt_ceiling: fixed(global_debt_ceiling, Precision::Rad)?,
            per_safe_debt_ceiling: fixed(safe_debt_ceiling, Precision::Wad)?,
            liquidation_c_ratio,
            safety_c_ratio: fixed(ratios.safetyCRatio, Precision::Ray)?,
            liquidation_penalty: fixed(penalty.liquidationPenalty, Precision::Wad)?,
            total_annualized_stability_fee: annualized_fee(
                fixed(global_fee, Precision::Ray)?,
                fixed(fee.stabilityFee, Precision::Ray)?,
            ),
        };

        log::debug!("rpc liquidation data: {:?}", data);
        Ok(data)
    }

    async fn user_state(&self, owner: &str) -> Result<UserState> {
        let a = &self.addresses;
        let owner: Address = owner
            .parse()
            .context(format!("Invalid owner address: {}", owner))?;

        let registry = IProxyRegistry::new(a.proxy_registry, self.provider.clone());
        let coin = IErc20::new(a.coin, self.provider.clone());

        let proxy = registry
            .proxies(owner)
            .call()
            .await
            .context("proxyRegistry.proxies() call failed")?;
        let balance = coin
            .balanceOf(owner)
            .call()
            .await
            .context("coin.balanceOf() call failed")?;

        let mut state = UserState {
            safes: Vec::new(),
            coin_balance: fixed(balance, Precision::Wad)?,
            proxy: None,
            coin_allowance: None,
        };

        // Safes are owned by the proxy, not the account
        if proxy == Address::ZERO {
            return Ok(state);
        }
        state.proxy = Some(proxy.to_string());

        let allowance = coin
            .allowance(owner, proxy)
            .call()
            .await
            .context("coin.allowance() call failed")?;
        let allowance = fixed(allowance, Precision::Wad)?;
        state.coin_allowance = (!allowance.is_zero()).then_some(allowance);

        let get_safes = IGetSafes::new(a.get_safes, self.provider.clone());
        let engine = ISafeEngine::new(a.safe_engine, self.provider.clone());

        let listed = get_safes
            .getSafesAsc(a.safe_manager, proxy)
            .call()
            .await
            .context("getSafes.getSafesAsc() call failed")?;

        for ((id, handler), ct) in listed
            .ids
            .iter()
            .zip(listed.safes.iter())
            .zip(listed.collateralTypes.iter())
        {
            if *ct != self.collateral_type {
                continue;
            }
            let safe = engine
                .safes(*ct, *handler)
                .call()
                .await
                .context(format!("safeEngine.safes() call failed for safe {}", id))?;
            let internal = engine
                .tokenCollateral(*ct, *handler)
                .call()
                .await
                .context(format!("safeEngine.tokenCollateral() call failed for safe {}", id))?;

            state.safes.push(SafeRecord {
                safe_id: id.to_string(),
                safe_handler: handler.to_string(),
                collateral: fixed(safe.lockedCollateral, Precision::Wad)?,
                debt: fixed(safe.generatedDebt, Precision::Wad)?,
                internal_collateral_balance: fixed(internal, Precision::Wad)?,
            });
        }

        log::debug!("rpc found {} safes for {}", state.safes.len(), owner);
        Ok(state)
    }

    async fn incentives(&self, owner: &str) -> Result<IncentivesState> {
        let contracts = self
            .addresses
            .incentives
            .as_ref()
            .context("No incentive contracts configured")?;
        let owner: Address = owner
            .parse()
            .context(format!("Invalid owner address: {}", owner))?;

        let pair = IUniswapV2Pair::new(contracts.coin_uniswap_pair, self.provider.clone());
        let reserves = pair
            .getReserves()
            .call()
            .await
            .context("pair.getReserves() call failed")?;
        let lp_supply = pair
            .totalSupply()
            .call()
            .await
            .context("pair.totalSupply() call failed")?;

        let reserve0 = fixed(reserves.reserve0, Precision::Wad)?;
        let reserve1 = fixed(reserves.reserve1, Precision::Wad)?;
        let (token0_price, token1_price) = pair_prices(reserve0, reserve1);

        let mut state = IncentivesState {
            pair: UniswapPair {
                reserve0,
                reserve1,
                token0_price,
                token1_price,
                total_supply: fixed(lp_supply, Precision::Wad)?,
            },
            campaigns: Vec::new(),
            balances: Vec::new(),
        };

        let factory =
            IStakingRewardsFactory::new(contracts.staking_rewards_factory, self.provider.clone());
        let count = factory
            .totalCampaignCount()
            .call()
            .await
            .context("factory.totalCampaignCount() call failed")?;
        let count = u64::try_from(count)
            .ok()
            .context("Campaign count out of range")?;

        for number in 0..count {
            let info = factory
                .stakingRewardsInfo(U256::from(number))
                .call()
                .await
                .context(format!("factory.stakingRewardsInfo() call failed for campaign {}", number))?;
            let campaign = IStakingRewards::new(info.stakingRewards, self.provider.clone());
            let ctx = |call: &str| format!("campaign {} {}() call failed", number, call);

            let reward_token = campaign.rewardsToken().call().await.context(ctx("rewardsToken"))?;
            let reward_rate = campaign.rewardRate().call().await.context(ctx("rewardRate"))?;
            let stored = campaign
                .rewardPerTokenStored()
                .call()
                .await
                .context(ctx("rewardPerTokenStored"))?;
            let staked = campaign.totalSupply().call().await.context(ctx("totalSupply"))?;
            let period_finish = campaign.periodFinish().call().await.context(ctx("periodFinish"))?;
            let last_update = campaign
                .lastUpdateTime()
                .call()
                .await
                .context(ctx("lastUpdateTime"))?;
            let duration = campaign
                .rewardsDuration()
                .call()
                .await
                .context(ctx("rewardsDuration"))?;

            state.campaigns.push(Campaign {
                campaign_number: number.to_string(),
                campaign_address: info.stakingRewards.to_string(),
                reward_token: reward_token.to_string(),
                reward_rate: fixed(reward_rate, Precision::Wad)?,
                reward_per_token_stored: fixed(stored, Precision::Wad)?,
                total_supply: fixed(staked, Precision::Wad)?,
                period_finish: period_finish.to_string(),
                last_updated_time: last_update.to_string(),
                rewards_duration: duration.to_string(),
            });

            let stake = campaign.balanceOf(owner).call().await.context(ctx("balanceOf"))?;
            let reward = campaign.rewards(owner).call().await.context(ctx("rewards"))?;
            let paid = campaign
                .userRewardPerTokenPaid(owner)
                .call()
                .await
                .context(ctx("userRewardPerTokenPaid"))?;

            // The indexer only records campaigns the owner has touched
            if stake.is_zero() && reward.is_zero() && paid.is_zero() {
                continue;
            }
            state.balances.push(IncentiveBalance {
                address: info.stakingRewards.to_string(),
                owner: owner.to_string(),
                stake_balance: fixed(stake, Precision::Wad)?,
                reward: fixed(reward, Precision::Wad)?,
                user_reward_per_token_paid: fixed(paid, Precision::Wad)?,
            });
        }

        log::debug!(
            "rpc found {} campaigns, {} with a balance for {}",
            state.campaigns.len(),
            state.balances.len(),
            owner
        );
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amt(s: &str) -> Amount {
        s.parse().unwrap()
    }

    #[test]
    fn test_collateral_type_id() {
        let id = collateral_type_id("ETH-A");
        assert_eq!(&id[..5], b"ETH-A");
        assert!(id[5..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_ray_conversion() {
        let raw = U256::from(10u64).pow(U256::from(27u64)) * U256::from(3u64) / U256::from(2u64);
        assert_eq!(fixed(raw, Precision::Ray).unwrap(), amt("1.5"));
    }

    #[test]
    fn test_spot_price() {
        assert_eq!(spot_price(amt("600"), amt("1.5"), amt("3")), amt("2700"));
    }

    #[test]
    fn test_pair_prices() {
        assert_eq!(pair_prices(amt("3000"), amt("10")), (amt("300"), amt("0.01").div_int(3)));
        assert_eq!(pair_prices(amt("3000"), Amount::ZERO), (Amount::ZERO, Amount::ZERO));
    }

    #[test]
    fn test_compounding_unit_rates() {
        assert_eq!(eight_hourly_rate(Amount::one()), Amount::one());
        assert_eq!(annualized_fee(Amount::ZERO, Amount::one()), Amount::one());
    }

    #[test]
    fn test_compounding_grows() {
        // 1 + 1e-9 per second over a year is about 1.0320
        let fee = annualized_fee(Amount::ZERO, amt("1.000000001"));
        assert_eq!(fee.truncate(3), amt("1.032"));
    }

    #[test]
    fn test_rejects_bad_addresses() {
        let mut config = Config::default_mainnet();
        config.contracts.coin = "not-an-address".to_string();
        assert!(RpcSource::new(&config).is_err());
    }

    #[test]
    fn test_rejects_bad_incentive_addresses() {
        let mut config = Config::default_mainnet();
        config.contracts.incentives = Some(crate::config::IncentiveContracts {
            coin_uniswap_pair: "0x8aE720a71622e824F576b4A8C03031066548A3B1".to_string(),
            staking_rewards_factory: "nope".to_string(),
        });
        assert!(RpcSource::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_incentives_need_contracts() {
        let source = RpcSource::new(&Config::default_mainnet()).unwrap();
        let err = source
            .incentives("0x7eb8caf136ba45dd16483188cbe8b615f6251ca7")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No incentive contracts configured"));
    }
}
