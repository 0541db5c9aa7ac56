//! Indexed query service read path (GraphQL over HTTP POST)

use crate::config::Config;
use crate::source::{
    Campaign, IncentiveBalance, IncentivesState, SafeRecord, StateSource, UniswapPair, UserState,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use safe_engine::{Amount, CurrentPrice, LiquidationData};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

pub struct IndexerSource {
    client: reqwest::Client,
    urls: Vec<String>,
    collateral_type: String,
}

#[derive(Debug, Deserialize)]
struct GraphResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphError>,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiquidationResponse {
    system_state: SystemStateDto,
    collateral_type: CollateralTypeDto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SystemStateDto {
    current_redemption_price: ValueDto,
    current_redemption_rate: RedemptionRateDto,
    global_debt: Amount,
    global_debt_ceiling: Amount,
    per_safe_debt_ceiling: Amount,
}

#[derive(Debug, Deserialize)]
struct ValueDto {
    value: Amount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RedemptionRateDto {
    eight_hourly_rate: Amount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollateralTypeDto {
    accumulated_rate: Amount,
    #[serde(default)]
    current_price: Option<CurrentPrice>,
    debt_ceiling: Amount,
    debt_floor: Amount,
    liquidation_c_ratio: Amount,
    liquidation_penalty: Amount,
    safety_c_ratio: Amount,
    total_annualized_stability_fee: Amount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserResponse {
    safes: Vec<SafeDto>,
    erc20_balances: Vec<BalanceDto>,
    user_proxies: Vec<ProxyDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SafeDto {
    safe_id: String,
    safe_handler: String,
    collateral: Amount,
    debt: Amount,
    #[serde(default)]
    internal_collateral_balance: Option<BalanceDto>,
}

#[derive(Debug, Deserialize)]
struct BalanceDto {
    balance: Amount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProxyDto {
    address: String,
    #[serde(default)]
    coin_allowance: Option<AllowanceDto>,
}

#[derive(Debug, Deserialize)]
struct AllowanceDto {
    amount: Amount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncentivesResponse {
    system_state: PairStateDto,
    incentive_campaigns: Vec<CampaignDto>,
    incentive_balances: Vec<IncentiveBalanceDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PairStateDto {
    #[serde(default)]
    coin_uniswap_pair: Option<PairDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PairDto {
    reserve0: Amount,
    reserve1: Amount,
    token0_price: Amount,
    token1_price: Amount,
    total_supply: Amount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CampaignDto {
    campaign_number: String,
    campaign_address: String,
    reward_token: String,
    reward_rate: Amount,
    reward_per_token_stored: Amount,
    total_supply: Amount,
    period_finish: String,
    last_updated_time: String,
    rewards_duration: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncentiveBalanceDto {
    address: String,
    owner: String,
    stake_balance: Amount,
    reward: Amount,
    user_reward_per_token_paid: Amount,
}

impl From<LiquidationResponse> for LiquidationData {
    fn from(r: LiquidationResponse) -> Self {
        let s = r.system_state;
        let c = r.collateral_type;
        LiquidationData {
            accumulated_rate: c.accumulated_rate,
            current_price: c.current_price.unwrap_or_default(),
            current_redemption_price: s.current_redemption_price.value,
            current_redemption_rate: s.current_redemption_rate.eight_hourly_rate,
            debt_floor: c.debt_floor,
            debt_ceiling: c.debt_ceiling,
            global_debt: s.global_debt,
            global_debt_ceiling: s.global_debt_ceiling,
            per_safe_debt_ceiling: s.per_safe_debt_ceiling,
            liquidation_c_ratio: c.liquidation_c_ratio,
            safety_c_ratio: c.safety_c_ratio,
            liquidation_penalty: c.liquidation_penalty,
            total_annualized_stability_fee: c.total_annualized_stability_fee,
        }
    }
}

impl From<UserResponse> for UserState {
    fn from(r: UserResponse) -> Self {
        let (proxy, coin_allowance) = match r.user_proxies.into_iter().next() {
            Some(p) => (Some(p.address), p.coin_allowance.map(|a| a.amount)),
            None => (None, None),
        };
        UserState {
            safes: r
                .safes
                .into_iter()
                .map(|s| SafeRecord {
                    safe_id: s.safe_id,
                    safe_handler: s.safe_handler,
                    collateral: s.collateral,
                    debt: s.debt,
                    internal_collateral_balance: s
                        .internal_collateral_balance
                        .map(|b| b.balance)
                        .unwrap_or(Amount::ZERO),
                })
                .collect(),
            coin_balance: r
                .erc20_balances
                .first()
                .map(|b| b.balance)
                .unwrap_or(Amount::ZERO),
            proxy,
            coin_allowance,
        }
    }
}

impl From<IncentivesResponse> for IncentivesState {
    fn from(r: IncentivesResponse) -> Self {
        let pair = r
            .system_state
            .coin_uniswap_pair
            .map(|p| UniswapPair {
                reserve0: p.reserve0,
                reserve1: p.reserve1,
                token0_price: p.token0_price,
                token1_price: p.token1_price,
                total_supply: p.total_supply,
            })
            .unwrap_or_default();

        IncentivesState {
            pair,
            campaigns: r
                .incentive_campaigns
                .into_iter()
                .map(|c| Campaign {
                    campaign_number: c.campaign_number,
                    campaign_address: c.campaign_address,
                    reward_token: c.reward_token,
                    reward_rate: c.reward_rate,
                    reward_per_token_stored: c.reward_per_token_stored,
                    total_supply: c.total_supply,
                    period_finish: c.period_finish,
                    last_updated_time: c.last_updated_time,
                    rewards_duration: c.rewards_duration,
                })
                .collect(),
            balances: r
                .incentive_balances
                .into_iter()
                .map(|b| IncentiveBalance {
                    address: b.address,
                    owner: b.owner,
                    stake_balance: b.stake_balance,
                    reward: b.reward,
                    user_reward_per_token_paid: b.user_reward_per_token_paid,
                })
                .collect(),
        }
    }
}

pub fn liquidation_query(collateral_type: &str) -> String {
    format!(
        r#"{{
  systemState(id: "current") {{
    currentRedemptionPrice {{ value }}
    currentRedemptionRate {{ eightHourlyRate }}
    globalDebt
    globalDebtCeiling
    perSafeDebtCeiling
  }}
  collateralType(id: "{}") {{
    accumulatedRate
    currentPrice {{ liquidationPrice safetyPrice value }}
    debtCeiling
    debtFloor
    liquidationCRatio
    liquidationPenalty
    safetyCRatio
    totalAnnualizedStabilityFee
  }}
}}"#,
        collateral_type
    )
}

/// Safes of `owner` for one collateral type, plus coin balance and proxy
pub fn user_query(owner: &str, collateral_type: &str) -> String {
    let owner = owner.to_lowercase();
    format!(
        r#"{{
  safes(where: {{ owner: "{owner}", collateralType: "{collateral_type}" }}) {{
    safeId
    safeHandler
    collateral
    debt
    internalCollateralBalance {{ balance }}
  }}
  erc20Balances(where: {{ address: "{owner}", label: "COIN" }}) {{ balance }}
  userProxies(where: {{ owner: "{owner}" }}) {{ address coinAllowance {{ amount }} }}
}}"#
    )
}

pub fn incentives_query(owner: &str) -> String {
    let owner = owner.to_lowercase();
    format!(
        r#"{{
  systemState(id: "current") {{
    coinUniswapPair {{ reserve0 reserve1 token0Price token1Price totalSupply }}
  }}
  incentiveCampaigns(orderBy: campaignNumber) {{
    campaignNumber
    campaignAddress
    rewardToken
    rewardRate
    rewardPerTokenStored
    totalSupply
    periodFinish
    lastUpdatedTime
    rewardsDuration
  }}
  incentiveBalances(where: {{ owner: "{owner}" }}) {{
    address
    owner
    stakeBalance
    reward
    userRewardPerTokenPaid
  }}
}}"#
    )
}

impl IndexerSource {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            urls: config.graph_urls.clone(),
            collateral_type: config.collateral_type.clone(),
        })
    }

    /// Run `query` against each endpoint until one answers
    async fn query<T: DeserializeOwned>(&self, query: String) -> Result<T> {
        let body = serde_json::json!({ "query": query });
        let mut last_err = None;

        for url in &self.urls {
            match self.post(url, &body).await {
                Ok(data) => return Ok(data),
                Err(e) => {
                    log::warn!("Indexer {} failed: {:#}", url, e);
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("No indexer URLs configured")))
    }

    async fn post<T: DeserializeOwned>(&self, url: &str, body: &serde_json::Value) -> Result<T> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context(format!("POST to {} failed", url))?
            .error_for_status()
            .context("Indexer returned an error status")?;

        let parsed: GraphResponse<T> = response
            .json()
            .await
            .context("Failed to decode indexer response")?;

        decode(parsed)
    }
}

fn decode<T>(response: GraphResponse<T>) -> Result<T> {
    if let Some(first) = response.errors.first() {
        anyhow::bail!("Indexer query error: {}", first.message);
    }
    response.data.context("Indexer response carried no data")
}

#[async_trait]
impl StateSource for IndexerSource {
    fn name(&self) -> &'static str {
        "indexer"
    }

    async fn liquidation_data(&self) -> Result<LiquidationData> {
        let response: LiquidationResponse = self
            .query(liquidation_query(&self.collateral_type))
            .await
            .context("Failed to fetch liquidation data from indexer")?;
        Ok(response.into())
    }

    async fn user_state(&self, owner: &str) -> Result<UserState> {
        let response: UserResponse = self
            .query(user_query(owner, &self.collateral_type))
            .await
            .context(format!("Failed to fetch safes of {} from indexer", owner))?;
        Ok(response.into())
    }

    async fn incentives(&self, owner: &str) -> Result<IncentivesState> {
        let response: IncentivesResponse = self
            .query(incentives_query(owner))
            .await
            .context(format!("Failed to fetch incentives of {} from indexer", owner))?;
        Ok(response.into())
    }
}
