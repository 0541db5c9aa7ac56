//! Field-by-field comparison of the two read paths

use crate::config::Config;
use crate::source::{Campaign, IncentiveBalance, IncentivesState, SafeRecord, UserState};
use safe_engine::{Amount, LiquidationData};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tolerance {
    /// Leading significant digits of the raw value must agree
    Exact,
    /// Absolute deviation must not exceed the bound
    Within(Amount),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub field: String,
    pub rpc: String,
    pub indexer: String,
    pub deviation: Option<Amount>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: rpc={} indexer={}", self.field, self.rpc, self.indexer)?;
        if let Some(d) = self.deviation {
            write!(f, " deviation={}", d)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub mismatches: Vec<Mismatch>,
    pub checked: usize,
}

impl Report {
    pub fn merge(mut self, other: Report) -> Report {
        self.mismatches.extend(other.mismatches);
        self.checked += other.checked;
        self
    }

    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }

    fn amount(&mut self, field: &str, rpc: Amount, indexer: Amount, tolerance: Tolerance, digits: usize) {
        self.checked += 1;
        let ok = match tolerance {
            Tolerance::Exact => mantissa_match(rpc, indexer, digits),
            Tolerance::Within(bound) => rpc.abs_diff(indexer) <= bound,
        };
        if !ok {
            self.mismatches.push(Mismatch {
                field: field.to_string(),
                rpc: rpc.to_string(),
                indexer: indexer.to_string(),
                deviation: Some(rpc.abs_diff(indexer)),
            });
        }
    }

    /// Both sides must agree on presence; present values compare as amounts
    fn optional(&mut self, field: &str, rpc: Option<Amount>, indexer: Option<Amount>, digits: usize) {
        match (rpc, indexer) {
            (Some(a), Some(b)) => self.amount(field, a, b, Tolerance::Exact, digits),
            (a, b) => self.identity(field, &show(a), &show(b)),
        }
    }

    fn identity(&mut self, field: &str, rpc: &str, indexer: &str) {
        self.checked += 1;
        if !rpc.eq_ignore_ascii_case(indexer) {
            self.mismatches.push(Mismatch {
                field: field.to_string(),
                rpc: rpc.to_string(),
                indexer: indexer.to_string(),
                deviation: None,
            });
        }
    }
}

fn show(value: Option<Amount>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "none".to_string())
}

/// Compare the first `digits` significant digits of both raw values
///
/// Values of different magnitude never match.
pub fn mantissa_match(a: Amount, b: Amount, digits: usize) -> bool {
    let a = a.raw().to_string();
    let b = b.raw().to_string();
    if a.len() != b.len() {
        return false;
    }
    let n = digits.min(a.len());
    a[..n] == b[..n]
}

pub struct Comparator {
    digits: usize,
    safe_id: Option<String>,
    redemption_price: Tolerance,
    redemption_rate: Tolerance,
    collateral_price: Tolerance,
    stability_fee: Tolerance,
    token_price: Tolerance,
    incentives: bool,
}

impl Comparator {
    pub fn new(config: &Config) -> Self {
        let t = &config.tolerances;
        Self {
            digits: config.mantissa_digits,
            safe_id: config.safe_id.clone(),
            redemption_price: Tolerance::Within(t.redemption_price),
            redemption_rate: Tolerance::Within(t.redemption_rate),
            collateral_price: Tolerance::Within(t.collateral_price),
            stability_fee: Tolerance::Within(t.stability_fee),
            token_price: Tolerance::Within(t.token_price),
            incentives: config.contracts.incentives.is_some(),
        }
    }

    /// Whether incentive contracts are configured for comparison
    pub fn compares_incentives(&self) -> bool {
        self.incentives
    }

    pub fn liquidation_data(&self, rpc: &LiquidationData, indexer: &LiquidationData) -> Report {
        let mut report = Report::default();
        let d = self.digits;
        let exact = Tolerance::Exact;

        report.amount("accumulatedRate", rpc.accumulated_rate, indexer.accumulated_rate, exact, d);
        report.amount(
            "currentPrice.value",
            rpc.current_price.value,
            indexer.current_price.value,
            self.collateral_price,
            d,
        );
        report.amount(
            "currentPrice.liquidationPrice",
            rpc.current_price.liquidation_price,
            indexer.current_price.liquidation_price,
            exact,
            d,
        );
        report.optional(
            "currentPrice.safetyPrice",
            rpc.current_price.safety_price,
            indexer.current_price.safety_price,
            d,
        );
        report.amount(
            "currentRedemptionPrice",
            rpc.current_redemption_price,
            indexer.current_redemption_price,
            self.redemption_price,
            d,
        );
        report.amount(
            "currentRedemptionRate",
            rpc.current_redemption_rate,
            indexer.current_redemption_rate,
            self.redemption_rate,
            d,
        );
        report.amount("debtFloor", rpc.debt_floor, indexer.debt_floor, exact, d);
        report.amount("debtCeiling", rpc.debt_ceiling, indexer.debt_ceiling, exact, d);
        report.amount("globalDebt", rpc.global_debt, indexer.global_debt, exact, d);
        report.amount("globalDebtCeiling", rpc.global_debt_ceiling, indexer.global_debt_ceiling, exact, d);
        report.amount(
            "perSafeDebtCeiling",
            rpc.per_safe_debt_ceiling,
            indexer.per_safe_debt_ceiling,
            exact,
            d,
        );
        report.amount("liquidationCRatio", rpc.liquidation_c_ratio, indexer.liquidation_c_ratio, exact, d);
        report.amount("safetyCRatio", rpc.safety_c_ratio, indexer.safety_c_ratio, exact, d);
        report.amount("liquidationPenalty", rpc.liquidation_penalty, indexer.liquidation_penalty, exact, d);
        report.amount(
            "totalAnnualizedStabilityFee",
            rpc.total_annualized_stability_fee,
            indexer.total_annualized_stability_fee,
            self.stability_fee,
            d,
        );

        report
    }

    pub fn user_state(&self, rpc: &UserState, indexer: &UserState) -> Report {
        let mut report = Report::default();
        let d = self.digits;

        report.amount("coinBalance", rpc.coin_balance, indexer.coin_balance, Tolerance::Exact, d);

        let none = String::from("none");
        report.identity(
            "proxy",
            rpc.proxy.as_ref().unwrap_or(&none),
            indexer.proxy.as_ref().unwrap_or(&none),
        );
        report.optional("proxy.coinAllowance", rpc.coin_allowance, indexer.coin_allowance, d);

        let rpc_safes = self.selected(&rpc.safes);
        let indexer_safes = self.selected(&indexer.safes);

        report.identity(
            "safes.length",
            &rpc_safes.len().to_string(),
            &indexer_safes.len().to_string(),
        );

        for (a, b) in rpc_safes.into_iter().zip(indexer_safes) {
            let prefix = format!("safes[{}]", a.safe_id);
            report.identity(&format!("{}.safeId", prefix), &a.safe_id, &b.safe_id);
            report.identity(&format!("{}.safeHandler", prefix), &a.safe_handler, &b.safe_handler);
            report.amount(&format!("{}.collateral", prefix), a.collateral, b.collateral, Tolerance::Exact, d);
            report.amount(&format!("{}.debt", prefix), a.debt, b.debt, Tolerance::Exact, d);
            report.amount(
                &format!("{}.internalCollateralBalance", prefix),
                a.internal_collateral_balance,
                b.internal_collateral_balance,
                Tolerance::Exact,
                d,
            );
        }

        report
    }

    pub fn incentives(&self, rpc: &IncentivesState, indexer: &IncentivesState) -> Report {
        let mut report = Report::default();
        let d = self.digits;
        let exact = Tolerance::Exact;
        let (p, q) = (&rpc.pair, &indexer.pair);

        report.amount("coinUniswapPair.reserve0", p.reserve0, q.reserve0, exact, d);
        report.amount("coinUniswapPair.reserve1", p.reserve1, q.reserve1, exact, d);
        report.amount("coinUniswapPair.token0Price", p.token0_price, q.token0_price, self.token_price, d);
        report.amount("coinUniswapPair.token1Price", p.token1_price, q.token1_price, self.token_price, d);
        report.amount("coinUniswapPair.totalSupply", p.total_supply, q.total_supply, exact, d);

        report.identity(
            "allCampaigns.length",
            &rpc.campaigns.len().to_string(),
            &indexer.campaigns.len().to_string(),
        );
        for (a, b) in by_number(&rpc.campaigns).into_iter().zip(by_number(&indexer.campaigns)) {
            self.campaign(&mut report, a, b);
        }

        report.identity(
            "incentiveBalances.length",
            &rpc.balances.len().to_string(),
            &indexer.balances.len().to_string(),
        );
        for b in &indexer.balances {
            let prefix = format!("incentiveBalances[{}]", b.address.to_lowercase());
            match rpc.balances.iter().find(|a| a.address.eq_ignore_ascii_case(&b.address)) {
                Some(a) => self.balance(&mut report, &prefix, a, b),
                None => report.identity(&prefix, "none", &b.address),
            }
        }

        report
    }

    fn campaign(&self, report: &mut Report, a: &Campaign, b: &Campaign) {
        let d = self.digits;
        let prefix = format!("allCampaigns[{}]", a.campaign_number);
        let field = |name: &str| format!("{}.{}", prefix, name);

        report.identity(&field("campaignNumber"), &a.campaign_number, &b.campaign_number);
        report.identity(&field("campaignAddress"), &a.campaign_address, &b.campaign_address);
        report.identity(&field("rewardToken"), &a.reward_token, &b.reward_token);
        report.amount(&field("rewardRate"), a.reward_rate, b.reward_rate, Tolerance::Exact, d);
        report.amount(
            &field("rewardPerTokenStored"),
            a.reward_per_token_stored,
            b.reward_per_token_stored,
            Tolerance::Exact,
            d,
        );
        report.amount(&field("totalSupply"), a.total_supply, b.total_supply, Tolerance::Exact, d);
        report.identity(&field("periodFinish"), &a.period_finish, &b.period_finish);
        report.identity(&field("lastUpdatedTime"), &a.last_updated_time, &b.last_updated_time);
        report.identity(&field("rewardsDuration"), &a.rewards_duration, &b.rewards_duration);
    }

    fn balance(&self, report: &mut Report, prefix: &str, a: &IncentiveBalance, b: &IncentiveBalance) {
        let d = self.digits;
        let field = |name: &str| format!("{}.{}", prefix, name);

        report.identity(&field("owner"), &a.owner, &b.owner);
        report.amount(&field("stakeBalance"), a.stake_balance, b.stake_balance, Tolerance::Exact, d);
        report.amount(&field("reward"), a.reward, b.reward, Tolerance::Exact, d);
        report.amount(
            &field("userRewardPerTokenPaid"),
            a.user_reward_per_token_paid,
            b.user_reward_per_token_paid,
            Tolerance::Exact,
            d,
        );
    }

    /// Safes to pair, ordered by numeric id
    fn selected<'a>(&self, safes: &'a [SafeRecord]) -> Vec<&'a SafeRecord> {
        let mut out: Vec<&SafeRecord> = safes
            .iter()
            .filter(|s| self.safe_id.as_ref().map_or(true, |id| *id == s.safe_id))
            .collect();
        out.sort_by_key(|s| s.safe_id.parse::<u64>().unwrap_or(u64::MAX));
        out
    }
}

fn by_number(campaigns: &[Campaign]) -> Vec<&Campaign> {
    let mut out: Vec<&Campaign> = campaigns.iter().collect();
    out.sort_by_key(|c| c.campaign_number.parse::<u64>().unwrap_or(u64::MAX));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IncentiveContracts;
    use crate::source::UniswapPair;
    use safe_engine::CurrentPrice;

    fn amt(s: &str) -> Amount {
        s.parse().unwrap()
    }

    fn comparator() -> Comparator {
        Comparator::new(&Config::default_mainnet())
    }

    fn data() -> LiquidationData {
        LiquidationData {
            accumulated_rate: amt("1.0312"),
            current_price: CurrentPrice {
                value: amt("2500"),
                safety_price: Some(amt("590")),
                liquidation_price: amt("610"),
            },
            current_redemption_price: amt("3.014"),
            current_redemption_rate: amt("0.99998"),
            debt_floor: amt("1500"),
            debt_ceiling: amt("50000000"),
            global_debt: amt("1000000"),
            global_debt_ceiling: amt("100000000"),
            per_safe_debt_ceiling: amt("1000000"),
            liquidation_c_ratio: amt("1.35"),
            safety_c_ratio: amt("1.4"),
            liquidation_penalty: amt("1.1"),
            total_annualized_stability_fee: amt("1.005"),
        }
    }

    fn safe(id: &str, handler: &str) -> SafeRecord {
        SafeRecord {
            safe_id: id.to_string(),
            safe_handler: handler.to_string(),
            collateral: amt("5"),
            debt: amt("300"),
            internal_collateral_balance: Amount::ZERO,
        }
    }

    fn incentives() -> IncentivesState {
        IncentivesState {
            pair: UniswapPair {
                reserve0: amt("3000"),
                reserve1: amt("10"),
                token0_price: amt("300"),
                token1_price: amt("0.0033333"),
                total_supply: amt("150"),
            },
            campaigns: vec![
                Campaign {
                    campaign_number: "2".to_string(),
                    campaign_address: "0xC2".to_string(),
                    reward_rate: amt("0.05"),
                    period_finish: "1617148800".to_string(),
                    ..Campaign::default()
                },
                Campaign {
                    campaign_number: "1".to_string(),
                    campaign_address: "0xC1".to_string(),
                    reward_rate: amt("0.04"),
                    period_finish: "1614556800".to_string(),
                    ..Campaign::default()
                },
            ],
            balances: vec![IncentiveBalance {
                address: "0xC2".to_string(),
                owner: "0xABC".to_string(),
                stake_balance: amt("4"),
                reward: amt("0.2"),
                user_reward_per_token_paid: amt("1.4"),
            }],
        }
    }

    #[test]
    fn test_mantissa_match() {
        // 45-decimal raw values differing past the 33rd digit
        let a = amt("1.000000000000000000000000000000001");
        let b = amt("1.0000000000000000000000000000000019");
        assert!(mantissa_match(a, b, 33));
        assert!(!mantissa_match(a, b, 40));
        assert!(!mantissa_match(amt("1"), amt("10"), 33));
        assert!(mantissa_match(Amount::ZERO, Amount::ZERO, 33));
    }

    #[test]
    fn test_identical_data_is_clean() {
        let report = comparator().liquidation_data(&data(), &data());
        assert!(report.is_clean());
        assert_eq!(report.checked, 15);
    }

    #[test]
    fn test_tolerated_drift() {
        let mut indexer = data();
        indexer.current_redemption_price = amt("3.01405");
        indexer.current_price.value = amt("2500.005");
        assert!(comparator().liquidation_data(&data(), &indexer).is_clean());

        indexer.current_redemption_price = amt("3.0142");
        let report = comparator().liquidation_data(&data(), &indexer);
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].field, "currentRedemptionPrice");
        assert_eq!(report.mismatches[0].deviation, Some(amt("0.0002")));
    }

    #[test]
    fn test_exact_field_mismatch() {
        let mut indexer = data();
        indexer.debt_floor = amt("1501");
        let report = comparator().liquidation_data(&data(), &indexer);
        assert_eq!(report.mismatches[0].field, "debtFloor");
        assert!(report.mismatches[0].to_string().contains("rpc=1500 indexer=1501"));
    }

    #[test]
    fn test_missing_safety_price_on_one_side() {
        let mut indexer = data();
        indexer.current_price.safety_price = None;
        let report = comparator().liquidation_data(&data(), &indexer);
        assert_eq!(report.mismatches[0].field, "currentPrice.safetyPrice");
        assert_eq!(report.mismatches[0].indexer, "none");
    }

    #[test]
    fn test_safes_paired_by_numeric_id() {
        let rpc = UserState {
            safes: vec![safe("10", "0xAA"), safe("9", "0xBB")],
            coin_balance: amt("12"),
            proxy: Some("0xABC".to_string()),
            coin_allowance: Some(amt("100")),
        };
        let indexer = UserState {
            safes: vec![safe("9", "0xbb"), safe("10", "0xaa")],
            coin_balance: amt("12"),
            proxy: Some("0xabc".to_string()),
            coin_allowance: Some(amt("100")),
        };
        let report = comparator().user_state(&rpc, &indexer);
        assert!(report.is_clean(), "{:?}", report.mismatches);
    }

    #[test]
    fn test_safe_count_mismatch() {
        let rpc = UserState {
            safes: vec![safe("1", "0xAA"), safe("2", "0xBB")],
            ..UserState::default()
        };
        let indexer = UserState {
            safes: vec![safe("1", "0xAA")],
            ..UserState::default()
        };
        let report = comparator().user_state(&rpc, &indexer);
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].field, "safes.length");
    }

    #[test]
    fn test_single_safe_filter() {
        let mut config = Config::default_mainnet();
        config.safe_id = Some("2".to_string());
        let comparator = Comparator::new(&config);

        let mut drifted = safe("1", "0xAA");
        drifted.debt = amt("999");
        let rpc = UserState {
            safes: vec![safe("1", "0xAA"), safe("2", "0xBB")],
            ..UserState::default()
        };
        let indexer = UserState {
            safes: vec![drifted, safe("2", "0xBB")],
            ..UserState::default()
        };
        assert!(comparator.user_state(&rpc, &indexer).is_clean());
    }

    #[test]
    fn test_merge() {
        let mut indexer = data();
        indexer.debt_floor = amt("1");
        let a = comparator().liquidation_data(&data(), &indexer);
        let b = comparator().user_state(&UserState::default(), &UserState::default());
        let merged = a.merge(b);
        assert_eq!(merged.mismatches.len(), 1);
        assert_eq!(merged.checked, 15 + 4);
    }

    #[test]
    fn test_coin_allowance_presence_and_amount() {
        let rpc = UserState {
            proxy: Some("0xABC".to_string()),
            coin_allowance: Some(amt("100")),
            ..UserState::default()
        };
        let mut indexer = rpc.clone();
        indexer.coin_allowance = None;
        let report = comparator().user_state(&rpc, &indexer);
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].field, "proxy.coinAllowance");
        assert_eq!(report.mismatches[0].indexer, "none");

        indexer.coin_allowance = Some(amt("99"));
        let report = comparator().user_state(&rpc, &indexer);
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].deviation, Some(amt("1")));

        indexer.coin_allowance = Some(amt("100"));
        assert!(comparator().user_state(&rpc, &indexer).is_clean());
    }

    #[test]
    fn test_internal_collateral_balance_compared() {
        let mut drifted = safe("1", "0xAA");
        drifted.internal_collateral_balance = amt("0.5");
        let rpc = UserState {
            safes: vec![safe("1", "0xAA")],
            ..UserState::default()
        };
        let indexer = UserState {
            safes: vec![drifted],
            ..UserState::default()
        };
        let report = comparator().user_state(&rpc, &indexer);
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].field, "safes[1].internalCollateralBalance");
    }

    #[test]
    fn test_identical_incentives_are_clean() {
        let report = comparator().incentives(&incentives(), &incentives());
        assert!(report.is_clean(), "{:?}", report.mismatches);
        // 5 pair fields, 2 lengths, 9 per campaign, 4 per balance
        assert_eq!(report.checked, 5 + 2 + 2 * 9 + 4);
    }

    #[test]
    fn test_token_price_tolerance() {
        let mut indexer = incentives();
        indexer.pair.token1_price = amt("0.00334");
        indexer.pair.token0_price = amt("300.00009");
        assert!(comparator().incentives(&incentives(), &indexer).is_clean());

        indexer.pair.token0_price = amt("300.0002");
        let report = comparator().incentives(&incentives(), &indexer);
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].field, "coinUniswapPair.token0Price");

        let mut indexer = incentives();
        indexer.pair.reserve1 = amt("10.000001");
        let report = comparator().incentives(&incentives(), &indexer);
        assert_eq!(report.mismatches[0].field, "coinUniswapPair.reserve1");
    }

    #[test]
    fn test_campaigns_paired_by_number() {
        let mut indexer = incentives();
        indexer.campaigns.reverse();
        indexer.campaigns[0].campaign_address = "0xc1".to_string();
        assert!(comparator().incentives(&incentives(), &indexer).is_clean());

        indexer.campaigns[1].period_finish = "1617148801".to_string();
        let report = comparator().incentives(&incentives(), &indexer);
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].field, "allCampaigns[2].periodFinish");

        indexer.campaigns.pop();
        let report = comparator().incentives(&incentives(), &indexer);
        assert_eq!(report.mismatches[0].field, "allCampaigns.length");
    }

    #[test]
    fn test_incentive_balances_matched_by_campaign() {
        let mut indexer = incentives();
        indexer.balances[0].address = "0xc2".to_string();
        indexer.balances[0].reward = amt("0.3");
        let report = comparator().incentives(&incentives(), &indexer);
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].field, "incentiveBalances[0xc2].reward");

        let mut indexer = incentives();
        indexer.balances[0].address = "0xC3".to_string();
        let report = comparator().incentives(&incentives(), &indexer);
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].field, "incentiveBalances[0xc3]");
    }

    #[test]
    fn test_incentives_follow_config() {
        assert!(!comparator().compares_incentives());
        let mut config = Config::default_mainnet();
        config.contracts.incentives = Some(IncentiveContracts {
            coin_uniswap_pair: "0x01".to_string(),
            staking_rewards_factory: "0x02".to_string(),
        });
        assert!(Comparator::new(&config).compares_incentives());
    }
}
