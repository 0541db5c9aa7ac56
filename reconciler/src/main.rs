//! Safe state reconciler
//!
//! Reads system and account state for one owner through both the contracts
//! and the indexer, and reports every field where the two disagree.

mod compare;
mod config;
mod indexer;
mod rpc;
mod source;

use anyhow::Result;
use compare::{Comparator, Report};
use config::Config;
use indexer::IndexerSource;
use rpc::RpcSource;
use source::StateSource;
use std::time::Duration;
use tokio::time;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if std::env::args().any(|a| a == "--init") {
        return Config::write_default(&config::config_path());
    }

    log::info!("Starting Safe reconciler");

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({:#}), using default mainnet config", e);
        Config::default_mainnet()
    });

    log::info!("Connected to RPC: {}", config.rpc_url);
    log::info!("Indexers: {}", config.graph_urls.join(", "));
    log::info!("Owner: {}", config.owner);

    let rpc = RpcSource::new(&config)?;
    let indexer = IndexerSource::new(&config)?;
    let comparator = Comparator::new(&config);

    if config.poll_interval_secs == 0 {
        let report = reconcile_once(&rpc, &indexer, &config.owner, &comparator).await?;
        log_report(&report);
        if !report.is_clean() {
            anyhow::bail!("{} fields disagree", report.mismatches.len());
        }
        return Ok(());
    }

    // Main event loop
    let mut interval = time::interval(Duration::from_secs(config.poll_interval_secs));

    loop {
        interval.tick().await;

        match reconcile_once(&rpc, &indexer, &config.owner, &comparator).await {
            Ok(report) => log_report(&report),
            Err(e) => log::error!("Error reconciling: {:#}", e),
        }
    }
}

/// Read both paths concurrently and compare them
async fn reconcile_once(
    rpc: &dyn StateSource,
    indexer: &dyn StateSource,
    owner: &str,
    comparator: &Comparator,
) -> Result<Report> {
    let (rpc_data, indexer_data, rpc_user, indexer_user) = tokio::try_join!(
        rpc.liquidation_data(),
        indexer.liquidation_data(),
        rpc.user_state(owner),
        indexer.user_state(owner),
    )?;

    log::debug!(
        "{} reports {} safes, {} reports {}",
        rpc.name(),
        rpc_user.safes.len(),
        indexer.name(),
        indexer_user.safes.len()
    );

    let report = comparator
        .liquidation_data(&rpc_data, &indexer_data)
        .merge(comparator.user_state(&rpc_user, &indexer_user));

    if !comparator.compares_incentives() {
        return Ok(report);
    }

    let (rpc_incentives, indexer_incentives) =
        tokio::try_join!(rpc.incentives(owner), indexer.incentives(owner))?;

    log::debug!(
        "{} reports {} campaigns, {} reports {}",
        rpc.name(),
        rpc_incentives.campaigns.len(),
        indexer.name(),
        indexer_incentives.campaigns.len()
    );

    Ok(report.merge(comparator.incentives(&rpc_incentives, &indexer_incentives)))
}

fn log_report(report: &Report) {
    if report.is_clean() {
        log::info!("All {} fields match", report.checked);
        return;
    }

    log::warn!(
        "{} of {} fields disagree",
        report.mismatches.len(),
        report.checked
    );
    for mismatch in &report.mismatches {
        log::warn!("  {}", mismatch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use safe_engine::{Amount, LiquidationData};
    use crate::config::IncentiveContracts;
    use crate::source::{IncentivesState, SafeRecord, UniswapPair, UserState};

    struct Fixture {
        name: &'static str,
        data: LiquidationData,
        user: UserState,
        incentives: IncentivesState,
        fail: bool,
    }

    #[async_trait]
    impl StateSource for Fixture {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn liquidation_data(&self) -> Result<LiquidationData> {
            if self.fail {
                return Err(anyhow!("{} unavailable", self.name));
            }
            Ok(self.data)
        }

        async fn user_state(&self, _owner: &str) -> Result<UserState> {
            Ok(self.user.clone())
        }

        async fn incentives(&self, _owner: &str) -> Result<IncentivesState> {
            Ok(self.incentives.clone())
        }
    }

    fn with_incentives() -> Comparator {
        let mut config = Config::default_mainnet();
        config.contracts.incentives = Some(IncentiveContracts {
            coin_uniswap_pair: "0x8aE720a71622e824F576b4A8C03031066548A3B1".to_string(),
            staking_rewards_factory: "0x0000000000000000000000000000000000000001".to_string(),
        });
        Comparator::new(&config)
    }

    fn fixture(name: &'static str, debt: &str) -> Fixture {
        Fixture {
            name,
            data: LiquidationData {
                accumulated_rate: Amount::one(),
                debt_floor: "1500".parse().unwrap(),
                ..LiquidationData::default()
            },
            user: UserState {
                safes: vec![SafeRecord {
                    safe_id: "1".to_string(),
                    safe_handler: "0xAA".to_string(),
                    collateral: "5".parse().unwrap(),
                    debt: debt.parse().unwrap(),
                    internal_collateral_balance: Amount::ZERO,
                }],
                coin_balance: Amount::ZERO,
                proxy: Some("0xBB".to_string()),
                coin_allowance: None,
            },
            incentives: IncentivesState {
                pair: UniswapPair {
                    reserve0: "3000".parse().unwrap(),
                    reserve1: "10".parse().unwrap(),
                    token0_price: "300".parse().unwrap(),
                    token1_price: "0.0033".parse().unwrap(),
                    total_supply: "150".parse().unwrap(),
                },
                ..IncentivesState::default()
            },
            fail: false,
        }
    }

    #[tokio::test]
    async fn test_matching_sources() {
        let comparator = Comparator::new(&Config::default_mainnet());
        let report = reconcile_once(&fixture("a", "300"), &fixture("b", "300"), "0x1", &comparator)
            .await
            .unwrap();
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_diverging_sources() {
        let comparator = Comparator::new(&Config::default_mainnet());
        let report = reconcile_once(&fixture("a", "300"), &fixture("b", "301"), "0x1", &comparator)
            .await
            .unwrap();
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].field, "safes[1].debt");
    }

    #[tokio::test]
    async fn test_source_failure_propagates() {
        let comparator = Comparator::new(&Config::default_mainnet());
        let mut broken = fixture("b", "300");
        broken.fail = true;
        let err = reconcile_once(&fixture("a", "300"), &broken, "0x1", &comparator)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("b unavailable"));
    }

    #[tokio::test]
    async fn test_incentives_skipped_without_contracts() {
        let comparator = Comparator::new(&Config::default_mainnet());
        let mut b = fixture("b", "300");
        b.incentives.pair.reserve0 = "1".parse().unwrap();
        let report = reconcile_once(&fixture("a", "300"), &b, "0x1", &comparator)
            .await
            .unwrap();
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_matching_incentives() {
        let mut b = fixture("b", "300");
        b.incentives.pair.token1_price = "0.00335".parse().unwrap();
        let report = reconcile_once(&fixture("a", "300"), &b, "0x1", &with_incentives())
            .await
            .unwrap();
        assert!(report.is_clean(), "{:?}", report.mismatches);
        assert!(report.checked > 15 + 6);
    }

    #[tokio::test]
    async fn test_diverging_pool_price() {
        let mut b = fixture("b", "300");
        b.incentives.pair.token0_price = "300.01".parse().unwrap();
        let report = reconcile_once(&fixture("a", "300"), &b, "0x1", &with_incentives())
            .await
            .unwrap();
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].field, "coinUniswapPair.token0Price");
    }

    #[tokio::test]
    async fn test_diverging_allowance() {
        let comparator = Comparator::new(&Config::default_mainnet());
        let mut b = fixture("b", "300");
        b.user.coin_allowance = Some("50".parse().unwrap());
        let report = reconcile_once(&fixture("a", "300"), &b, "0x1", &comparator)
            .await
            .unwrap();
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].field, "proxy.coinAllowance");
    }
}
