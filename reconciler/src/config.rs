//! Reconciler configuration

use anyhow::{Context, Result};
use safe_engine::Amount;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// JSON-RPC endpoint of an Ethereum node
    pub rpc_url: String,

    /// Indexer GraphQL endpoints, tried in order
    pub graph_urls: Vec<String>,

    /// Collateral type label, e.g. ETH-A
    pub collateral_type: String,

    /// Account whose Safes are compared
    pub owner: String,

    /// Restrict the comparison to one Safe
    #[serde(default)]
    pub safe_id: Option<String>,

    /// Polling interval in seconds; 0 runs one round and exits
    pub poll_interval_secs: u64,

    /// Significant digits compared for exact fields
    pub mantissa_digits: usize,

    pub contracts: Contracts,

    pub tolerances: Tolerances,
}

/// Deployed contract addresses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contracts {
    pub safe_engine: String,
    pub oracle_relayer: String,
    pub tax_collector: String,
    pub liquidation_engine: String,
    pub safe_manager: String,
    pub get_safes: String,
    pub proxy_registry: String,
    pub coin: String,
    /// Liquidity-incentive contracts; incentives are compared only when set
    #[serde(default)]
    pub incentives: Option<IncentiveContracts>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncentiveContracts {
    /// Uniswap V2 coin/WETH pair
    pub coin_uniswap_pair: String,
    /// Factory holding one staking-rewards contract per campaign
    pub staking_rewards_factory: String,
}

/// Allowed absolute deviation for fields computed off-chain on one side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tolerances {
    /// Redemption price moves every second on-chain
    pub redemption_price: Amount,
    pub redemption_rate: Amount,
    /// Derived from liquidation price, c-ratio and redemption price
    pub collateral_price: Amount,
    pub stability_fee: Amount,
    /// Pool prices are divided out on one side
    #[serde(default = "default_token_price")]
    pub token_price: Amount,
}

fn default_token_price() -> Amount {
    "0.0001".parse().unwrap_or(Amount::ZERO)
}

impl Default for Tolerances {
    fn default() -> Self {
        let parse = |s: &str| s.parse().unwrap_or(Amount::ZERO);
        Self {
            redemption_price: parse("0.0001"),
            redemption_rate: parse("0.00001"),
            collateral_price: parse("0.01"),
            stability_fee: parse("0.00001"),
            token_price: default_token_price(),
        }
    }
}

/// Config file path from RECONCILER_CONFIG, `~` expanded
pub fn config_path() -> String {
    let raw = std::env::var("RECONCILER_CONFIG")
        .unwrap_or_else(|_| "reconciler-config.toml".to_string());
    shellexpand::tilde(&raw).into_owned()
}

impl Config {
    /// Load configuration from TOML file
    pub fn load() -> Result<Self> {
        let path = config_path();

        let config_str = std::fs::read_to_string(&path)
            .context(format!("Failed to read config file: {}", path))?;

        Self::from_toml(&config_str)
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("Failed to parse config TOML")?;
        if config.graph_urls.is_empty() {
            anyhow::bail!("Config lists no indexer URLs");
        }
        if config.mantissa_digits == 0 {
            anyhow::bail!("mantissa_digits must be at least 1");
        }
        Ok(config)
    }

    /// Create default configuration
    pub fn default_mainnet() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            graph_urls: vec![
                "https://subgraph.reflexer.finance/subgraphs/name/reflexer-labs/rai".to_string(),
            ],
            collateral_type: "ETH-A".to_string(),
            owner: "0x7eb8caf136ba45dd16483188cbe8b615f6251ca7".to_string(),
            safe_id: None,
            poll_interval_secs: 0,
            mantissa_digits: 33,
            contracts: Contracts {
                safe_engine: "0xCC88a9d330da1133Df3A7bD823B95e52511A6962".to_string(),
                oracle_relayer: "0x4ed9C0dCa0479bC64d8f4EB3007126D5791f7851".to_string(),
                tax_collector: "0xcDB05aEda142a1B0D6044C09C64e4226c1a281EB".to_string(),
                liquidation_engine: "0x27Efc6FFE79692E0521E7e27657cF228240A06c2".to_string(),
                safe_manager: "0xEfe0B4cA532769a3AE758fD82E1426a03A94F185".to_string(),
                get_safes: "0xdf4BC9aA98cC8eCd90Ba2BEe73aD4a1a9C8d202B".to_string(),
                proxy_registry: "0x4678f0a6958e4D2Bc4F1BAF7Bc52E8F3564f3fE4".to_string(),
                coin: "0x03ab458634910AaD20eF5f1C8ee96F1D6ac54919".to_string(),
                incentives: None,
            },
            tolerances: Tolerances::default(),
        }
    }

    /// Write default config to file
    pub fn write_default(path: &str) -> Result<()> {
        let config = Self::default_mainnet();
        let toml_str = toml::to_string_pretty(&config)
            .context("Failed to serialize config")?;

        std::fs::write(path, toml_str)
            .context(format!("Failed to write config to {}", path))?;

        log::info!("Created default config at {}", path);
        Ok(())
    }
}
