//! Harness configuration.
//!
//! Built-in constants describe the GLP farming deployment on Arbitrum. A TOML
//! file named by `HARNESS_CONFIG` may override any of them, and a handful of
//! environment variables override the file. A `.env` file is honoured.

use std::path::{Path, PathBuf};

use alloy::primitives::{Address, address};
use serde::Deserialize;

use crate::error::HarnessError;
use crate::fees::FeeConfig;

/// Token deposited in the vault (fee-staked GLP).
pub const WANT: Address = address!("1aDDD80E6039594eE970E5872D247bf0414C8903");
/// Transfer/approval surface for the want (staked GLP).
pub const WANT_PROXY: Address = address!("5402B5F40310bDED796c7D0F3FF6683f5C0cFfdf");
/// Account holding plenty of want; the harness borrows a fifth of it.
pub const WHALE_ADDRESS: Address = address!("a75287d2f8b217273e7fcd7e86ef07d33972042e");
/// Badger registry, used to fill in default addresses.
pub const REGISTRY: Address = address!("Fda7eB6f8b7a9e9fCFd348042ae675d1d652454f");
/// Token the strategy distributes to the reward tree.
pub const WETH: Address = address!("82aF49447D8a07e3bd95BD0d56f35241523fBab1");
pub const SWAP_ROUTER: Address = address!("E592427A0AEce92De3Edee1F18E0157C05861564");
pub const SWAP_QUOTER: Address = address!("b27308f9F90D607463bb33eA1BeBb41C27CE5AB6");

pub const VAULT_CONTRACT: &str = "TheVault";
pub const STRATEGY_CONTRACT: &str = "GlpBlueberryFarmer";
pub const DEFAULT_ARTIFACTS_DIR: &str = "build/contracts";

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Upstream RPC the anvil fork is created from.
    pub fork_url: Option<String>,
    pub fork_block_number: Option<u64>,
    pub want: Address,
    pub want_proxy: Address,
    pub whale: Address,
    pub registry: Address,
    pub weth: Address,
    pub swap_router: Address,
    pub swap_quoter: Address,
    /// The deployer receives `whale_balance / whale_share_divisor`.
    pub whale_share_divisor: u64,
    pub fees: FeeConfig,
    pub artifacts_dir: PathBuf,
    pub vault_contract: String,
    pub strategy_contract: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            fork_url: None,
            fork_block_number: None,
            want: WANT,
            want_proxy: WANT_PROXY,
            whale: WHALE_ADDRESS,
            registry: REGISTRY,
            weth: WETH,
            swap_router: SWAP_ROUTER,
            swap_quoter: SWAP_QUOTER,
            whale_share_divisor: 5,
            fees: FeeConfig::default(),
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            vault_contract: VAULT_CONTRACT.to_string(),
            strategy_contract: STRATEGY_CONTRACT.to_string(),
        }
    }
}

/// On-disk shape of the TOML override file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    fork_url: Option<String>,
    fork_block_number: Option<u64>,
    want: Option<String>,
    want_proxy: Option<String>,
    whale: Option<String>,
    registry: Option<String>,
    weth: Option<String>,
    swap_router: Option<String>,
    swap_quoter: Option<String>,
    whale_share_divisor: Option<u64>,
    fees: Option<FeeConfig>,
    artifacts_dir: Option<PathBuf>,
    vault_contract: Option<String>,
    strategy_contract: Option<String>,
}

fn parse_address(field: &str, value: &str) -> Result<Address, HarnessError> {
    value
        .parse::<Address>()
        .map_err(|e| HarnessError::Config(format!("Invalid {field} address '{value}': {e}")))
}

fn override_address(
    target: &mut Address,
    field: &str,
    value: Option<&str>,
) -> Result<(), HarnessError> {
    if let Some(v) = value {
        *target = parse_address(field, v)?;
    }
    Ok(())
}

impl HarnessConfig {
    /// Defaults, then `HARNESS_CONFIG` file, then environment.
    pub fn load() -> Result<Self, HarnessError> {
        dotenvy::dotenv().ok();

        let mut config = match std::env::var("HARNESS_CONFIG") {
            Ok(path) => Self::from_toml_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::Config(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, HarnessError> {
        let file: FileConfig = toml::from_str(contents)
            .map_err(|e| HarnessError::Config(format!("Invalid harness TOML: {e}")))?;

        let mut config = Self::default();
        config.fork_url = file.fork_url.or(config.fork_url);
        config.fork_block_number = file.fork_block_number.or(config.fork_block_number);
        override_address(&mut config.want, "want", file.want.as_deref())?;
        override_address(&mut config.want_proxy, "want_proxy", file.want_proxy.as_deref())?;
        override_address(&mut config.whale, "whale", file.whale.as_deref())?;
        override_address(&mut config.registry, "registry", file.registry.as_deref())?;
        override_address(&mut config.weth, "weth", file.weth.as_deref())?;
        override_address(&mut config.swap_router, "swap_router", file.swap_router.as_deref())?;
        override_address(&mut config.swap_quoter, "swap_quoter", file.swap_quoter.as_deref())?;
        if let Some(divisor) = file.whale_share_divisor {
            config.whale_share_divisor = divisor;
        }
        if let Some(fees) = file.fees {
            config.fees = fees;
        }
        if let Some(dir) = file.artifacts_dir {
            config.artifacts_dir = dir;
        }
        if let Some(name) = file.vault_contract {
            config.vault_contract = name;
        }
        if let Some(name) = file.strategy_contract {
            config.strategy_contract = name;
        }
        Ok(config)
    }

    /// Apply environment overrides through `lookup` so tests need not touch
    /// the process environment.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), HarnessError> {
        if let Some(url) = lookup("FORK_RPC_URL").filter(|u| !u.is_empty()) {
            self.fork_url = Some(url);
        }
        if let Some(block) = lookup("FORK_BLOCK_NUMBER") {
            let number = block.parse::<u64>().map_err(|e| {
                HarnessError::Config(format!("Invalid FORK_BLOCK_NUMBER '{block}': {e}"))
            })?;
            self.fork_block_number = Some(number);
        }
        if let Some(dir) = lookup("HARNESS_ARTIFACTS_DIR") {
            self.artifacts_dir = PathBuf::from(dir);
        }
        override_address(&mut self.want, "HARNESS_WANT", lookup("HARNESS_WANT").as_deref())?;
        override_address(
            &mut self.want_proxy,
            "HARNESS_WANT_PROXY",
            lookup("HARNESS_WANT_PROXY").as_deref(),
        )?;
        override_address(&mut self.whale, "HARNESS_WHALE", lookup("HARNESS_WHALE").as_deref())?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.whale_share_divisor == 0 {
            return Err(HarnessError::Config(
                "whale_share_divisor must be at least 1".into(),
            ));
        }
        if let Some(url) = &self.fork_url {
            url.parse::<url::Url>()
                .map_err(|e| HarnessError::Config(format!("Invalid fork URL '{url}': {e}")))?;
        }
        self.fees.validate()
    }

    /// The fork URL, or a config error naming the variable to set.
    pub fn require_fork_url(&self) -> Result<&str, HarnessError> {
        self.fork_url
            .as_deref()
            .ok_or_else(|| HarnessError::Config("FORK_RPC_URL is not set".into()))
    }
}
