//! Fixture provisioning: fund the deployer from a whale, deploy the vault and
//! strategy, and wire them together.

use alloy::primitives::{Address, U256};

use crate::accounts::Accounts;
use crate::artifacts::load_bytecode;
use crate::chain::ForkChain;
use crate::config::HarnessConfig;
use crate::contracts::{IERC20Detailed, IStrategy, TheVault};
use crate::error::HarnessError;
use crate::fees::FeeConfig;

/// A deployed and wired vault/strategy pair.
#[derive(Debug, Clone)]
pub struct DeployedSystem {
    pub vault: Address,
    pub strategy: Address,
    pub want: Address,
    pub want_proxy: Address,
    pub fees: FeeConfig,
    pub accounts: Accounts,
    /// Want moved from the whale to the deployer.
    pub funded: U256,
}

/// Move `whale_balance / whale_share_divisor` of the want from the whale to
/// the deployer. Returns the amount moved.
pub async fn fund_from_whale(
    chain: &ForkChain,
    config: &HarnessConfig,
) -> Result<U256, HarnessError> {
    let deployer = chain.accounts().deployer;
    let want = IERC20Detailed::new(config.want, chain.provider());

    let whale_balance = want.balanceOf(config.whale).call().await?;
    if whale_balance.is_zero() {
        return Err(HarnessError::Setup(format!(
            "Whale {} holds no {} at this fork block",
            config.whale, config.want
        )));
    }
    let amount = whale_balance / U256::from(config.whale_share_divisor);

    chain.impersonate(config.whale).await?;
    let transfer = pull_from_whale(chain, config, deployer, whale_balance, amount).await;
    // Release the whale on both paths; the transfer error takes precedence.
    let released = chain.stop_impersonating(config.whale).await;
    transfer?;
    released?;

    let funded = want.balanceOf(deployer).call().await?;
    if funded.is_zero() {
        return Err(HarnessError::Setup(
            "Deployer received no want from the whale".into(),
        ));
    }

    tracing::info!(
        whale = %config.whale,
        %deployer,
        whale_balance = %whale_balance,
        amount = %funded,
        "Funded deployer from whale"
    );
    Ok(funded)
}

async fn pull_from_whale(
    chain: &ForkChain,
    config: &HarnessConfig,
    deployer: Address,
    whale_balance: U256,
    amount: U256,
) -> Result<(), HarnessError> {
    chain
        .transact(
            config.whale,
            config.want_proxy,
            IERC20Detailed::approveCall {
                spender: deployer,
                amount: whale_balance,
            },
        )
        .await?;
    chain
        .transact(
            deployer,
            config.want_proxy,
            IERC20Detailed::transferFromCall {
                from: config.whale,
                to: deployer,
                amount,
            },
        )
        .await?;
    Ok(())
}

/// Deploy and wire the vault and strategy named in `config`.
///
/// Any revert during deployment or wiring becomes a [`HarnessError::Setup`].
pub async fn deploy_system(
    chain: &ForkChain,
    config: &HarnessConfig,
    funded: U256,
) -> Result<DeployedSystem, HarnessError> {
    config.fees.validate()?;

    // Both artifacts load before anything is sent.
    let vault_code = load_bytecode(&config.artifacts_dir, &config.vault_contract)?;
    let strategy_code = load_bytecode(&config.artifacts_dir, &config.strategy_contract)?;

    wire(chain, config, vault_code, strategy_code, funded)
        .await
        .map_err(|e| match e {
            HarnessError::Reverted { call, reason } => {
                HarnessError::Setup(format!("{call} reverted during deployment: {reason}"))
            }
            other => other,
        })
}

async fn wire(
    chain: &ForkChain,
    config: &HarnessConfig,
    vault_code: Vec<u8>,
    strategy_code: Vec<u8>,
    funded: U256,
) -> Result<DeployedSystem, HarnessError> {
    let accounts = chain.accounts().clone();

    let vault = chain
        .deploy(accounts.deployer, vault_code, Vec::new(), &config.vault_contract)
        .await?;
    chain
        .transact(
            accounts.deployer,
            vault,
            TheVault::initializeCall {
                token: config.want,
                governance: accounts.governance,
                keeper: accounts.keeper,
                guardian: accounts.guardian,
                // Fees are paid to governance.
                treasury: accounts.governance,
                strategist: accounts.strategist,
                badgerTree: accounts.reward_distributor,
                name: String::new(),
                symbol: String::new(),
                feeConfig: config.fees.as_initialize_args(),
            },
        )
        .await?;
    chain
        .transact(
            accounts.governance,
            vault,
            TheVault::setStrategistCall {
                strategist: accounts.deployer,
            },
        )
        .await?;
    tracing::info!(%vault, "Vault deployed and initialized");

    let strategy = chain
        .deploy(
            accounts.deployer,
            strategy_code,
            Vec::new(),
            &config.strategy_contract,
        )
        .await?;
    chain
        .transact(
            accounts.deployer,
            strategy,
            IStrategy::initializeCall {
                vault,
                swapConfig: [config.swap_router, config.swap_quoter],
            },
        )
        .await?;
    chain
        .transact(accounts.governance, vault, TheVault::setStrategyCall { strategy })
        .await?;

    let linked = TheVault::new(vault, chain.provider()).strategy().call().await?;
    let back = IStrategy::new(strategy, chain.provider()).vault().call().await?;
    if linked != strategy || back != vault {
        return Err(HarnessError::Setup(format!(
            "vault {vault} and strategy {strategy} are not linked (vault.strategy = {linked}, strategy.vault = {back})"
        )));
    }
    tracing::info!(%strategy, "Strategy deployed and linked");

    Ok(DeployedSystem {
        vault,
        strategy,
        want: config.want,
        want_proxy: config.want_proxy,
        fees: config.fees,
        accounts,
        funded,
    })
}

/// One test's worth of state: a fresh fork with a funded, wired system.
pub struct Fixture {
    pub config: HarnessConfig,
    pub chain: ForkChain,
    pub system: DeployedSystem,
}

impl Fixture {
    /// Load config from the environment and provision a fresh fork.
    pub async fn from_env() -> Result<Self, HarnessError> {
        Self::setup(HarnessConfig::load()?).await
    }

    pub async fn setup(config: HarnessConfig) -> Result<Self, HarnessError> {
        // Check artifacts before paying for a fork.
        load_bytecode(&config.artifacts_dir, &config.vault_contract)?;
        load_bytecode(&config.artifacts_dir, &config.strategy_contract)?;

        let chain = ForkChain::spawn(&config).await?;
        tracing::debug!(registry = %config.registry, "Using registry");

        let funded = fund_from_whale(&chain, &config).await?;
        let system = deploy_system(&chain, &config, funded).await?;

        Ok(Self {
            config,
            chain,
            system,
        })
    }
}
