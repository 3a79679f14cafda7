use std::sync::Once;
use std::time::Duration;

use anyhow::Result;
use once_cell::sync::Lazy;
use tokio::sync::Mutex as AsyncMutex;

use strategy_harness::{Fixture, GlpFarmerResolver, HarnessConfig, ScenarioRunner};

pub const FORK_TEST_TIMEOUT: Duration = Duration::from_secs(900);

/// Seconds per time advance in the reward scenarios.
pub const SLEEP_SECONDS: u64 = 130_000;

/// One forking anvil at a time.
pub static HARNESS_LOCK: Lazy<AsyncMutex<()>> = Lazy::new(|| AsyncMutex::new(()));
static LOG_INIT: Once = Once::new();

pub fn setup_log() {
    LOG_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "strategy_harness=info".into()),
            )
            .try_init();
    });
}

/// Provision a fresh fork from the environment.
///
/// Returns `None` if the fork URL or compiled artifacts are missing (graceful skip).
pub async fn fixture() -> Result<Option<Fixture>> {
    let config = HarnessConfig::load()?;
    match Fixture::setup(config).await {
        Ok(fixture) => Ok(Some(fixture)),
        Err(err) if err.is_missing_environment() => {
            eprintln!("Skipping fork test: {err}");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

/// Runner acting as the deployer, who holds the whale's want.
pub async fn deployer_runner(fixture: &Fixture) -> Result<ScenarioRunner<'_, GlpFarmerResolver>> {
    let resolver = GlpFarmerResolver::load(
        &fixture.chain,
        fixture.system.vault,
        fixture.system.strategy,
        fixture.system.want,
    )
    .await?;
    Ok(ScenarioRunner::new(
        &fixture.chain,
        &fixture.system,
        resolver,
        fixture.system.accounts.deployer,
    )
    .await?)
}
