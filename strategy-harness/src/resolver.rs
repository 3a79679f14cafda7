//! Strategy-specific knowledge layered on top of the generic invariants.

use alloy::primitives::Address;

use crate::chain::ForkChain;
use crate::contracts::{IGlpFarmer, TheVault};
use crate::error::HarnessError;
use crate::events::HarvestEvents;
use crate::invariants::{
    DepositParams, WithdrawParams, confirm_fee_recipients_credited, confirm_harvested_event,
    confirm_no_residual, confirm_single_distribution,
};
use crate::snapshot::{Entity, Snapshot};

/// Common trait for per-strategy resolvers
pub trait StrategyResolver {
    /// Extra balance holders the snapshotter should track
    fn destinations(&self) -> Vec<Entity>;

    /// Extra tokens the snapshotter should track, by name
    fn tracked_tokens(&self) -> Vec<(String, Address)>;

    fn hook_after_confirm_deposit(
        &self,
        _before: &Snapshot,
        _after: &Snapshot,
        _params: &DepositParams,
    ) -> Result<(), HarnessError> {
        Ok(())
    }

    fn hook_after_confirm_withdraw(
        &self,
        _before: &Snapshot,
        _after: &Snapshot,
        _params: &WithdrawParams,
    ) -> Result<(), HarnessError> {
        Ok(())
    }

    fn hook_after_earn(&self, _before: &Snapshot, _after: &Snapshot) -> Result<(), HarnessError> {
        Ok(())
    }

    /// Strategy-specific harvest checks, run after the generic ones
    fn confirm_harvest(
        &self,
        before: &Snapshot,
        after: &Snapshot,
        events: &HarvestEvents,
    ) -> Result<(), HarnessError>;

    fn confirm_tend(
        &self,
        _before: &Snapshot,
        _after: &Snapshot,
        _events: &HarvestEvents,
    ) -> Result<(), HarnessError> {
        Ok(())
    }
}

pub const TOKEN_GMX: &str = "gmx";
pub const TOKEN_ES_GMX: &str = "esGmx";
pub const TOKEN_WETH: &str = "weth";

pub const ENTITY_VESTER: &str = "vester";
pub const ENTITY_BADGER_TREE: &str = "badgerTree";

/// Resolver for the GLP farmer: autocompounds GMX rewards into GLP and
/// streams WETH rewards to the badger tree.
#[derive(Debug, Clone)]
pub struct GlpFarmerResolver {
    pub want: Address,
    /// Token the distribution event must name (`strategy.WETH()`).
    pub reward: Address,
    pub vester: Address,
    pub badger_tree: Address,
    pub gmx: Address,
    pub es_gmx: Address,
    pub weth: Address,
}

impl GlpFarmerResolver {
    /// Read the strategy's token and destination addresses from the fork.
    pub async fn load(
        chain: &ForkChain,
        vault: Address,
        strategy: Address,
        want: Address,
    ) -> Result<Self, HarnessError> {
        let farmer = IGlpFarmer::new(strategy, chain.provider());
        let vault = TheVault::new(vault, chain.provider());

        let resolver = Self {
            want,
            reward: farmer.WETH().call().await?,
            vester: farmer.vester().call().await?,
            badger_tree: vault.badgerTree().call().await?,
            gmx: farmer.GMX_ADDRESS().call().await?,
            es_gmx: farmer.ES_GMX_ADDRESS().call().await?,
            weth: farmer.WETH_ADDRESS().call().await?,
        };
        tracing::debug!(?resolver, "Resolver loaded");
        Ok(resolver)
    }
}

impl StrategyResolver for GlpFarmerResolver {
    fn destinations(&self) -> Vec<Entity> {
        vec![
            Entity::new(ENTITY_VESTER, self.vester),
            Entity::new(ENTITY_BADGER_TREE, self.badger_tree),
        ]
    }

    fn tracked_tokens(&self) -> Vec<(String, Address)> {
        vec![
            (TOKEN_GMX.to_string(), self.gmx),
            (TOKEN_ES_GMX.to_string(), self.es_gmx),
            (TOKEN_WETH.to_string(), self.weth),
        ]
    }

    fn confirm_harvest(
        &self,
        before: &Snapshot,
        after: &Snapshot,
        events: &HarvestEvents,
    ) -> Result<(), HarnessError> {
        confirm_harvested_event(before, after, events, self.want)?;

        let distribution = confirm_single_distribution(events, self.reward)?;
        tracing::info!(
            token = %distribution.token,
            amount = %distribution.amount,
            "TreeDistribution"
        );
        confirm_fee_recipients_credited(before, after, TOKEN_WETH)?;

        // Everything claimed is either compounded or forwarded.
        confirm_no_residual(after, &[TOKEN_WETH, TOKEN_ES_GMX, TOKEN_GMX])
    }
}
