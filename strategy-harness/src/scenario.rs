//! Scenario steps: one vault or strategy operation wrapped in before/after
//! snapshots and followed by the matching invariant checks.

use alloy::primitives::{Address, U256};
use alloy::rpc::types::TransactionReceipt;
use alloy::sol_types::SolCall;

use crate::chain::ForkChain;
use crate::contracts::{IERC20Detailed, IStrategy, TheVault};
use crate::error::HarnessError;
use crate::events::HarvestEvents;
use crate::invariants::{
    DepositParams, WithdrawParams, confirm_deposit, confirm_earn, confirm_harvest_state,
    confirm_withdraw,
};
use crate::provision::DeployedSystem;
use crate::resolver::StrategyResolver;
use crate::snapshot::{ENTITY_USER, Snapshot, SnapshotDiff, Snapshotter, TOKEN_SHARES};

/// Result of one step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub before: Snapshot,
    pub after: Snapshot,
    pub receipt: TransactionReceipt,
    pub events: HarvestEvents,
}

/// Runs checked steps against a deployed system on behalf of one user.
pub struct ScenarioRunner<'a, R> {
    chain: &'a ForkChain,
    system: &'a DeployedSystem,
    resolver: R,
    user: Address,
    snapshotter: Snapshotter,
}

impl<'a, R: StrategyResolver> ScenarioRunner<'a, R> {
    pub async fn new(
        chain: &'a ForkChain,
        system: &'a DeployedSystem,
        resolver: R,
        user: Address,
    ) -> Result<Self, HarnessError> {
        let snapshotter = Snapshotter::new(
            chain,
            system.vault,
            system.strategy,
            system.want,
            user,
            resolver.destinations(),
            resolver.tracked_tokens(),
        )
        .await?;

        Ok(Self {
            chain,
            system,
            resolver,
            user,
            snapshotter,
        })
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub async fn snap(&self) -> Result<Snapshot, HarnessError> {
        self.snapshotter.snap(self.chain).await
    }

    /// Want held by the user right now.
    pub async fn want_balance(&self) -> Result<U256, HarnessError> {
        Ok(IERC20Detailed::new(self.system.want, self.chain.provider())
            .balanceOf(self.user)
            .call()
            .await?)
    }

    pub async fn available(&self) -> Result<U256, HarnessError> {
        Ok(TheVault::new(self.system.vault, self.chain.provider())
            .available()
            .call()
            .await?)
    }

    // ── Steps ───────────────────────────────────────────────────────────────

    pub async fn deposit(&self, amount: U256) -> Result<StepOutcome, HarnessError> {
        self.ensure_approved(amount).await?;

        let outcome = self
            .step(
                "deposit",
                self.user,
                self.system.vault,
                TheVault::depositCall { amount },
            )
            .await?;

        let params = DepositParams {
            user: self.user,
            amount,
        };
        confirm_deposit(&outcome.before, &outcome.after, &params)?;
        self.resolver
            .hook_after_confirm_deposit(&outcome.before, &outcome.after, &params)?;
        Ok(outcome)
    }

    pub async fn earn(&self) -> Result<StepOutcome, HarnessError> {
        let outcome = self
            .step(
                "earn",
                self.system.accounts.governance,
                self.system.vault,
                TheVault::earnCall {},
            )
            .await?;

        confirm_earn(&outcome.before, &outcome.after)?;
        self.resolver.hook_after_earn(&outcome.before, &outcome.after)?;
        Ok(outcome)
    }

    pub async fn harvest(&self) -> Result<StepOutcome, HarnessError> {
        let outcome = self
            .step(
                "harvest",
                self.system.accounts.governance,
                self.system.strategy,
                IStrategy::harvestCall {},
            )
            .await?;

        confirm_harvest_state(&outcome.before, &outcome.after)?;
        self.resolver
            .confirm_harvest(&outcome.before, &outcome.after, &outcome.events)?;
        Ok(outcome)
    }

    pub async fn tend(&self) -> Result<StepOutcome, HarnessError> {
        let outcome = self
            .step(
                "tend",
                self.system.accounts.governance,
                self.system.strategy,
                IStrategy::tendCall {},
            )
            .await?;

        self.resolver
            .confirm_tend(&outcome.before, &outcome.after, &outcome.events)?;
        Ok(outcome)
    }

    pub async fn withdraw(&self, shares: U256) -> Result<StepOutcome, HarnessError> {
        let outcome = self
            .step(
                "withdraw",
                self.user,
                self.system.vault,
                TheVault::withdrawCall { shares },
            )
            .await?;
        self.confirm_withdrawal(&outcome, shares)?;
        Ok(outcome)
    }

    pub async fn withdraw_all(&self) -> Result<StepOutcome, HarnessError> {
        let outcome = self
            .step(
                "withdrawAll",
                self.user,
                self.system.vault,
                TheVault::withdrawAllCall {},
            )
            .await?;
        let shares = outcome.before.balance(TOKEN_SHARES, ENTITY_USER);
        self.confirm_withdrawal(&outcome, shares)?;
        Ok(outcome)
    }

    pub async fn sleep(&self, seconds: u64) -> Result<(), HarnessError> {
        self.chain.sleep(seconds).await
    }

    pub async fn mine(&self, blocks: u64) -> Result<(), HarnessError> {
        self.chain.mine(blocks).await
    }

    /// Deposit half of the user's want and push it to the strategy. Returns
    /// the deposited amount.
    pub async fn setup_share_math(&self) -> Result<U256, HarnessError> {
        let amount = self.want_balance().await? / U256::from(2u64);
        if amount.is_zero() {
            return Err(HarnessError::Setup(format!(
                "user {} has no want to deposit",
                self.user
            )));
        }
        self.deposit(amount).await?;
        self.earn().await?;
        Ok(amount)
    }

    // ── Internals ───────────────────────────────────────────────────────────

    /// Approve the vault on the want proxy for the maximum amount unless the
    /// on-chain allowance already covers `amount`. A checkpoint revert can
    /// undo an earlier approval.
    async fn ensure_approved(&self, amount: U256) -> Result<(), HarnessError> {
        let allowance = IERC20Detailed::new(self.system.want_proxy, self.chain.provider())
            .allowance(self.user, self.system.vault)
            .call()
            .await?;
        if allowance >= amount {
            return Ok(());
        }
        self.chain
            .transact(
                self.user,
                self.system.want_proxy,
                IERC20Detailed::approveCall {
                    spender: self.system.vault,
                    amount: U256::MAX,
                },
            )
            .await?;
        tracing::debug!(user = %self.user, vault = %self.system.vault, "Approved vault");
        Ok(())
    }

    fn confirm_withdrawal(&self, outcome: &StepOutcome, shares: U256) -> Result<(), HarnessError> {
        let params = WithdrawParams {
            user: self.user,
            shares,
        };
        confirm_withdraw(&outcome.before, &outcome.after, &params)?;
        self.resolver
            .hook_after_confirm_withdraw(&outcome.before, &outcome.after, &params)
    }

    async fn step<C: SolCall>(
        &self,
        label: &str,
        from: Address,
        to: Address,
        call: C,
    ) -> Result<StepOutcome, HarnessError> {
        let before = self.snap().await?;
        let receipt = self.chain.transact(from, to, call).await?;
        let after = self.snap().await?;
        let events = HarvestEvents::from_receipt(&receipt);

        let diff = SnapshotDiff::between(&before, &after);
        tracing::info!(
            step = label,
            tx = %receipt.transaction_hash,
            changed = diff.changed().count(),
            "Step complete\n{diff}"
        );

        Ok(StepOutcome {
            before,
            after,
            receipt,
            events,
        })
    }
}
