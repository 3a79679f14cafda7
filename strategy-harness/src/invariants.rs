//! Invariants checked against a before/after snapshot pair.
//!
//! The `confirm_*` functions are the generic checks every vault/strategy pair
//! must pass. The harvest helpers below them are building blocks resolvers
//! compose into their strategy-specific harvest checks.

use alloy::primitives::{Address, U256};

use crate::ensure_invariant;
use crate::error::HarnessError;
use crate::events::{HarvestEvents, TokenAmount};
use crate::fees::gains_proportional;
use crate::snapshot::{
    ENTITY_STRATEGIST, ENTITY_STRATEGY, ENTITY_TREASURY, ENTITY_USER, ENTITY_VAULT, Scalar,
    Snapshot, TOKEN_SHARES, TOKEN_WANT, gain,
};

#[derive(Debug, Clone, Copy)]
pub struct DepositParams {
    pub user: Address,
    pub amount: U256,
}

#[derive(Debug, Clone, Copy)]
pub struct WithdrawParams {
    pub user: Address,
    pub shares: U256,
}

pub fn confirm_deposit(
    before: &Snapshot,
    after: &Snapshot,
    params: &DepositParams,
) -> Result<(), HarnessError> {
    let user_spent = before
        .balance(TOKEN_WANT, ENTITY_USER)
        .checked_sub(after.balance(TOKEN_WANT, ENTITY_USER));
    ensure_invariant!(
        user_spent == Some(params.amount),
        "deposit.user_want",
        "user {} want went from {} to {}, expected a decrease of {}",
        params.user,
        before.balance(TOKEN_WANT, ENTITY_USER),
        after.balance(TOKEN_WANT, ENTITY_USER),
        params.amount
    );

    let vault_gain = gain(
        before.balance(TOKEN_WANT, ENTITY_VAULT),
        after.balance(TOKEN_WANT, ENTITY_VAULT),
    );
    ensure_invariant!(
        vault_gain == Some(params.amount),
        "deposit.vault_want",
        "vault want moved by {:?}, expected +{}",
        vault_gain,
        params.amount
    );

    ensure_invariant!(
        after.balance(TOKEN_SHARES, ENTITY_USER) > before.balance(TOKEN_SHARES, ENTITY_USER),
        "deposit.user_shares",
        "user shares did not increase ({} -> {})",
        before.balance(TOKEN_SHARES, ENTITY_USER),
        after.balance(TOKEN_SHARES, ENTITY_USER)
    );
    Ok(())
}

/// Earn moves exactly `available()` from the vault into the strategy.
pub fn confirm_earn(before: &Snapshot, after: &Snapshot) -> Result<(), HarnessError> {
    let available = before.get(Scalar::VaultAvailable);

    let vault_spent = before
        .balance(TOKEN_WANT, ENTITY_VAULT)
        .checked_sub(after.balance(TOKEN_WANT, ENTITY_VAULT));
    ensure_invariant!(
        vault_spent == Some(available),
        "earn.vault_want",
        "vault want decreased by {:?}, expected available() = {}",
        vault_spent,
        available
    );

    if !available.is_zero() {
        ensure_invariant!(
            after.get(Scalar::StrategyBalanceOf) > before.get(Scalar::StrategyBalanceOf),
            "earn.strategy_balance",
            "strategy.balanceOf did not increase ({} -> {})",
            before.get(Scalar::StrategyBalanceOf),
            after.get(Scalar::StrategyBalanceOf)
        );
    }
    Ok(())
}

pub fn confirm_withdraw(
    before: &Snapshot,
    after: &Snapshot,
    params: &WithdrawParams,
) -> Result<(), HarnessError> {
    let burned = before
        .balance(TOKEN_SHARES, ENTITY_USER)
        .checked_sub(after.balance(TOKEN_SHARES, ENTITY_USER));
    ensure_invariant!(
        burned == Some(params.shares),
        "withdraw.user_shares",
        "user {} shares decreased by {:?}, expected {}",
        params.user,
        burned,
        params.shares
    );

    if !params.shares.is_zero() {
        ensure_invariant!(
            after.balance(TOKEN_WANT, ENTITY_USER) > before.balance(TOKEN_WANT, ENTITY_USER),
            "withdraw.user_want",
            "user want did not increase ({} -> {})",
            before.balance(TOKEN_WANT, ENTITY_USER),
            after.balance(TOKEN_WANT, ENTITY_USER)
        );
    }
    Ok(())
}

/// Harvest never shrinks the strategy's position, and without a management
/// fee it never lowers the share price.
pub fn confirm_harvest_state(before: &Snapshot, after: &Snapshot) -> Result<(), HarnessError> {
    ensure_invariant!(
        after.get(Scalar::StrategyBalanceOf) >= before.get(Scalar::StrategyBalanceOf),
        "harvest.strategy_balance",
        "strategy.balanceOf decreased ({} -> {})",
        before.get(Scalar::StrategyBalanceOf),
        after.get(Scalar::StrategyBalanceOf)
    );

    if before.get(Scalar::ManagementFee).is_zero() {
        ensure_invariant!(
            after.get(Scalar::PricePerFullShare) >= before.get(Scalar::PricePerFullShare),
            "harvest.share_price",
            "share price decreased ({} -> {})",
            before.get(Scalar::PricePerFullShare),
            after.get(Scalar::PricePerFullShare)
        );
    }
    Ok(())
}

// ── Harvest building blocks ─────────────────────────────────────────────────

/// Recipients of nonzero performance fees gained `token`; when both rates are
/// set, their gains are in proportion to the rates.
pub fn confirm_fee_recipients_credited(
    before: &Snapshot,
    after: &Snapshot,
    token: &str,
) -> Result<(), HarnessError> {
    let governance_bps = before.get(Scalar::PerformanceFeeGovernance);
    let strategist_bps = before.get(Scalar::PerformanceFeeStrategist);

    let treasury_gain = gain(
        before.balance(token, ENTITY_TREASURY),
        after.balance(token, ENTITY_TREASURY),
    );
    let strategist_gain = gain(
        before.balance(token, ENTITY_STRATEGIST),
        after.balance(token, ENTITY_STRATEGIST),
    );

    if !governance_bps.is_zero() {
        ensure_invariant!(
            treasury_gain.is_some_and(|g| !g.is_zero()),
            "harvest.treasury_fee",
            "treasury {token} balance did not increase with a {governance_bps} bps governance fee"
        );
    }
    if !strategist_bps.is_zero() {
        ensure_invariant!(
            strategist_gain.is_some_and(|g| !g.is_zero()),
            "harvest.strategist_fee",
            "strategist {token} balance did not increase with a {strategist_bps} bps strategist fee"
        );
    }

    // Treasury and strategist can be the same account, in which case the
    // split is not observable.
    let distinct = match (
        before.address(ENTITY_TREASURY),
        before.address(ENTITY_STRATEGIST),
    ) {
        (Some(treasury), Some(strategist)) => treasury != strategist,
        _ => true,
    };
    if let (Some(tg), Some(sg), Ok(gb), Ok(sb)) = (
        treasury_gain,
        strategist_gain,
        u64::try_from(governance_bps),
        u64::try_from(strategist_bps),
    ) {
        if gb > 0 && sb > 0 && distinct {
            ensure_invariant!(
                gains_proportional(tg, gb, sg, sb),
                "harvest.fee_split",
                "{token} fee gains {tg} (treasury, {gb} bps) and {sg} (strategist, {sb} bps) are not proportional"
            );
        }
    }
    Ok(())
}

/// At most one `Harvested` event. A missing event is only logged. When the
/// event reports a gain, the vault grew by exactly that amount, the share
/// price rose and fee recipients were paid in shares.
pub fn confirm_harvested_event(
    before: &Snapshot,
    after: &Snapshot,
    events: &HarvestEvents,
    want: Address,
) -> Result<Option<TokenAmount>, HarnessError> {
    let Some(event) = events.harvested.first().copied() else {
        tracing::info!("No Harvested event");
        return Ok(None);
    };

    ensure_invariant!(
        events.harvested.len() == 1,
        "harvest.harvested_count",
        "expected at most one Harvested event, got {}",
        events.harvested.len()
    );
    ensure_invariant!(
        event.token == want,
        "harvest.harvested_token",
        "Harvested token {} is not the want {}",
        event.token,
        want
    );

    if event.amount.is_zero() {
        return Ok(Some(event));
    }

    let vault_gain = gain(before.get(Scalar::VaultBalance), after.get(Scalar::VaultBalance));
    ensure_invariant!(
        vault_gain == Some(event.amount),
        "harvest.vault_gain",
        "Harvested reports {} but sett.balance moved by {:?}",
        event.amount,
        vault_gain
    );
    ensure_invariant!(
        after.get(Scalar::PricePerFullShare) > before.get(Scalar::PricePerFullShare),
        "harvest.value_gained",
        "share price did not increase ({} -> {}) despite a harvest of {}",
        before.get(Scalar::PricePerFullShare),
        after.get(Scalar::PricePerFullShare),
        event.amount
    );
    confirm_fee_recipients_credited(before, after, TOKEN_SHARES)?;

    Ok(Some(event))
}

/// Exactly one `TreeDistribution` event, for `token`, with a nonzero amount.
pub fn confirm_single_distribution(
    events: &HarvestEvents,
    token: Address,
) -> Result<TokenAmount, HarnessError> {
    ensure_invariant!(
        events.tree_distributions.len() == 1,
        "harvest.distribution_count",
        "expected exactly one TreeDistribution event, got {}",
        events.tree_distributions.len()
    );
    let event = events.tree_distributions[0];
    ensure_invariant!(
        event.token == token,
        "harvest.distribution_token",
        "TreeDistribution token {} is not {}",
        event.token,
        token
    );
    ensure_invariant!(
        !event.amount.is_zero(),
        "harvest.distribution_amount",
        "TreeDistribution of {} has zero amount",
        event.token
    );
    Ok(event)
}

/// The strategy holds none of `tokens`. Each must have been captured.
pub fn confirm_no_residual(after: &Snapshot, tokens: &[&str]) -> Result<(), HarnessError> {
    for token in tokens {
        ensure_invariant!(
            after.has_balance(token, ENTITY_STRATEGY),
            "harvest.residual_tracked",
            "strategy balance of {token} was not captured"
        );
        let left = after.balance(token, ENTITY_STRATEGY);
        ensure_invariant!(
            left.is_zero(),
            "harvest.residual",
            "strategy left {left} {token} behind"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: Address = Address::with_last_byte(0x09);
    const WANT: Address = Address::with_last_byte(0x01);
    const WETH: Address = Address::with_last_byte(0x02);

    fn u(n: u64) -> U256 {
        U256::from(n)
    }

    fn fees(governance: u64, strategist: u64) -> Snapshot {
        Snapshot::default()
            .with_scalar(Scalar::PerformanceFeeGovernance, u(governance))
            .with_scalar(Scalar::PerformanceFeeStrategist, u(strategist))
    }

    fn expect_check(result: Result<impl std::fmt::Debug, HarnessError>, expected: &str) {
        match result {
            Err(HarnessError::Invariant { check, .. }) => assert_eq!(check, expected),
            other => panic!("expected invariant {expected}, got {other:?}"),
        }
    }

    // ── deposit / earn / withdraw ───────────────────────────────────────────

    #[test]
    fn test_deposit_ok() {
        let before = Snapshot::default()
            .with_balance(TOKEN_WANT, ENTITY_USER, u(1_000))
            .with_balance(TOKEN_WANT, ENTITY_VAULT, u(0))
            .with_balance(TOKEN_SHARES, ENTITY_USER, u(0));
        let after = Snapshot::default()
            .with_balance(TOKEN_WANT, ENTITY_USER, u(600))
            .with_balance(TOKEN_WANT, ENTITY_VAULT, u(400))
            .with_balance(TOKEN_SHARES, ENTITY_USER, u(400));
        let params = DepositParams { user: USER, amount: u(400) };
        assert!(confirm_deposit(&before, &after, &params).is_ok());
    }

    #[test]
    fn test_deposit_wrong_vault_amount() {
        let before = Snapshot::default().with_balance(TOKEN_WANT, ENTITY_USER, u(1_000));
        let after = Snapshot::default()
            .with_balance(TOKEN_WANT, ENTITY_USER, u(600))
            .with_balance(TOKEN_WANT, ENTITY_VAULT, u(399))
            .with_balance(TOKEN_SHARES, ENTITY_USER, u(400));
        let params = DepositParams { user: USER, amount: u(400) };
        expect_check(confirm_deposit(&before, &after, &params), "deposit.vault_want");
    }

    #[test]
    fn test_deposit_without_shares() {
        let before = Snapshot::default().with_balance(TOKEN_WANT, ENTITY_USER, u(1_000));
        let after = Snapshot::default()
            .with_balance(TOKEN_WANT, ENTITY_USER, u(600))
            .with_balance(TOKEN_WANT, ENTITY_VAULT, u(400));
        let params = DepositParams { user: USER, amount: u(400) };
        expect_check(confirm_deposit(&before, &after, &params), "deposit.user_shares");
    }

    #[test]
    fn test_earn_moves_available() {
        let before = Snapshot::default()
            .with_scalar(Scalar::VaultAvailable, u(950))
            .with_scalar(Scalar::StrategyBalanceOf, u(0))
            .with_balance(TOKEN_WANT, ENTITY_VAULT, u(1_000));
        let after = Snapshot::default()
            .with_scalar(Scalar::StrategyBalanceOf, u(950))
            .with_balance(TOKEN_WANT, ENTITY_VAULT, u(50));
        assert!(confirm_earn(&before, &after).is_ok());
    }

    #[test]
    fn test_earn_moving_too_much() {
        let before = Snapshot::default()
            .with_scalar(Scalar::VaultAvailable, u(950))
            .with_balance(TOKEN_WANT, ENTITY_VAULT, u(1_000));
        let after = Snapshot::default()
            .with_scalar(Scalar::StrategyBalanceOf, u(1_000))
            .with_balance(TOKEN_WANT, ENTITY_VAULT, u(0));
        expect_check(confirm_earn(&before, &after), "earn.vault_want");
    }

    #[test]
    fn test_earn_with_nothing_available() {
        let before = Snapshot::default().with_balance(TOKEN_WANT, ENTITY_VAULT, u(0));
        let after = before.clone();
        assert!(confirm_earn(&before, &after).is_ok());
    }

    #[test]
    fn test_withdraw_ok() {
        let before = Snapshot::default()
            .with_balance(TOKEN_SHARES, ENTITY_USER, u(400))
            .with_balance(TOKEN_WANT, ENTITY_USER, u(600));
        let after = Snapshot::default()
            .with_balance(TOKEN_SHARES, ENTITY_USER, u(100))
            .with_balance(TOKEN_WANT, ENTITY_USER, u(899));
        let params = WithdrawParams { user: USER, shares: u(300) };
        assert!(confirm_withdraw(&before, &after, &params).is_ok());
    }

    #[test]
    fn test_withdraw_without_payout() {
        let before = Snapshot::default()
            .with_balance(TOKEN_SHARES, ENTITY_USER, u(400))
            .with_balance(TOKEN_WANT, ENTITY_USER, u(600));
        let after = Snapshot::default()
            .with_balance(TOKEN_SHARES, ENTITY_USER, u(100))
            .with_balance(TOKEN_WANT, ENTITY_USER, u(600));
        let params = WithdrawParams { user: USER, shares: u(300) };
        expect_check(confirm_withdraw(&before, &after, &params), "withdraw.user_want");
    }

    // ── harvest ─────────────────────────────────────────────────────────────

    #[test]
    fn test_harvest_state_share_price_drop() {
        let before = Snapshot::default().with_scalar(Scalar::PricePerFullShare, u(1_000));
        let after = Snapshot::default().with_scalar(Scalar::PricePerFullShare, u(999));
        expect_check(confirm_harvest_state(&before, &after), "harvest.share_price");
    }

    #[test]
    fn test_harvest_state_tolerates_price_drop_with_management_fee() {
        let before = Snapshot::default()
            .with_scalar(Scalar::ManagementFee, u(200))
            .with_scalar(Scalar::PricePerFullShare, u(1_000));
        let after = Snapshot::default().with_scalar(Scalar::PricePerFullShare, u(999));
        assert!(confirm_harvest_state(&before, &after).is_ok());
    }

    #[test]
    fn test_missing_harvested_event_is_tolerated() {
        let snap = Snapshot::default();
        let result = confirm_harvested_event(&snap, &snap, &HarvestEvents::default(), WANT);
        assert_eq!(result.unwrap(), None);
    }

    #[test]
    fn test_two_harvested_events_fail() {
        let snap = Snapshot::default();
        let event = TokenAmount { token: WANT, amount: u(0) };
        let events = HarvestEvents {
            harvested: vec![event, event],
            tree_distributions: vec![],
        };
        expect_check(
            confirm_harvested_event(&snap, &snap, &events, WANT),
            "harvest.harvested_count",
        );
    }

    #[test]
    fn test_harvested_zero_amount_skips_value_checks() {
        let snap = Snapshot::default();
        let events = HarvestEvents {
            harvested: vec![TokenAmount { token: WANT, amount: u(0) }],
            tree_distributions: vec![],
        };
        assert!(confirm_harvested_event(&snap, &snap, &events, WANT).is_ok());
    }

    #[test]
    fn test_harvested_gain_checks_vault_price_and_fees() {
        let before = fees(2_000, 0)
            .with_scalar(Scalar::VaultBalance, u(10_000))
            .with_scalar(Scalar::PricePerFullShare, u(1_000))
            .with_balance(TOKEN_SHARES, ENTITY_TREASURY, u(0));
        let after = fees(2_000, 0)
            .with_scalar(Scalar::VaultBalance, u(10_500))
            .with_scalar(Scalar::PricePerFullShare, u(1_040))
            .with_balance(TOKEN_SHARES, ENTITY_TREASURY, u(96));
        let events = HarvestEvents {
            harvested: vec![TokenAmount { token: WANT, amount: u(500) }],
            tree_distributions: vec![],
        };
        assert!(confirm_harvested_event(&before, &after, &events, WANT).is_ok());

        let flat_price = after.clone().with_scalar(Scalar::PricePerFullShare, u(1_000));
        expect_check(
            confirm_harvested_event(&before, &flat_price, &events, WANT),
            "harvest.value_gained",
        );

        let unpaid = after.clone().with_balance(TOKEN_SHARES, ENTITY_TREASURY, u(0));
        expect_check(
            confirm_harvested_event(&before, &unpaid, &events, WANT),
            "harvest.treasury_fee",
        );

        let short = after.with_scalar(Scalar::VaultBalance, u(10_499));
        expect_check(
            confirm_harvested_event(&before, &short, &events, WANT),
            "harvest.vault_gain",
        );
    }

    #[test]
    fn test_harvested_wrong_token() {
        let snap = Snapshot::default();
        let events = HarvestEvents {
            harvested: vec![TokenAmount { token: WETH, amount: u(1) }],
            tree_distributions: vec![],
        };
        expect_check(
            confirm_harvested_event(&snap, &snap, &events, WANT),
            "harvest.harvested_token",
        );
    }

    #[test]
    fn test_fee_split_must_be_proportional() {
        let before = fees(2_000, 1_000)
            .with_balance("weth", ENTITY_TREASURY, u(0))
            .with_balance("weth", ENTITY_STRATEGIST, u(0));
        let proportional = fees(2_000, 1_000)
            .with_balance("weth", ENTITY_TREASURY, u(200))
            .with_balance("weth", ENTITY_STRATEGIST, u(100));
        assert!(confirm_fee_recipients_credited(&before, &proportional, "weth").is_ok());

        let skewed = fees(2_000, 1_000)
            .with_balance("weth", ENTITY_TREASURY, u(100))
            .with_balance("weth", ENTITY_STRATEGIST, u(100));
        expect_check(
            confirm_fee_recipients_credited(&before, &skewed, "weth"),
            "harvest.fee_split",
        );
    }

    #[test]
    fn test_equal_gains_rejected_for_distinct_accounts() {
        let treasury = Address::with_last_byte(0x05);
        let strategist = Address::with_last_byte(0x01);
        let before = fees(2_000, 1_000)
            .with_entity(ENTITY_TREASURY, treasury)
            .with_entity(ENTITY_STRATEGIST, strategist)
            .with_balance("weth", ENTITY_TREASURY, u(0))
            .with_balance("weth", ENTITY_STRATEGIST, u(0));
        let after = fees(2_000, 1_000)
            .with_entity(ENTITY_TREASURY, treasury)
            .with_entity(ENTITY_STRATEGIST, strategist)
            .with_balance("weth", ENTITY_TREASURY, u(100))
            .with_balance("weth", ENTITY_STRATEGIST, u(100));
        expect_check(
            confirm_fee_recipients_credited(&before, &after, "weth"),
            "harvest.fee_split",
        );
    }

    #[test]
    fn test_shared_fee_account_skips_split() {
        let shared = Address::with_last_byte(0x04);
        let before = fees(2_000, 1_000)
            .with_entity(ENTITY_TREASURY, shared)
            .with_entity(ENTITY_STRATEGIST, shared)
            .with_balance("weth", ENTITY_TREASURY, u(0))
            .with_balance("weth", ENTITY_STRATEGIST, u(0));
        let after = fees(2_000, 1_000)
            .with_entity(ENTITY_TREASURY, shared)
            .with_entity(ENTITY_STRATEGIST, shared)
            .with_balance("weth", ENTITY_TREASURY, u(300))
            .with_balance("weth", ENTITY_STRATEGIST, u(300));
        assert!(confirm_fee_recipients_credited(&before, &after, "weth").is_ok());
    }

    #[test]
    fn test_strategist_fee_must_be_paid() {
        let before = fees(0, 1_000)
            .with_balance(TOKEN_SHARES, ENTITY_STRATEGIST, u(50))
            .with_balance(TOKEN_SHARES, ENTITY_TREASURY, u(0));
        let after = fees(0, 1_000)
            .with_balance(TOKEN_SHARES, ENTITY_STRATEGIST, u(50))
            .with_balance(TOKEN_SHARES, ENTITY_TREASURY, u(0));
        expect_check(
            confirm_fee_recipients_credited(&before, &after, TOKEN_SHARES),
            "harvest.strategist_fee",
        );

        let paid = after.with_balance(TOKEN_SHARES, ENTITY_STRATEGIST, u(60));
        assert!(confirm_fee_recipients_credited(&before, &paid, TOKEN_SHARES).is_ok());
    }

    #[test]
    fn test_zero_rates_require_nothing() {
        let snap = fees(0, 0);
        assert!(confirm_fee_recipients_credited(&snap, &snap, "weth").is_ok());
    }

    #[test]
    fn test_single_distribution() {
        let events = HarvestEvents {
            harvested: vec![],
            tree_distributions: vec![TokenAmount { token: WETH, amount: u(42) }],
        };
        let event = confirm_single_distribution(&events, WETH).unwrap();
        assert_eq!(event.amount, u(42));

        expect_check(
            confirm_single_distribution(&HarvestEvents::default(), WETH),
            "harvest.distribution_count",
        );
        expect_check(
            confirm_single_distribution(&events, WANT),
            "harvest.distribution_token",
        );

        let empty = HarvestEvents {
            harvested: vec![],
            tree_distributions: vec![TokenAmount { token: WETH, amount: u(0) }],
        };
        expect_check(
            confirm_single_distribution(&empty, WETH),
            "harvest.distribution_amount",
        );
    }

    #[test]
    fn test_no_residual() {
        let clean = Snapshot::default()
            .with_balance("gmx", ENTITY_STRATEGY, u(0))
            .with_balance("esGmx", ENTITY_STRATEGY, u(0));
        assert!(confirm_no_residual(&clean, &["gmx", "esGmx"]).is_ok());

        let dirty = clean.clone().with_balance("esGmx", ENTITY_STRATEGY, u(3));
        expect_check(confirm_no_residual(&dirty, &["gmx", "esGmx"]), "harvest.residual");

        expect_check(
            confirm_no_residual(&clean, &["gmx", "weth"]),
            "harvest.residual_tracked",
        );
    }
}
