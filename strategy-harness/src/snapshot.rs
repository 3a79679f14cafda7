//! Before/after state capture.
//!
//! A [`Snapshot`] holds token balances keyed by `(token, entity)` name plus a
//! fixed set of vault and strategy getters. The [`Snapshotter`] knows which
//! entities and tokens to read and issues only view calls.

use std::collections::BTreeMap;
use std::fmt;

use alloy::primitives::utils::format_units;
use alloy::primitives::{Address, U256};

use crate::chain::ForkChain;
use crate::contracts::{IERC20Detailed, IStrategy, TheVault};
use crate::error::HarnessError;

pub const TOKEN_WANT: &str = "want";
/// Vault shares.
pub const TOKEN_SHARES: &str = "sett";

pub const ENTITY_USER: &str = "user";
pub const ENTITY_VAULT: &str = "sett";
pub const ENTITY_STRATEGY: &str = "strategy";
pub const ENTITY_TREASURY: &str = "treasury";
pub const ENTITY_STRATEGIST: &str = "strategist";

/// Scalar getters read on every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scalar {
    VaultBalance,
    VaultAvailable,
    PricePerFullShare,
    VaultTotalSupply,
    PerformanceFeeGovernance,
    PerformanceFeeStrategist,
    WithdrawalFee,
    ManagementFee,
    StrategyBalanceOf,
    StrategyBalanceOfPool,
    StrategyBalanceOfWant,
}

impl Scalar {
    pub const ALL: [Scalar; 11] = [
        Scalar::VaultBalance,
        Scalar::VaultAvailable,
        Scalar::PricePerFullShare,
        Scalar::VaultTotalSupply,
        Scalar::PerformanceFeeGovernance,
        Scalar::PerformanceFeeStrategist,
        Scalar::WithdrawalFee,
        Scalar::ManagementFee,
        Scalar::StrategyBalanceOf,
        Scalar::StrategyBalanceOfPool,
        Scalar::StrategyBalanceOfWant,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Scalar::VaultBalance => "sett.balance",
            Scalar::VaultAvailable => "sett.available",
            Scalar::PricePerFullShare => "sett.getPricePerFullShare",
            Scalar::VaultTotalSupply => "sett.totalSupply",
            Scalar::PerformanceFeeGovernance => "sett.performanceFeeGovernance",
            Scalar::PerformanceFeeStrategist => "sett.performanceFeeStrategist",
            Scalar::WithdrawalFee => "sett.withdrawalFee",
            Scalar::ManagementFee => "sett.managementFee",
            Scalar::StrategyBalanceOf => "strategy.balanceOf",
            Scalar::StrategyBalanceOfPool => "strategy.balanceOfPool",
            Scalar::StrategyBalanceOfWant => "strategy.balanceOfWant",
        }
    }
}

/// A named balance holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub name: String,
    pub address: Address,
}

impl Entity {
    pub fn new(name: impl Into<String>, address: Address) -> Self {
        Self {
            name: name.into(),
            address,
        }
    }
}

/// A named token whose balances are tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedToken {
    pub name: String,
    pub address: Address,
    pub decimals: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    scalars: BTreeMap<Scalar, U256>,
    balances: BTreeMap<String, BTreeMap<String, U256>>,
    decimals: BTreeMap<String, u8>,
    addresses: BTreeMap<String, Address>,
}

impl Snapshot {
    /// Scalar value; zero if it was not captured.
    pub fn get(&self, scalar: Scalar) -> U256 {
        self.scalars.get(&scalar).copied().unwrap_or_default()
    }

    /// Balance of `token` held by `entity`; zero if not captured.
    pub fn balance(&self, token: &str, entity: &str) -> U256 {
        self.balances
            .get(token)
            .and_then(|by_entity| by_entity.get(entity))
            .copied()
            .unwrap_or_default()
    }

    /// Address behind `entity`, if the snapshot recorded it.
    pub fn address(&self, entity: &str) -> Option<Address> {
        self.addresses.get(entity).copied()
    }

    pub fn has_balance(&self, token: &str, entity: &str) -> bool {
        self.balances
            .get(token)
            .is_some_and(|by_entity| by_entity.contains_key(entity))
    }

    pub fn with_scalar(mut self, scalar: Scalar, value: U256) -> Self {
        self.scalars.insert(scalar, value);
        self
    }

    pub fn with_balance(mut self, token: &str, entity: &str, value: U256) -> Self {
        self.balances
            .entry(token.to_string())
            .or_default()
            .insert(entity.to_string(), value);
        self
    }

    pub fn with_entity(mut self, entity: &str, address: Address) -> Self {
        self.addresses.insert(entity.to_string(), address);
        self
    }

    pub fn with_decimals(mut self, token: &str, decimals: u8) -> Self {
        self.decimals.insert(token.to_string(), decimals);
        self
    }

    fn token_decimals(&self, token: &str) -> u8 {
        self.decimals.get(token).copied().unwrap_or(18)
    }
}

/// `after - before` as a sign and magnitude.
fn signed_delta(before: U256, after: U256) -> (bool, U256) {
    if after >= before {
        (false, after - before)
    } else {
        (true, before - after)
    }
}

/// Gain from `before` to `after`, or `None` if the value went down.
pub fn gain(before: U256, after: U256) -> Option<U256> {
    after.checked_sub(before)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffRow {
    pub key: String,
    pub before: U256,
    pub after: U256,
    pub decimals: Option<u8>,
}

impl DiffRow {
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}

/// Row-by-row comparison of two snapshots, for logging.
#[derive(Debug, Clone, Default)]
pub struct SnapshotDiff {
    pub rows: Vec<DiffRow>,
}

impl SnapshotDiff {
    pub fn between(before: &Snapshot, after: &Snapshot) -> Self {
        let mut rows = Vec::new();

        for scalar in Scalar::ALL {
            if before.scalars.contains_key(&scalar) || after.scalars.contains_key(&scalar) {
                rows.push(DiffRow {
                    key: scalar.key().to_string(),
                    before: before.get(scalar),
                    after: after.get(scalar),
                    decimals: None,
                });
            }
        }

        let mut keys: Vec<(&String, &String)> = before
            .balances
            .iter()
            .chain(after.balances.iter())
            .flat_map(|(token, by_entity)| by_entity.keys().map(move |entity| (token, entity)))
            .collect();
        keys.sort();
        keys.dedup();

        for (token, entity) in keys {
            rows.push(DiffRow {
                key: format!("{token}.{entity}"),
                before: before.balance(token, entity),
                after: after.balance(token, entity),
                decimals: Some(after.token_decimals(token)),
            });
        }

        Self { rows }
    }

    pub fn changed(&self) -> impl Iterator<Item = &DiffRow> {
        self.rows.iter().filter(|r| r.changed())
    }
}

fn render(value: U256, decimals: Option<u8>) -> String {
    match decimals {
        Some(d) => format_units(value, d).unwrap_or_else(|_| value.to_string()),
        None => value.to_string(),
    }
}

impl fmt::Display for SnapshotDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.rows.iter().map(|r| r.key.len()).max().unwrap_or(0);
        writeln!(f, "{:<width$}  {:>28}  {:>28}  {:>28}", "key", "before", "after", "delta")?;
        for row in &self.rows {
            let (negative, magnitude) = signed_delta(row.before, row.after);
            let delta = if magnitude.is_zero() {
                "-".to_string()
            } else {
                format!("{}{}", if negative { "-" } else { "+" }, render(magnitude, row.decimals))
            };
            writeln!(
                f,
                "{:<width$}  {:>28}  {:>28}  {:>28}",
                row.key,
                render(row.before, row.decimals),
                render(row.after, row.decimals),
                delta,
            )?;
        }
        Ok(())
    }
}

/// Reads a fixed set of balances and getters from the fork.
#[derive(Debug, Clone)]
pub struct Snapshotter {
    vault: Address,
    strategy: Address,
    entities: Vec<Entity>,
    tokens: Vec<TrackedToken>,
}

impl Snapshotter {
    /// Track `user`, the vault, the strategy, the vault's treasury and
    /// strategist, plus `extra_entities`; for want, vault shares and
    /// `extra_tokens`.
    pub async fn new(
        chain: &ForkChain,
        vault: Address,
        strategy: Address,
        want: Address,
        user: Address,
        extra_entities: Vec<Entity>,
        extra_tokens: Vec<(String, Address)>,
    ) -> Result<Self, HarnessError> {
        let vault_contract = TheVault::new(vault, chain.provider());
        let treasury = vault_contract.treasury().call().await?;
        let strategist = vault_contract.strategist().call().await?;

        let mut entities = vec![
            Entity::new(ENTITY_USER, user),
            Entity::new(ENTITY_VAULT, vault),
            Entity::new(ENTITY_STRATEGY, strategy),
            Entity::new(ENTITY_TREASURY, treasury),
            Entity::new(ENTITY_STRATEGIST, strategist),
        ];
        entities.extend(extra_entities);

        let mut tokens = Vec::new();
        for (name, address) in [
            (TOKEN_WANT.to_string(), want),
            (TOKEN_SHARES.to_string(), vault),
        ]
        .into_iter()
        .chain(extra_tokens)
        {
            let decimals = IERC20Detailed::new(address, chain.provider())
                .decimals()
                .call()
                .await?;
            tokens.push(TrackedToken {
                name,
                address,
                decimals,
            });
        }

        tracing::debug!(
            entities = entities.len(),
            tokens = tokens.len(),
            "Snapshotter ready"
        );

        Ok(Self {
            vault,
            strategy,
            entities,
            tokens,
        })
    }

    pub async fn snap(&self, chain: &ForkChain) -> Result<Snapshot, HarnessError> {
        let mut snapshot = Snapshot::default();
        for entity in &self.entities {
            snapshot = snapshot.with_entity(&entity.name, entity.address);
        }

        for scalar in Scalar::ALL {
            let value = self.read_scalar(chain, scalar).await?;
            snapshot = snapshot.with_scalar(scalar, value);
        }

        for token in &self.tokens {
            let erc20 = IERC20Detailed::new(token.address, chain.provider());
            snapshot = snapshot.with_decimals(&token.name, token.decimals);
            for entity in &self.entities {
                let balance = erc20.balanceOf(entity.address).call().await?;
                snapshot = snapshot.with_balance(&token.name, &entity.name, balance);
            }
        }

        Ok(snapshot)
    }

    async fn read_scalar(&self, chain: &ForkChain, scalar: Scalar) -> Result<U256, HarnessError> {
        let vault = TheVault::new(self.vault, chain.provider());
        let strategy = IStrategy::new(self.strategy, chain.provider());
        let value = match scalar {
            Scalar::VaultBalance => vault.balance().call().await?,
            Scalar::VaultAvailable => vault.available().call().await?,
            Scalar::PricePerFullShare => vault.getPricePerFullShare().call().await?,
            Scalar::VaultTotalSupply => vault.totalSupply().call().await?,
            Scalar::PerformanceFeeGovernance => vault.performanceFeeGovernance().call().await?,
            Scalar::PerformanceFeeStrategist => vault.performanceFeeStrategist().call().await?,
            Scalar::WithdrawalFee => vault.withdrawalFee().call().await?,
            Scalar::ManagementFee => vault.managementFee().call().await?,
            Scalar::StrategyBalanceOf => strategy.balanceOf().call().await?,
            Scalar::StrategyBalanceOfPool => strategy.balanceOfPool().call().await?,
            Scalar::StrategyBalanceOfWant => strategy.balanceOfWant().call().await?,
        };
        Ok(value)
    }
}
