//! Role accounts, assigned once per fork from anvil's unlocked dev accounts.

use alloy::primitives::Address;

use crate::error::HarnessError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Deployer,
    Strategist,
    Keeper,
    Guardian,
    Governance,
    Treasury,
    ProxyAdmin,
    RandomUser,
    /// Receives distributed rewards (the "badger tree").
    RewardDistributor,
    User,
}

impl Role {
    pub const ALL: [Role; 10] = [
        Role::Deployer,
        Role::Strategist,
        Role::Keeper,
        Role::Guardian,
        Role::Governance,
        Role::Treasury,
        Role::ProxyAdmin,
        Role::RandomUser,
        Role::RewardDistributor,
        Role::User,
    ];

    /// Index into the dev account list.
    pub fn account_index(self) -> usize {
        match self {
            Role::Deployer => 0,
            Role::Strategist => 1,
            Role::Keeper => 2,
            Role::Guardian => 3,
            Role::Governance => 4,
            Role::Treasury => 5,
            Role::ProxyAdmin => 6,
            Role::RandomUser => 7,
            Role::RewardDistributor => 8,
            Role::User => 9,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Accounts {
    pub deployer: Address,
    pub strategist: Address,
    pub keeper: Address,
    pub guardian: Address,
    pub governance: Address,
    pub treasury: Address,
    pub proxy_admin: Address,
    pub random_user: Address,
    pub reward_distributor: Address,
    pub user: Address,
}

impl Accounts {
    pub fn from_addresses(addresses: &[Address]) -> Result<Self, HarnessError> {
        if addresses.len() < Role::ALL.len() {
            return Err(HarnessError::Setup(format!(
                "need {} dev accounts, node exposes {}",
                Role::ALL.len(),
                addresses.len()
            )));
        }
        let at = |role: Role| addresses[role.account_index()];
        Ok(Self {
            deployer: at(Role::Deployer),
            strategist: at(Role::Strategist),
            keeper: at(Role::Keeper),
            guardian: at(Role::Guardian),
            governance: at(Role::Governance),
            treasury: at(Role::Treasury),
            proxy_admin: at(Role::ProxyAdmin),
            random_user: at(Role::RandomUser),
            reward_distributor: at(Role::RewardDistributor),
            user: at(Role::User),
        })
    }

    pub fn get(&self, role: Role) -> Address {
        match role {
            Role::Deployer => self.deployer,
            Role::Strategist => self.strategist,
            Role::Keeper => self.keeper,
            Role::Guardian => self.guardian,
            Role::Governance => self.governance,
            Role::Treasury => self.treasury,
            Role::ProxyAdmin => self.proxy_admin,
            Role::RandomUser => self.random_user,
            Role::RewardDistributor => self.reward_distributor,
            Role::User => self.user,
        }
    }
}
