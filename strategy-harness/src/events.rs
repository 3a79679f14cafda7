//! Reward-reporting events pulled out of a transaction receipt.

use alloy::primitives::{Address, Log, U256};
use alloy::rpc::types::TransactionReceipt;
use alloy::sol_types::SolEvent;

use crate::contracts::TheVault::{Harvested, TreeDistribution};

/// Token and amount carried by a `Harvested` or `TreeDistribution` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAmount {
    pub token: Address,
    pub amount: U256,
}

/// Every `Harvested` and `TreeDistribution` event in a receipt, in log order.
///
/// Logs are matched by signature regardless of emitter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestEvents {
    pub harvested: Vec<TokenAmount>,
    pub tree_distributions: Vec<TokenAmount>,
}

impl HarvestEvents {
    pub fn from_receipt(receipt: &TransactionReceipt) -> Self {
        Self::from_logs(receipt.inner.logs().iter().map(|log| &log.inner))
    }

    pub fn from_logs<'a>(logs: impl IntoIterator<Item = &'a Log>) -> Self {
        let mut events = Self::default();
        for log in logs {
            match log.data.topics().first() {
                Some(topic) if *topic == Harvested::SIGNATURE_HASH => {
                    match Harvested::decode_log_data(&log.data) {
                        Ok(ev) => events.harvested.push(TokenAmount {
                            token: ev.token,
                            amount: ev.amount,
                        }),
                        Err(e) => tracing::warn!(error = %e, "Undecodable Harvested log"),
                    }
                }
                Some(topic) if *topic == TreeDistribution::SIGNATURE_HASH => {
                    match TreeDistribution::decode_log_data(&log.data) {
                        Ok(ev) => events.tree_distributions.push(TokenAmount {
                            token: ev.token,
                            amount: ev.amount,
                        }),
                        Err(e) => tracing::warn!(error = %e, "Undecodable TreeDistribution log"),
                    }
                }
                _ => {}
            }
        }
        events
    }
}
