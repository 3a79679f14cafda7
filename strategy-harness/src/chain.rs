//! The forked chain the harness runs against.
//!
//! Spawns anvil in fork mode and talks to it through a provider with no
//! local signer: every transaction goes out as `eth_sendTransaction` with an
//! explicit `from`, which anvil signs for its dev accounts and for any
//! impersonated address.

use alloy::network::Ethereum;
use alloy::node_bindings::{Anvil, AnvilInstance};
use alloy::primitives::{Address, Bytes, TxKind, U256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::{TransactionInput, TransactionReceipt, TransactionRequest};
use alloy::sol_types::SolCall;

use crate::accounts::Accounts;
use crate::config::HarnessConfig;
use crate::error::HarnessError;

pub type ForkProvider = RootProvider<Ethereum>;

/// Gas money handed to impersonated accounts.
pub const IMPERSONATION_BALANCE: U256 = U256::from_limbs([10_000_000_000_000_000_000, 0, 0, 0]);

/// Opaque `evm_snapshot` id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(U256);

pub struct ForkChain {
    // Kept alive for the lifetime of the chain; dropping it kills anvil.
    _anvil: AnvilInstance,
    provider: ForkProvider,
    accounts: Accounts,
}

impl ForkChain {
    /// Spawn anvil forking `config.fork_url` (at `fork_block_number`, if set).
    pub async fn spawn(config: &HarnessConfig) -> Result<Self, HarnessError> {
        let fork_url = config.require_fork_url()?.to_string();
        let fork_block = config.fork_block_number;

        // Anvil startup blocks until the fork answers.
        let anvil = tokio::task::spawn_blocking(move || {
            let mut anvil = Anvil::new().fork(fork_url);
            if let Some(block) = fork_block {
                anvil = anvil.fork_block_number(block);
            }
            anvil.try_spawn()
        })
        .await
        .map_err(|e| HarnessError::Anvil(format!("Anvil spawn task failed: {e}")))?
        .map_err(|e| HarnessError::Anvil(format!("Failed to spawn forking anvil: {e}")))?;

        let provider = RootProvider::<Ethereum>::new_http(anvil.endpoint_url());
        let accounts = Accounts::from_addresses(anvil.addresses())?;

        tracing::info!(
            endpoint = %anvil.endpoint(),
            fork_block = ?config.fork_block_number,
            "Forked chain started"
        );

        Ok(Self {
            _anvil: anvil,
            provider,
            accounts,
        })
    }

    pub fn provider(&self) -> &ForkProvider {
        &self.provider
    }

    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    // ── Cheat codes ─────────────────────────────────────────────────────────

    pub async fn impersonate(&self, account: Address) -> Result<(), HarnessError> {
        let _: () = self
            .provider
            .raw_request("anvil_setBalance".into(), (account, IMPERSONATION_BALANCE))
            .await?;
        let _: () = self
            .provider
            .raw_request("anvil_impersonateAccount".into(), (account,))
            .await?;
        tracing::debug!(%account, "Impersonating");
        Ok(())
    }

    pub async fn stop_impersonating(&self, account: Address) -> Result<(), HarnessError> {
        let _: () = self
            .provider
            .raw_request("anvil_stopImpersonatingAccount".into(), (account,))
            .await?;
        Ok(())
    }

    /// Advance block time by `seconds`. The next mined block carries the new
    /// timestamp; nothing is mined here.
    pub async fn sleep(&self, seconds: u64) -> Result<(), HarnessError> {
        let _: serde_json::Value = self
            .provider
            .raw_request("evm_increaseTime".into(), (U256::from(seconds),))
            .await?;
        tracing::debug!(seconds, "Advanced chain time");
        Ok(())
    }

    pub async fn mine(&self, blocks: u64) -> Result<(), HarnessError> {
        for _ in 0..blocks {
            let _: serde_json::Value = self
                .provider
                .raw_request("evm_mine".into(), Vec::<serde_json::Value>::new())
                .await?;
        }
        Ok(())
    }

    pub async fn checkpoint(&self) -> Result<Checkpoint, HarnessError> {
        let id: U256 = self
            .provider
            .raw_request("evm_snapshot".into(), Vec::<serde_json::Value>::new())
            .await?;
        Ok(Checkpoint(id))
    }

    /// Roll chain state back to `checkpoint`. Anvil consumes the snapshot, so
    /// take a fresh one to revert again.
    pub async fn revert_to(&self, checkpoint: Checkpoint) -> Result<(), HarnessError> {
        let reverted: bool = self
            .provider
            .raw_request("evm_revert".into(), (checkpoint.0,))
            .await?;
        if !reverted {
            return Err(HarnessError::Rpc(format!(
                "evm_revert refused snapshot {}",
                checkpoint.0
            )));
        }
        tracing::debug!(id = %checkpoint.0, "Reverted to checkpoint");
        Ok(())
    }

    pub async fn timestamp(&self) -> Result<u64, HarnessError> {
        let number = self.provider.get_block_number().await?;
        let block = self
            .provider
            .get_block_by_number(number.into())
            .await?
            .ok_or_else(|| HarnessError::Rpc("latest block missing".into()))?;
        Ok(block.header.timestamp)
    }

    // ── Transactions ────────────────────────────────────────────────────────

    /// Send `call` to `to` from `from` and wait for a successful receipt.
    pub async fn transact<C: SolCall>(
        &self,
        from: Address,
        to: Address,
        call: C,
    ) -> Result<TransactionReceipt, HarnessError> {
        let tx = TransactionRequest::default()
            .from(from)
            .to(to)
            .input(Bytes::from(call.abi_encode()).into());
        self.submit(tx, C::SIGNATURE).await
    }

    /// Deploy `bytecode ++ constructor_args` from `from`; returns the address.
    pub async fn deploy(
        &self,
        from: Address,
        bytecode: Vec<u8>,
        constructor_args: Vec<u8>,
        label: &str,
    ) -> Result<Address, HarnessError> {
        let mut deploy_data = bytecode;
        deploy_data.extend_from_slice(&constructor_args);

        let mut tx = TransactionRequest::default()
            .from(from)
            .input(TransactionInput::both(Bytes::from(deploy_data)));
        tx.to = Some(TxKind::Create);

        let receipt = self.submit(tx, label).await?;
        receipt.contract_address.ok_or_else(|| HarnessError::Reverted {
            call: label.to_string(),
            reason: "no contract address in receipt".into(),
        })
    }

    async fn submit(
        &self,
        tx: TransactionRequest,
        label: &str,
    ) -> Result<TransactionReceipt, HarnessError> {
        // Reverts usually surface here, from anvil's gas estimation.
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| HarnessError::Reverted {
                call: label.to_string(),
                reason: e.to_string(),
            })?;

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| HarnessError::Rpc(format!("Receipt fetch failed for {label}: {e}")))?;

        if !receipt.status() {
            return Err(HarnessError::Reverted {
                call: label.to_string(),
                reason: format!("transaction {} failed", receipt.transaction_hash),
            });
        }

        tracing::debug!(
            call = label,
            tx = %receipt.transaction_hash,
            gas_used = receipt.gas_used,
            "Transaction confirmed"
        );
        Ok(receipt)
    }
}
