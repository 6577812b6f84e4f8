use std::sync::Arc;

use anyhow::{anyhow, Result};
use ethers::{
    middleware::SignerMiddleware,
    providers::{Http, Middleware, PendingTransaction, Provider},
    signers::{LocalWallet, Signer},
    types::{TransactionReceipt, H160, H256, U256},
    utils::{format_ether, hex, to_checksum},
};

pub type Client = SignerMiddleware<Provider<Http>, LocalWallet>;

pub async fn connect(rpc: &str, sk: &str) -> Result<Arc<Client>> {
    let wallet = LocalWallet::from_bytes(&hex::decode(sk.strip_prefix("0x").unwrap_or(sk))?)?;
    let provider = Provider::<Http>::try_from(rpc)?;

    let chain_id = provider.get_chainid().await?;
    log::debug!("connected to {rpc}, chain id {chain_id}");

    Ok(Arc::new(SignerMiddleware::new(
        provider,
        wallet.with_chain_id(chain_id_to_u64(chain_id)?),
    )))
}

pub fn chain_id_to_u64(chain_id: U256) -> Result<u64> {
    if chain_id > U256::from(u64::MAX) {
        return Err(anyhow!("chain id {chain_id} does not fit in 64 bits"));
    }
    Ok(chain_id.as_u64())
}

/// Blocks until `transaction_hash` is buried under `confirmations` blocks,
/// counting its own block as the first.
pub async fn wait_confirmations(
    client: Arc<Client>,
    transaction_hash: H256,
    confirmations: usize,
) -> Result<TransactionReceipt> {
    PendingTransaction::new(transaction_hash, client.provider())
        .confirmations(confirmations)
        .await?
        .ok_or(anyhow!("transaction {transaction_hash:?} dropped from mempool"))
}

pub fn checksum(address: H160) -> String {
    to_checksum(&address, None)
}

/// Ether amount with trailing zeros dropped, keeping one decimal: `1.0`,
/// `0.25`.
pub fn format_balance(wei: U256) -> String {
    let ether = format_ether(wei);
    if !ether.contains('.') {
        return format!("{ether}.0");
    }
    let trimmed = ether.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{trimmed}0")
    } else {
        trimmed.to_string()
    }
}
