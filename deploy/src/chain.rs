use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethers::{
    contract::ContractFactory,
    providers::Middleware,
    signers::Signer,
    types::{Address, H256, U256, U64},
};

use crate::{
    artifact::ContractArtifact,
    contracts::DAO,
    utils::{self, Client},
};

/// A freshly mined DAO instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployedDao {
    pub address: Address,
    pub transaction_hash: H256,
}

/// Public state read back from the DAO right after deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaoState {
    pub admin: Address,
    pub member_count: U256,
    pub proposal_count: U256,
}

/// Everything the deployment needs from the network.
#[async_trait]
pub trait DaoChain: Send + Sync {
    async fn deployer(&self) -> Result<Address>;

    async fn balance(&self, account: Address) -> Result<U256>;

    /// Sends the creation transaction with no constructor arguments and
    /// waits for it to be mined.
    async fn deploy_dao(&self) -> Result<DeployedDao>;

    async fn dao_state(&self, dao: Address) -> Result<DaoState>;

    async fn block_number(&self) -> Result<u64>;

    async fn chain_id(&self) -> Result<u64>;

    async fn wait_confirmations(&self, transaction_hash: H256, confirmations: usize) -> Result<()>;
}

pub struct EthersChain {
    client: Arc<Client>,
    artifacts_dir: PathBuf,
    contract: String,
}

impl EthersChain {
    pub async fn new(rpc: &str, sk: &str, artifacts_dir: PathBuf, contract: &str) -> Result<Self> {
        let client = utils::connect(rpc, sk).await?;
        Ok(Self {
            client,
            artifacts_dir,
            contract: contract.to_string(),
        })
    }
}

#[async_trait]
impl DaoChain for EthersChain {
    async fn deployer(&self) -> Result<Address> {
        Ok(self.client.signer().address())
    }

    async fn balance(&self, account: Address) -> Result<U256> {
        Ok(self.client.get_balance(account, None).await?)
    }

    async fn deploy_dao(&self) -> Result<DeployedDao> {
        let artifact = ContractArtifact::load(&self.artifacts_dir, &self.contract)?;
        let factory = ContractFactory::new(artifact.abi, artifact.bytecode, self.client.clone());

        let (contract, receipt) = factory.deploy(())?.legacy().send_with_receipt().await?;
        log::info!("deployment transaction hash:{:?}", receipt.transaction_hash);

        if receipt.status == Some(U64::zero()) {
            return Err(anyhow!(
                "deployment transaction {:?} reverted",
                receipt.transaction_hash
            ));
        }

        Ok(DeployedDao {
            address: contract.address(),
            transaction_hash: receipt.transaction_hash,
        })
    }

    async fn dao_state(&self, dao: Address) -> Result<DaoState> {
        let dao = DAO::new(dao, self.client.clone());
        Ok(DaoState {
            admin: dao.admin().call().await?,
            member_count: dao.member_count().call().await?,
            proposal_count: dao.proposal_count().call().await?,
        })
    }

    async fn block_number(&self) -> Result<u64> {
        Ok(self.client.get_block_number().await?.as_u64())
    }

    async fn chain_id(&self) -> Result<u64> {
        utils::chain_id_to_u64(self.client.get_chainid().await?)
    }

    async fn wait_confirmations(
        &self,
        transaction_hash: H256,
        confirmations: usize,
    ) -> Result<()> {
        let receipt =
            utils::wait_confirmations(self.client.clone(), transaction_hash, confirmations).await?;
        log::debug!(
            "{:?} confirmed {} times, mined in block {:?}",
            transaction_hash,
            confirmations,
            receipt.block_number
        );
        Ok(())
    }
}
