use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, Result};
use clap::Parser;

use crate::{
    chain::EthersChain,
    deploy::{Deploy, DeployConfig, Deployment, Network, VERIFY_CONFIRMATIONS},
    verify::{EtherscanVerifier, ExplorerSettings},
};

/// Deploy the DAO contract, record the deployment and verify its source.
#[derive(Debug, Parser)]
#[clap(version)]
pub struct CommandLine {
    /// JSON-RPC endpoint of the target network
    #[clap(short, long, env = "RPC_URL")]
    rpc: String,

    /// Deployer private key, hex encoded
    #[clap(long, env = "PRIVATE_KEY", hide_env_values = true)]
    sk: String,

    /// Network name, used for the record file name. `hardhat` and
    /// `localhost` skip explorer verification.
    #[clap(short, long, env = "NETWORK", default_value = "hardhat")]
    network: String,

    #[clap(long, default_value = "deployments")]
    deployments_dir: PathBuf,

    /// Hardhat artifacts directory
    #[clap(long, default_value = "artifacts")]
    artifacts_dir: PathBuf,

    #[clap(short, long, default_value = "DAO")]
    contract: String,

    #[clap(long, env = "ETHERSCAN_API_KEY", hide_env_values = true)]
    etherscan_api_key: Option<String>,

    /// Etherscan-compatible API endpoint, for explorers ethers doesn't know
    #[clap(long, env = "EXPLORER_API_URL")]
    explorer_api_url: Option<String>,

    #[clap(long, env = "EXPLORER_URL")]
    explorer_url: Option<String>,

    /// Confirmations to wait for before verifying
    #[clap(long, default_value_t = VERIFY_CONFIRMATIONS)]
    confirmations: usize,

    /// Give up on the whole deployment after this many seconds
    #[clap(long)]
    timeout: Option<u64>,
}

impl CommandLine {
    pub async fn execute(self) -> Result<()> {
        let timeout = self.timeout;
        let deployment = match timeout {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), self.deploy())
                .await
                .map_err(|_| anyhow!("deployment timed out after {secs}s"))??,
            None => self.deploy().await?,
        };
        log_outcome(&deployment);
        Ok(())
    }

    // Connecting to the node is part of the deployment, so `--timeout`
    // bounds it too.
    async fn deploy(self) -> Result<Deployment> {
        let chain =
            EthersChain::new(&self.rpc, &self.sk, self.artifacts_dir.clone(), &self.contract)
                .await?;
        let verifier = EtherscanVerifier::new(
            ExplorerSettings {
                api_key: self.etherscan_api_key,
                api_url: self.explorer_api_url,
                browser_url: self.explorer_url,
            },
            self.artifacts_dir,
            &self.contract,
        );
        let config = DeployConfig {
            confirmations: self.confirmations,
            ..DeployConfig::new(Network::new(self.network), self.deployments_dir)
        };

        Deploy::new(chain, verifier, config).run().await
    }
}

fn log_outcome(deployment: &Deployment) {
    log::info!(
        "{} deployed at {} (tx {:?}), record {}, verification {:?}",
        deployment.record.network,
        deployment.record.contract_address,
        deployment.dao.transaction_hash,
        deployment.record_path.display(),
        deployment.verification
    );
}
