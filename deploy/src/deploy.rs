use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::{
    chain::{DaoChain, DeployedDao},
    record::DeploymentRecord,
    utils::{checksum, format_balance},
    verify::Verifier,
};

/// Confirmations to wait for before asking an explorer to verify the source.
pub const VERIFY_CONFIRMATIONS: usize = 6;

const LOCAL_NETWORKS: [&str; 2] = ["hardhat", "localhost"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    name: String,
}

impl Network {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Local development chains have no explorer to verify against.
    pub fn is_local(&self) -> bool {
        LOCAL_NETWORKS.contains(&self.name.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub network: Network,
    pub deployments_dir: PathBuf,
    pub confirmations: usize,
}

impl DeployConfig {
    pub fn new(network: Network, deployments_dir: impl AsRef<Path>) -> Self {
        Self {
            network,
            deployments_dir: deployments_dir.as_ref().to_path_buf(),
            confirmations: VERIFY_CONFIRMATIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Skipped,
    Verified,
    Failed(String),
}

#[derive(Debug)]
pub struct Deployment {
    pub dao: DeployedDao,
    pub record: DeploymentRecord,
    pub record_path: PathBuf,
    pub verification: VerificationOutcome,
}

pub struct Deploy<C, V> {
    chain: C,
    verifier: V,
    config: DeployConfig,
}

impl<C: DaoChain, V: Verifier> Deploy<C, V> {
    pub fn new(chain: C, verifier: V, config: DeployConfig) -> Self {
        Self {
            chain,
            verifier,
            config,
        }
    }

    pub async fn run(&self) -> Result<Deployment> {
        let network = self.config.network.name();
        println!("Starting DAO deployment on {network}...");

        let deployer = self.chain.deployer().await?;
        println!("Deploying contracts with the account: {}", checksum(deployer));
        println!(
            "Account balance: {}",
            format_balance(self.chain.balance(deployer).await?)
        );

        println!("\nDeploying DAO contract...");
        let dao = self.chain.deploy_dao().await?;
        println!("DAO contract deployed to: {}", checksum(dao.address));

        println!("\nVerifying deployment...");
        let state = self.chain.dao_state(dao.address).await?;
        println!("Admin address: {}", checksum(state.admin));
        println!("Initial member count: {}", state.member_count);
        println!("Initial proposal count: {}", state.proposal_count);
        if state.admin != deployer {
            log::warn!(
                "DAO admin {:?} is not the deployer {:?}",
                state.admin,
                deployer
            );
        }

        print_usage_examples();

        let record = DeploymentRecord::new(
            network,
            dao.address,
            deployer,
            self.chain.block_number().await?,
            self.chain.chain_id().await?,
        );
        record.print_summary();

        let record_path = record.to_file(&self.config.deployments_dir)?;
        println!("\nDeployment info saved to {}", record_path.display());

        let verification = self.verify(&dao, record.chain_id).await?;

        println!("\n🎉 DAO deployment completed successfully!");
        println!(
            "You can now interact with your DAO at: {}",
            record.contract_address
        );

        Ok(Deployment {
            dao,
            record,
            record_path,
            verification,
        })
    }

    /// Only the confirmation wait can fail the run from here; explorer
    /// errors are reported and swallowed.
    async fn verify(&self, dao: &DeployedDao, chain_id: u64) -> Result<VerificationOutcome> {
        if self.config.network.is_local() {
            log::debug!(
                "skipping verification on local network {}",
                self.config.network.name()
            );
            return Ok(VerificationOutcome::Skipped);
        }

        println!("\nWaiting for block confirmations...");
        self.chain
            .wait_confirmations(dao.transaction_hash, self.config.confirmations)
            .await?;

        println!("Verifying contract on block explorer...");
        match self.verifier.verify(dao.address, chain_id, &[]).await {
            Ok(()) => {
                println!("Contract verified successfully!");
                Ok(VerificationOutcome::Verified)
            }
            Err(err) => {
                println!("Contract verification failed: {err}");
                log::warn!("verification of {:?} failed: {err:?}", dao.address);
                Ok(VerificationOutcome::Failed(err.to_string()))
            }
        }
    }
}

fn print_usage_examples() {
    println!("\n=== Contract Interaction Examples ===");
    println!("1. Add a new member:");
    println!("   await dao.addMember(\"0x...memberAddress\");");

    println!("\n2. Create a proposal:");
    println!("   await dao.createProposal(\"Proposal Title\", \"Proposal Description\");");

    println!("\n3. Vote on a proposal:");
    println!("   await dao.vote(1, true); // Vote 'yes' on proposal ID 1");

    println!("\n4. Execute a proposal:");
    println!("   await dao.executeProposal(1);");

    println!("\n5. Get proposal details:");
    println!("   await dao.getProposal(1);");
}
