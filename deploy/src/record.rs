use std::{
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::utils::checksum;

/// What a finished deployment leaves behind in the deployments directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub network: String,
    pub contract_address: String,
    pub deployer_address: String,
    pub block_number: u64,
    pub timestamp: String,
    pub chain_id: u64,
}

impl DeploymentRecord {
    pub fn new(
        network: &str,
        contract: Address,
        deployer: Address,
        block_number: u64,
        chain_id: u64,
    ) -> Self {
        Self {
            network: network.to_string(),
            contract_address: checksum(contract),
            deployer_address: checksum(deployer),
            block_number,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            chain_id,
        }
    }

    pub fn file_name(network: &str) -> String {
        format!("{network}_deployment.json")
    }

    /// Writes the record as `<network>_deployment.json` under `output_dir`,
    /// replacing any earlier record for the same network.
    pub fn to_file(&self, output_dir: &Path) -> Result<PathBuf> {
        if !output_dir.exists() {
            std::fs::create_dir_all(output_dir).with_context(|| {
                format!("failed to create deployments dir {}", output_dir.display())
            })?;
        }

        let path = output_dir.join(Self::file_name(&self.network));
        let file = std::fs::File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer
            .flush()
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn print_summary(&self) {
        println!("\n=== Deployment Summary ===");
        println!("Network: {}", self.network);
        println!("Contract Address: {}", self.contract_address);
        println!("Deployer Address: {}", self.deployer_address);
        println!("Block Number: {}", self.block_number);
        println!("Chain ID: {}", self.chain_id);
        println!("Timestamp: {}", self.timestamp);
    }
}
