use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use ethers::{abi::Abi, types::Bytes};
use serde::Deserialize;

/// A Hardhat compilation artifact, as written to
/// `artifacts/contracts/<Name>.sol/<Name>.json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    pub contract_name: String,
    pub source_name: String,
    pub abi: Abi,
    pub bytecode: Bytes,
    #[serde(skip)]
    pub path: PathBuf,
}

impl ContractArtifact {
    pub fn path_for(artifacts_dir: &Path, contract: &str) -> PathBuf {
        artifacts_dir
            .join("contracts")
            .join(format!("{contract}.sol"))
            .join(contract)
            .with_extension("json")
    }

    pub fn load(artifacts_dir: &Path, contract: &str) -> Result<Self> {
        let path = Self::path_for(artifacts_dir, contract);
        if !path.exists() {
            return Err(anyhow!(
                "contract artifact not found for {contract}: {}",
                path.display()
            ));
        }

        let file = std::fs::File::open(&path)
            .with_context(|| format!("failed to open artifact {}", path.display()))?;
        let mut artifact: ContractArtifact = serde_json::from_reader(file)
            .with_context(|| format!("failed to parse artifact {}", path.display()))?;

        if artifact.bytecode.is_empty() {
            return Err(anyhow!(
                "artifact {} has no bytecode, is {contract} abstract or an interface?",
                path.display()
            ));
        }
        artifact.path = path;
        log::debug!(
            "loaded artifact {}:{} ({} bytes)",
            artifact.source_name,
            artifact.contract_name,
            artifact.bytecode.len()
        );
        Ok(artifact)
    }

    /// `<sourceName>:<contractName>`, the name explorers expect for
    /// standard-json verification.
    pub fn fully_qualified_name(&self) -> String {
        format!("{}:{}", self.source_name, self.contract_name)
    }

    pub fn debug_file(&self) -> PathBuf {
        self.path.with_extension("dbg.json")
    }
}
