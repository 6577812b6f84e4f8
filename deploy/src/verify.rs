use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ethers::{
    abi::{self, Token},
    etherscan::{
        verify::{CodeFormat, VerifyContract},
        Client,
    },
    types::{Address, Chain},
    utils::hex,
};
use serde::Deserialize;

use crate::artifact::ContractArtifact;

const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(3);
const STATUS_POLL_ATTEMPTS: usize = 20;

/// Publishes the source of a deployed contract to a block explorer.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(
        &self,
        address: Address,
        chain_id: u64,
        constructor_args: &[Token],
    ) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct ExplorerSettings {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub browser_url: Option<String>,
}

/// Verifies against an Etherscan-compatible API using the standard-json input
/// Hardhat recorded for the artifact.
pub struct EtherscanVerifier {
    settings: ExplorerSettings,
    artifacts_dir: PathBuf,
    contract: String,
    poll_interval: Duration,
    poll_attempts: usize,
}

#[derive(Debug, Deserialize)]
struct DebugFile {
    #[serde(rename = "buildInfo")]
    build_info: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub solc_long_version: String,
    pub input: serde_json::Value,
}

impl BuildInfo {
    /// Follows the artifact's `.dbg.json` to the build-info file that
    /// produced it.
    pub fn for_artifact(artifact: &ContractArtifact) -> Result<Self> {
        let dbg_path = artifact.debug_file();
        let dbg: DebugFile = read_json(&dbg_path)?;
        let dir = dbg_path.parent().unwrap_or_else(|| Path::new("."));
        read_json(&dir.join(dbg.build_info))
    }

    pub fn compiler_version(&self) -> String {
        format!("v{}", self.solc_long_version)
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("failed to parse {}", path.display()))
}

fn is_already_verified(message: &str) -> bool {
    message.to_lowercase().contains("already verified")
}

impl EtherscanVerifier {
    pub fn new(settings: ExplorerSettings, artifacts_dir: PathBuf, contract: &str) -> Self {
        Self {
            settings,
            artifacts_dir,
            contract: contract.to_string(),
            poll_interval: STATUS_POLL_INTERVAL,
            poll_attempts: STATUS_POLL_ATTEMPTS,
        }
    }

    fn client(&self, chain_id: u64) -> Result<Client> {
        let api_key = self
            .settings
            .api_key
            .clone()
            .ok_or(anyhow!("no explorer API key configured"))?;

        let builder = match (&self.settings.api_url, &self.settings.browser_url) {
            (Some(api_url), browser_url) => Client::builder()
                .with_api_url(api_url.as_str())?
                .with_url(browser_url.as_deref().unwrap_or(api_url.as_str()))?,
            (None, _) => {
                let chain = Chain::try_from(chain_id)
                    .map_err(|_| anyhow!("no known explorer for chain id {chain_id}"))?;
                Client::builder().chain(chain)?
            }
        };
        Ok(builder.with_api_key(api_key).build()?)
    }

    fn request(&self, address: Address, constructor_args: &[Token]) -> Result<VerifyContract> {
        let artifact = ContractArtifact::load(&self.artifacts_dir, &self.contract)?;
        let build_info = BuildInfo::for_artifact(&artifact)?;

        let mut request = VerifyContract::new(
            address,
            artifact.fully_qualified_name(),
            serde_json::to_string(&build_info.input)?,
            build_info.compiler_version(),
        )
        .code_format(CodeFormat::StandardJsonInput);
        if !constructor_args.is_empty() {
            let encoded = hex::encode(abi::encode(constructor_args));
            request = request.constructor_arguments(Some(encoded));
        }
        Ok(request)
    }

    async fn await_verdict(&self, client: &Client, guid: &str) -> Result<()> {
        for _ in 0..self.poll_attempts {
            tokio::time::sleep(self.poll_interval).await;
            let resp = client.check_contract_verification_status(guid).await?;
            log::debug!("verification {guid}: {}", resp.result);

            if resp.result.starts_with("Pending") {
                continue;
            }
            if resp.result.starts_with("Pass") || is_already_verified(&resp.result) {
                return Ok(());
            }
            return Err(anyhow!(resp.result));
        }
        Err(anyhow!("explorer did not finish verification {guid}"))
    }
}

#[async_trait]
impl Verifier for EtherscanVerifier {
    async fn verify(
        &self,
        address: Address,
        chain_id: u64,
        constructor_args: &[Token],
    ) -> Result<()> {
        let client = self.client(chain_id)?;
        let request = self.request(address, constructor_args)?;

        let resp = match client.submit_contract_verification(&request).await {
            Ok(resp) if resp.status == "1" => resp,
            Ok(resp) if !is_already_verified(&resp.result) => return Err(anyhow!(resp.result)),
            Err(err) if !is_already_verified(&err.to_string()) => return Err(err.into()),
            _ => {
                log::info!("{address:?} is already verified");
                return Ok(());
            }
        };
        log::info!("verification submitted, guid {}", resp.result);
        self.await_verdict(&client, &resp.result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::tests::{write_artifact, DAO_ARTIFACT};
    use tempfile::{tempdir, TempDir};
    use wiremock::{
        matchers::{body_string_contains, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    const BUILD_INFO: &str = r#"{
  "id": "0f3c",
  "_format": "hh-sol-build-info-1",
  "solcVersion": "0.8.19",
  "solcLongVersion": "0.8.19+commit.7dd6d404",
  "input": {
    "language": "Solidity",
    "sources": { "contracts/DAO.sol": { "content": "contract DAO {}" } },
    "settings": { "optimizer": { "enabled": true, "runs": 200 } }
  },
  "output": {}
}"#;

    fn write_build(artifacts_dir: &Path) {
        let artifact = write_artifact(artifacts_dir, "DAO", DAO_ARTIFACT);
        std::fs::write(
            artifact.with_extension("dbg.json"),
            r#"{ "_format": "hh-sol-dbg-1", "buildInfo": "../../build-info/0f3c.json" }"#,
        )
        .unwrap();
        let build_info_dir = artifacts_dir.join("build-info");
        std::fs::create_dir_all(&build_info_dir).unwrap();
        std::fs::write(build_info_dir.join("0f3c.json"), BUILD_INFO).unwrap();
    }

    #[test]
    fn build_info_is_found_through_debug_file() {
        let dir = tempdir().unwrap();
        write_build(dir.path());

        let artifact = ContractArtifact::load(dir.path(), "DAO").unwrap();
        let build_info = BuildInfo::for_artifact(&artifact).unwrap();
        assert_eq!(build_info.compiler_version(), "v0.8.19+commit.7dd6d404");
        assert_eq!(build_info.input["language"], "Solidity");
    }

    #[test]
    fn request_targets_fully_qualified_name() {
        let dir = tempdir().unwrap();
        write_build(dir.path());
        let verifier =
            EtherscanVerifier::new(ExplorerSettings::default(), dir.path().to_path_buf(), "DAO");

        let address = Address::from_low_u64_be(0xdef);
        let request = verifier.request(address, &[]).unwrap();
        assert_eq!(request.address, address);
        assert_eq!(request.contract_name, "contracts/DAO.sol:DAO");
        assert_eq!(request.compiler_version, "v0.8.19+commit.7dd6d404");
        assert!(request.constructor_arguments.is_none());
        assert!(request.source.contains("contracts/DAO.sol"));
    }

    #[test]
    fn missing_build_info_fails_request() {
        let dir = tempdir().unwrap();
        write_artifact(dir.path(), "DAO", DAO_ARTIFACT);
        let verifier =
            EtherscanVerifier::new(ExplorerSettings::default(), dir.path().to_path_buf(), "DAO");

        assert!(verifier.request(Address::zero(), &[]).is_err());
    }

    #[test]
    fn client_needs_api_key() {
        let verifier = EtherscanVerifier::new(ExplorerSettings::default(), PathBuf::new(), "DAO");
        let err = verifier.client(11155111).err().unwrap();
        assert!(err.to_string().contains("API key"));
    }

    #[test]
    fn custom_explorer_needs_no_known_chain() {
        let settings = ExplorerSettings {
            api_key: Some("key".to_string()),
            api_url: Some("https://scan.test2.btcs.network/api".to_string()),
            browser_url: None,
        };
        let verifier = EtherscanVerifier::new(settings, PathBuf::new(), "DAO");
        assert!(verifier.client(1114).is_ok());
    }

    #[test]
    fn unknown_chain_without_explorer_url_fails() {
        let settings = ExplorerSettings {
            api_key: Some("key".to_string()),
            ..Default::default()
        };
        let verifier = EtherscanVerifier::new(settings, PathBuf::new(), "DAO");
        assert!(verifier.client(987_654_321).is_err());
    }

    #[test]
    fn recognises_already_verified() {
        assert!(is_already_verified("Contract source code already verified"));
        assert!(is_already_verified("Already Verified"));
        assert!(!is_already_verified("Fail - Unable to verify"));
    }

    fn explorer_response(status: &str, result: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": status,
            "message": if status == "1" { "OK" } else { "NOTOK" },
            "result": result,
        }))
    }

    async fn mount_submit(server: &MockServer, status: &str, result: &str) {
        Mock::given(method("POST"))
            .and(path("/api"))
            .and(body_string_contains("verifysourcecode"))
            .respond_with(explorer_response(status, result))
            .expect(1)
            .mount(server)
            .await;
    }

    /// Verifier pointed at `server`, with artifacts on disk and no delay
    /// between status polls.
    fn mock_verifier(server: &MockServer) -> (EtherscanVerifier, TempDir) {
        let dir = tempdir().unwrap();
        write_build(dir.path());
        let settings = ExplorerSettings {
            api_key: Some("key".to_string()),
            api_url: Some(format!("{}/api", server.uri())),
            browser_url: Some(server.uri()),
        };
        let mut verifier = EtherscanVerifier::new(settings, dir.path().to_path_buf(), "DAO");
        verifier.poll_interval = Duration::ZERO;
        (verifier, dir)
    }

    #[tokio::test]
    async fn submit_then_pass() {
        let server = MockServer::start().await;
        mount_submit(&server, "1", "guid-1").await;
        Mock::given(method("POST"))
            .and(body_string_contains("checkverifystatus"))
            .and(body_string_contains("guid-1"))
            .respond_with(explorer_response("1", "Pass - Verified"))
            .expect(1)
            .mount(&server)
            .await;

        let (verifier, _dir) = mock_verifier(&server);
        verifier
            .verify(Address::from_low_u64_be(0xdef), 1114, &[])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn pending_is_polled_again() {
        let server = MockServer::start().await;
        mount_submit(&server, "1", "guid-2").await;
        Mock::given(method("POST"))
            .and(body_string_contains("checkverifystatus"))
            .respond_with(explorer_response("0", "Pending in queue"))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("checkverifystatus"))
            .respond_with(explorer_response("1", "Pass - Verified"))
            .expect(1)
            .mount(&server)
            .await;

        let (verifier, _dir) = mock_verifier(&server);
        verifier
            .verify(Address::from_low_u64_be(0xdef), 1114, &[])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn already_verified_on_submit_skips_polling() {
        let server = MockServer::start().await;
        mount_submit(&server, "0", "Contract source code already verified").await;
        Mock::given(method("POST"))
            .and(body_string_contains("checkverifystatus"))
            .respond_with(explorer_response("1", "Pass - Verified"))
            .expect(0)
            .mount(&server)
            .await;

        let (verifier, _dir) = mock_verifier(&server);
        verifier
            .verify(Address::from_low_u64_be(0xdef), 1114, &[])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn already_verified_status_is_success() {
        let server = MockServer::start().await;
        mount_submit(&server, "1", "guid-3").await;
        Mock::given(method("POST"))
            .and(body_string_contains("checkverifystatus"))
            .respond_with(explorer_response("0", "Already Verified"))
            .expect(1)
            .mount(&server)
            .await;

        let (verifier, _dir) = mock_verifier(&server);
        verifier
            .verify(Address::from_low_u64_be(0xdef), 1114, &[])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejected_submit_is_an_error() {
        let server = MockServer::start().await;
        mount_submit(&server, "0", "Unable to locate ContractCode").await;

        let (verifier, _dir) = mock_verifier(&server);
        let err = verifier
            .verify(Address::from_low_u64_be(0xdef), 1114, &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unable to locate ContractCode"));
    }

    #[tokio::test]
    async fn failed_verdict_is_an_error() {
        let server = MockServer::start().await;
        mount_submit(&server, "1", "guid-4").await;
        Mock::given(method("POST"))
            .and(body_string_contains("checkverifystatus"))
            .respond_with(explorer_response("0", "Fail - Unable to verify"))
            .expect(1)
            .mount(&server)
            .await;

        let (verifier, _dir) = mock_verifier(&server);
        let err = verifier
            .verify(Address::from_low_u64_be(0xdef), 1114, &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Fail - Unable to verify"));
    }

    #[tokio::test]
    async fn gives_up_after_last_poll() {
        let server = MockServer::start().await;
        mount_submit(&server, "1", "guid-5").await;
        Mock::given(method("POST"))
            .and(body_string_contains("checkverifystatus"))
            .respond_with(explorer_response("0", "Pending in queue"))
            .expect(STATUS_POLL_ATTEMPTS as u64)
            .mount(&server)
            .await;

        let (verifier, _dir) = mock_verifier(&server);
        let err = verifier
            .verify(Address::from_low_u64_be(0xdef), 1114, &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("did not finish verification guid-5"));
    }
}
