//! Settlement Key Module
//!
//! Loads the settlement account from its YAML key file and turns it into a
//! signing wallet bound to the configured chain.

use crate::error::ChainError;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Settlement account read from a YAML key file
///
/// ```yaml
/// address: "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
/// private_key: "0xac09...ff80"
/// ```
#[derive(Clone, Deserialize)]
pub struct SettlementKey {
    pub address: String,
    private_key: String,
}

impl fmt::Debug for SettlementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettlementKey")
            .field("address", &self.address)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl SettlementKey {
    /// Read the key file at `path` (a leading `~/` is expanded)
    pub fn load(path: &Path) -> Result<Self, ChainError> {
        let path = expand_home(path);
        let content = std::fs::read_to_string(&path).map_err(|source| ChainError::KeyFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ChainError> {
        serde_yaml::from_str(content).map_err(|e| ChainError::MalformedKey(e.to_string()))
    }

    /// Signing wallet for `chain_id`
    ///
    /// # Errors
    /// `MalformedKey` if the private key does not parse or does not belong to
    /// the declared address.
    pub fn wallet(&self, chain_id: u64) -> Result<LocalWallet, ChainError> {
        let wallet: LocalWallet = self
            .private_key
            .trim_start_matches("0x")
            .parse()
            .map_err(|e: ethers::signers::WalletError| ChainError::MalformedKey(e.to_string()))?;

        let declared: Address = self
            .address
            .parse()
            .map_err(|_| ChainError::InvalidAddress(self.address.clone()))?;
        if wallet.address() != declared {
            return Err(ChainError::MalformedKey(format!(
                "private key does not belong to {}",
                self.address
            )));
        }

        Ok(wallet.with_chain_id(chain_id))
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development account #0
    const ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const PRIVATE_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn write_key_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("payout-key-{}-{name}.yaml", std::process::id()));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_and_build_wallet() {
        let path = write_key_file(
            "valid",
            &format!("address: \"{ADDRESS}\"\nprivate_key: \"{PRIVATE_KEY}\"\n"),
        );

        let key = SettlementKey::load(&path).unwrap();
        let wallet = key.wallet(31337).unwrap();

        assert_eq!(wallet.address(), ADDRESS.parse::<Address>().unwrap());
        assert_eq!(wallet.chain_id(), 31337);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_mismatched_address_is_malformed() {
        let key = SettlementKey::parse(&format!(
            "address: \"0x0000000000000000000000000000000000000001\"\nprivate_key: \"{PRIVATE_KEY}\"\n"
        ))
        .unwrap();

        assert!(matches!(key.wallet(1), Err(ChainError::MalformedKey(_))));
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let result = SettlementKey::parse(&format!("address: \"{ADDRESS}\"\n"));

        assert!(matches!(result, Err(ChainError::MalformedKey(_))));
    }

    #[test]
    fn test_missing_file_is_reported_with_path() {
        let result = SettlementKey::load(Path::new("/nonexistent/payout/key.yaml"));

        assert!(matches!(result, Err(ChainError::KeyFile { .. })));
    }

    #[test]
    fn test_debug_output_hides_private_key() {
        let key = SettlementKey::parse(&format!(
            "address: \"{ADDRESS}\"\nprivate_key: \"{PRIVATE_KEY}\"\n"
        ))
        .unwrap();

        assert!(!format!("{key:?}").contains(&PRIVATE_KEY[2..]));
    }
}
