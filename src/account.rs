//! Account context - the bound identity a provider acts on behalf of
//!
//! Built once per provider instantiation from either a plaintext private
//! key or a bare address. Presence of the signer is the sole determinant
//! of write capability.

use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use tokio::sync::OnceCell;

use crate::error::{Error, Result};
use crate::node::NodeClient;

/// Credential an account context is built from
#[derive(Debug, Clone)]
pub enum Credential {
    /// Hex-encoded private key, enables signing
    PrivateKey(String),

    /// Bare address, read-only
    Address(Address),
}

/// Bound account identity: address, optional signer, cached chain id
pub struct AccountContext {
    address: Address,
    signer: Option<LocalWallet>,
    /// Resolved lazily from the node at first use, then fixed for the
    /// context's lifetime. A context never observes chain id changes.
    chain_id: OnceCell<u64>,
}

impl AccountContext {
    pub fn new(credential: Credential) -> Result<Self> {
        match credential {
            Credential::PrivateKey(key) => {
                let wallet: LocalWallet = key
                    .trim_start_matches("0x")
                    .parse()
                    .map_err(|e| Error::Config(format!("Invalid private key: {}", e)))?;

                Ok(Self {
                    address: wallet.address(),
                    signer: Some(wallet),
                    chain_id: OnceCell::new(),
                })
            }
            Credential::Address(address) => Ok(Self {
                address,
                signer: None,
                chain_id: OnceCell::new(),
            }),
        }
    }

    /// Re-bind to a different address, dropping any signing capability
    pub fn rebind_read_only(&self, address: Address) -> Self {
        Self {
            address,
            signer: None,
            chain_id: OnceCell::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn can_sign(&self) -> bool {
        self.signer.is_some()
    }

    pub fn signer(&self) -> Option<&LocalWallet> {
        self.signer.as_ref()
    }

    /// Chain id, fetched from the node on first use and cached
    pub async fn chain_id(&self, node: &dyn NodeClient) -> Result<u64> {
        self.chain_id
            .get_or_try_init(|| node.chain_id())
            .await
            .map(|id| *id)
    }

    /// Hex-encoded chain id, as the standardized interface reports it
    pub async fn chain_id_hex(&self, node: &dyn NodeClient) -> Result<String> {
        Ok(format!("0x{:x}", self.chain_id(node).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_address_is_read_only() {
        let address: Address = "0x00000000000000000000000000000000000000aa"
            .parse()
            .unwrap();
        let context = AccountContext::new(Credential::Address(address)).unwrap();

        assert_eq!(context.address(), address);
        assert!(!context.can_sign());
        assert!(context.signer().is_none());
    }

    #[test]
    fn test_private_key_derives_address_and_signs() {
        // Well-known anvil/hardhat test key
        let key = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
        let context = AccountContext::new(Credential::PrivateKey(key.to_string())).unwrap();

        assert!(context.can_sign());
        assert_eq!(
            format!("{:?}", context.address()),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_rebind_drops_signer() {
        let key = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
        let context = AccountContext::new(Credential::PrivateKey(key.to_string())).unwrap();

        let other: Address = "0x00000000000000000000000000000000000000bb"
            .parse()
            .unwrap();
        let rebound = context.rebind_read_only(other);

        assert_eq!(rebound.address(), other);
        assert!(!rebound.can_sign());
    }

    #[test]
    fn test_invalid_key_is_config_error() {
        let result = AccountContext::new(Credential::PrivateKey("not-hex".to_string()));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
