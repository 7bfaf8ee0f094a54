//! Owner signatures over operation hashes.

use alloy_primitives::{eip191_hash_message, keccak256, Address, Bytes, B256};
use async_trait::async_trait;
use k256::ecdsa::{SigningKey, VerifyingKey};

use crate::errors::SignerError;

/// Something that can sign an operation hash on behalf of an owner.
#[async_trait]
pub trait OperationSigner: Send + Sync {
    /// Externally-owned address the signature must recover to.
    fn owner(&self) -> Address;

    /// 65-byte `r || s || v` signature over the EIP-191 personal message of `hash`.
    async fn sign_operation_hash(&self, hash: B256) -> Result<Bytes, SignerError>;
}

/// In-process secp256k1 key.
#[derive(Clone)]
pub struct LocalSigner {
    key: SigningKey,
    owner: Address,
}

impl core::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LocalSigner").field("owner", &self.owner).finish_non_exhaustive()
    }
}

impl LocalSigner {
    pub fn new(key: SigningKey) -> Self {
        let owner = address_of(key.verifying_key());
        Self { key, owner }
    }

    /// Parse a 32-byte hex private key, with or without `0x`.
    pub fn from_hex(private_key: &str) -> Result<Self, SignerError> {
        let raw = hex::decode(private_key.trim().trim_start_matches("0x"))
            .map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        let key = SigningKey::from_slice(&raw).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        Ok(Self::new(key))
    }

    pub fn sign_hash(&self, hash: B256) -> Result<Bytes, SignerError> {
        let digest = eip191_hash_message(hash);
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(digest.as_slice())
            .map_err(|e| SignerError::Signing(e.to_string()))?;

        let mut out = Vec::with_capacity(65);
        out.extend_from_slice(&signature.to_bytes());
        out.push(27 + recovery_id.to_byte());
        Ok(out.into())
    }
}

#[async_trait]
impl OperationSigner for LocalSigner {
    fn owner(&self) -> Address {
        self.owner
    }

    async fn sign_operation_hash(&self, hash: B256) -> Result<Bytes, SignerError> {
        self.sign_hash(hash)
    }
}

/// Ethereum address of a public key: last 20 bytes of `keccak256(x || y)`.
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    Address::from_slice(&keccak256(&point.as_bytes()[1..])[12..])
}
