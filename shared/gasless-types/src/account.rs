use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// Deterministic smart account of an owner, as resolved for one transfer attempt.
///
/// `account_address` is stable for a given owner and salt. `nonce` and `is_deployed`
/// are snapshots and go stale as soon as the account transacts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartAccountIdentity {
    owner_address: Address,
    account_address: Address,
    deployment_payload: Bytes,
    nonce: U256,
    is_deployed: bool,
}

impl SmartAccountIdentity {
    pub fn deployed(owner_address: Address, account_address: Address, nonce: U256) -> Self {
        Self {
            owner_address,
            account_address,
            deployment_payload: Bytes::new(),
            nonce,
            is_deployed: true,
        }
    }

    /// `deployment_payload` is `factory || factoryData` and is attached verbatim to the operation.
    pub fn undeployed(
        owner_address: Address,
        account_address: Address,
        deployment_payload: Bytes,
        nonce: U256,
    ) -> Self {
        Self {
            owner_address,
            account_address,
            deployment_payload,
            nonce,
            is_deployed: false,
        }
    }

    pub fn owner_address(&self) -> Address {
        self.owner_address
    }

    pub fn account_address(&self) -> Address {
        self.account_address
    }

    /// Empty when the account is already deployed.
    pub fn deployment_payload(&self) -> &Bytes {
        &self.deployment_payload
    }

    pub fn nonce(&self) -> U256 {
        self.nonce
    }

    pub fn is_deployed(&self) -> bool {
        self.is_deployed
    }
}
