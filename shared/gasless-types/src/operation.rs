use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::packing::{
    split_deployment_payload, unpack_sponsor_and_data, unpack_u128_pair, PackingError,
    SponsorFields,
};

/// Packed deferred-execution intent (entry point v0.7 `PackedUserOperation` minus the signature).
///
/// Built once per transfer attempt. A stale nonce means building a new one, not editing this.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedOperation {
    pub sender: Address,
    pub nonce: U256,
    /// `factory || factoryData`, empty for deployed accounts.
    pub deployment_payload: Bytes,
    pub call_data: Bytes,
    /// `verificationGasLimit (16) || callGasLimit (16)`.
    pub packed_gas_limits: B256,
    /// Full 32-byte word, never packed.
    pub pre_verification_gas: U256,
    /// `maxPriorityFeePerGas (16) || maxFeePerGas (16)`.
    pub packed_fee_fields: B256,
    /// `pool (20) || verificationGasLimit (16) || postOpGasLimit (16) || context`.
    pub sponsor_and_data: Bytes,
}

impl UnsignedOperation {
    pub fn verification_gas_limit(&self) -> u128 {
        unpack_u128_pair(&self.packed_gas_limits).0
    }

    pub fn call_gas_limit(&self) -> u128 {
        unpack_u128_pair(&self.packed_gas_limits).1
    }

    pub fn max_priority_fee_per_gas(&self) -> u128 {
        unpack_u128_pair(&self.packed_fee_fields).0
    }

    pub fn max_fee_per_gas(&self) -> u128 {
        unpack_u128_pair(&self.packed_fee_fields).1
    }

    pub fn sponsor_fields(&self) -> Result<SponsorFields, PackingError> {
        unpack_sponsor_and_data(&self.sponsor_and_data)
    }

    /// `(factory, factoryData)` when the operation also deploys the account.
    pub fn factory_parts(&self) -> Result<Option<(Address, Bytes)>, PackingError> {
        split_deployment_payload(&self.deployment_payload)
    }

    /// Upper bound of gas the sponsor may pay for, across every phase.
    pub fn total_gas_limit(&self) -> U256 {
        let sponsor_gas = self
            .sponsor_fields()
            .map(|f| U256::from(f.verification_gas_limit) + U256::from(f.post_op_gas_limit))
            .unwrap_or_default();
        U256::from(self.verification_gas_limit())
            + U256::from(self.call_gas_limit())
            + self.pre_verification_gas
            + sponsor_gas
    }

    /// Attach a signature. Consumes the operation so the signed form cannot drift from what was signed.
    pub fn into_signed(self, signature: Bytes) -> SignedOperation {
        SignedOperation {
            operation: self,
            signature,
        }
    }
}

/// An operation plus its owner signature. Read-only after signing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedOperation {
    #[serde(flatten)]
    operation: UnsignedOperation,
    signature: Bytes,
}

impl SignedOperation {
    pub fn operation(&self) -> &UnsignedOperation {
        &self.operation
    }

    pub fn signature(&self) -> &Bytes {
        &self.signature
    }
}

/// Terminal outcome reported by the relay once the operation landed on-chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationReceipt {
    pub operation_hash: B256,
    pub success: bool,
    pub actual_gas_cost: U256,
    pub actual_gas_used: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_reason: Option<String>,
    pub transaction_hash: B256,
    pub block_number: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packing::{pack_sponsor_and_data, pack_u128_pair};

    fn operation() -> UnsignedOperation {
        UnsignedOperation {
            sender: Address::repeat_byte(0x11),
            nonce: U256::from(3u64),
            deployment_payload: Bytes::new(),
            call_data: Bytes::from_static(&[0x47, 0xe1, 0xda, 0x2a]),
            packed_gas_limits: pack_u128_pair(100_000, 200_000),
            pre_verification_gas: U256::from(50_000u64),
            packed_fee_fields: pack_u128_pair(1_000_000_000, 2_000_000_000),
            sponsor_and_data: pack_sponsor_and_data(Address::repeat_byte(0x33), 60_000, 40_000, &[]),
        }
    }

    #[test]
    fn accessors_unpack_fields() {
        let op = operation();
        assert_eq!(op.verification_gas_limit(), 100_000);
        assert_eq!(op.call_gas_limit(), 200_000);
        assert_eq!(op.max_priority_fee_per_gas(), 1_000_000_000);
        assert_eq!(op.max_fee_per_gas(), 2_000_000_000);
        assert_eq!(op.factory_parts().unwrap(), None);
        assert_eq!(op.total_gas_limit(), U256::from(450_000u64));
    }

    #[test]
    fn signing_keeps_operation_intact() {
        let op = operation();
        let signed = op.clone().into_signed(Bytes::from(vec![0u8; 65]));
        assert_eq!(signed.operation(), &op);
        assert_eq!(signed.signature().len(), 65);
    }
}
