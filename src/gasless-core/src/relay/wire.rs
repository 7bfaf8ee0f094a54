//! Relay JSON formats (entry point v0.7, unpacked).
//!
//! The relay speaks the unpacked form: packed gas and fee words are split back into
//! discrete hex quantities, and the deployment and sponsor fields are split into
//! `factory`/`factoryData` and `paymaster*`.

use alloy_primitives::{Address, Bytes, B256, U256, U64};
use gasless_types::{OperationReceipt, PackingError, SignedOperation};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireOperation {
    pub sender: Address,
    pub nonce: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory_data: Option<Bytes>,
    pub call_data: Bytes,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub paymaster: Address,
    pub paymaster_verification_gas_limit: U256,
    pub paymaster_post_op_gas_limit: U256,
    pub paymaster_data: Bytes,
    pub signature: Bytes,
}

impl TryFrom<&SignedOperation> for WireOperation {
    type Error = PackingError;

    fn try_from(signed: &SignedOperation) -> Result<Self, Self::Error> {
        let op = signed.operation();
        let sponsor = op.sponsor_fields()?;
        let (factory, factory_data) = match op.factory_parts()? {
            Some((factory, data)) => (Some(factory), Some(data)),
            None => (None, None),
        };

        Ok(Self {
            sender: op.sender,
            nonce: op.nonce,
            factory,
            factory_data,
            call_data: op.call_data.clone(),
            call_gas_limit: U256::from(op.call_gas_limit()),
            verification_gas_limit: U256::from(op.verification_gas_limit()),
            pre_verification_gas: op.pre_verification_gas,
            max_fee_per_gas: U256::from(op.max_fee_per_gas()),
            max_priority_fee_per_gas: U256::from(op.max_priority_fee_per_gas()),
            paymaster: sponsor.pool,
            paymaster_verification_gas_limit: U256::from(sponsor.verification_gas_limit),
            paymaster_post_op_gas_limit: U256::from(sponsor.post_op_gas_limit),
            paymaster_data: sponsor.context,
            signature: signed.signature().clone(),
        })
    }
}

/// `eth_getUserOperationReceipt` result.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireReceipt {
    pub user_op_hash: B256,
    pub success: bool,
    pub actual_gas_cost: U256,
    pub actual_gas_used: U256,
    #[serde(default)]
    pub reason: Option<String>,
    pub receipt: WireTransactionReceipt,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTransactionReceipt {
    pub transaction_hash: B256,
    pub block_number: U64,
}

impl From<WireReceipt> for OperationReceipt {
    fn from(wire: WireReceipt) -> Self {
        Self {
            operation_hash: wire.user_op_hash,
            success: wire.success,
            actual_gas_cost: wire.actual_gas_cost,
            actual_gas_used: wire.actual_gas_used,
            revert_reason: wire.reason.filter(|r| !r.is_empty()),
            transaction_hash: wire.receipt.transaction_hash,
            block_number: wire.receipt.block_number.to::<u64>(),
        }
    }
}
