//! Operation hash: the digest the owner signs and the entry point recomputes.
//!
//! ```text
//! inner = keccak256(abi.encode(
//!     sender, nonce, keccak256(initCode), keccak256(callData),
//!     accountGasLimits, preVerificationGas, gasFees, keccak256(paymasterAndData)))
//! hash  = keccak256(abi.encode(inner, entryPoint, chainId))
//! ```
//!
//! Every field is a 32-byte word, so `abi.encode` is plain concatenation of left-padded words.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::SolValue;
use gasless_types::{SignedOperation, UnsignedOperation};

use crate::{contracts::interfaces::PackedUserOperation, errors::GaslessError};

fn address_word(address: Address) -> [u8; 32] {
    let mut padded = [0u8; 32];
    padded[12..32].copy_from_slice(address.as_slice());
    padded
}

/// Hash of the packed fields alone, without entry point or chain binding.
pub fn inner_hash(op: &UnsignedOperation) -> B256 {
    let mut buf = Vec::with_capacity(32 * 8);
    buf.extend_from_slice(&address_word(op.sender));
    buf.extend_from_slice(&op.nonce.to_be_bytes::<32>());
    buf.extend_from_slice(keccak256(&op.deployment_payload).as_slice());
    buf.extend_from_slice(keccak256(&op.call_data).as_slice());
    buf.extend_from_slice(op.packed_gas_limits.as_slice());
    buf.extend_from_slice(&op.pre_verification_gas.to_be_bytes::<32>());
    buf.extend_from_slice(op.packed_fee_fields.as_slice());
    buf.extend_from_slice(keccak256(&op.sponsor_and_data).as_slice());
    keccak256(buf)
}

/// Operation hash bound to one entry point on one chain. Deterministic, no I/O.
pub fn operation_hash(op: &UnsignedOperation, entry_point: Address, chain_id: u64) -> B256 {
    let mut buf = Vec::with_capacity(32 * 3);
    buf.extend_from_slice(inner_hash(op).as_slice());
    buf.extend_from_slice(&address_word(entry_point));
    buf.extend_from_slice(&U256::from(chain_id).to_be_bytes::<32>());
    keccak256(buf)
}

/// Same digest through the ABI encoder instead of the word buffer.
fn abi_operation_hash(op: &UnsignedOperation, entry_point: Address, chain_id: u64) -> B256 {
    let inner = keccak256(
        (
            op.sender,
            op.nonce,
            keccak256(&op.deployment_payload),
            keccak256(&op.call_data),
            op.packed_gas_limits,
            op.pre_verification_gas,
            op.packed_fee_fields,
            keccak256(&op.sponsor_and_data),
        )
            .abi_encode(),
    );
    keccak256((inner, entry_point, U256::from(chain_id)).abi_encode())
}

/// [`operation_hash`], refusing to return a digest the two encoders disagree on.
pub fn checked_operation_hash(
    op: &UnsignedOperation,
    entry_point: Address,
    chain_id: u64,
) -> Result<B256, GaslessError> {
    let local = operation_hash(op, entry_point, chain_id);
    let reference = abi_operation_hash(op, entry_point, chain_id);
    if local != reference {
        return Err(GaslessError::HashMismatch {
            local,
            reported: reference,
        });
    }
    Ok(local)
}

/// On-chain struct for `EntryPoint.getUserOpHash`. The signature does not enter the hash.
pub fn packed_user_operation(op: &UnsignedOperation, signature: Bytes) -> PackedUserOperation {
    PackedUserOperation {
        sender: op.sender,
        nonce: op.nonce,
        initCode: op.deployment_payload.clone(),
        callData: op.call_data.clone(),
        accountGasLimits: op.packed_gas_limits,
        preVerificationGas: op.pre_verification_gas,
        gasFees: op.packed_fee_fields,
        paymasterAndData: op.sponsor_and_data.clone(),
        signature,
    }
}

pub fn signed_packed_user_operation(op: &SignedOperation) -> PackedUserOperation {
    packed_user_operation(op.operation(), op.signature().clone())
}
