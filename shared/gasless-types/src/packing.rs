//! Fixed-width big-endian packing used by the operation layout.
//!
//! Layouts:
//! - gas limits: `verificationGasLimit (u128) || callGasLimit (u128)`
//! - fee fields: `maxPriorityFeePerGas (u128) || maxFeePerGas (u128)`
//! - sponsor-and-data: `pool (20) || verificationGasLimit (u128) || postOpGasLimit (u128) || context`
//! - deployment payload: `factory (20) || factoryData`

use alloy_primitives::{Address, Bytes, B256};

pub const ADDRESS_LEN: usize = 20;
pub const PACKED_U128_LEN: usize = 16;

/// Offset of the trailing context blob inside `sponsorAndData`.
pub const SPONSOR_CONTEXT_OFFSET: usize = ADDRESS_LEN + 2 * PACKED_U128_LEN;

/// Errors while splitting packed byte fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackingError {
    Truncated { needed: usize, available: usize },
}

impl core::fmt::Display for PackingError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Truncated { needed, available } => {
                write!(f, "packed field truncated: need {needed} bytes, have {available}")
            }
        }
    }
}

impl std::error::Error for PackingError {}

/// Discrete values carried by a `sponsorAndData` field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SponsorFields {
    pub pool: Address,
    pub verification_gas_limit: u128,
    pub post_op_gas_limit: u128,
    pub context: Bytes,
}

/// Concatenate two 16-byte values into one 32-byte word (`high || low`).
pub fn pack_u128_pair(high: u128, low: u128) -> B256 {
    let mut out = [0u8; 32];
    out[..PACKED_U128_LEN].copy_from_slice(&high.to_be_bytes());
    out[PACKED_U128_LEN..].copy_from_slice(&low.to_be_bytes());
    B256::new(out)
}

/// Inverse of [`pack_u128_pair`].
pub fn unpack_u128_pair(packed: &B256) -> (u128, u128) {
    let mut high = [0u8; PACKED_U128_LEN];
    let mut low = [0u8; PACKED_U128_LEN];
    high.copy_from_slice(&packed[..PACKED_U128_LEN]);
    low.copy_from_slice(&packed[PACKED_U128_LEN..]);
    (u128::from_be_bytes(high), u128::from_be_bytes(low))
}

pub fn pack_sponsor_and_data(
    pool: Address,
    verification_gas_limit: u128,
    post_op_gas_limit: u128,
    context: &[u8],
) -> Bytes {
    let mut buf = Vec::with_capacity(SPONSOR_CONTEXT_OFFSET + context.len());
    buf.extend_from_slice(pool.as_slice());
    buf.extend_from_slice(&verification_gas_limit.to_be_bytes());
    buf.extend_from_slice(&post_op_gas_limit.to_be_bytes());
    buf.extend_from_slice(context);
    buf.into()
}

pub fn unpack_sponsor_and_data(bytes: &[u8]) -> Result<SponsorFields, PackingError> {
    let mut i = 0usize;
    let pool = read_address(bytes, &mut i)?;
    let verification_gas_limit = read_u128_be(bytes, &mut i)?;
    let post_op_gas_limit = read_u128_be(bytes, &mut i)?;
    Ok(SponsorFields {
        pool,
        verification_gas_limit,
        post_op_gas_limit,
        context: Bytes::copy_from_slice(&bytes[i..]),
    })
}

/// `factory || factoryData`; the factory call is not ABI-wrapped.
pub fn pack_deployment_payload(factory: Address, factory_data: &[u8]) -> Bytes {
    let mut buf = Vec::with_capacity(ADDRESS_LEN + factory_data.len());
    buf.extend_from_slice(factory.as_slice());
    buf.extend_from_slice(factory_data);
    buf.into()
}

/// Split a deployment payload into `(factory, factoryData)`. Empty payload means "already deployed".
pub fn split_deployment_payload(bytes: &[u8]) -> Result<Option<(Address, Bytes)>, PackingError> {
    if bytes.is_empty() {
        return Ok(None);
    }
    let mut i = 0usize;
    let factory = read_address(bytes, &mut i)?;
    Ok(Some((factory, Bytes::copy_from_slice(&bytes[i..]))))
}

pub fn read_address(bytes: &[u8], i: &mut usize) -> Result<Address, PackingError> {
    let raw = read_slice(bytes, i, ADDRESS_LEN)?;
    Ok(Address::from_slice(raw))
}

pub fn read_u128_be(bytes: &[u8], i: &mut usize) -> Result<u128, PackingError> {
    let raw = read_slice(bytes, i, PACKED_U128_LEN)?;
    let mut buf = [0u8; PACKED_U128_LEN];
    buf.copy_from_slice(raw);
    Ok(u128::from_be_bytes(buf))
}

fn read_slice<'a>(bytes: &'a [u8], i: &mut usize, len: usize) -> Result<&'a [u8], PackingError> {
    if bytes.len() < *i + len {
        return Err(PackingError::Truncated {
            needed: *i + len,
            available: bytes.len(),
        });
    }
    let out = &bytes[*i..*i + len];
    *i += len;
    Ok(out)
}
