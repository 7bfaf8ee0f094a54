use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Upper bound for a pool fee (100%).
pub const MAX_FEE_BASIS_POINTS: u16 = 10_000;

/// Errors while constructing a [`SponsorPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    FeeOutOfRange { fee_basis_points: u64 },
}

impl core::fmt::Display for PoolError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::FeeOutOfRange { fee_basis_points } => write!(
                f,
                "fee of {fee_basis_points} basis points exceeds {MAX_FEE_BASIS_POINTS}"
            ),
        }
    }
}

impl std::error::Error for PoolError {}

/// Sponsor pool snapshot, read from the pool contract or the indexer.
///
/// The fee is validated on construction and on deserialization, so a `SponsorPool`
/// value always carries `fee_basis_points <= 10_000`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawSponsorPool")]
pub struct SponsorPool {
    pool_address: Address,
    token_address: Address,
    fee_basis_points: u16,
    /// In token base units.
    min_transfer_amount: U256,
    /// Native balance (wei) the pool can spend on gas.
    eth_available: U256,
    sponsor_address: Address,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSponsorPool {
    pool_address: Address,
    token_address: Address,
    fee_basis_points: u64,
    min_transfer_amount: U256,
    eth_available: U256,
    sponsor_address: Address,
}

impl TryFrom<RawSponsorPool> for SponsorPool {
    type Error = PoolError;

    fn try_from(raw: RawSponsorPool) -> Result<Self, Self::Error> {
        Self::new(
            raw.pool_address,
            raw.token_address,
            raw.fee_basis_points,
            raw.min_transfer_amount,
            raw.eth_available,
            raw.sponsor_address,
        )
    }
}

impl SponsorPool {
    pub fn new(
        pool_address: Address,
        token_address: Address,
        fee_basis_points: u64,
        min_transfer_amount: U256,
        eth_available: U256,
        sponsor_address: Address,
    ) -> Result<Self, PoolError> {
        if fee_basis_points > u64::from(MAX_FEE_BASIS_POINTS) {
            return Err(PoolError::FeeOutOfRange { fee_basis_points });
        }
        Ok(Self {
            pool_address,
            token_address,
            fee_basis_points: fee_basis_points as u16,
            min_transfer_amount,
            eth_available,
            sponsor_address,
        })
    }

    pub fn pool_address(&self) -> Address {
        self.pool_address
    }

    pub fn token_address(&self) -> Address {
        self.token_address
    }

    pub fn fee_basis_points(&self) -> u16 {
        self.fee_basis_points
    }

    pub fn min_transfer_amount(&self) -> U256 {
        self.min_transfer_amount
    }

    pub fn eth_available(&self) -> U256 {
        self.eth_available
    }

    pub fn sponsor_address(&self) -> Address {
        self.sponsor_address
    }

    /// Fee owed to the pool for `amount`, rounded down. `None` when `amount × fee` overflows.
    pub fn fee_for(&self, amount: U256) -> Option<U256> {
        amount
            .checked_mul(U256::from(self.fee_basis_points))
            .map(|scaled| scaled / U256::from(MAX_FEE_BASIS_POINTS))
    }
}

/// A pool evaluated for one specific transfer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatePool {
    #[serde(flatten)]
    pub pool: SponsorPool,
    pub gas_cost_percentage: f64,
    pub effective_fee_percentage: f64,
    pub is_healthy: bool,
}
