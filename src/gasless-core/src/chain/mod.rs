//! External read capabilities consumed by the pipeline.
//!
//! Each collaborator is a trait so the pipeline can run against live endpoints
//! ([`http::HttpChainReader`], [`onchain::OnchainPoolDirectory`]) or in-memory fakes.

pub mod http;
pub mod onchain;

use std::sync::Arc;

use alloy_primitives::{Address, Bytes};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use gasless_types::SponsorPool;

use crate::errors::ChainError;

/// Fee-per-gas suggestion for a new operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeEstimate {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// Request/response chain reads.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// `eth_call` against `to` with raw calldata.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError>;

    /// Deployed bytecode at `address` (empty when nothing is deployed).
    async fn get_code(&self, address: Address) -> Result<Bytes, ChainError>;

    async fn fee_estimate(&self) -> Result<FeeEstimate, ChainError>;
}

#[async_trait]
impl<T: ChainReader + ?Sized> ChainReader for Arc<T> {
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        (**self).call(to, data).await
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, ChainError> {
        (**self).get_code(address).await
    }

    async fn fee_estimate(&self) -> Result<FeeEstimate, ChainError> {
        (**self).fee_estimate().await
    }
}

/// Typed `readContract`: ABI-encode `call`, run it against `target`, decode the return.
pub async fn read_contract<C, R>(chain: &R, target: Address, call: &C) -> Result<C::Return, ChainError>
where
    C: SolCall + Sync,
    R: ChainReader + ?Sized,
{
    let out = chain.call(target, call.abi_encode().into()).await?;
    C::abi_decode_returns(&out, true).map_err(|e| ChainError::Decode {
        target,
        reason: e.to_string(),
    })
}

/// Token price source. `None` means "unknown", which only degrades the gas-cost estimate.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Native wei per token base unit.
    async fn price_in_native(&self, symbol: &str) -> Option<f64>;
}

/// Oracle that never knows a price.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPriceOracle;

#[async_trait]
impl PriceOracle for NoPriceOracle {
    async fn price_in_native(&self, _symbol: &str) -> Option<f64> {
        None
    }
}

/// Source of sponsor pool snapshots (indexer, storage API, or direct contract reads).
#[async_trait]
pub trait PoolDirectory: Send + Sync {
    async fn pools_for_token(&self, token: Address) -> Result<Vec<SponsorPool>, ChainError>;
}

/// Fixed pool list, e.g. loaded from a JSON file.
#[derive(Clone, Debug, Default)]
pub struct StaticPoolDirectory {
    pools: Vec<SponsorPool>,
}

impl StaticPoolDirectory {
    pub fn new(pools: Vec<SponsorPool>) -> Self {
        Self { pools }
    }
}

#[async_trait]
impl PoolDirectory for StaticPoolDirectory {
    async fn pools_for_token(&self, token: Address) -> Result<Vec<SponsorPool>, ChainError> {
        Ok(self
            .pools
            .iter()
            .filter(|p| p.token_address() == token)
            .cloned()
            .collect())
    }
}
