use alloy_primitives::Address;
use async_trait::async_trait;
use gasless_types::SponsorPool;
use tracing::{debug, warn};

use crate::{
    chain::{read_contract, ChainReader, PoolDirectory},
    contracts::interfaces::{IEntryPoint, ISponsorPool},
    errors::ChainError,
};

/// Pool directory that reads a known set of sponsor-pool contracts directly.
///
/// `ethAvailable` is the pool's deposit at the entry point, which is what actually pays for gas.
#[derive(Clone, Debug)]
pub struct OnchainPoolDirectory<C> {
    chain: C,
    entry_point: Address,
    pools: Vec<Address>,
}

impl<C: ChainReader> OnchainPoolDirectory<C> {
    pub fn new(chain: C, entry_point: Address, pools: Vec<Address>) -> Self {
        Self {
            chain,
            entry_point,
            pools,
        }
    }

    pub async fn read_pool(&self, pool: Address) -> Result<SponsorPool, ChainError> {
        let deposit_call = IEntryPoint::balanceOfCall { account: pool };
        let (token, fee, min_amount, owner, deposit) = tokio::try_join!(
            read_contract(&self.chain, pool, &ISponsorPool::tokenCall {}),
            read_contract(&self.chain, pool, &ISponsorPool::feeBasisPointsCall {}),
            read_contract(&self.chain, pool, &ISponsorPool::minTransferAmountCall {}),
            read_contract(&self.chain, pool, &ISponsorPool::ownerCall {}),
            read_contract(&self.chain, self.entry_point, &deposit_call),
        )?;

        let fee_bps = u64::try_from(fee._0).unwrap_or(u64::MAX);
        SponsorPool::new(pool, token._0, fee_bps, min_amount._0, deposit._0, owner._0).map_err(|e| {
            ChainError::Decode {
                target: pool,
                reason: e.to_string(),
            }
        })
    }
}

#[async_trait]
impl<C: ChainReader> PoolDirectory for OnchainPoolDirectory<C> {
    async fn pools_for_token(&self, token: Address) -> Result<Vec<SponsorPool>, ChainError> {
        let mut out = Vec::with_capacity(self.pools.len());
        let mut failed = 0usize;
        let mut last_error = None;
        for &address in &self.pools {
            match self.read_pool(address).await {
                Ok(pool) if pool.token_address() == token => out.push(pool),
                Ok(pool) => {
                    debug!(pool = %address, pool_token = %pool.token_address(), %token, "pool_token_mismatch");
                }
                // One broken pool must not hide the others.
                Err(e) => {
                    warn!(pool = %address, error = %e, "pool_read_failed");
                    failed += 1;
                    last_error = Some(e);
                }
            }
        }
        // Nothing could be read at all: the directory is down, not empty.
        if failed == self.pools.len() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }
        if out.is_empty() && !self.pools.is_empty() {
            debug!(%token, configured = self.pools.len(), "no_pool_for_token");
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::FeeEstimate;
    use alloy_primitives::{Bytes, U256};
    use alloy_sol_types::{SolCall, SolValue};

    struct PoolChain {
        pool: Address,
        token: Address,
        fee: U256,
    }

    #[async_trait]
    impl ChainReader for PoolChain {
        async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
            let selector: [u8; 4] = data[..4].try_into().unwrap();
            let word = if to == self.pool && selector == ISponsorPool::tokenCall::SELECTOR {
                self.token.abi_encode()
            } else if selector == ISponsorPool::feeBasisPointsCall::SELECTOR {
                self.fee.abi_encode()
            } else if selector == ISponsorPool::minTransferAmountCall::SELECTOR {
                U256::from(5u64).abi_encode()
            } else if selector == ISponsorPool::ownerCall::SELECTOR {
                Address::repeat_byte(0x0e).abi_encode()
            } else if selector == IEntryPoint::balanceOfCall::SELECTOR {
                U256::from(10u64).pow(U256::from(18u64)).abi_encode()
            } else {
                return Err(ChainError::Rpc { code: -32000, message: "execution reverted".into() });
            };
            Ok(word.into())
        }

        async fn get_code(&self, _address: Address) -> Result<Bytes, ChainError> {
            Ok(Bytes::new())
        }

        async fn fee_estimate(&self) -> Result<FeeEstimate, ChainError> {
            Ok(FeeEstimate { max_fee_per_gas: 1, max_priority_fee_per_gas: 1 })
        }
    }

    #[tokio::test]
    async fn reads_pool_fields_and_deposit() {
        let pool = Address::repeat_byte(0x0a);
        let token = Address::repeat_byte(0x0b);
        let chain = PoolChain { pool, token, fee: U256::from(25u64) };
        let dir = OnchainPoolDirectory::new(chain, Address::repeat_byte(0xee), vec![pool]);

        let pools = dir.pools_for_token(token).await.unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].fee_basis_points(), 25);
        assert_eq!(pools[0].min_transfer_amount(), U256::from(5u64));
        assert_eq!(pools[0].sponsor_address(), Address::repeat_byte(0x0e));
        assert_eq!(pools[0].eth_available(), U256::from(10u64).pow(U256::from(18u64)));

        assert!(dir.pools_for_token(Address::repeat_byte(0x0c)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pool_with_invalid_fee_is_skipped() {
        let pool = Address::repeat_byte(0x0a);
        let token = Address::repeat_byte(0x0b);
        let chain = PoolChain { pool, token, fee: U256::from(10_001u64) };
        let dir = OnchainPoolDirectory::new(chain, Address::repeat_byte(0xee), vec![pool]);

        assert!(dir.read_pool(pool).await.is_err());
        assert!(matches!(dir.pools_for_token(token).await, Err(ChainError::Decode { .. })));
    }

    struct DownChain;

    #[async_trait]
    impl ChainReader for DownChain {
        async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes, ChainError> {
            Err(ChainError::Transport("connection refused".into()))
        }

        async fn get_code(&self, _address: Address) -> Result<Bytes, ChainError> {
            Err(ChainError::Transport("connection refused".into()))
        }

        async fn fee_estimate(&self) -> Result<FeeEstimate, ChainError> {
            Err(ChainError::Transport("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn unreachable_chain_is_an_error_not_an_empty_list() {
        let pools = vec![Address::repeat_byte(0x0a), Address::repeat_byte(0x0d)];
        let dir = OnchainPoolDirectory::new(DownChain, Address::repeat_byte(0xee), pools);

        let err = dir.pools_for_token(Address::repeat_byte(0x0b)).await.unwrap_err();
        assert!(matches!(err, ChainError::Transport(_)));
    }

    #[tokio::test]
    async fn one_unreadable_pool_does_not_hide_the_rest() {
        let pool = Address::repeat_byte(0x0a);
        let token = Address::repeat_byte(0x0b);
        let chain = PoolChain { pool, token, fee: U256::from(25u64) };
        // 0x0d answers `token()` with a revert.
        let dir = OnchainPoolDirectory::new(
            chain,
            Address::repeat_byte(0xee),
            vec![pool, Address::repeat_byte(0x0d)],
        );

        let found = dir.pools_for_token(token).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].pool_address(), pool);
    }
}
