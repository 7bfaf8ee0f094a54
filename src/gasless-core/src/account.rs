//! Smart-account identity resolution.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use gasless_types::{packing::pack_deployment_payload, SmartAccountIdentity};
use tracing::debug;

use crate::{
    chain::{read_contract, ChainReader},
    contracts::{
        constants::DEFAULT_NONCE_KEY,
        interfaces::{IAccountFactory, IEntryPoint},
    },
    errors::{ChainError, GaslessError},
};

/// Resolves an owner's counterfactual account through the factory and entry point.
#[derive(Clone, Copy, Debug)]
pub struct AccountResolver {
    pub factory: Address,
    pub entry_point: Address,
    pub salt: U256,
}

impl AccountResolver {
    pub fn new(factory: Address, entry_point: Address, salt: U256) -> Self {
        Self {
            factory,
            entry_point,
            salt,
        }
    }

    /// `factory || createAccount(owner, salt)`.
    pub fn deployment_payload(&self, owner: Address) -> Bytes {
        let call = IAccountFactory::createAccountCall {
            owner,
            salt: self.salt,
        };
        pack_deployment_payload(self.factory, &call.abi_encode())
    }

    /// Account address only. Stable for a given owner and salt, so callers may cache it.
    pub async fn account_address<C: ChainReader + ?Sized>(
        &self,
        chain: &C,
        owner: Address,
    ) -> Result<Address, GaslessError> {
        let call = IAccountFactory::getAddressCall {
            owner,
            salt: self.salt,
        };
        let account = read_contract(chain, self.factory, &call)
            .await
            .map_err(GaslessError::ResolutionFailed)?
            ._0;
        if account == Address::ZERO {
            return Err(GaslessError::ResolutionFailed(ChainError::Decode {
                target: self.factory,
                reason: "factory returned the zero address".into(),
            }));
        }
        Ok(account)
    }

    /// Full identity: address, deployment state, deployment payload and current nonce.
    ///
    /// Deployment state and nonce are read fresh on every call.
    pub async fn resolve<C: ChainReader + ?Sized>(
        &self,
        chain: &C,
        owner: Address,
    ) -> Result<SmartAccountIdentity, GaslessError> {
        let account = self.account_address(chain, owner).await?;

        let nonce_call = IEntryPoint::getNonceCall {
            sender: account,
            key: DEFAULT_NONCE_KEY,
        };
        let (code, nonce) = tokio::try_join!(
            chain.get_code(account),
            read_contract(chain, self.entry_point, &nonce_call),
        )
        .map_err(GaslessError::ResolutionFailed)?;

        let is_deployed = !code.is_empty();
        debug!(%owner, %account, is_deployed, nonce = %nonce.nonce, "account_resolved");

        Ok(if is_deployed {
            SmartAccountIdentity::deployed(owner, account, nonce.nonce)
        } else {
            SmartAccountIdentity::undeployed(owner, account, self.deployment_payload(owner), nonce.nonce)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::FeeEstimate;
    use alloy_sol_types::SolValue;
    use async_trait::async_trait;

    const FACTORY: Address = Address::repeat_byte(0xfa);
    const ENTRY_POINT: Address = Address::repeat_byte(0xe9);
    const ACCOUNT: Address = Address::repeat_byte(0xac);

    struct FakeChain {
        deployed: bool,
        fail_nonce: bool,
    }

    #[async_trait]
    impl ChainReader for FakeChain {
        async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
            if to == FACTORY && data.starts_with(&IAccountFactory::getAddressCall::SELECTOR) {
                return Ok(ACCOUNT.abi_encode().into());
            }
            if to == ENTRY_POINT && data.starts_with(&IEntryPoint::getNonceCall::SELECTOR) {
                if self.fail_nonce {
                    return Err(ChainError::Transport("connection reset".into()));
                }
                return Ok(U256::from(4u64).abi_encode().into());
            }
            Err(ChainError::Rpc { code: -32000, message: "execution reverted".into() })
        }

        async fn get_code(&self, _address: Address) -> Result<Bytes, ChainError> {
            Ok(if self.deployed {
                Bytes::from_static(&[0x60, 0x80])
            } else {
                Bytes::new()
            })
        }

        async fn fee_estimate(&self) -> Result<FeeEstimate, ChainError> {
            Ok(FeeEstimate { max_fee_per_gas: 1, max_priority_fee_per_gas: 1 })
        }
    }

    fn resolver() -> AccountResolver {
        AccountResolver::new(FACTORY, ENTRY_POINT, U256::ZERO)
    }

    #[tokio::test]
    async fn deployed_account_has_no_payload() {
        let chain = FakeChain { deployed: true, fail_nonce: false };
        let owner = Address::repeat_byte(0x01);
        let id = resolver().resolve(&chain, owner).await.unwrap();

        assert_eq!(id.account_address(), ACCOUNT);
        assert_eq!(id.owner_address(), owner);
        assert!(id.is_deployed());
        assert!(id.deployment_payload().is_empty());
        assert_eq!(id.nonce(), U256::from(4u64));
    }

    #[tokio::test]
    async fn undeployed_account_carries_factory_call() {
        let chain = FakeChain { deployed: false, fail_nonce: false };
        let owner = Address::repeat_byte(0x01);
        let id = resolver().resolve(&chain, owner).await.unwrap();

        assert!(!id.is_deployed());
        let payload = id.deployment_payload();
        assert_eq!(&payload[..20], FACTORY.as_slice());
        assert_eq!(&payload[20..24], &IAccountFactory::createAccountCall::SELECTOR);
        // selector + (address, uint256)
        assert_eq!(payload.len(), 20 + 4 + 64);
        assert_eq!(&payload[20 + 4 + 12..20 + 4 + 32], owner.as_slice());
    }

    #[tokio::test]
    async fn failed_read_is_resolution_error() {
        let chain = FakeChain { deployed: true, fail_nonce: true };
        let err = resolver().resolve(&chain, Address::repeat_byte(0x01)).await.unwrap_err();
        assert!(matches!(err, GaslessError::ResolutionFailed(ChainError::Transport(_))));
    }
}
