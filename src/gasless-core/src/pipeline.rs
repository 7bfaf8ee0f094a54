//! End-to-end sponsored transfer.
//!
//! select pool → resolve account → check allowance → build → hash → sign → submit → wait.
//! Every step runs once per attempt; retries (new quote, new allowance, new nonce) belong to
//! the caller.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use gasless_types::{CandidatePool, OperationReceipt, SmartAccountIdentity, UnsignedOperation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    account::AccountResolver,
    builder::{GasSettings, OperationBuilder, TransferIntent},
    chain::{read_contract, ChainReader, FeeEstimate, PoolDirectory, PriceOracle},
    config::{GasOverrides, PipelineConfig},
    contracts::interfaces::{IEntryPoint, IERC20},
    errors::GaslessError,
    hasher::{checked_operation_hash, packed_user_operation},
    relay::{RelayClient, RelaySubmitter},
    selector::{select_pool, PoolSelection},
    signer::OperationSigner,
};

/// ERC-20 token the transfer moves. `symbol` is what the price oracle is keyed by.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub address: Address,
    pub symbol: String,
}

impl Token {
    pub fn new(address: Address, symbol: impl Into<String>) -> Self {
        Self {
            address,
            symbol: symbol.into(),
        }
    }
}

/// Ranked pools for a prospective transfer.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub token: Address,
    pub amount: U256,
    /// Worst-case gas cost in wei used for ranking.
    pub estimated_gas: U256,
    /// Wei per token base unit, when the oracle knew one.
    pub exchange_rate: Option<f64>,
    pub best: Option<CandidatePool>,
    pub candidates: Vec<CandidatePool>,
}

impl Quote {
    /// Fee charged by the best pool, in token base units.
    pub fn fee(&self) -> Option<U256> {
        self.best.as_ref().and_then(|c| c.pool.fee_for(self.amount))
    }
}

/// One transfer as the caller describes it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferRequest {
    pub recipient: Address,
    pub token: Token,
    pub amount: U256,
    pub overrides: GasOverrides,
}

/// ERC-20 `approve` the owner must broadcast before the transfer can go through.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub token: Address,
    pub owner: Address,
    /// The owner's smart account.
    pub spender: Address,
    pub amount: U256,
    pub current_allowance: U256,
    /// `approve(spender, amount)` calldata, sent to `token`.
    pub call_data: Bytes,
}

impl ApprovalRequest {
    pub fn new(token: Address, owner: Address, spender: Address, amount: U256, current: U256) -> Self {
        let call_data = IERC20::approveCall { spender, amount }.abi_encode().into();
        Self {
            token,
            owner,
            spender,
            amount,
            current_allowance: current,
            call_data,
        }
    }
}

/// Outcome of [`GaslessPipeline::run`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferStatus {
    Completed(OperationReceipt),
    /// Nothing was built or submitted; approve, then [`GaslessPipeline::resume`].
    NeedsApproval(ApprovalRequest),
}

/// The assembled pipeline. Collaborators are injected so tests can swap in fakes.
#[derive(Clone, Debug)]
pub struct GaslessPipeline<C, R, D, O> {
    config: PipelineConfig,
    chain: C,
    pools: D,
    oracle: O,
    resolver: AccountResolver,
    builder: OperationBuilder,
    submitter: RelaySubmitter<R>,
}

impl<C, R, D, O> GaslessPipeline<C, R, D, O>
where
    C: ChainReader,
    R: RelayClient,
    D: PoolDirectory,
    O: PriceOracle,
{
    pub fn new(config: PipelineConfig, chain: C, relay: R, pools: D, oracle: O) -> Self {
        let resolver = AccountResolver::new(config.factory, config.entry_point, config.account_salt);
        let submitter = RelaySubmitter::new(relay, config.entry_point, config.poll);
        Self {
            config,
            chain,
            pools,
            oracle,
            resolver,
            builder: OperationBuilder::new(),
            submitter,
        }
    }

    pub fn with_sponsor_context(mut self, context: Bytes) -> Self {
        self.builder = self.builder.with_sponsor_context(context);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    pub fn relay(&self) -> &R {
        self.submitter.relay()
    }

    /// Smart account of `owner` with its current deployment state and nonce.
    pub async fn resolve_account(&self, owner: Address) -> Result<SmartAccountIdentity, GaslessError> {
        self.resolver.resolve(&self.chain, owner).await
    }

    /// Rank pools for `amount` of `token`, assuming an already deployed account.
    pub async fn quote(&self, token: &Token, amount: U256) -> Result<Quote, GaslessError> {
        let gas = self.gas_settings(true, &GasOverrides::default()).await?;
        self.quote_with_gas(token, amount, gas.max_cost()).await
    }

    /// Run the transfer; an insufficient allowance comes back as an error.
    pub async fn execute_gasless_transfer<S: OperationSigner + ?Sized>(
        &self,
        signer: &S,
        recipient: Address,
        token: &Token,
        amount: U256,
    ) -> Result<OperationReceipt, GaslessError> {
        let request = TransferRequest {
            recipient,
            token: token.clone(),
            amount,
            overrides: GasOverrides::default(),
        };
        self.execute(signer, &request).await
    }

    /// Run the transfer; an insufficient allowance comes back as [`TransferStatus::NeedsApproval`].
    pub async fn run<S: OperationSigner + ?Sized>(
        &self,
        signer: &S,
        request: &TransferRequest,
    ) -> Result<TransferStatus, GaslessError> {
        match self.execute(signer, request).await {
            Ok(receipt) => Ok(TransferStatus::Completed(receipt)),
            Err(GaslessError::InsufficientAllowance {
                owner,
                spender,
                required,
                current,
            }) => {
                info!(%owner, %spender, %required, %current, token = %request.token.address, "approval_required");
                Ok(TransferStatus::NeedsApproval(ApprovalRequest::new(
                    request.token.address,
                    owner,
                    spender,
                    required,
                    current,
                )))
            }
            Err(e) => Err(e),
        }
    }

    /// Re-run the whole pipeline after the owner approved. Nothing from the first attempt is reused.
    pub async fn resume<S: OperationSigner + ?Sized>(
        &self,
        signer: &S,
        request: &TransferRequest,
    ) -> Result<TransferStatus, GaslessError> {
        info!(owner = %signer.owner(), token = %request.token.address, "transfer_resumed");
        self.run(signer, request).await
    }

    /// Full pipeline with caller gas overrides.
    pub async fn execute<S: OperationSigner + ?Sized>(
        &self,
        signer: &S,
        request: &TransferRequest,
    ) -> Result<OperationReceipt, GaslessError> {
        let owner = signer.owner();
        let intent = TransferIntent {
            owner,
            recipient: request.recipient,
            token: request.token.address,
            amount: request.amount,
        };
        if intent.amount.is_zero() {
            return Err(GaslessError::BuildFailed("amount must be greater than zero".into()));
        }
        if intent.recipient == Address::ZERO {
            return Err(GaslessError::BuildFailed("recipient is the zero address".into()));
        }

        let identity = self.resolve_account(owner).await?;
        let gas = self
            .gas_settings(identity.is_deployed(), &request.overrides)
            .await?;

        let quote = self
            .quote_with_gas(&request.token, request.amount, gas.max_cost())
            .await?;
        let best = quote.best.ok_or(GaslessError::NoHealthyPool {
            token: request.token.address,
            candidates: quote.candidates.len(),
        })?;
        let pool = best.pool;
        let fee = pool
            .fee_for(request.amount)
            .ok_or_else(|| GaslessError::BuildFailed("fee overflows uint256".into()))?;

        let required = request
            .amount
            .checked_add(fee)
            .ok_or_else(|| GaslessError::BuildFailed("amount plus fee overflows uint256".into()))?;
        self.ensure_allowance(&intent, identity.account_address(), required)
            .await?;

        let operation = self.builder.build(&identity, &intent, &pool, &gas)?;
        let hash = checked_operation_hash(&operation, self.config.entry_point, self.config.chain_id)?;
        if self.config.verify_hash_onchain {
            self.verify_hash_onchain(&operation, hash).await?;
        }
        info!(
            operation_hash = %hash,
            sender = %operation.sender,
            nonce = %operation.nonce,
            pool = %pool.pool_address(),
            %fee,
            deploys_account = !identity.is_deployed(),
            "operation_built"
        );

        let signature = signer
            .sign_operation_hash(hash)
            .await
            .map_err(GaslessError::SigningFailed)?;
        let signed = operation.into_signed(signature);

        self.submitter.submit_and_wait(&signed, hash).await
    }

    async fn gas_settings(
        &self,
        is_deployed: bool,
        overrides: &GasOverrides,
    ) -> Result<GasSettings, GaslessError> {
        let fees = match (overrides.max_fee_per_gas, overrides.max_priority_fee_per_gas) {
            (Some(max_fee_per_gas), Some(max_priority_fee_per_gas)) => FeeEstimate {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            },
            _ => self
                .chain
                .fee_estimate()
                .await
                .map_err(GaslessError::ResolutionFailed)?,
        };
        Ok(GasSettings::resolve(&self.config.gas, is_deployed, fees, overrides))
    }

    async fn quote_with_gas(
        &self,
        token: &Token,
        amount: U256,
        estimated_gas: U256,
    ) -> Result<Quote, GaslessError> {
        let pools = self
            .pools
            .pools_for_token(token.address)
            .await
            .map_err(GaslessError::PoolLookupFailed)?;
        let exchange_rate = self.oracle.price_in_native(&token.symbol).await;
        if exchange_rate.is_none() {
            warn!(symbol = %token.symbol, "price_unavailable");
        }

        let PoolSelection { best, candidates } =
            select_pool(token.address, amount, &pools, estimated_gas, exchange_rate);
        match &best {
            Some(c) => info!(
                token = %token.address,
                pool = %c.pool.pool_address(),
                effective_fee_percentage = c.effective_fee_percentage,
                candidates = candidates.len(),
                "pool_selected"
            ),
            None => info!(token = %token.address, candidates = candidates.len(), "no_healthy_pool"),
        }

        Ok(Quote {
            token: token.address,
            amount,
            estimated_gas,
            exchange_rate,
            best,
            candidates,
        })
    }

    async fn ensure_allowance(
        &self,
        intent: &TransferIntent,
        spender: Address,
        required: U256,
    ) -> Result<(), GaslessError> {
        let call = IERC20::allowanceCall {
            owner: intent.owner,
            spender,
        };
        let current = read_contract(&self.chain, intent.token, &call)
            .await
            .map_err(GaslessError::ResolutionFailed)?
            ._0;
        debug!(owner = %intent.owner, %spender, %current, %required, "allowance_checked");

        if current < required {
            return Err(GaslessError::InsufficientAllowance {
                owner: intent.owner,
                spender,
                required,
                current,
            });
        }
        Ok(())
    }

    async fn verify_hash_onchain(
        &self,
        operation: &UnsignedOperation,
        local: B256,
    ) -> Result<(), GaslessError> {
        let call = IEntryPoint::getUserOpHashCall {
            userOp: packed_user_operation(operation, Bytes::new()),
        };
        let reported = read_contract(&self.chain, self.config.entry_point, &call)
            .await
            .map_err(GaslessError::ResolutionFailed)?
            ._0;
        if reported != local {
            return Err(GaslessError::HashMismatch { local, reported });
        }
        debug!(operation_hash = %local, "hash_verified_onchain");
        Ok(())
    }
}
