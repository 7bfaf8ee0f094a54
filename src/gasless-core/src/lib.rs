//! Gasless token transfers through a sponsor pool and an ERC-4337 (v0.7) smart account.
//!
//! The owner keeps the tokens in their own wallet and grants an allowance to their smart
//! account. The account pulls `amount` to the recipient and the pool fee to the pool in one
//! batched call; the pool pays the gas.

pub mod account;
pub mod builder;
pub mod chain;
pub mod config;
pub mod contracts;
pub mod errors;
pub mod hasher;
pub mod pipeline;
pub mod relay;
pub mod rpc;
pub mod selector;
pub mod signer;

pub use account::AccountResolver;
pub use builder::{GasSettings, OperationBuilder, TransferIntent};
pub use chain::{
    http::HttpChainReader, onchain::OnchainPoolDirectory, ChainReader, FeeEstimate, NoPriceOracle,
    PoolDirectory, PriceOracle, StaticPoolDirectory,
};
pub use config::{GasOverrides, GasPolicy, PipelineConfig, PollConfig};
pub use errors::{ChainError, GaslessError, RelayError, SignerError};
pub use hasher::{checked_operation_hash, operation_hash};
pub use pipeline::{ApprovalRequest, GaslessPipeline, Quote, Token, TransferRequest, TransferStatus};
pub use relay::{http::HttpRelayClient, RelayClient, RelaySubmitter};
pub use rpc::JsonRpcClient;
pub use selector::{select_pool, PoolSelection};
pub use signer::{LocalSigner, OperationSigner};

pub use gasless_types as types;
