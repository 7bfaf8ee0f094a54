use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use gasless_types::{OperationReceipt, SignedOperation};
use serde_json::json;

use crate::{
    errors::RelayError,
    relay::{
        wire::{WireOperation, WireReceipt},
        RelayClient,
    },
    rpc::JsonRpcClient,
};

/// [`RelayClient`] for a bundler exposing the standard `eth_*UserOperation*` methods.
#[derive(Clone, Debug)]
pub struct HttpRelayClient {
    rpc: JsonRpcClient,
}

impl HttpRelayClient {
    pub fn new(rpc: JsonRpcClient) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl RelayClient for HttpRelayClient {
    async fn send_operation(
        &self,
        operation: &SignedOperation,
        entry_point: Address,
    ) -> Result<B256, RelayError> {
        let wire = WireOperation::try_from(operation)?;
        Ok(self
            .rpc
            .request("eth_sendUserOperation", json!([wire, entry_point]))
            .await?)
    }

    async fn get_receipt(&self, operation_hash: B256) -> Result<Option<OperationReceipt>, RelayError> {
        let receipt: Option<WireReceipt> = self
            .rpc
            .request("eth_getUserOperationReceipt", json!([operation_hash]))
            .await?;
        Ok(receipt.map(Into::into))
    }
}
