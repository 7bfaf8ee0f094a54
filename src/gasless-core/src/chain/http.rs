use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use serde_json::json;

use crate::{
    chain::{ChainReader, FeeEstimate},
    errors::ChainError,
    rpc::JsonRpcClient,
};

/// [`ChainReader`] backed by a node's JSON-RPC endpoint.
#[derive(Clone, Debug)]
pub struct HttpChainReader {
    rpc: JsonRpcClient,
}

impl HttpChainReader {
    pub fn new(rpc: JsonRpcClient) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl ChainReader for HttpChainReader {
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        let params = json!([{ "to": to, "data": data }, "latest"]);
        Ok(self.rpc.request("eth_call", params).await?)
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, ChainError> {
        Ok(self.rpc.request("eth_getCode", json!([address, "latest"])).await?)
    }

    async fn fee_estimate(&self) -> Result<FeeEstimate, ChainError> {
        let (gas_price, priority) = tokio::try_join!(
            self.rpc.request::<_, U256>("eth_gasPrice", json!([])),
            self.rpc.request::<_, U256>("eth_maxPriorityFeePerGas", json!([])),
        )?;
        let gas_price = to_u128(gas_price, "eth_gasPrice")?;
        let max_priority_fee_per_gas = to_u128(priority, "eth_maxPriorityFeePerGas")?;
        // The suggested price already includes a tip; headroom covers one base-fee bump.
        let max_fee_per_gas = gas_price
            .saturating_add(gas_price / 8)
            .max(max_priority_fee_per_gas);
        Ok(FeeEstimate {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        })
    }
}

fn to_u128(value: U256, method: &str) -> Result<u128, ChainError> {
    u128::try_from(value)
        .map_err(|_| ChainError::MalformedResponse(format!("{method}: {value} exceeds 128 bits")))
}
