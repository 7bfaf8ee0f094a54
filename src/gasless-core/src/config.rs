//! Pipeline configuration.
//!
//! Every field has a default, so a JSON config file only needs to carry what differs
//! (typically `chainId` and, on non-canonical deployments, `factory`).

use std::time::Duration;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::contracts::constants::{
    DEFAULT_ACCOUNT_SALT, DEFAULT_POLL_INTERVAL_MS, DEFAULT_RECEIPT_TIMEOUT_MS,
    DEPLOY_CALL_GAS_LIMIT, DEPLOY_VERIFICATION_GAS_LIMIT, ENTRY_POINT_V07, PRE_VERIFICATION_GAS,
    SIMPLE_ACCOUNT_FACTORY_V07, SPONSOR_POST_OP_GAS_LIMIT, SPONSOR_VERIFICATION_GAS_LIMIT,
    STEADY_CALL_GAS_LIMIT, STEADY_VERIFICATION_GAS_LIMIT,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    pub entry_point: Address,
    pub factory: Address,
    pub chain_id: u64,
    pub account_salt: U256,
    pub gas: GasPolicy,
    pub poll: PollConfig,
    /// Cross-check the local operation hash against `EntryPoint.getUserOpHash` before signing.
    pub verify_hash_onchain: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            entry_point: ENTRY_POINT_V07,
            factory: SIMPLE_ACCOUNT_FACTORY_V07,
            chain_id: 1,
            account_salt: DEFAULT_ACCOUNT_SALT,
            gas: GasPolicy::default(),
            poll: PollConfig::default(),
            verify_hash_onchain: false,
        }
    }
}

/// Validation + call gas for one account state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasBudget {
    pub verification_gas_limit: u128,
    pub call_gas_limit: u128,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GasPolicy {
    /// Budget when the account already exists.
    pub steady: GasBudget,
    /// Budget when the operation also deploys the account.
    pub deployment: GasBudget,
    pub pre_verification_gas: U256,
    pub sponsor_verification_gas_limit: u128,
    pub sponsor_post_op_gas_limit: u128,
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self {
            steady: GasBudget {
                verification_gas_limit: STEADY_VERIFICATION_GAS_LIMIT,
                call_gas_limit: STEADY_CALL_GAS_LIMIT,
            },
            deployment: GasBudget {
                verification_gas_limit: DEPLOY_VERIFICATION_GAS_LIMIT,
                call_gas_limit: DEPLOY_CALL_GAS_LIMIT,
            },
            pre_verification_gas: U256::from(PRE_VERIFICATION_GAS),
            sponsor_verification_gas_limit: SPONSOR_VERIFICATION_GAS_LIMIT,
            sponsor_post_op_gas_limit: SPONSOR_POST_OP_GAS_LIMIT,
        }
    }
}

impl GasPolicy {
    pub fn budget_for(&self, is_deployed: bool) -> GasBudget {
        if is_deployed {
            self.steady
        } else {
            self.deployment
        }
    }
}

/// Per-call gas and fee overrides. `None` falls back to the policy or the chain estimate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GasOverrides {
    pub verification_gas_limit: Option<u128>,
    pub call_gas_limit: Option<u128>,
    pub pre_verification_gas: Option<U256>,
    pub sponsor_verification_gas_limit: Option<u128>,
    pub sponsor_post_op_gas_limit: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            timeout_ms: DEFAULT_RECEIPT_TIMEOUT_MS,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
