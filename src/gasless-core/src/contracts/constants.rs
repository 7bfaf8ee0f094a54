//! Protocol constants mirrored from the v0.7 entry point and SimpleAccount factory.

use alloy_primitives::{address, aliases::U192, Address, U256};

/// Canonical v0.7 entry point deployment (same address on every chain).
pub const ENTRY_POINT_V07: Address = address!("0000000071727De22E5E9d8BAf0edAc6f37da032");

/// Canonical SimpleAccountFactory for entry point v0.7.
pub const SIMPLE_ACCOUNT_FACTORY_V07: Address = address!("91E60e0613810449d098b0b5Ec8b51A0FE8c8985");

/// Salt used for every owner's account (one account per owner).
pub const DEFAULT_ACCOUNT_SALT: U256 = U256::ZERO;

/// Nonce key 0: the single sequential nonce lane.
pub const DEFAULT_NONCE_KEY: U192 = U192::ZERO;

// Gas budgets. Deploying the account in the same operation costs roughly an order of
// magnitude more validation gas than calling an existing account.
pub const STEADY_VERIFICATION_GAS_LIMIT: u128 = 150_000;
pub const STEADY_CALL_GAS_LIMIT: u128 = 200_000;
pub const DEPLOY_VERIFICATION_GAS_LIMIT: u128 = 1_500_000;
pub const DEPLOY_CALL_GAS_LIMIT: u128 = 400_000;
pub const PRE_VERIFICATION_GAS: u64 = 60_000;
pub const SPONSOR_VERIFICATION_GAS_LIMIT: u128 = 100_000;
pub const SPONSOR_POST_OP_GAS_LIMIT: u128 = 50_000;

/// Relay receipt polling defaults.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_RECEIPT_TIMEOUT_MS: u64 = 30_000;
