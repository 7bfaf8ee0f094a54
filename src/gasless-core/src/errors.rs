use alloy_primitives::{Address, B256, U256};
use thiserror::Error;

pub use gasless_types::{PackingError, PoolError};

/// Errors from chain reads (`eth_call`, `eth_getCode`, fee queries).
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("call to {target} failed to decode: {reason}")]
    Decode { target: Address, reason: String },
}

/// Errors from the relay endpoint.
#[derive(Debug, Clone, Error)]
pub enum RelayError {
    #[error("transport error: {0}")]
    Transport(String),

    /// Validation error reported by the relay (message passed through verbatim).
    #[error("relay error {code}: {message}")]
    Rejected { code: i64, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("operation cannot be encoded for the relay: {0}")]
    Encoding(#[from] PackingError),
}

#[derive(Debug, Clone, Error)]
pub enum SignerError {
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

/// Pipeline-level error taxonomy.
///
/// Everything except [`GaslessError::HashMismatch`] can be retried by the caller with fresh
/// inputs (new quote, new allowance, new nonce). A hash mismatch is a packing/hashing defect.
#[derive(Debug, Clone, Error)]
pub enum GaslessError {
    #[error("no healthy sponsor pool for token {token} ({candidates} candidates)")]
    NoHealthyPool { token: Address, candidates: usize },

    #[error("allowance {current} from {owner} to {spender} is below required {required}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        required: U256,
        current: U256,
    },

    #[error("smart account resolution failed: {0}")]
    ResolutionFailed(#[source] ChainError),

    #[error("operation build failed: {0}")]
    BuildFailed(String),

    #[error("operation hash mismatch: local {local}, reported {reported}")]
    HashMismatch { local: B256, reported: B256 },

    #[error("relay rejected operation: {0}")]
    SubmissionRejected(#[source] RelayError),

    #[error("operation {operation_hash} reverted on-chain: {}", .reason.as_deref().unwrap_or("no reason given"))]
    OnChainRevert {
        operation_hash: B256,
        transaction_hash: B256,
        reason: Option<String>,
    },

    #[error("no receipt for operation {operation_hash} after {timeout_ms}ms")]
    ReceiptTimeout { operation_hash: B256, timeout_ms: u64 },

    #[error("signing failed: {0}")]
    SigningFailed(#[source] SignerError),

    #[error("sponsor pool lookup failed: {0}")]
    PoolLookupFailed(#[source] ChainError),
}

impl GaslessError {
    /// Whether a fresh attempt of the whole pipeline may succeed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::HashMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_hash_mismatch_is_fatal() {
        let fatal = GaslessError::HashMismatch {
            local: B256::ZERO,
            reported: B256::repeat_byte(1),
        };
        assert!(!fatal.is_recoverable());

        let recoverable = [
            GaslessError::NoHealthyPool { token: Address::ZERO, candidates: 0 },
            GaslessError::BuildFailed("zero amount".into()),
            GaslessError::ReceiptTimeout { operation_hash: B256::ZERO, timeout_ms: 30_000 },
            GaslessError::SubmissionRejected(RelayError::Rejected {
                code: -32602,
                message: "AA25 invalid account nonce".into(),
            }),
        ];
        assert!(recoverable.iter().all(GaslessError::is_recoverable));
    }

    #[test]
    fn revert_message_includes_reason() {
        let err = GaslessError::OnChainRevert {
            operation_hash: B256::ZERO,
            transaction_hash: B256::ZERO,
            reason: Some("ERC20: insufficient allowance".into()),
        };
        assert!(err.to_string().contains("ERC20: insufficient allowance"));
    }
}
