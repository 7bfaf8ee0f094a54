//! Submission to the relay and receipt polling.

pub mod http;
pub mod wire;

use std::sync::Arc;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use gasless_types::{OperationReceipt, SignedOperation};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::{
    config::PollConfig,
    errors::{GaslessError, RelayError},
};

/// Relay (bundler) endpoint.
#[async_trait]
pub trait RelayClient: Send + Sync {
    /// Submit a signed operation; returns the operation hash the relay computed.
    async fn send_operation(
        &self,
        operation: &SignedOperation,
        entry_point: Address,
    ) -> Result<B256, RelayError>;

    /// Terminal receipt, or `None` while the operation is still pending.
    async fn get_receipt(&self, operation_hash: B256) -> Result<Option<OperationReceipt>, RelayError>;
}

#[async_trait]
impl<T: RelayClient + ?Sized> RelayClient for Arc<T> {
    async fn send_operation(
        &self,
        operation: &SignedOperation,
        entry_point: Address,
    ) -> Result<B256, RelayError> {
        (**self).send_operation(operation, entry_point).await
    }

    async fn get_receipt(&self, operation_hash: B256) -> Result<Option<OperationReceipt>, RelayError> {
        (**self).get_receipt(operation_hash).await
    }
}

/// Submits one signed operation and waits for its outcome. Never resubmits.
#[derive(Clone, Debug)]
pub struct RelaySubmitter<R> {
    relay: R,
    entry_point: Address,
    poll: PollConfig,
}

impl<R: RelayClient> RelaySubmitter<R> {
    pub fn new(relay: R, entry_point: Address, poll: PollConfig) -> Self {
        Self {
            relay,
            entry_point,
            poll,
        }
    }

    pub fn relay(&self) -> &R {
        &self.relay
    }

    /// Send the operation. The relay's hash must equal `local_hash`.
    pub async fn submit(
        &self,
        operation: &SignedOperation,
        local_hash: B256,
    ) -> Result<B256, GaslessError> {
        let reported = self
            .relay
            .send_operation(operation, self.entry_point)
            .await
            .map_err(GaslessError::SubmissionRejected)?;

        if reported != local_hash {
            return Err(GaslessError::HashMismatch {
                local: local_hash,
                reported,
            });
        }
        info!(operation_hash = %reported, sender = %operation.operation().sender, "operation_submitted");
        Ok(reported)
    }

    /// Poll until a receipt shows up or the timeout expires.
    ///
    /// A failed receipt becomes [`GaslessError::OnChainRevert`].
    pub async fn wait_for_receipt(&self, operation_hash: B256) -> Result<OperationReceipt, GaslessError> {
        let receipt = timeout(self.poll.timeout(), self.poll_receipt(operation_hash))
            .await
            .map_err(|_| GaslessError::ReceiptTimeout {
                operation_hash,
                timeout_ms: self.poll.timeout_ms,
            })?;

        if !receipt.success {
            warn!(
                %operation_hash,
                transaction_hash = %receipt.transaction_hash,
                reason = receipt.revert_reason.as_deref().unwrap_or(""),
                "operation_reverted"
            );
            return Err(GaslessError::OnChainRevert {
                operation_hash,
                transaction_hash: receipt.transaction_hash,
                reason: receipt.revert_reason,
            });
        }

        info!(
            %operation_hash,
            transaction_hash = %receipt.transaction_hash,
            block_number = receipt.block_number,
            actual_gas_cost = %receipt.actual_gas_cost,
            "operation_included"
        );
        Ok(receipt)
    }

    pub async fn submit_and_wait(
        &self,
        operation: &SignedOperation,
        local_hash: B256,
    ) -> Result<OperationReceipt, GaslessError> {
        let operation_hash = self.submit(operation, local_hash).await?;
        self.wait_for_receipt(operation_hash).await
    }

    async fn poll_receipt(&self, operation_hash: B256) -> OperationReceipt {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.relay.get_receipt(operation_hash).await {
                Ok(Some(receipt)) => return receipt,
                Ok(None) => debug!(%operation_hash, attempt, "receipt_pending"),
                Err(e) => warn!(%operation_hash, attempt, error = %e, "receipt_poll_failed"),
            }
            sleep(self.poll.interval()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Bytes, U256};
    use gasless_types::{
        packing::{pack_sponsor_and_data, pack_u128_pair},
        UnsignedOperation,
    };
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Mutex,
    };
    use std::time::Duration;

    const HASH: B256 = B256::repeat_byte(0x4d);

    struct ScriptedRelay {
        hash: B256,
        /// Receipt appears on this poll (1-based); 0 means never.
        ready_on: u32,
        success: bool,
        fail_first_poll: bool,
        polls: AtomicU32,
        sent: Mutex<Vec<B256>>,
    }

    impl ScriptedRelay {
        fn new(ready_on: u32) -> Self {
            Self {
                hash: HASH,
                ready_on,
                success: true,
                fail_first_poll: false,
                polls: AtomicU32::new(0),
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RelayClient for ScriptedRelay {
        async fn send_operation(
            &self,
            _operation: &SignedOperation,
            _entry_point: Address,
        ) -> Result<B256, RelayError> {
            self.sent.lock().unwrap().push(self.hash);
            Ok(self.hash)
        }

        async fn get_receipt(&self, operation_hash: B256) -> Result<Option<OperationReceipt>, RelayError> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_first_poll && n == 1 {
                return Err(RelayError::Transport("connection refused".into()));
            }
            if self.ready_on == 0 || n < self.ready_on {
                return Ok(None);
            }
            Ok(Some(OperationReceipt {
                operation_hash,
                success: self.success,
                actual_gas_cost: U256::from(21_000u64),
                actual_gas_used: U256::from(21_000u64),
                revert_reason: (!self.success).then(|| "ERC20: transfer amount exceeds allowance".into()),
                transaction_hash: B256::repeat_byte(0x7c),
                block_number: 100,
            }))
        }
    }

    fn signed() -> SignedOperation {
        UnsignedOperation {
            sender: Address::repeat_byte(0x11),
            nonce: U256::ZERO,
            deployment_payload: Bytes::new(),
            call_data: Bytes::new(),
            packed_gas_limits: pack_u128_pair(1, 1),
            pre_verification_gas: U256::from(1u64),
            packed_fee_fields: pack_u128_pair(1, 1),
            sponsor_and_data: pack_sponsor_and_data(Address::repeat_byte(0x33), 1, 1, &[]),
        }
        .into_signed(Bytes::from(vec![0u8; 65]))
    }

    fn submitter(relay: ScriptedRelay) -> RelaySubmitter<ScriptedRelay> {
        RelaySubmitter::new(relay, Address::repeat_byte(0xe9), PollConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn receipt_on_third_poll() {
        let s = submitter(ScriptedRelay::new(3));
        let started = tokio::time::Instant::now();

        let receipt = s.submit_and_wait(&signed(), HASH).await.unwrap();

        assert_eq!(receipt.operation_hash, HASH);
        assert_eq!(s.relay().polls.load(Ordering::SeqCst), 3);
        // Two sleeps between three polls.
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn no_receipt_times_out_at_bound() {
        let s = submitter(ScriptedRelay::new(0));
        let started = tokio::time::Instant::now();

        let err = s.wait_for_receipt(HASH).await.unwrap_err();

        assert!(matches!(err, GaslessError::ReceiptTimeout { timeout_ms: 30_000, .. }));
        assert!(started.elapsed() >= Duration::from_secs(30));
        assert!(started.elapsed() < Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_transport_error_is_not_fatal() {
        let mut relay = ScriptedRelay::new(2);
        relay.fail_first_poll = true;
        let s = submitter(relay);

        let receipt = s.wait_for_receipt(HASH).await.unwrap();
        assert!(receipt.success);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_receipt_is_revert() {
        let mut relay = ScriptedRelay::new(1);
        relay.success = false;
        let err = submitter(relay).wait_for_receipt(HASH).await.unwrap_err();

        match err {
            GaslessError::OnChainRevert { transaction_hash, reason, .. } => {
                assert_eq!(transaction_hash, B256::repeat_byte(0x7c));
                assert!(reason.unwrap().contains("allowance"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn relay_hash_must_match_local() {
        let mut relay = ScriptedRelay::new(1);
        relay.hash = B256::repeat_byte(0x01);
        let s = submitter(relay);

        let err = s.submit(&signed(), HASH).await.unwrap_err();
        assert!(matches!(err, GaslessError::HashMismatch { .. }));
        assert_eq!(s.relay().polls.load(Ordering::SeqCst), 0);
    }
}
