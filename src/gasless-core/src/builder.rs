//! Unsigned operation assembly.
//!
//! The operation asks the smart account to run two `transferFrom(owner, ..)` calls in one
//! `executeBatch`: the transfer itself and the sponsor fee. The account never holds the token;
//! it spends the owner's allowance.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use gasless_types::{
    packing::{pack_sponsor_and_data, pack_u128_pair},
    SmartAccountIdentity, SponsorPool, UnsignedOperation,
};

use crate::{
    chain::FeeEstimate,
    config::{GasOverrides, GasPolicy},
    contracts::interfaces::{IERC20, ISmartAccount},
    errors::GaslessError,
    hasher::inner_hash,
};

/// What the owner wants moved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferIntent {
    pub owner: Address,
    pub recipient: Address,
    pub token: Address,
    pub amount: U256,
}

/// Concrete gas and fee values for one operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GasSettings {
    pub verification_gas_limit: u128,
    pub call_gas_limit: u128,
    pub pre_verification_gas: U256,
    pub sponsor_verification_gas_limit: u128,
    pub sponsor_post_op_gas_limit: u128,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

impl GasSettings {
    /// Pick the budget for the account state, then apply caller overrides field by field.
    pub fn resolve(
        policy: &GasPolicy,
        is_deployed: bool,
        fees: FeeEstimate,
        overrides: &GasOverrides,
    ) -> Self {
        let budget = policy.budget_for(is_deployed);
        Self {
            verification_gas_limit: overrides
                .verification_gas_limit
                .unwrap_or(budget.verification_gas_limit),
            call_gas_limit: overrides.call_gas_limit.unwrap_or(budget.call_gas_limit),
            pre_verification_gas: overrides
                .pre_verification_gas
                .unwrap_or(policy.pre_verification_gas),
            sponsor_verification_gas_limit: overrides
                .sponsor_verification_gas_limit
                .unwrap_or(policy.sponsor_verification_gas_limit),
            sponsor_post_op_gas_limit: overrides
                .sponsor_post_op_gas_limit
                .unwrap_or(policy.sponsor_post_op_gas_limit),
            max_fee_per_gas: overrides.max_fee_per_gas.unwrap_or(fees.max_fee_per_gas),
            max_priority_fee_per_gas: overrides
                .max_priority_fee_per_gas
                .unwrap_or(fees.max_priority_fee_per_gas),
        }
    }

    pub fn total_gas(&self) -> U256 {
        U256::from(self.verification_gas_limit)
            + U256::from(self.call_gas_limit)
            + self.pre_verification_gas
            + U256::from(self.sponsor_verification_gas_limit)
            + U256::from(self.sponsor_post_op_gas_limit)
    }

    /// Worst-case native cost (wei) the sponsor may be charged.
    pub fn max_cost(&self) -> U256 {
        self.total_gas()
            .saturating_mul(U256::from(self.max_fee_per_gas))
    }
}

/// `executeBatch` calldata: `amount` to the recipient, `fee` to the pool, both pulled from the owner.
pub fn transfer_call_data(intent: &TransferIntent, fee_recipient: Address, fee: U256) -> Bytes {
    let to_recipient = IERC20::transferFromCall {
        from: intent.owner,
        to: intent.recipient,
        amount: intent.amount,
    };
    let to_sponsor = IERC20::transferFromCall {
        from: intent.owner,
        to: fee_recipient,
        amount: fee,
    };
    ISmartAccount::executeBatchCall {
        dest: vec![intent.token, intent.token],
        value: vec![U256::ZERO, U256::ZERO],
        func: vec![to_recipient.abi_encode().into(), to_sponsor.abi_encode().into()],
    }
    .abi_encode()
    .into()
}

/// Builds [`UnsignedOperation`]s for sponsored transfers.
#[derive(Clone, Debug, Default)]
pub struct OperationBuilder {
    /// Trailing bytes appended to `sponsorAndData` (pool-specific context).
    pub sponsor_context: Bytes,
}

impl OperationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sponsor_context(mut self, context: Bytes) -> Self {
        self.sponsor_context = context;
        self
    }

    /// Assemble the operation. The fee is `amount * pool.feeBasisPoints / 10_000`, paid to the pool.
    pub fn build(
        &self,
        identity: &SmartAccountIdentity,
        intent: &TransferIntent,
        pool: &SponsorPool,
        gas: &GasSettings,
    ) -> Result<UnsignedOperation, GaslessError> {
        validate(identity, intent, pool, gas)?;

        let fee = pool
            .fee_for(intent.amount)
            .ok_or_else(|| GaslessError::BuildFailed("fee overflows uint256".into()))?;
        intent
            .amount
            .checked_add(fee)
            .ok_or_else(|| GaslessError::BuildFailed("amount plus fee overflows uint256".into()))?;

        let operation = UnsignedOperation {
            sender: identity.account_address(),
            nonce: identity.nonce(),
            deployment_payload: identity.deployment_payload().clone(),
            call_data: transfer_call_data(intent, pool.pool_address(), fee),
            packed_gas_limits: pack_u128_pair(gas.verification_gas_limit, gas.call_gas_limit),
            pre_verification_gas: gas.pre_verification_gas,
            packed_fee_fields: pack_u128_pair(gas.max_priority_fee_per_gas, gas.max_fee_per_gas),
            sponsor_and_data: pack_sponsor_and_data(
                pool.pool_address(),
                gas.sponsor_verification_gas_limit,
                gas.sponsor_post_op_gas_limit,
                &self.sponsor_context,
            ),
        };
        check_packing(&operation, gas, pool.pool_address(), &self.sponsor_context)?;
        Ok(operation)
    }
}

/// Unpack the packed fields and compare them with what went in.
fn check_packing(
    op: &UnsignedOperation,
    gas: &GasSettings,
    pool: Address,
    context: &[u8],
) -> Result<(), GaslessError> {
    let sponsor = op
        .sponsor_fields()
        .map_err(|e| GaslessError::BuildFailed(e.to_string()))?;
    let unpacked = GasSettings {
        verification_gas_limit: op.verification_gas_limit(),
        call_gas_limit: op.call_gas_limit(),
        pre_verification_gas: op.pre_verification_gas,
        sponsor_verification_gas_limit: sponsor.verification_gas_limit,
        sponsor_post_op_gas_limit: sponsor.post_op_gas_limit,
        max_fee_per_gas: op.max_fee_per_gas(),
        max_priority_fee_per_gas: op.max_priority_fee_per_gas(),
    };
    if unpacked == *gas && sponsor.pool == pool && sponsor.context.as_ref() == context {
        return Ok(());
    }

    let expected = UnsignedOperation {
        packed_gas_limits: pack_u128_pair(gas.verification_gas_limit, gas.call_gas_limit),
        pre_verification_gas: gas.pre_verification_gas,
        packed_fee_fields: pack_u128_pair(gas.max_priority_fee_per_gas, gas.max_fee_per_gas),
        sponsor_and_data: pack_sponsor_and_data(
            pool,
            gas.sponsor_verification_gas_limit,
            gas.sponsor_post_op_gas_limit,
            context,
        ),
        ..op.clone()
    };
    Err(GaslessError::HashMismatch {
        local: inner_hash(op),
        reported: inner_hash(&expected),
    })
}

fn validate(
    identity: &SmartAccountIdentity,
    intent: &TransferIntent,
    pool: &SponsorPool,
    gas: &GasSettings,
) -> Result<(), GaslessError> {
    let fail = |msg: &str| Err(GaslessError::BuildFailed(msg.to_string()));

    if intent.amount.is_zero() {
        return fail("amount must be greater than zero");
    }
    if intent.owner == Address::ZERO {
        return fail("owner is the zero address");
    }
    if intent.recipient == Address::ZERO {
        return fail("recipient is the zero address");
    }
    if intent.token == Address::ZERO {
        return fail("token is the zero address");
    }
    if intent.owner != identity.owner_address() {
        return fail("owner does not match the resolved smart account");
    }
    if pool.token_address() != intent.token {
        return fail("sponsor pool serves a different token");
    }
    if identity.is_deployed() == !identity.deployment_payload().is_empty() {
        return fail("deployment payload does not match deployment state");
    }
    if gas.verification_gas_limit == 0 || gas.call_gas_limit == 0 {
        return fail("gas limits must be non-zero");
    }
    if gas.max_priority_fee_per_gas > gas.max_fee_per_gas {
        return fail("priority fee exceeds max fee");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gasless_types::packing::pack_deployment_payload;

    const OWNER: Address = Address::repeat_byte(0x01);
    const RECIPIENT: Address = Address::repeat_byte(0x02);
    const TOKEN: Address = Address::repeat_byte(0x03);
    const ACCOUNT: Address = Address::repeat_byte(0xac);
    const POOL: Address = Address::repeat_byte(0x9a);

    fn pool(fee_bps: u64) -> SponsorPool {
        SponsorPool::new(POOL, TOKEN, fee_bps, U256::from(1u64), U256::MAX, Address::repeat_byte(0x5e))
            .unwrap()
    }

    fn intent(amount: u64) -> TransferIntent {
        TransferIntent {
            owner: OWNER,
            recipient: RECIPIENT,
            token: TOKEN,
            amount: U256::from(amount),
        }
    }

    fn fees() -> FeeEstimate {
        FeeEstimate {
            max_fee_per_gas: 2_000_000_000,
            max_priority_fee_per_gas: 1_000_000_000,
        }
    }

    fn steady_gas() -> GasSettings {
        GasSettings::resolve(&GasPolicy::default(), true, fees(), &GasOverrides::default())
    }

    #[test]
    fn packs_gas_fee_and_sponsor_fields() {
        let identity = SmartAccountIdentity::deployed(OWNER, ACCOUNT, U256::from(9u64));
        let gas = steady_gas();
        let op = OperationBuilder::new()
            .build(&identity, &intent(1_000_000), &pool(30), &gas)
            .unwrap();

        assert_eq!(op.sender, ACCOUNT);
        assert_eq!(op.nonce, U256::from(9u64));
        assert!(op.deployment_payload.is_empty());
        assert_eq!(op.verification_gas_limit(), gas.verification_gas_limit);
        assert_eq!(op.call_gas_limit(), gas.call_gas_limit);
        assert_eq!(op.max_priority_fee_per_gas(), 1_000_000_000);
        assert_eq!(op.max_fee_per_gas(), 2_000_000_000);
        assert_eq!(op.pre_verification_gas, gas.pre_verification_gas);

        let sponsor = op.sponsor_fields().unwrap();
        assert_eq!(sponsor.pool, POOL);
        assert_eq!(sponsor.verification_gas_limit, gas.sponsor_verification_gas_limit);
        assert_eq!(sponsor.post_op_gas_limit, gas.sponsor_post_op_gas_limit);
        assert!(sponsor.context.is_empty());
        assert_eq!(op.sponsor_and_data.len(), 52);
    }

    #[test]
    fn call_data_moves_amount_and_fee_from_owner() {
        let identity = SmartAccountIdentity::deployed(OWNER, ACCOUNT, U256::ZERO);
        let op = OperationBuilder::new()
            .build(&identity, &intent(1_000_000), &pool(30), &steady_gas())
            .unwrap();

        let batch = ISmartAccount::executeBatchCall::abi_decode(&op.call_data, true).unwrap();
        assert_eq!(batch.dest, vec![TOKEN, TOKEN]);
        assert_eq!(batch.value, vec![U256::ZERO, U256::ZERO]);

        let first = IERC20::transferFromCall::abi_decode(&batch.func[0], true).unwrap();
        assert_eq!((first.from, first.to, first.amount), (OWNER, RECIPIENT, U256::from(1_000_000u64)));

        let second = IERC20::transferFromCall::abi_decode(&batch.func[1], true).unwrap();
        assert_eq!((second.from, second.to, second.amount), (OWNER, POOL, U256::from(3_000u64)));
    }

    #[test]
    fn undeployed_account_attaches_payload_and_deployment_budget() {
        let payload = pack_deployment_payload(Address::repeat_byte(0xfa), &[0x5f, 0xbf, 0xb9, 0xcf]);
        let identity = SmartAccountIdentity::undeployed(OWNER, ACCOUNT, payload.clone(), U256::ZERO);
        let policy = GasPolicy::default();
        let gas = GasSettings::resolve(&policy, identity.is_deployed(), fees(), &GasOverrides::default());
        let op = OperationBuilder::new()
            .build(&identity, &intent(10), &pool(0), &gas)
            .unwrap();

        assert_eq!(op.deployment_payload, payload);
        assert_eq!(op.verification_gas_limit(), policy.deployment.verification_gas_limit);
        assert!(op.verification_gas_limit() > policy.steady.verification_gas_limit);
    }

    #[test]
    fn overrides_win_over_policy_and_estimate() {
        let overrides = GasOverrides {
            call_gas_limit: Some(77_000),
            max_fee_per_gas: Some(5),
            max_priority_fee_per_gas: Some(5),
            ..GasOverrides::default()
        };
        let gas = GasSettings::resolve(&GasPolicy::default(), true, fees(), &overrides);
        assert_eq!(gas.call_gas_limit, 77_000);
        assert_eq!(gas.max_fee_per_gas, 5);
        assert_eq!(gas.verification_gas_limit, GasPolicy::default().steady.verification_gas_limit);
    }

    #[test]
    fn sponsor_context_is_appended() {
        let identity = SmartAccountIdentity::deployed(OWNER, ACCOUNT, U256::ZERO);
        let op = OperationBuilder::new()
            .with_sponsor_context(Bytes::from_static(&[0xaa, 0xbb]))
            .build(&identity, &intent(10), &pool(0), &steady_gas())
            .unwrap();
        assert_eq!(op.sponsor_fields().unwrap().context.as_ref(), &[0xaa, 0xbb]);
    }

    #[test]
    fn invalid_inputs_fail_to_build() {
        let identity = SmartAccountIdentity::deployed(OWNER, ACCOUNT, U256::ZERO);
        let builder = OperationBuilder::new();
        let gas = steady_gas();

        let zero = builder.build(&identity, &intent(0), &pool(30), &gas);
        assert!(matches!(zero, Err(GaslessError::BuildFailed(_))));

        let mut no_recipient = intent(10);
        no_recipient.recipient = Address::ZERO;
        assert!(builder.build(&identity, &no_recipient, &pool(30), &gas).is_err());

        let mut stranger = intent(10);
        stranger.owner = Address::repeat_byte(0x77);
        assert!(builder.build(&identity, &stranger, &pool(30), &gas).is_err());

        let mut bad_fees = gas;
        bad_fees.max_priority_fee_per_gas = bad_fees.max_fee_per_gas + 1;
        assert!(builder.build(&identity, &intent(10), &pool(30), &bad_fees).is_err());
    }

    #[test]
    fn oversized_amount_is_rejected_not_clamped() {
        let identity = SmartAccountIdentity::deployed(OWNER, ACCOUNT, U256::ZERO);
        let mut huge = intent(1);
        huge.amount = U256::MAX / U256::from(2u64);

        let err = OperationBuilder::new()
            .build(&identity, &huge, &pool(10_000), &steady_gas())
            .unwrap_err();
        assert!(matches!(err, GaslessError::BuildFailed(msg) if msg.contains("fee overflows")));
    }

    #[test]
    fn packing_check_detects_drift() {
        let identity = SmartAccountIdentity::deployed(OWNER, ACCOUNT, U256::ZERO);
        let gas = steady_gas();
        let mut op = OperationBuilder::new()
            .build(&identity, &intent(10), &pool(30), &gas)
            .unwrap();
        assert!(check_packing(&op, &gas, POOL, &[]).is_ok());

        op.packed_gas_limits = pack_u128_pair(gas.call_gas_limit, gas.verification_gas_limit);
        let err = check_packing(&op, &gas, POOL, &[]).unwrap_err();
        assert!(matches!(err, GaslessError::HashMismatch { local, reported } if local != reported));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn max_cost_covers_every_gas_phase() {
        let gas = steady_gas();
        let expected = (U256::from(150_000u64 + 200_000 + 60_000 + 100_000 + 50_000))
            * U256::from(2_000_000_000u64);
        assert_eq!(gas.max_cost(), expected);
    }
}
