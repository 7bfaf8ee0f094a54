//! Sponsor pool ranking.
//!
//! Pure function of its inputs: the price lookup happens before, in the pipeline.

use alloy_primitives::{Address, U256};
use gasless_types::{CandidatePool, SponsorPool};

/// Ranked candidates for one transfer plus the chosen pool, if any is healthy.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PoolSelection {
    pub best: Option<CandidatePool>,
    /// Every pool for the token, ascending by effective fee, healthy or not.
    pub candidates: Vec<CandidatePool>,
}

/// Rank the pools of `token` for a transfer of `amount` base units.
///
/// `estimated_gas` is in wei; `exchange_rate` is wei per token base unit. Without a usable rate
/// the gas term is 0, which under-estimates the cost but never blocks a quote.
pub fn select_pool(
    token: Address,
    amount: U256,
    pools: &[SponsorPool],
    estimated_gas: U256,
    exchange_rate: Option<f64>,
) -> PoolSelection {
    let gas_cost_percentage = gas_cost_percentage(amount, estimated_gas, exchange_rate);

    let mut candidates: Vec<CandidatePool> = pools
        .iter()
        .filter(|p| p.token_address() == token)
        .map(|pool| {
            let is_healthy =
                pool.eth_available() >= estimated_gas && amount >= pool.min_transfer_amount();
            CandidatePool {
                pool: pool.clone(),
                gas_cost_percentage,
                effective_fee_percentage: f64::from(pool.fee_basis_points()) / 100.0
                    + gas_cost_percentage,
                is_healthy,
            }
        })
        .collect();

    // Stable: equal fees keep pool-list order.
    candidates.sort_by(|a, b| a.effective_fee_percentage.total_cmp(&b.effective_fee_percentage));

    let best = candidates.iter().find(|c| c.is_healthy).cloned();
    PoolSelection { best, candidates }
}

fn gas_cost_percentage(amount: U256, estimated_gas: U256, exchange_rate: Option<f64>) -> f64 {
    let Some(rate) = exchange_rate.filter(|r| r.is_finite() && *r > 0.0) else {
        return 0.0;
    };
    let notional = f64::from(amount) * rate;
    if notional <= 0.0 || !notional.is_finite() {
        return 0.0;
    }
    f64::from(estimated_gas) / notional * 100.0
}
