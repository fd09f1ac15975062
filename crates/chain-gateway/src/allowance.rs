use tracing::info;

use crate::client::ChainClient;
use crate::error::ChainError;

/// Horizon `ensureWalletAllowances` sizes allowances for, per §4.6: "needed
/// for N providers over a fixed horizon (6 months)."
pub const ALLOWANCE_HORIZON_MONTHS: u32 = 6;

/// Approximates the original SDK's `uint256` max allowance. Rust has no
/// native 256-bit integer; `u128::MAX` is the widest integer this crate
/// carries on-chain counters in (per §9's "mixed numeric widths" note), and
/// is large enough that no real allowance check will ever be limited by it.
pub const MAX_ALLOWANCE: u128 = u128::MAX;

/// Per-provider allowance rate the wallet must cover for the probe harness
/// to keep issuing deals without running dry mid-horizon. These are harness
/// policy constants, not chain-derived values — see `DESIGN.md` for the
/// sizing rationale.
#[derive(Debug, Clone, Copy)]
pub struct AllowanceRates {
    pub rate_allowance_per_provider: u128,
    pub lockup_allowance_per_provider: u128,
}

impl Default for AllowanceRates {
    fn default() -> Self {
        Self {
            rate_allowance_per_provider: 1_000_000_000,
            lockup_allowance_per_provider: 10_000_000_000,
        }
    }
}

fn required_allowance(rate_per_provider: u128, provider_count: u64, horizon_months: u32) -> u128 {
    rate_per_provider
        .saturating_mul(provider_count as u128)
        .saturating_mul(horizon_months as u128)
}

/// §4.6: "computes `{rateAllowance, lockupAllowance}` needed for N providers
/// over a fixed horizon (6 months) and, if deficient, deposits the shortfall
/// and/or re-approves with `uint256-max`-equivalent allowances."
///
/// Wallet allowance failures at startup are fatal (§7), so callers should
/// propagate `Err` rather than continue probing with an under-funded
/// wallet.
pub async fn ensure_wallet_allowances(
    client: &dyn ChainClient,
    wallet_address: &str,
    provider_count: u64,
    rates: AllowanceRates,
) -> Result<(), ChainError> {
    let needed_rate = required_allowance(
        rates.rate_allowance_per_provider,
        provider_count,
        ALLOWANCE_HORIZON_MONTHS,
    );
    let needed_lockup = required_allowance(
        rates.lockup_allowance_per_provider,
        provider_count,
        ALLOWANCE_HORIZON_MONTHS,
    );

    let account = client.account_info(wallet_address).await?;

    let rate_deficient = account.rate_allowance < needed_rate;
    let lockup_deficient = account.lockup_allowance < needed_lockup;

    if !rate_deficient && !lockup_deficient {
        return Ok(());
    }

    info!(
        wallet_address,
        needed_rate,
        needed_lockup,
        have_rate = account.rate_allowance,
        have_lockup = account.lockup_allowance,
        "wallet allowance deficient, topping up"
    );

    let needed_balance = needed_rate.max(needed_lockup);
    if account.balance < needed_balance {
        let shortfall = needed_balance - account.balance;
        client.deposit(wallet_address, shortfall).await?;
    }

    client
        .approve_service(wallet_address, MAX_ALLOWANCE, MAX_ALLOWANCE)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_allowance_scales_with_providers_and_horizon() {
        assert_eq!(required_allowance(100, 10, 6), 6_000);
        assert_eq!(required_allowance(100, 0, 6), 0);
    }
}
