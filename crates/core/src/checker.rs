//! Liquidation eligibility math.
//!
//! Pure and deterministic: no I/O, no mutable state. Both polling loops and the
//! reconciliation sweep call into these functions concurrently, always with
//! fresh snapshots of the position and price caches.

use std::collections::HashMap;

use tracing::warn;

use crate::config::RiskConfig;
use crate::types::{CollateralPosition, LiquidationEligibility, LiquidationParams};

/// Milliseconds per year used for interest accrual.
const MS_PER_YEAR: f64 = 365.0 * 24.0 * 60.0 * 60.0 * 1000.0;

/// Compute the risk verdict for one position at one collateral price.
///
/// Interest accrues linearly on the debt principal since the last sync, so the
/// debt value can only grow between syncs. Zero total debt means an infinite
/// health factor; such a position is never liquidatable.
pub fn check_eligibility(
    position: &CollateralPosition,
    collateral_price: f64,
    now_ms: u64,
    cfg: &RiskConfig,
) -> LiquidationEligibility {
    let collateral_value = position.collateral_amount * collateral_price;

    let elapsed_ms = now_ms.saturating_sub(position.last_updated_ms) as f64;
    let accrued_interest =
        position.debt_amount * cfg.interest_rate_annual * (elapsed_ms / MS_PER_YEAR);
    let debt_value = position.debt_amount + accrued_interest;

    let health_factor = if debt_value == 0.0 {
        f64::INFINITY
    } else {
        collateral_value / (debt_value * cfg.collateralization_threshold)
    };

    LiquidationEligibility {
        escrow_address: position.escrow_address.clone(),
        collateral_value,
        debt_value,
        health_factor,
        is_liquidatable: health_factor < 1.0,
    }
}

/// Compute submission parameters for an eligible position.
///
/// A single liquidation closes at most half the outstanding debt; the seized
/// collateral includes the liquidation bonus, and the expected profit is the
/// bonus portion valued at the current price.
pub fn liquidation_params(
    position: &CollateralPosition,
    collateral_price: f64,
    eligibility: &LiquidationEligibility,
    cfg: &RiskConfig,
) -> LiquidationParams {
    let liquidation_amount = eligibility.debt_value * cfg.close_factor;
    let seized_units = liquidation_amount / collateral_price;

    LiquidationParams {
        escrow_address: position.escrow_address.clone(),
        collateral_asset: position.collateral_asset.clone(),
        debt_asset: position.debt_asset.clone(),
        liquidation_amount,
        collateral_to_seize: seized_units * (1.0 + cfg.liquidation_bonus),
        expected_profit: seized_units * cfg.liquidation_bonus * collateral_price,
    }
}

/// Batch verdicts for a set of positions against a price map.
///
/// A position whose collateral asset has no cached price is skipped with a
/// warning; a missing price is a gap to log, not a batch failure.
pub fn check_positions(
    positions: &[CollateralPosition],
    prices: &HashMap<String, f64>,
    now_ms: u64,
    cfg: &RiskConfig,
) -> Vec<LiquidationEligibility> {
    positions
        .iter()
        .filter_map(|position| match prices.get(&position.collateral_asset) {
            Some(price) => Some(check_eligibility(position, *price, now_ms, cfg)),
            None => {
                warn!(
                    escrow = %position.escrow_address,
                    asset = %position.collateral_asset,
                    "No cached price for collateral asset, skipping position"
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(collateral_amount: f64, debt_amount: f64) -> CollateralPosition {
        CollateralPosition {
            escrow_address: "0xesc1".into(),
            collateral_asset: "ETH".into(),
            collateral_amount,
            debt_asset: "USDC".into(),
            debt_amount,
            pool_id: "pool-1".into(),
            last_updated_ms: 0,
        }
    }

    fn risk() -> RiskConfig {
        RiskConfig::default()
    }

    #[test]
    fn zero_debt_is_never_liquidatable() {
        let pos = position(0.0, 0.0);
        let verdict = check_eligibility(&pos, 500.0, 0, &risk());

        assert!(verdict.health_factor.is_infinite());
        assert!(!verdict.is_liquidatable);

        // Still infinite with collateral present and time elapsed.
        let pos = position(100.0, 0.0);
        let verdict = check_eligibility(&pos, 500.0, 1_000_000_000, &risk());
        assert!(verdict.health_factor.is_infinite());
        assert!(!verdict.is_liquidatable);
    }

    #[test]
    fn liquidatable_only_strictly_below_one() {
        // collateral 15, price 100, debt 1000, threshold 1.5, zero elapsed
        // => HF = 1500 / (1000 * 1.5) = 1.0 exactly
        let pos = position(15.0, 1000.0);
        let verdict = check_eligibility(&pos, 100.0, 0, &risk());
        assert_eq!(verdict.health_factor, 1.0);
        assert!(!verdict.is_liquidatable);

        // One cent less collateral value tips it over.
        let verdict = check_eligibility(&pos, 99.99, 0, &risk());
        assert!(verdict.health_factor < 1.0);
        assert!(verdict.is_liquidatable);
    }

    #[test]
    fn interest_only_grows_debt() {
        let pos = position(20.0, 7000.0);
        let one_year_ms = (MS_PER_YEAR) as u64;

        let at_sync = check_eligibility(&pos, 500.0, 0, &risk());
        let later = check_eligibility(&pos, 500.0, one_year_ms, &risk());

        assert_eq!(at_sync.debt_value, 7000.0);
        // 5% annual on 7000 principal.
        assert!((later.debt_value - 7350.0).abs() < 1e-6);
        assert!(later.debt_value >= pos.debt_amount);
        assert!(later.health_factor < at_sync.health_factor);
    }

    #[test]
    fn end_to_end_scenario() {
        // 20 units at $500 = $10,000 collateral; $7,000 debt; threshold 1.5.
        let pos = position(20.0, 7000.0);
        let cfg = risk();

        let verdict = check_eligibility(&pos, 500.0, 0, &cfg);
        assert!((verdict.health_factor - 0.95238).abs() < 1e-4);
        assert!(verdict.is_liquidatable);

        let params = liquidation_params(&pos, 500.0, &verdict, &cfg);
        assert!((params.liquidation_amount - 3500.0).abs() < 1e-9);
        assert!((params.collateral_to_seize - 7.35).abs() < 1e-9);
        assert!((params.expected_profit - 175.0).abs() < 1e-9);
    }

    #[test]
    fn liquidation_amount_never_exceeds_half_debt() {
        let pos = position(1.0, 10_000.0);
        let cfg = risk();
        let verdict = check_eligibility(&pos, 100.0, 0, &cfg);

        // Repeated calls stay capped.
        for _ in 0..3 {
            let params = liquidation_params(&pos, 100.0, &verdict, &cfg);
            assert!(params.liquidation_amount <= verdict.debt_value * 0.5 + 1e-9);
        }
    }

    #[test]
    fn batch_skips_positions_without_price() {
        let positions = vec![
            position(20.0, 7000.0),
            CollateralPosition {
                collateral_asset: "UNPRICED".into(),
                ..position(5.0, 100.0)
            },
        ];
        let prices = HashMap::from([("ETH".to_string(), 500.0)]);

        let verdicts = check_positions(&positions, &prices, 0, &risk());
        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].escrow_address, "0xesc1");
    }
}
