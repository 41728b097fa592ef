//! Portfolio analysis kernels.

use crate::error::{check_len, KernelError};

/// Risk-adjusted weight allocation.
///
/// `covariance` is the row-major `n x n` covariance matrix for the `n`
/// assets in `mean_returns`. Each asset is weighted by its excess return
/// over `risk_free_rate` divided by its variance, then the weights are
/// normalized to sum to one; assets below the risk-free rate get zero.
/// When no asset clears the risk-free rate the allocation is equal-weight.
/// If the resulting expected return falls short of `target_return`, the
/// allocation is tilted toward the highest-returning asset just enough to
/// reach the target (or as close as that asset allows).
pub fn portfolio_optimization(
    mean_returns: &[f64],
    covariance: &[f64],
    weights: &mut [f64],
    risk_free_rate: f64,
    target_return: f64,
) -> Result<(), KernelError> {
    let n = weights.len();
    if n == 0 {
        return Err(KernelError::BadArgument("no assets to weight".into()));
    }
    check_len("portfolio mean returns", n, mean_returns.len())?;
    check_len("portfolio covariance", n * n, covariance.len())?;

    let mut total = 0.0;
    for i in 0..n {
        let variance = covariance[i * n + i];
        if variance < 0.0 {
            return Err(KernelError::BadArgument(format!(
                "negative variance for asset {i}"
            )));
        }
        let excess = mean_returns[i] - risk_free_rate;
        weights[i] = if excess > 0.0 && variance > 0.0 {
            excess / variance
        } else {
            0.0
        };
        total += weights[i];
    }

    if total <= 0.0 {
        // Nothing beats the risk-free rate; fall back to equal weight.
        let equal = 1.0 / n as f64;
        weights.fill(equal);
    } else {
        for w in weights.iter_mut() {
            *w /= total;
        }
    }

    // Tilt toward the best asset when the target return is not met.
    let expected: f64 = weights
        .iter()
        .zip(mean_returns)
        .map(|(w, r)| w * r)
        .sum();
    if expected < target_return {
        let (best, best_return) = mean_returns
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |acc, (i, r)| {
                if r > acc.1 {
                    (i, r)
                } else {
                    acc
                }
            });
        if best_return > expected {
            let lambda = ((target_return - expected) / (best_return - expected)).min(1.0);
            for (i, w) in weights.iter_mut().enumerate() {
                *w *= 1.0 - lambda;
                if i == best {
                    *w += lambda;
                }
            }
        }
    }
    Ok(())
}

/// Historical value-at-risk of a weighted portfolio.
///
/// `returns` holds per-asset return series, asset-major: asset `i`'s
/// observations occupy `returns[i * n_obs .. (i + 1) * n_obs]` where
/// `n_obs = returns.len() / weights.len()`. The VaR is the loss at the
/// `1 - confidence` quantile of the weighted return series, scaled by the
/// square root of `horizon_days`, floored at zero.
pub fn value_at_risk(
    returns: &[f64],
    weights: &[f64],
    confidence: f64,
    horizon_days: u32,
) -> Result<f64, KernelError> {
    let n_assets = weights.len();
    if n_assets == 0 || returns.is_empty() {
        return Err(KernelError::BadArgument(
            "returns and weights must not be empty".into(),
        ));
    }
    if returns.len() % n_assets != 0 {
        return Err(KernelError::BadLength {
            what: "value_at_risk returns",
            expected: (returns.len() / n_assets) * n_assets,
            actual: returns.len(),
        });
    }
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(KernelError::BadArgument(format!(
            "confidence must be in (0, 1), got {confidence}"
        )));
    }
    if horizon_days == 0 {
        return Err(KernelError::BadArgument("horizon must be positive".into()));
    }

    let n_obs = returns.len() / n_assets;
    let mut portfolio: Vec<f64> = (0..n_obs)
        .map(|t| {
            (0..n_assets)
                .map(|i| weights[i] * returns[i * n_obs + t])
                .sum()
        })
        .collect();
    portfolio.sort_by(|a, b| a.total_cmp(b));

    let idx = (((1.0 - confidence) * n_obs as f64).ceil() as usize)
        .saturating_sub(1)
        .min(n_obs - 1);
    let quantile = portfolio[idx];
    Ok((-quantile).max(0.0) * (horizon_days as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn test_weights_sum_to_one() {
        let means = [0.10, 0.08, 0.02];
        // Diagonal covariance: variances 0.04, 0.01, 0.09.
        let cov = [
            0.04, 0.0, 0.0, //
            0.0, 0.01, 0.0, //
            0.0, 0.0, 0.09,
        ];
        let mut weights = [0.0; 3];
        portfolio_optimization(&means, &cov, &mut weights, 0.03, 0.0).unwrap();

        assert_close(weights.iter().sum::<f64>(), 1.0);
        // Asset 1 has the best excess/variance ratio; asset 2 is below the
        // risk-free rate and gets nothing.
        assert!(weights[1] > weights[0]);
        assert_close(weights[2], 0.0);
    }

    #[test]
    fn test_equal_weight_fallback() {
        let means = [0.01, 0.02];
        let cov = [0.04, 0.0, 0.0, 0.04];
        let mut weights = [0.0; 2];
        portfolio_optimization(&means, &cov, &mut weights, 0.05, 0.0).unwrap();
        assert_close(weights[0], 0.5);
        assert_close(weights[1], 0.5);
    }

    #[test]
    fn test_target_return_tilts_to_best() {
        let means = [0.12, 0.04];
        let cov = [0.04, 0.0, 0.0, 0.0001];
        let mut weights = [0.0; 2];
        // Low-variance asset 1 dominates the base allocation, dragging
        // expected return below the target; the tilt moves weight to 0.
        portfolio_optimization(&means, &cov, &mut weights, 0.0, 0.10).unwrap();

        let expected: f64 = weights.iter().zip(&means).map(|(w, r)| w * r).sum();
        assert_close(weights.iter().sum::<f64>(), 1.0);
        assert!((expected - 0.10).abs() < 1e-9, "expected {expected}");
    }

    #[test]
    fn test_var_single_asset() {
        // 100 observations: -5% once, -1% a few times, the rest positive.
        let mut returns = vec![0.01; 100];
        returns[0] = -0.05;
        returns[1] = -0.01;
        returns[2] = -0.01;

        let var = value_at_risk(&returns, &[1.0], 0.99, 1).unwrap();
        // The 1% left-tail quantile lands on the worst observation.
        assert_close(var, 0.05);

        // Four-day horizon scales by sqrt(4).
        let var4 = value_at_risk(&returns, &[1.0], 0.99, 4).unwrap();
        assert_close(var4, 0.10);
    }

    #[test]
    fn test_var_weighted_portfolio() {
        // Two assets, two observations each; asset-major layout.
        let returns = [
            -0.10, 0.02, // asset 0
            0.02, 0.02, // asset 1
        ];
        let var = value_at_risk(&returns, &[0.5, 0.5], 0.9, 1).unwrap();
        // Worst portfolio return: 0.5*(-0.10) + 0.5*0.02 = -0.04.
        assert_close(var, 0.04);
    }

    #[test]
    fn test_var_no_losses_is_zero() {
        let returns = [0.01, 0.02, 0.03, 0.04];
        let var = value_at_risk(&returns, &[1.0], 0.95, 1).unwrap();
        assert_close(var, 0.0);
    }

    #[test]
    fn test_var_argument_checks() {
        assert!(value_at_risk(&[], &[1.0], 0.95, 1).is_err());
        assert!(value_at_risk(&[0.1, 0.2, 0.3], &[0.5, 0.5], 0.95, 1).is_err());
        assert!(value_at_risk(&[0.1, 0.2], &[1.0], 1.5, 1).is_err());
        assert!(value_at_risk(&[0.1, 0.2], &[1.0], 0.95, 0).is_err());
    }
}
