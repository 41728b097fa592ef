//! Monte Carlo path simulation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{check_len, KernelError};

/// Parameters for one simulated underlying.
#[derive(Debug, Clone, Copy)]
pub struct PathSpec {
    /// Starting price.
    pub spot: f64,
    /// Annualized drift.
    pub drift: f64,
    /// Annualized volatility.
    pub volatility: f64,
    /// Simulated horizon in years.
    pub horizon_years: f64,
}

/// Simulate geometric Brownian motion paths for each spec.
///
/// `paths` is laid out spec-major then path-major:
/// `paths[(s * num_paths + p) * num_steps + t]`, so its length must be
/// `specs.len() * num_paths * num_steps`. The generator is seeded, so a
/// given `(specs, num_paths, num_steps, seed)` always produces the same
/// paths.
pub fn monte_carlo(
    specs: &[PathSpec],
    paths: &mut [f64],
    num_paths: usize,
    num_steps: usize,
    seed: u64,
) -> Result<(), KernelError> {
    if num_paths == 0 || num_steps == 0 {
        return Err(KernelError::BadArgument(
            "num_paths and num_steps must be positive".into(),
        ));
    }
    check_len(
        "monte_carlo paths",
        specs.len() * num_paths * num_steps,
        paths.len(),
    )?;

    let mut rng = StdRng::seed_from_u64(seed);

    for (s, spec) in specs.iter().enumerate() {
        if spec.spot <= 0.0 || spec.horizon_years <= 0.0 {
            return Err(KernelError::BadArgument(format!(
                "spot and horizon must be positive (spot {}, horizon {})",
                spec.spot, spec.horizon_years
            )));
        }

        let dt = spec.horizon_years / num_steps as f64;
        let step_drift = (spec.drift - 0.5 * spec.volatility * spec.volatility) * dt;
        let step_vol = spec.volatility * dt.sqrt();

        for p in 0..num_paths {
            let base = (s * num_paths + p) * num_steps;
            let mut price = spec.spot;
            for t in 0..num_steps {
                price *= (step_drift + step_vol * standard_normal(&mut rng)).exp();
                paths[base + t] = price;
            }
        }
    }
    Ok(())
}

/// One standard normal draw via Box-Muller.
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> PathSpec {
        PathSpec {
            spot: 100.0,
            drift: 0.05,
            volatility: 0.2,
            horizon_years: 1.0,
        }
    }

    #[test]
    fn test_deterministic_for_seed() {
        let specs = [spec()];
        let mut a = vec![0.0; 10 * 50];
        let mut b = vec![0.0; 10 * 50];
        monte_carlo(&specs, &mut a, 10, 50, 42).unwrap();
        monte_carlo(&specs, &mut b, 10, 50, 42).unwrap();
        assert_eq!(a, b);

        let mut c = vec![0.0; 10 * 50];
        monte_carlo(&specs, &mut c, 10, 50, 43).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_paths_stay_positive() {
        let specs = [spec()];
        let mut paths = vec![0.0; 100 * 20];
        monte_carlo(&specs, &mut paths, 100, 20, 7).unwrap();
        assert!(paths.iter().all(|p| *p > 0.0));
    }

    #[test]
    fn test_zero_volatility_is_deterministic_growth() {
        let specs = [PathSpec {
            spot: 100.0,
            drift: 0.1,
            volatility: 0.0,
            horizon_years: 1.0,
        }];
        let mut paths = vec![0.0; 2 * 4];
        monte_carlo(&specs, &mut paths, 2, 4, 1).unwrap();

        // With sigma = 0 every path is exp(drift * t).
        let expected_final = 100.0 * (0.1f64).exp();
        assert!((paths[3] - expected_final).abs() < 1e-9);
        assert!((paths[7] - expected_final).abs() < 1e-9);
    }

    #[test]
    fn test_terminal_mean_tracks_drift() {
        let specs = [spec()];
        let num_paths = 5_000;
        let num_steps = 16;
        let mut paths = vec![0.0; num_paths * num_steps];
        monte_carlo(&specs, &mut paths, num_paths, num_steps, 11).unwrap();

        let mean_final: f64 = (0..num_paths)
            .map(|p| paths[p * num_steps + num_steps - 1])
            .sum::<f64>()
            / num_paths as f64;

        // E[S_T] = S_0 e^{mu T} = 105.1...; allow generous sampling error.
        let expected = 100.0 * (0.05f64).exp();
        assert!(
            (mean_final - expected).abs() < 2.0,
            "mean {mean_final} vs {expected}"
        );
    }

    #[test]
    fn test_length_validation() {
        let specs = [spec()];
        let mut wrong = vec![0.0; 9];
        assert!(matches!(
            monte_carlo(&specs, &mut wrong, 2, 5, 1),
            Err(KernelError::BadLength { .. })
        ));
        assert!(monte_carlo(&specs, &mut wrong, 0, 5, 1).is_err());
    }
}
