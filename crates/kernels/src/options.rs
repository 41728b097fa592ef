//! Options pricing kernels.

use crate::error::{check_len, KernelError};

/// One European option to price.
#[derive(Debug, Clone, Copy)]
pub struct OptionContract {
    /// Spot price of the underlying.
    pub spot: f64,
    /// Strike price.
    pub strike: f64,
    /// Continuously compounded risk-free rate.
    pub rate: f64,
    /// Annualized volatility.
    pub volatility: f64,
    /// Time to expiry in years.
    pub expiry_years: f64,
}

/// Standard normal CDF via the Abramowitz-Stegun 7.1.26 rational
/// approximation; absolute error below 7.5e-8.
fn norm_cdf(x: f64) -> f64 {
    const B1: f64 = 0.319381530;
    const B2: f64 = -0.356563782;
    const B3: f64 = 1.781477937;
    const B4: f64 = -1.821255978;
    const B5: f64 = 1.330274429;
    const P: f64 = 0.2316419;

    let t = 1.0 / (1.0 + P * x.abs());
    let poly = t * (B1 + t * (B2 + t * (B3 + t * (B4 + t * B5))));
    let density = (-0.5 * x * x).exp() / (2.0 * std::f64::consts::PI).sqrt();
    let tail = density * poly;
    if x >= 0.0 {
        1.0 - tail
    } else {
        tail
    }
}

/// Black-Scholes closed-form prices for a batch of European options.
///
/// `calls` and `puts` must match `options` in length. Contracts at or past
/// expiry, or with no volatility, price at discounted intrinsic value.
pub fn black_scholes(
    options: &[OptionContract],
    calls: &mut [f64],
    puts: &mut [f64],
) -> Result<(), KernelError> {
    check_len("black_scholes call prices", options.len(), calls.len())?;
    check_len("black_scholes put prices", options.len(), puts.len())?;

    for (i, opt) in options.iter().enumerate() {
        if opt.spot <= 0.0 || opt.strike <= 0.0 {
            return Err(KernelError::BadArgument(format!(
                "spot and strike must be positive (spot {}, strike {})",
                opt.spot, opt.strike
            )));
        }

        let discounted_strike = opt.strike * (-opt.rate * opt.expiry_years).exp();
        if opt.expiry_years <= 0.0 || opt.volatility <= 0.0 {
            calls[i] = (opt.spot - discounted_strike).max(0.0);
            puts[i] = (discounted_strike - opt.spot).max(0.0);
            continue;
        }

        let vol_sqrt_t = opt.volatility * opt.expiry_years.sqrt();
        let d1 = ((opt.spot / opt.strike).ln()
            + (opt.rate + 0.5 * opt.volatility * opt.volatility) * opt.expiry_years)
            / vol_sqrt_t;
        let d2 = d1 - vol_sqrt_t;

        calls[i] = opt.spot * norm_cdf(d1) - discounted_strike * norm_cdf(d2);
        puts[i] = discounted_strike * norm_cdf(-d2) - opt.spot * norm_cdf(-d1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_norm_cdf_symmetry() {
        assert!((norm_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((norm_cdf(1.96) - 0.975).abs() < 1e-3);
        assert!((norm_cdf(-1.96) + norm_cdf(1.96) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_black_scholes_reference_value() {
        // Classic textbook case: S=100, K=100, r=5%, sigma=20%, T=1.
        let options = [OptionContract {
            spot: 100.0,
            strike: 100.0,
            rate: 0.05,
            volatility: 0.2,
            expiry_years: 1.0,
        }];
        let mut calls = [0.0];
        let mut puts = [0.0];
        black_scholes(&options, &mut calls, &mut puts).unwrap();

        assert!((calls[0] - 10.4506).abs() < 1e-3, "call {}", calls[0]);
        assert!((puts[0] - 5.5735).abs() < 1e-3, "put {}", puts[0]);

        // Put-call parity: C - P = S - K e^{-rT}.
        let parity = calls[0] - puts[0] - (100.0 - 100.0 * (-0.05f64).exp());
        assert!(parity.abs() < 1e-9);
    }

    #[test]
    fn test_expired_prices_at_intrinsic() {
        let options = [
            OptionContract {
                spot: 120.0,
                strike: 100.0,
                rate: 0.0,
                volatility: 0.2,
                expiry_years: 0.0,
            },
            OptionContract {
                spot: 80.0,
                strike: 100.0,
                rate: 0.0,
                volatility: 0.2,
                expiry_years: 0.0,
            },
        ];
        let mut calls = [0.0; 2];
        let mut puts = [0.0; 2];
        black_scholes(&options, &mut calls, &mut puts).unwrap();

        assert_eq!(calls[0], 20.0);
        assert_eq!(puts[0], 0.0);
        assert_eq!(calls[1], 0.0);
        assert_eq!(puts[1], 20.0);
    }

    #[test]
    fn test_length_and_argument_checks() {
        let options = [OptionContract {
            spot: 100.0,
            strike: 100.0,
            rate: 0.0,
            volatility: 0.2,
            expiry_years: 1.0,
        }];
        let mut short = [];
        let mut ok = [0.0];
        assert!(black_scholes(&options, &mut short, &mut ok).is_err());

        let bad = [OptionContract {
            spot: -1.0,
            strike: 100.0,
            rate: 0.0,
            volatility: 0.2,
            expiry_years: 1.0,
        }];
        let mut calls = [0.0];
        let mut puts = [0.0];
        assert!(black_scholes(&bad, &mut calls, &mut puts).is_err());
    }
}
