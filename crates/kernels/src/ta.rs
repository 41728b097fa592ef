//! Technical-analysis kernels.

use crate::error::{check_len, KernelError};

/// Simple moving average over a sliding window of `period` prices.
///
/// `out` receives one value per full window: `prices.len() - period + 1`.
pub fn moving_average(prices: &[f64], out: &mut [f64], period: usize) -> Result<(), KernelError> {
    if period == 0 {
        return Err(KernelError::BadArgument("period must be positive".into()));
    }
    if prices.len() < period {
        return Err(KernelError::BadArgument(format!(
            "need at least {period} prices, got {}",
            prices.len()
        )));
    }
    check_len("moving_average output", prices.len() - period + 1, out.len())?;

    // Rolling sum; one add and one subtract per step.
    let mut sum: f64 = prices[..period].iter().sum();
    out[0] = sum / period as f64;
    for i in 1..out.len() {
        sum += prices[i + period - 1] - prices[i - 1];
        out[i] = sum / period as f64;
    }
    Ok(())
}

/// Exponential moving average with smoothing factor `alpha` in `(0, 1]`.
///
/// `out` has the same length as `prices`; the first value seeds the
/// average.
pub fn exponential_moving_average(
    prices: &[f64],
    out: &mut [f64],
    alpha: f64,
) -> Result<(), KernelError> {
    if !(alpha > 0.0 && alpha <= 1.0) {
        return Err(KernelError::BadArgument(format!(
            "alpha must be in (0, 1], got {alpha}"
        )));
    }
    if prices.is_empty() {
        return Err(KernelError::BadArgument("prices must not be empty".into()));
    }
    check_len("exponential_moving_average output", prices.len(), out.len())?;

    out[0] = prices[0];
    for i in 1..prices.len() {
        out[i] = alpha * prices[i] + (1.0 - alpha) * out[i - 1];
    }
    Ok(())
}

/// Bollinger bands: middle = SMA, upper/lower = middle +/- `num_std_dev`
/// population standard deviations over the window.
///
/// Each band receives `prices.len() - period + 1` values.
pub fn bollinger_bands(
    prices: &[f64],
    upper: &mut [f64],
    middle: &mut [f64],
    lower: &mut [f64],
    period: usize,
    num_std_dev: f64,
) -> Result<(), KernelError> {
    if period == 0 {
        return Err(KernelError::BadArgument("period must be positive".into()));
    }
    if prices.len() < period {
        return Err(KernelError::BadArgument(format!(
            "need at least {period} prices, got {}",
            prices.len()
        )));
    }
    let windows = prices.len() - period + 1;
    check_len("bollinger upper band", windows, upper.len())?;
    check_len("bollinger middle band", windows, middle.len())?;
    check_len("bollinger lower band", windows, lower.len())?;

    for i in 0..windows {
        let window = &prices[i..i + period];
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance =
            window.iter().map(|p| (p - mean) * (p - mean)).sum::<f64>() / period as f64;
        let dev = variance.sqrt() * num_std_dev;
        middle[i] = mean;
        upper[i] = mean + dev;
        lower[i] = mean - dev;
    }
    Ok(())
}

/// Relative strength index with Wilder smoothing.
///
/// `out` receives `prices.len() - period` values, one per price after the
/// seed window.
pub fn rsi(prices: &[f64], out: &mut [f64], period: usize) -> Result<(), KernelError> {
    if period == 0 {
        return Err(KernelError::BadArgument("period must be positive".into()));
    }
    if prices.len() < period + 1 {
        return Err(KernelError::BadArgument(format!(
            "need at least {} prices, got {}",
            period + 1,
            prices.len()
        )));
    }
    check_len("rsi output", prices.len() - period, out.len())?;

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let change = prices[i] - prices[i - 1];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss -= change;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[0] = rsi_value(avg_gain, avg_loss);

    for i in period + 1..prices.len() {
        let change = prices[i] - prices[i - 1];
        let (gain, loss) = if change > 0.0 {
            (change, 0.0)
        } else {
            (0.0, -change)
        };
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        out[i - period] = rsi_value(avg_gain, avg_loss);
    }
    Ok(())
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}
