//! Technical indicators powered by the `ta` crate
//!
//! Only the oscillator the confirmation step needs lives here: MACD and its
//! signal line over a close series.

use ta::indicators::ExponentialMovingAverage;
use ta::Next;

/// Type alias for two-line indicators (line1, line2)
pub type DualLineOutput = (Vec<Option<f64>>, Vec<Option<f64>>);

/// Number of leading bars without a stable signal line
///
/// The MACD line exists once the slow EMA has `slow` bars, and the signal EMA
/// needs another `signal - 1` MACD values on top of that, so the first usable
/// point is at index `slow + signal - 2`.
pub fn macd_warmup(slow_period: usize, signal_period: usize) -> usize {
    (slow_period + signal_period).saturating_sub(2)
}

/// Calculate MACD line and signal line using ta crate EMAs
///
/// Fast and slow EMAs start at the first close. The signal EMA is seeded with
/// the first MACD value at index `slow - 1`, not with the partial values
/// before it. Positions inside the warm-up are `None`.
pub fn macd(
    values: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> DualLineOutput {
    if values.is_empty() {
        return (vec![], vec![]);
    }

    let (mut fast, mut slow, mut signal) = match (
        ExponentialMovingAverage::new(fast_period),
        ExponentialMovingAverage::new(slow_period),
        ExponentialMovingAverage::new(signal_period),
    ) {
        (Ok(f), Ok(s), Ok(g)) => (f, s, g),
        _ => return (vec![None; values.len()], vec![None; values.len()]),
    };

    let first_macd = slow_period - 1;
    let warmup = macd_warmup(slow_period, signal_period);
    let mut macd_line = Vec::with_capacity(values.len());
    let mut signal_line = Vec::with_capacity(values.len());

    for (i, &value) in values.iter().enumerate() {
        let m = fast.next(value) - slow.next(value);
        let s = if i >= first_macd {
            Some(signal.next(m))
        } else {
            None
        };

        if i >= warmup {
            macd_line.push(Some(m));
            signal_line.push(s);
        } else {
            macd_line.push(None);
            signal_line.push(None);
        }
    }

    (macd_line, signal_line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macd_warmup() {
        assert_eq!(macd_warmup(26, 9), 33);

        let values: Vec<f64> = (1..=35).map(|x| x as f64).collect();
        let (macd_line, signal) = macd(&values, 12, 26, 9);

        assert_eq!(macd_line.len(), 35);
        assert!(macd_line[32].is_none());
        assert!(signal[32].is_none());
        // 35 bars leave exactly two settled points
        assert_eq!(macd_line.iter().filter(|v| v.is_some()).count(), 2);
        assert_eq!(signal.iter().filter(|v| v.is_some()).count(), 2);
    }

    #[test]
    fn test_macd_accelerating_uptrend_above_signal() {
        let values: Vec<f64> = (0..60).map(|i| 100.0 + 0.02 * (i * i) as f64).collect();
        let (macd_line, signal) = macd(&values, 12, 26, 9);

        let m = macd_line.last().unwrap().unwrap();
        let s = signal.last().unwrap().unwrap();
        assert!(m > 0.0);
        assert!(m > s);
    }

    #[test]
    fn test_macd_accelerating_downtrend_below_signal() {
        let values: Vec<f64> = (0..60).map(|i| 200.0 - 0.02 * (i * i) as f64).collect();
        let (macd_line, signal) = macd(&values, 12, 26, 9);

        let m = macd_line.last().unwrap().unwrap();
        let s = signal.last().unwrap().unwrap();
        assert!(m < 0.0);
        assert!(m < s);
    }

    #[test]
    fn test_macd_flat_series_is_zero() {
        let values = vec![50.0; 40];
        let (macd_line, signal) = macd(&values, 12, 26, 9);
        approx::assert_abs_diff_eq!(macd_line.last().unwrap().unwrap(), 0.0, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(signal.last().unwrap().unwrap(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_macd_invalid_periods() {
        let values = vec![1.0, 2.0, 3.0];
        let (macd_line, signal) = macd(&values, 0, 26, 9);
        assert!(macd_line.iter().all(Option::is_none));
        assert!(signal.iter().all(Option::is_none));
        assert!(macd(&[], 12, 26, 9).0.is_empty());
    }

    #[test]
    fn test_signal_seeded_at_first_macd_value() {
        // Falling start so the MACD values before the slow EMA fills are far from zero
        let values: Vec<f64> = (0..45)
            .map(|i| if i < 20 { 200.0 - 3.0 * i as f64 } else { 140.0 + 0.5 * (i - 20) as f64 })
            .collect();
        let (macd_line, signal) = macd(&values, 12, 26, 9);

        let ema = |k: f64, xs: &[f64]| -> Vec<f64> {
            let mut out = Vec::with_capacity(xs.len());
            for &x in xs {
                let prev = out.last().copied().unwrap_or(x);
                out.push(k * x + (1.0 - k) * prev);
            }
            out
        };
        let fast = ema(2.0 / 13.0, &values);
        let slow = ema(2.0 / 27.0, &values);
        let full: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let expected = ema(0.2, &full[25..]);

        approx::assert_relative_eq!(macd_line[44].unwrap(), full[44], epsilon = 1e-9);
        approx::assert_relative_eq!(signal[44].unwrap(), expected[expected.len() - 1], epsilon = 1e-9);

        // Seeding at bar 0 would give a different line
        let from_start = ema(0.2, &full);
        assert!((from_start[44] - expected[expected.len() - 1]).abs() > 1e-6);
    }
}
