// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// Formula:
//   alpha  = 2 / (period + 1)
//   EMA_t  = price_t * alpha + EMA_{t-1} * (1 - alpha)
//
// The first value sits at index `period - 1` and is the SMA of the first
// `period` prices.  Earlier indices are absent, not zero.
// =============================================================================

use super::AlignedSeries;

/// Compute the dense EMA series for `prices` and look-back `period`.
///
/// Element `j` of the result corresponds to `prices[period - 1 + j]`.
///
/// # Edge cases
/// - `period == 0` => empty vec
/// - `prices.len() < period` => empty vec
pub fn calculate_ema(prices: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || prices.len() < period {
        return Vec::new();
    }

    let alpha = 2.0 / (period + 1) as f64;

    let seed = prices[..period].iter().sum::<f64>() / period as f64;

    let mut result = Vec::with_capacity(prices.len() - period + 1);
    result.push(seed);

    let mut prev = seed;
    for &price in &prices[period..] {
        let ema = price * alpha + prev * (1.0 - alpha);
        result.push(ema);
        prev = ema;
    }

    result
}

/// EMA laid over `prices` index-for-index.
pub fn ema_aligned(prices: &[f64], period: usize) -> AlignedSeries {
    AlignedSeries::new(prices.len(), calculate_ema(prices, period))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ema_empty_input() {
        assert!(calculate_ema(&[], 5).is_empty());
    }

    #[test]
    fn ema_period_zero() {
        assert!(calculate_ema(&[1.0, 2.0, 3.0], 0).is_empty());
    }

    #[test]
    fn ema_insufficient_data() {
        assert!(calculate_ema(&[1.0, 2.0], 5).is_empty());
    }

    #[test]
    fn ema_seed_is_simple_average() {
        let ema = calculate_ema(&[2.0, 4.0, 6.0], 3);
        assert_eq!(ema.len(), 1);
        assert!((ema[0] - 4.0).abs() < 1e-10);
    }

    #[test]
    fn ema_known_values() {
        // 5-period EMA of 1..=10: seed 3.0, alpha 1/3.
        let prices: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        let ema = calculate_ema(&prices, 5);
        assert_eq!(ema.len(), 6);

        let alpha = 2.0 / 6.0;
        let mut expected = 3.0;
        assert!((ema[0] - expected).abs() < 1e-10);
        for (j, &p) in prices[5..].iter().enumerate() {
            expected = p * alpha + expected * (1.0 - alpha);
            assert!((ema[j + 1] - expected).abs() < 1e-10, "index {}", j + 1);
        }
    }

    #[test]
    fn aligned_ema_is_absent_before_seed_index() {
        let prices: Vec<f64> = (1..=12).map(|x| x as f64).collect();
        let ema = ema_aligned(&prices, 9);
        assert_eq!(ema.len(), 12);
        assert_eq!(ema.get(7), None);
        assert!((ema.get(8).unwrap() - 5.0).abs() < 1e-10);
        assert!(ema.last().is_some());
        assert!(ema.previous().is_some());
    }

    #[test]
    fn aligned_ema_short_input_is_absent() {
        let ema = ema_aligned(&[1.0; 10], 20);
        assert_eq!(ema.last(), None);
        assert_eq!(ema.len(), 10);
    }

    #[test]
    fn ema_is_reproducible() {
        let prices: Vec<f64> = (0..200).map(|i| 100.0 + (i as f64 * 0.37).sin()).collect();
        let a = calculate_ema(&prices, 20);
        let b = calculate_ema(&prices, 20);
        assert!(a.iter().zip(&b).all(|(x, y)| x.to_bits() == y.to_bits()));
    }

    proptest! {
        #[test]
        fn constant_series_stays_constant(p in 0.0001f64..1_000_000.0, period in 1usize..60, extra in 0usize..80) {
            let prices = vec![p; period + extra];
            let ema = ema_aligned(&prices, period);
            for i in (period - 1)..prices.len() {
                let v = ema.get(i).unwrap();
                prop_assert!((v - p).abs() <= p * 1e-12, "ema[{}] = {} for constant {}", i, v, p);
            }
        }
    }
}
