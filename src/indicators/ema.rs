// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula (no bias adjustment):
//   EMA_0 = x_0
//   EMA_t = alpha * x_t + (1 - alpha) * EMA_{t-1}
//
// A span-based EMA uses alpha = 2 / (span + 1); a center-of-mass smoothing
// such as Wilder's uses alpha = 1 / period.
//
// The recursion is seeded at the first finite input. Entries before the seed
// are NaN. A NaN input after the seed yields NaN at that position and leaves
// the running average untouched for the next finite input.
// =============================================================================

use crate::error::AnalysisError;

/// EMA with an explicit smoothing factor `alpha` in `(0, 1]`.
pub fn ema_alpha(values: &[f64], alpha: f64) -> Result<Vec<f64>, AnalysisError> {
    if !(alpha > 0.0 && alpha <= 1.0) {
        return Err(AnalysisError::invalid(
            "alpha",
            format!("must lie in (0, 1], got {alpha}"),
        ));
    }

    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;

    for &x in values {
        if x.is_nan() {
            out.push(f64::NAN);
            continue;
        }
        let ema = match prev {
            None => x,
            Some(p) => alpha * x + (1.0 - alpha) * p,
        };
        out.push(ema);
        prev = Some(ema);
    }

    Ok(out)
}

/// EMA over a look-back `span` (alpha = 2 / (span + 1)).
pub fn ema_span(values: &[f64], span: usize) -> Result<Vec<f64>, AnalysisError> {
    if span == 0 {
        return Err(AnalysisError::invalid("span", "must be a positive integer, got 0"));
    }
    ema_alpha(values, 2.0 / (span as f64 + 1.0))
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    // ---- ema_span --------------------------------------------------------

    #[test]
    fn ema_empty_input() {
        assert!(ema_span(&[], 5).unwrap().is_empty());
    }

    #[test]
    fn ema_span_zero() {
        let err = ema_span(&[1.0, 2.0, 3.0], 0).unwrap_err();
        assert_eq!(err.kind(), "invalid_parameter");
    }

    #[test]
    fn ema_seeded_at_first_value() {
        let ema = ema_span(&[10.0, 20.0], 3).unwrap();
        assert_eq!(ema[0], 10.0);
        // alpha = 0.5
        assert!((ema[1] - 15.0).abs() < 1e-12);
    }

    #[test]
    fn ema_known_values() {
        let closes: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        let ema = ema_span(&closes, 5).unwrap();
        assert_eq!(ema.len(), closes.len());

        let alpha = 2.0 / 6.0;
        let mut expected = closes[0];
        for (i, &c) in closes.iter().enumerate().skip(1) {
            expected = alpha * c + (1.0 - alpha) * expected;
            assert!((ema[i] - expected).abs() < 1e-10, "got {}, expected {expected}", ema[i]);
        }
    }

    #[test]
    fn ema_of_constant_is_constant() {
        let ema = ema_span(&[42.0; 50], 12).unwrap();
        assert!(ema.iter().all(|v| (v - 42.0).abs() < 1e-12));
    }

    #[test]
    fn ema_does_not_look_ahead() {
        let base: Vec<f64> = (0..40).map(|i| (i as f64).sqrt()).collect();
        let mut bumped = base.clone();
        bumped[30] += 100.0;
        let a = ema_span(&base, 9).unwrap();
        let b = ema_span(&bumped, 9).unwrap();
        assert_eq!(&a[..30], &b[..30]);
        assert_ne!(a[30], b[30]);
    }

    // ---- NaN handling ----------------------------------------------------

    #[test]
    fn ema_leading_nan_delays_seed() {
        let ema = ema_span(&[f64::NAN, f64::NAN, 4.0, 6.0], 3).unwrap();
        assert!(ema[0].is_nan() && ema[1].is_nan());
        assert_eq!(ema[2], 4.0);
        assert!((ema[3] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn ema_interior_nan_keeps_state() {
        let ema = ema_span(&[4.0, f64::NAN, 6.0], 3).unwrap();
        assert!(ema[1].is_nan());
        assert!((ema[2] - 5.0).abs() < 1e-12);
    }

    // ---- ema_alpha -------------------------------------------------------

    #[test]
    fn alpha_bounds() {
        assert!(ema_alpha(&[1.0], 0.0).is_err());
        assert!(ema_alpha(&[1.0], 1.5).is_err());
        assert!(ema_alpha(&[1.0], f64::NAN).is_err());
        assert_eq!(ema_alpha(&[1.0, 3.0], 1.0).unwrap(), vec![1.0, 3.0]);
    }
}
