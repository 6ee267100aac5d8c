// =============================================================================
// Rolling window statistics - Simple Moving Average and standard deviation
// =============================================================================
//
// Both functions return a vector aligned with the input: entry `i` covers the
// trailing window `values[i + 1 - window ..= i]`. The first `window - 1`
// entries are NaN, and so is any window containing a NaN input. Nothing is
// back- or forward-filled.
// =============================================================================

use crate::error::AnalysisError;

pub(crate) fn check_window(name: &'static str, window: usize) -> Result<(), AnalysisError> {
    if window == 0 {
        return Err(AnalysisError::invalid(name, "must be a positive integer, got 0"));
    }
    Ok(())
}

fn rolling<F>(values: &[f64], window: usize, stat: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }
    for end in window..=values.len() {
        let slice = &values[end - window..end];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        out[end - 1] = stat(slice);
    }
    out
}

fn mean(slice: &[f64]) -> f64 {
    slice.iter().sum::<f64>() / slice.len() as f64
}

/// Rolling arithmetic mean over `window` points.
pub fn rolling_mean(values: &[f64], window: usize) -> Result<Vec<f64>, AnalysisError> {
    check_window("window", window)?;
    Ok(rolling(values, window, mean))
}

/// Rolling sample standard deviation (n - 1 denominator) over `window` points.
///
/// A window of 1 has no sample deviation, so every entry is NaN.
pub fn rolling_std(values: &[f64], window: usize) -> Result<Vec<f64>, AnalysisError> {
    check_window("window", window)?;
    if window < 2 {
        return Ok(vec![f64::NAN; values.len()]);
    }
    Ok(rolling(values, window, |slice| {
        let m = mean(slice);
        let ss: f64 = slice.iter().map(|x| (x - m).powi(2)).sum();
        (ss / (slice.len() - 1) as f64).sqrt()
    }))
}

/// Last defined value of a series, if any.
pub fn last_defined(values: &[f64]) -> Option<f64> {
    values.iter().rev().copied().find(|v| !v.is_nan())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_window_is_rejected() {
        let err = rolling_mean(&[1.0, 2.0], 0).unwrap_err();
        assert_eq!(err.kind(), "invalid_parameter");
        assert!(rolling_std(&[1.0, 2.0], 0).is_err());
    }

    #[test]
    fn leading_rows_are_undefined() {
        let values: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        let ma = rolling_mean(&values, 4).unwrap();
        assert_eq!(ma.len(), 10);
        assert!(ma[..3].iter().all(|v| v.is_nan()));
        assert!((ma[3] - 2.5).abs() < 1e-12);
        assert!((ma[9] - 8.5).abs() < 1e-12);
    }

    #[test]
    fn rolling_mean_matches_window_mean_everywhere() {
        let values: Vec<f64> = (0..300).map(|i| 100.0 + (i as f64 * 0.37).sin() * 5.0).collect();
        for k in [20usize, 50, 200] {
            let ma = rolling_mean(&values, k).unwrap();
            for i in 0..values.len() {
                if i + 1 < k {
                    assert!(ma[i].is_nan(), "MA_{k}[{i}] should be undefined");
                } else {
                    let expected = values[i + 1 - k..=i].iter().sum::<f64>() / k as f64;
                    assert!((ma[i] - expected).abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn window_longer_than_input_is_all_nan() {
        let ma = rolling_mean(&[1.0, 2.0, 3.0], 5).unwrap();
        assert!(ma.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn nan_poisons_only_windows_that_contain_it() {
        let values = [1.0, 2.0, f64::NAN, 4.0, 5.0, 6.0];
        let ma = rolling_mean(&values, 2).unwrap();
        assert!((ma[1] - 1.5).abs() < 1e-12);
        assert!(ma[2].is_nan());
        assert!(ma[3].is_nan());
        assert!((ma[4] - 4.5).abs() < 1e-12);
    }

    #[test]
    fn sample_std_uses_n_minus_one() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let sd = rolling_std(&values, 8).unwrap();
        // Sum of squared deviations is 32, so sqrt(32 / 7).
        assert!((sd[7] - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn std_of_single_point_window_is_undefined() {
        let sd = rolling_std(&[1.0, 2.0, 3.0], 1).unwrap();
        assert!(sd.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn last_defined_skips_trailing_nan() {
        assert_eq!(last_defined(&[f64::NAN, 1.0, 2.0, f64::NAN]), Some(2.0));
        assert_eq!(last_defined(&[f64::NAN]), None);
    }
}
