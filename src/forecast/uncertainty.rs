// =============================================================================
// Monte-Carlo prediction intervals
// =============================================================================
//
// Two sources of uncertainty are simulated:
//
//   1. Trend: beyond the history the future may bend like the past did. Each
//      sample draws Poisson(S · (T - 1)) new changepoints uniformly in (1, T)
//      with Laplace(0, mean|δ|) rate changes, S being the fitted changepoint
//      count and T the last rescaled forecast time.
//   2. Observation noise: Gaussian with the fitted σ.
//
// Interval bounds are the empirical (1 ± width)/2 quantiles of the samples.
// The generator is seeded, so identical inputs give identical bounds.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::forecast::trend::{PiecewiseLinear, TrendPerturbation};
use crate::types::SeasonalityMode;

/// Point forecast at one row, in rescaled units.
#[derive(Debug, Clone, Copy)]
pub struct PointForecast {
    pub t: f64,
    pub trend: f64,
    /// Sum of all seasonal effects.
    pub seasonal: f64,
}

impl PointForecast {
    pub fn combine(&self, mode: SeasonalityMode, trend: f64) -> f64 {
        match mode {
            SeasonalityMode::Multiplicative => trend * (1.0 + self.seasonal),
            SeasonalityMode::Additive => trend + self.seasonal,
        }
    }

    pub fn yhat(&self, mode: SeasonalityMode) -> f64 {
        self.combine(mode, self.trend)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IntervalSettings {
    pub mode: SeasonalityMode,
    /// Noise standard deviation in rescaled units.
    pub sigma: f64,
    /// Multiplier back to the original units.
    pub y_scale: f64,
    pub width: f64,
    pub samples: usize,
    pub seed: u64,
}

/// `(lower, upper)` for every point, in original units.
pub fn prediction_intervals(
    points: &[PointForecast],
    trend: &PiecewiseLinear,
    settings: &IntervalSettings,
) -> Vec<(f64, f64)> {
    if settings.samples == 0 {
        return points
            .iter()
            .map(|p| {
                let y = p.yhat(settings.mode) * settings.y_scale;
                (y, y)
            })
            .collect();
    }

    let mut rng = StdRng::seed_from_u64(settings.seed);
    let t_end = points.iter().map(|p| p.t).fold(1.0_f64, f64::max);
    let paths: Vec<TrendPerturbation> = (0..settings.samples)
        .map(|_| sample_perturbation(&mut rng, trend, t_end))
        .collect();

    let lower_q = (1.0 - settings.width) / 2.0;
    let upper_q = (1.0 + settings.width) / 2.0;
    let mut draws = Vec::with_capacity(settings.samples);

    points
        .iter()
        .map(|p| {
            draws.clear();
            for path in &paths {
                let trend_s = p.trend + path.offset(p.t);
                let noise = settings.sigma * standard_normal(&mut rng);
                draws.push((p.combine(settings.mode, trend_s) + noise) * settings.y_scale);
            }
            draws.sort_by(f64::total_cmp);
            (quantile(&draws, lower_q), quantile(&draws, upper_q))
        })
        .collect()
}

/// New changepoints for one simulated future trend path.
pub fn sample_perturbation(
    rng: &mut StdRng,
    trend: &PiecewiseLinear,
    t_end: f64,
) -> TrendPerturbation {
    let horizon = t_end - 1.0;
    let s = trend.changepoints.len() as f64;
    if horizon <= 0.0 || s == 0.0 {
        return TrendPerturbation::default();
    }

    let count = poisson(rng, s * horizon);
    let scale = trend.mean_abs_delta() + 1e-8;

    let mut changepoints: Vec<f64> = (0..count)
        .map(|_| 1.0 + horizon * rng.random::<f64>())
        .collect();
    changepoints.sort_by(f64::total_cmp);
    let deltas = (0..count).map(|_| laplace(rng, scale)).collect();

    TrendPerturbation {
        changepoints,
        deltas,
    }
}

// =============================================================================
// Distribution helpers
// =============================================================================

/// Uniform draw in the open interval (0, 1).
fn open_unit(rng: &mut StdRng) -> f64 {
    loop {
        let u: f64 = rng.random();
        if u > 0.0 {
            return u;
        }
    }
}

/// Box–Muller transform.
pub fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1 = open_unit(rng);
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Laplace(0, scale) by inverse CDF.
pub fn laplace(rng: &mut StdRng, scale: f64) -> f64 {
    let u = open_unit(rng) - 0.5;
    -scale * u.signum() * (1.0 - 2.0 * u.abs()).ln()
}

/// Knuth's multiplication method; normal approximation for large rates.
pub fn poisson(rng: &mut StdRng, lambda: f64) -> usize {
    if !(lambda > 0.0) {
        return 0;
    }
    if lambda > 30.0 {
        let draw = lambda + lambda.sqrt() * standard_normal(rng);
        return draw.round().max(0.0) as usize;
    }
    let limit = (-lambda).exp();
    let mut k = 0;
    let mut p = 1.0;
    loop {
        p *= rng.random::<f64>();
        if p <= limit {
            return k;
        }
        k += 1;
    }
}

/// Linear-interpolated quantile of an ascending slice.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn flat_trend() -> PiecewiseLinear {
        PiecewiseLinear {
            k: 0.0,
            m: 1.0,
            changepoints: vec![0.2, 0.4, 0.6],
            deltas: vec![0.1, -0.1, 0.05],
        }
    }

    #[test]
    fn quantile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile(&v, 0.0), 1.0);
        assert_eq!(quantile(&v, 1.0), 5.0);
        assert_eq!(quantile(&v, 0.5), 3.0);
        assert!((quantile(&v, 0.1) - 1.4).abs() < 1e-12);
        assert_eq!(quantile(&[9.0], 0.3), 9.0);
        assert!(quantile(&[], 0.5).is_nan());
    }

    #[test]
    fn normal_moments_are_plausible() {
        let mut r = rng();
        let n = 20_000;
        let draws: Vec<f64> = (0..n).map(|_| standard_normal(&mut r)).collect();
        let mean = draws.iter().sum::<f64>() / n as f64;
        let var = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((var - 1.0).abs() < 0.05, "var {var}");
    }

    #[test]
    fn laplace_mean_abs_matches_scale() {
        let mut r = rng();
        let n = 20_000;
        let mean_abs = (0..n).map(|_| laplace(&mut r, 2.0).abs()).sum::<f64>() / n as f64;
        assert!((mean_abs - 2.0).abs() < 0.1, "mean |x| {mean_abs}");
    }

    #[test]
    fn poisson_mean_matches_rate() {
        let mut r = rng();
        for lambda in [0.5, 4.0, 50.0] {
            let n = 5_000;
            let mean = (0..n).map(|_| poisson(&mut r, lambda) as f64).sum::<f64>() / n as f64;
            assert!((mean - lambda).abs() < 0.1 * lambda.max(1.0), "λ={lambda} mean={mean}");
        }
        assert_eq!(poisson(&mut r, 0.0), 0);
    }

    #[test]
    fn no_perturbation_inside_history() {
        let mut r = rng();
        let p = sample_perturbation(&mut r, &flat_trend(), 1.0);
        assert!(p.changepoints.is_empty());
        let p = sample_perturbation(&mut r, &flat_trend(), 3.0);
        assert!(p.changepoints.iter().all(|&c| c > 1.0 && c < 3.0));
        assert_eq!(p.changepoints.len(), p.deltas.len());
    }

    fn settings(samples: usize) -> IntervalSettings {
        IntervalSettings {
            mode: SeasonalityMode::Multiplicative,
            sigma: 0.05,
            y_scale: 100.0,
            width: 0.8,
            samples,
            seed: 42,
        }
    }

    fn points() -> Vec<PointForecast> {
        (0..30)
            .map(|i| {
                let t = i as f64 / 10.0;
                PointForecast {
                    t,
                    trend: 1.0,
                    seasonal: 0.01 * (i as f64).sin(),
                }
            })
            .collect()
    }

    #[test]
    fn intervals_bracket_point_forecast_and_widen() {
        let pts = points();
        let bounds = prediction_intervals(&pts, &flat_trend(), &settings(500));
        assert_eq!(bounds.len(), pts.len());
        for (p, (lo, hi)) in pts.iter().zip(&bounds) {
            let y = p.yhat(SeasonalityMode::Multiplicative) * 100.0;
            assert!(lo <= hi);
            assert!(*lo < y && y < *hi, "{lo} {y} {hi}");
        }
        let first = bounds[0].1 - bounds[0].0;
        let last = bounds[29].1 - bounds[29].0;
        assert!(last > first);
    }

    #[test]
    fn intervals_are_reproducible() {
        let pts = points();
        let a = prediction_intervals(&pts, &flat_trend(), &settings(200));
        let b = prediction_intervals(&pts, &flat_trend(), &settings(200));
        assert_eq!(a, b);
    }

    #[test]
    fn zero_samples_collapse_onto_yhat() {
        let pts = points();
        let bounds = prediction_intervals(&pts, &flat_trend(), &settings(0));
        for (p, (lo, hi)) in pts.iter().zip(&bounds) {
            let y = p.yhat(SeasonalityMode::Multiplicative) * 100.0;
            assert_eq!((*lo, *hi), (y, y));
        }
    }
}
