// =============================================================================
// Piecewise-linear trend with changepoints
// =============================================================================
//
//   g(t) = k·t + m + Σ_j δ_j · (t - s_j)₊
//
// t is history time rescaled to [0, 1]. The changepoints s_j sit on a uniform
// grid over the first `changepoint_range` of the history; each δ_j is an
// adjustment to the growth rate that takes effect from s_j onwards. The
// adjustments carry a Laplace prior, so most of them end up near zero.

/// Candidate changepoint locations for rescaled history times `t`
/// (ascending, first = 0, last = 1).
///
/// Places `min(n_changepoints, hist_size - 1)` points at evenly spaced
/// indices within the first `range` of the history, skipping index 0.
pub fn changepoints(t: &[f64], n_changepoints: usize, range: f64) -> Vec<f64> {
    let hist_size = (t.len() as f64 * range).floor() as usize;
    if hist_size <= 1 || n_changepoints == 0 {
        return Vec::new();
    }
    let count = n_changepoints.min(hist_size - 1);
    let last = (hist_size - 1) as f64;

    let mut out: Vec<f64> = Vec::with_capacity(count);
    for i in 1..=count {
        let idx = (last * i as f64 / count as f64).round() as usize;
        let s = t[idx];
        if out.last().map_or(true, |&prev| s > prev) {
            out.push(s);
        }
    }
    out
}

/// Fitted trend parameters in rescaled units.
#[derive(Debug, Clone, PartialEq)]
pub struct PiecewiseLinear {
    /// Base growth rate.
    pub k: f64,
    /// Offset.
    pub m: f64,
    pub changepoints: Vec<f64>,
    /// Rate adjustment at each changepoint.
    pub deltas: Vec<f64>,
}

impl PiecewiseLinear {
    /// Parameter count: `k`, `m` and one delta per changepoint.
    pub fn param_count(&self) -> usize {
        2 + self.changepoints.len()
    }

    pub fn eval(&self, t: f64) -> f64 {
        let bends: f64 = self
            .changepoints
            .iter()
            .zip(&self.deltas)
            .map(|(&s, &d)| d * (t - s).max(0.0))
            .sum();
        self.k * t + self.m + bends
    }

    /// Growth rate after the last changepoint.
    pub fn final_rate(&self) -> f64 {
        self.k + self.deltas.iter().sum::<f64>()
    }

    /// Regression row `[t, 1, (t - s_1)₊, ..]` matching [`Self::set_params`].
    pub fn design_row(&self, t: f64, out: &mut Vec<f64>) {
        out.clear();
        out.push(t);
        out.push(1.0);
        out.extend(self.changepoints.iter().map(|&s| (t - s).max(0.0)));
    }

    pub fn set_params(&mut self, p: &[f64]) {
        self.k = p[0];
        self.m = p[1];
        self.deltas.copy_from_slice(&p[2..]);
    }

    /// Mean absolute rate change, the scale used for simulated future
    /// changepoints.
    pub fn mean_abs_delta(&self) -> f64 {
        if self.deltas.is_empty() {
            return 0.0;
        }
        self.deltas.iter().map(|d| d.abs()).sum::<f64>() / self.deltas.len() as f64
    }
}

/// Extra changepoints drawn for one simulated future trend path.
#[derive(Debug, Clone, Default)]
pub struct TrendPerturbation {
    pub changepoints: Vec<f64>,
    pub deltas: Vec<f64>,
}

impl TrendPerturbation {
    /// Offset this path adds to the fitted trend at time `t`.
    pub fn offset(&self, t: f64) -> f64 {
        self.changepoints
            .iter()
            .zip(&self.deltas)
            .map(|(&s, &d)| d * (t - s).max(0.0))
            .sum()
    }
}
