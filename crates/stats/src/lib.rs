//! Scalar statistics for the ICECAP verification engine.
//!
//! Gridded reductions in the other crates call these per cell. Functions
//! prefixed `nan` skip non-finite values and return NaN when nothing is left.

use statrs::distribution::{ContinuousCDF, StudentsT};

/// Finite values of a slice, in order.
pub fn finite(data: &[f64]) -> Vec<f64> {
    data.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Number of NaN values in a slice.
pub fn nan_count(data: &[f64]) -> usize {
    data.iter().filter(|v| v.is_nan()).count()
}

/// Mean of the finite values. NaN if there are none.
pub fn nanmean(data: &[f64]) -> f64 {
    let (sum, n) = data
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { f64::NAN } else { sum / n as f64 }
}

/// Sum of the finite values. NaN if there are none.
pub fn nansum(data: &[f64]) -> f64 {
    let mut any = false;
    let sum = data
        .iter()
        .filter(|v| v.is_finite())
        .inspect(|_| any = true)
        .sum();
    if any { sum } else { f64::NAN }
}

/// Population variance (N denominator) of the finite values.
/// NaN if there are none.
pub fn nanvar(data: &[f64]) -> f64 {
    let vals = finite(data);
    if vals.is_empty() {
        return f64::NAN;
    }
    let n = vals.len() as f64;
    let m = vals.iter().sum::<f64>() / n;
    vals.iter().map(|&x| (x - m) * (x - m)).sum::<f64>() / n
}

/// Median of the finite values. NaN if there are none.
pub fn nanmedian(data: &[f64]) -> f64 {
    let mut vals = finite(data);
    if vals.is_empty() {
        return f64::NAN;
    }
    vals.sort_by(f64::total_cmp);
    median(&vals)
}

/// Linear-interpolation quantile (Hyndman & Fan type 7).
///
/// **Expects pre-sorted input** (caller's responsibility).
///
/// # Panics
///
/// Panics if `sorted` is empty.
pub fn quantile_type7(sorted: &[f64], p: f64) -> f64 {
    assert!(
        !sorted.is_empty(),
        "quantile_type7: input must not be empty"
    );
    let n = sorted.len();
    let h = (n - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    sorted[lo] + (h - h.floor()) * (sorted[hi] - sorted[lo])
}

/// Closest-observation quantile (Hyndman & Fan type 3): the order
/// statistic nearest to `n·p`, ties going to the even order statistic.
///
/// Always returns one of the sample values. **Expects pre-sorted input.**
///
/// # Panics
///
/// Panics if `sorted` is empty.
pub fn quantile_closest_observation(sorted: &[f64], p: f64) -> f64 {
    assert!(
        !sorted.is_empty(),
        "quantile_closest_observation: input must not be empty"
    );
    let n = sorted.len();
    // Zero-based virtual index of the 1-based order statistic n·p - 0.5.
    let index = n as f64 * p - 1.5;
    let previous = index.floor();
    let gamma = index - previous;
    let chosen = if gamma == 0.0 && previous.rem_euclid(2.0) == 1.0 {
        previous
    } else {
        previous + 1.0
    };
    let idx = chosen.clamp(0.0, (n - 1) as f64) as usize;
    sorted[idx]
}

/// Quantile of the finite values using `method`. NaN if there are none.
pub fn nanquantile(data: &[f64], p: f64, method: QuantileMethod) -> f64 {
    let mut vals = finite(data);
    if vals.is_empty() {
        return f64::NAN;
    }
    vals.sort_by(f64::total_cmp);
    match method {
        QuantileMethod::Linear => quantile_type7(&vals, p),
        QuantileMethod::ClosestObservation => quantile_closest_observation(&vals, p),
    }
}

/// Quantile estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantileMethod {
    /// Linear interpolation between order statistics (type 7).
    Linear,
    /// Nearest order statistic (type 3).
    ClosestObservation,
}

/// Median of pre-sorted data. For even length, averages the middle two values.
///
/// # Panics
///
/// Panics if `sorted` is empty.
pub fn median(sorted: &[f64]) -> f64 {
    assert!(!sorted.is_empty(), "median: input must not be empty");
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Least-squares fit of `y` against its index `0..n`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    /// Change of `y` per index step.
    pub slope: f64,
    /// Fitted value at index 0.
    pub intercept: f64,
    /// Two-sided p-value of the null hypothesis `slope == 0`.
    pub pvalue: f64,
}

impl LinearFit {
    const NAN: LinearFit = LinearFit {
        slope: f64::NAN,
        intercept: f64::NAN,
        pvalue: f64::NAN,
    };

    /// Fitted value at index `x`.
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Regress `y` on `0, 1, …, n-1`.
///
/// Any NaN in `y`, or fewer than two values, gives an all-NaN fit. A
/// constant series gives slope 0, the constant as intercept and p-value 1.
pub fn linregress(y: &[f64]) -> LinearFit {
    let n = y.len();
    if n < 2 || y.iter().any(|v| v.is_nan()) {
        return LinearFit::NAN;
    }
    let nf = n as f64;
    let mx = (nf - 1.0) / 2.0;
    let my = y.iter().sum::<f64>() / nf;

    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for (i, &yi) in y.iter().enumerate() {
        let dx = i as f64 - mx;
        let dy = yi - my;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    if syy == 0.0 {
        return LinearFit {
            slope: 0.0,
            intercept: my,
            pvalue: 1.0,
        };
    }

    let slope = sxy / sxx;
    let intercept = my - slope * mx;
    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);

    let pvalue = if n == 2 || r.abs() == 1.0 {
        0.0
    } else {
        let df = nf - 2.0;
        let t = r * (df / ((1.0 - r) * (1.0 + r))).sqrt();
        match StudentsT::new(0.0, 1.0, df) {
            Ok(dist) => 2.0 * dist.sf(t.abs()),
            Err(_) => f64::NAN,
        }
    };

    LinearFit {
        slope,
        intercept,
        pvalue,
    }
}

/// Continuous ranked probability score of an ensemble against one
/// observation: `mean|X - y| - ½ mean|X - X'|` over all member pairs.
///
/// NaN if the observation or any member is NaN, or the ensemble is empty.
pub fn crps_ensemble(members: &[f64], obs: f64) -> f64 {
    if members.is_empty() || obs.is_nan() || members.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let m = members.len() as f64;
    let skill = members.iter().map(|x| (x - obs).abs()).sum::<f64>() / m;

    let mut sorted = members.to_vec();
    sorted.sort_by(f64::total_cmp);
    // Sum over ordered pairs of |x_i - x_j| from the sorted ranks.
    let pair_sum: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, &x)| (2.0 * i as f64 - m + 1.0) * x)
        .sum::<f64>()
        * 2.0;
    skill - 0.5 * pair_sum / (m * m)
}

/// Great-circle distance in km between two points given in degrees.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let (p1, p2) = (lat1.to_radians(), lat2.to_radians());
    let dlat = p2 - p1;
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2) + p1.cos() * p2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}
