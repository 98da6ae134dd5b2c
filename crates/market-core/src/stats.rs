//! Descriptive statistics over return samples.
//!
//! Conventions: standard deviation is the sample estimator (n - 1
//! denominator) and quantiles interpolate linearly between order statistics
//! at rank `(n - 1) * p`. Both match the defaults of the common dataframe
//! and array libraries, so figures agree with what analysts compute by hand.

/// Compute the mean of a data slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Compute sample standard deviation.
pub fn std_dev(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let m = mean(data);
    let variance = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (data.len() - 1) as f64;
    variance.sqrt()
}

/// Sort a copy of `data` ascending. NaNs compare equal and keep their place.
pub fn sorted(data: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = data.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted
}

/// Quantile of already-sorted data at probability `p` (0.0-1.0), with linear
/// interpolation between the two nearest ranks.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let p = p.clamp(0.0, 1.0);
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Quantile of unsorted data at probability `p` (0.0-1.0).
pub fn quantile(data: &[f64], p: f64) -> f64 {
    quantile_sorted(&sorted(data), p)
}

/// Fraction of values strictly greater than `threshold` (0.0-1.0).
pub fn fraction_above(data: &[f64], threshold: f64) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().filter(|&&x| x > threshold).count() as f64 / data.len() as f64
}
