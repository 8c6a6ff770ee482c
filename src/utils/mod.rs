// src/utils/mod.rs

//! Small weighted statistics shared by the correlation filter, the samplers and
//! the solvers.

/// Weighted mean; `None` when the weights sum to zero.
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> Option<f64> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return None;
    }
    let sum: f64 = values.iter().zip(weights).map(|(v, w)| v * w).sum();
    Some(sum / total)
}

/// Weighted population variance.
pub fn weighted_variance(values: &[f64], weights: &[f64]) -> Option<f64> {
    let mean = weighted_mean(values, weights)?;
    let total: f64 = weights.iter().sum();
    let ss: f64 = values
        .iter()
        .zip(weights)
        .map(|(v, w)| w * (v - mean) * (v - mean))
        .sum();
    Some(ss / total)
}

/// Population standard deviation with unit weights.
pub fn std_dev(values: &[f64]) -> f64 {
    let ones = vec![1.0; values.len()];
    weighted_variance(values, &ones).map(f64::sqrt).unwrap_or(0.0)
}

/// Weighted Pearson correlation. NaN when either side has zero variance.
pub fn weighted_pearson(x: &[f64], y: &[f64], weights: &[f64]) -> f64 {
    let (mx, my) = match (weighted_mean(x, weights), weighted_mean(y, weights)) {
        (Some(mx), Some(my)) => (mx, my),
        _ => return f64::NAN,
    };
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for ((a, b), w) in x.iter().zip(y).zip(weights) {
        let da = a - mx;
        let db = b - my;
        sxy += w * da * db;
        sxx += w * da * da;
        syy += w * db * db;
    }
    // Relative guard: a column of identical floats can leave rounding residue.
    let total: f64 = weights.iter().sum();
    let negligible = |ss: f64, mean: f64| {
        let tiny = mean.abs().max(1.0) * 1e-12;
        ss / total <= tiny * tiny
    };
    if negligible(sxx, mx) || negligible(syy, my) {
        return f64::NAN;
    }
    (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0)
}

/// Linearly interpolated quantile of already sorted values (R type 7).
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    Some(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
}

/// Sorts a copy of `values` (NaN-free input) and returns it.
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    out
}

/// Exponential proximity kernel: `exp(-d² / width²)`.
pub fn exponential_kernel(distance: f64, width: f64) -> f64 {
    (-(distance * distance) / (width * width)).exp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn pearson_matches_hand_computation() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.5];
        let w = [1.0; 4];
        let r = weighted_pearson(&x, &y, &w);
        assert!(r > 0.99 && r <= 1.0);
        let neg: Vec<f64> = y.iter().map(|v| -v).collect();
        assert_abs_diff_eq!(weighted_pearson(&x, &neg, &w), -r, epsilon = 1e-12);
    }

    #[test]
    fn pearson_is_nan_for_constant_column() {
        let x = [3.0, 3.0, 3.0];
        let y = [1.0, 2.0, 3.0];
        assert!(weighted_pearson(&x, &y, &[1.0; 3]).is_nan());
    }

    #[test]
    fn quantiles_interpolate() {
        let v = sorted(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(quantile_sorted(&v, 0.0), Some(1.0));
        assert_eq!(quantile_sorted(&v, 1.0), Some(4.0));
        assert_abs_diff_eq!(quantile_sorted(&v, 0.5).unwrap_or(0.0), 2.5, epsilon = 1e-12);
        assert_eq!(quantile_sorted(&v, 1.5), None);
    }

    #[test]
    fn kernel_is_one_at_zero_distance() {
        assert_eq!(exponential_kernel(0.0, 0.75), 1.0);
        assert!(exponential_kernel(2.0, 0.75) < exponential_kernel(1.0, 0.75));
    }
}
