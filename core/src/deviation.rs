//! Parametric deviation scoring: absolute z-scores against population stats.

/// Below this the column is treated as constant.
const MIN_STD: f64 = 1e-12;

/// Population mean and standard deviation. None for an empty slice.
pub fn mean_std(vals: &[f64]) -> Option<(f64, f64)> {
    if vals.is_empty() {
        return None;
    }
    let n = vals.len() as f64;
    let mean = vals.iter().sum::<f64>() / n;
    let sq_diff: f64 = vals.iter().map(|v| (v - mean).powi(2)).sum();
    Some((mean, (sq_diff / n).sqrt()))
}

/// |z| per value. A constant column scores 0 everywhere.
pub fn abs_z_scores(vals: &[f64]) -> Vec<f64> {
    match mean_std(vals) {
        Some((mean, std)) if std > MIN_STD => vals.iter().map(|v| ((v - mean) / std).abs()).collect(),
        _ => vec![0.0; vals.len()],
    }
}
