/// Percentage change from `previous` to `current`.
///
/// `None` when `previous` is zero, so the value serializes as JSON `null`
/// instead of `Infinity` or `NaN`.
pub fn delta_pct(current: f64, previous: f64) -> Option<f64> {
    if previous == 0.0 {
        None
    } else {
        Some((current - previous) / previous * 100.0)
    }
}

/// [`delta_pct`] over the sums of two aligned series.
pub fn series_delta_pct(current: &[u64], previous: &[u64]) -> Option<f64> {
    #[allow(clippy::cast_precision_loss)]
    let sum = |xs: &[u64]| xs.iter().sum::<u64>() as f64;
    delta_pct(sum(current), sum(previous))
}
