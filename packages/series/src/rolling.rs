//! Centered rolling mean used to smooth series for display.

/// Centered moving average with a minimum of one observation per window.
///
/// Each output value is the mean of the in-bounds inputs in a window of
/// `window` positions centered on it, so edges average over fewer values
/// instead of producing gaps. For even windows the extra position falls
/// on the left. A `window` of 0 is treated as 1.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn centered_rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let right = (window - 1) / 2;
    let left = window - 1 - right;

    let mut prefix = Vec::with_capacity(values.len() + 1);
    prefix.push(0.0);
    for value in values {
        prefix.push(prefix[prefix.len() - 1] + value);
    }

    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(left);
            let hi = (i + right + 1).min(values.len());
            (prefix[hi] - prefix[lo]) / (hi - lo) as f64
        })
        .collect()
}
