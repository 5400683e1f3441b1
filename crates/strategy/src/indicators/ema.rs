/// Exponential Moving Average over a whole series.
///
/// Output is aligned by index with the input. The first `length - 1` values
/// are undefined (`NaN`); the value at `length - 1` is seeded with the SMA of
/// the first `length` inputs, then smoothed with `k = 2 / (length + 1)`.
/// A series shorter than `length` is entirely `NaN`.
pub fn ema(values: &[f64], length: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if length == 0 || values.len() < length {
        return out;
    }

    let k = 2.0 / (length as f64 + 1.0);
    let mut ema_val = values[..length].iter().sum::<f64>() / length as f64;
    out[length - 1] = ema_val;

    for (i, &price) in values.iter().enumerate().skip(length) {
        ema_val = price * k + ema_val * (1.0 - k);
        out[i] = ema_val;
    }
    out
}

/// Replace undefined (`NaN`) values with `fill`.
pub fn fill_na(mut values: Vec<f64>, fill: f64) -> Vec<f64> {
    for v in values.iter_mut().filter(|v| v.is_nan()) {
        *v = fill;
    }
    values
}
