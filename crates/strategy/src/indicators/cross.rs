//! Boolean predicates over two index-aligned series.
//!
//! Comparisons involving an undefined (`NaN`) value are false, so a column
//! that is still warming up never produces a signal.

/// `a[i] > b[i]` for every index of the shorter series.
pub fn above(a: &[f64], b: &[f64]) -> Vec<bool> {
    a.iter().zip(b).map(|(x, y)| x > y).collect()
}

/// `a[i] < b[i]` for every index of the shorter series.
pub fn below(a: &[f64], b: &[f64]) -> Vec<bool> {
    a.iter().zip(b).map(|(x, y)| x < y).collect()
}

/// Crossing events of `a` over `b`.
///
/// With `above = true`, index `i` is true when `a` is above `b` at `i` but was
/// not at `i - 1`. With `above = false` the same holds for `a` going below
/// `b`. Index 0 is never a cross.
pub fn cross(a: &[f64], b: &[f64], above: bool) -> Vec<bool> {
    let side = if above { self::above(a, b) } else { below(a, b) };
    side.iter()
        .enumerate()
        .map(|(i, &now)| i > 0 && now && !side[i - 1])
        .collect()
}
