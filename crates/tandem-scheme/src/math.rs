//! Tolerant floating point comparisons for simulated time.

/// `a == b` within `eps`.
pub fn equals(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps
}

/// `a > b` by more than `eps`.
pub fn greater(a: f64, b: f64, eps: f64) -> bool {
    a - b > eps
}

/// `a >= b` within `eps`.
pub fn greater_equals(a: f64, b: f64, eps: f64) -> bool {
    a - b >= -eps
}
