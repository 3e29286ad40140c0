use crate::config::constant::CAPACITY_EPS;

/// Capacity comparison with the crate-wide 1e-6 tolerance.
pub fn within_capacity(used: f64, cap: f64) -> bool {
    used <= cap + CAPACITY_EPS
}

pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Ratio guarded against a zero denominator.
pub fn safe_ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}
