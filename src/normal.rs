//! Normal tail helpers for the probit game model.
//!
//! A side whose effective rating advantage is `x` wins with probability
//! `erfc(-x / (sigma_px * sqrt 2)) / 2`.

use std::f64::consts::{LN_2, PI, SQRT_2};

// Beyond this statrs' erfc is close to underflow; switch to the asymptotic series.
const ERFC_ASYMPTOTIC_FROM: f64 = 25.0;

pub fn erfc(x: f64) -> f64 {
    statrs::function::erf::erfc(x)
}

/// `ln(erfc(x))`, finite for arbitrarily large positive `x`.
pub fn ln_erfc(x: f64) -> f64 {
    if x < ERFC_ASYMPTOTIC_FROM {
        return erfc(x).ln();
    }
    let inv2 = 1.0 / (x * x);
    let series = 1.0 - 0.5 * inv2 + 0.75 * inv2 * inv2 - 1.875 * inv2 * inv2 * inv2;
    -x * x - (x * PI.sqrt()).ln() + series.ln()
}

pub fn win_probability(advantage: f64, sigma_px: f64) -> f64 {
    erfc(-advantage / (sigma_px * SQRT_2)) / 2.0
}

pub fn ln_win_probability(advantage: f64, sigma_px: f64) -> f64 {
    ln_erfc(-advantage / (sigma_px * SQRT_2)) - LN_2
}

/// Derivative of [`ln_win_probability`] with respect to `advantage`.
pub fn win_gradient(advantage: f64, sigma_px: f64) -> f64 {
    let t = -advantage / (sigma_px * SQRT_2);
    (2.0 / PI).sqrt() / sigma_px * (-t * t - ln_erfc(t)).exp()
}

/// Negated second derivative of [`ln_win_probability`]; always positive.
pub fn win_curvature(advantage: f64, sigma_px: f64) -> f64 {
    let g = win_gradient(advantage, sigma_px);
    advantage / (sigma_px * sigma_px) * g + g * g
}
