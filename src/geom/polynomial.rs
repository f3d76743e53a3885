//! Direct Bézier evaluation from memoized Bernstein coefficients.
//!
//! Both evaluators compute `Σ_i P_i · w_i(t)` where `w_i` is the point's
//! (possibly differentiated) Bernstein polynomial in power form. They differ
//! only in how each `w_i` is accumulated.

use super::coefficients::coefficients;
use super::core::LinearSpace;

/// `t^0 ..= t^degree`.
fn power_table(t: f64, degree: usize) -> Vec<f64> {
    let mut powers = Vec::with_capacity(degree + 1);
    let mut current = 1.0;
    for _ in 0..=degree {
        powers.push(current);
        current *= t;
    }
    powers
}

/// Evaluates the `derivative_order`-th derivative at `t` by summing
/// coefficient-weighted powers of `t`.
///
/// # Arguments
/// * `points` - control points; the degree is `points.len() - 1`
/// * `t` - curve parameter; values outside `[0, 1]` extrapolate
/// * `derivative_order` - `0` for the position
///
/// # Returns
/// The zero element when `points` is empty or `derivative_order` exceeds the
/// degree.
#[must_use]
pub fn evaluate_power_sum<P: LinearSpace>(points: &[P], t: f64, derivative_order: usize) -> P {
    let Some(degree) = points.len().checked_sub(1) else {
        return P::ZERO;
    };
    let table = coefficients(degree, derivative_order);
    let powers = power_table(t, degree);

    let mut sum = P::ZERO;
    for group in table.terms() {
        let mut weight = 0.0;
        for (k, coefficient) in group.coefficients.iter().enumerate() {
            let power = degree - k;
            weight += coefficient * powers[power - derivative_order];
        }
        sum = sum + points[group.point] * weight;
    }
    sum
}

/// Same contract as [`evaluate_power_sum`], accumulating each point's
/// polynomial with Horner's scheme instead of a power table.
#[must_use]
pub fn evaluate_horner<P: LinearSpace>(points: &[P], t: f64, derivative_order: usize) -> P {
    let Some(degree) = points.len().checked_sub(1) else {
        return P::ZERO;
    };
    let table = coefficients(degree, derivative_order);

    let mut sum = P::ZERO;
    for group in table.terms() {
        let mut acc = 0.0;
        for coefficient in group.coefficients {
            acc = acc * t + coefficient;
        }
        let shift = group.lowest_power - derivative_order;
        let weight = acc * t.powi(i32::try_from(shift).unwrap_or(i32::MAX));
        sum = sum + points[group.point] * weight;
    }
    sum
}
