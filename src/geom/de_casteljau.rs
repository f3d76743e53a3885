//! De Casteljau evaluation with hodograph differencing.
//!
//! The only operations required of the point type are `lerp` and `subtract`,
//! so the evaluator also works for types that are not backed by `f64` fields.

use super::core::LinearSpace;

/// Evaluates the `derivative_order`-th derivative of the curve at `t`.
///
/// The hodograph step `q_i = n · (p_{i+1} - p_i)` is applied
/// `derivative_order` times, then the remaining polygon is reduced by linear
/// interpolation. The scale by `n` is expressed as
/// `lerp(p_i, p_{i+1}, n) - p_i`.
///
/// Returns `None` only when `points` is empty. A derivative order above the
/// degree yields `subtract(p_0, p_0)`.
pub fn evaluate_with<P, L, S>(
    points: &[P],
    t: f64,
    derivative_order: usize,
    lerp: L,
    subtract: S,
) -> Option<P>
where
    P: Copy,
    L: Fn(P, P, f64) -> P,
    S: Fn(P, P) -> P,
{
    let first = *points.first()?;
    let mut scratch = points.to_vec();
    let mut len = scratch.len();

    for _ in 0..derivative_order {
        if len <= 1 {
            return Some(subtract(first, first));
        }
        let n = (len - 1) as f64;
        for i in 0..len - 1 {
            scratch[i] = subtract(lerp(scratch[i], scratch[i + 1], n), scratch[i]);
        }
        len -= 1;
    }

    for level in (1..len).rev() {
        for i in 0..level {
            scratch[i] = lerp(scratch[i], scratch[i + 1], t);
        }
    }
    Some(scratch[0])
}

/// [`evaluate_with`] for [`LinearSpace`] points; empty input yields zero.
#[must_use]
pub fn evaluate_de_casteljau<P: LinearSpace>(points: &[P], t: f64, derivative_order: usize) -> P {
    evaluate_with(
        points,
        t,
        derivative_order,
        |a, b, s| a + (b - a) * s,
        |a, b| a - b,
    )
    .unwrap_or(P::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::core::{Tolerance, Vec3};

    #[test]
    fn cubic_midpoint() {
        let points = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 2.0, 0.0),
            Vec3::new(3.0, 2.0, 0.0),
            Vec3::new(4.0, 0.0, 0.0),
        ];
        let mid = evaluate_de_casteljau(&points, 0.5, 0);
        assert!(Tolerance::DEFAULT.approx_eq_vec3(mid, Vec3::new(2.0, 1.5, 0.0)));

        // B'(t) at the start is 3 (P1 - P0)
        let start_velocity = evaluate_de_casteljau(&points, 0.0, 1);
        assert!(Tolerance::DEFAULT.approx_eq_vec3(start_velocity, Vec3::new(3.0, 6.0, 0.0)));
    }

    #[test]
    fn input_is_not_mutated() {
        let points = vec![1.0, 4.0, 2.0];
        let copy = points.clone();
        let _ = evaluate_de_casteljau(&points, 0.7, 1);
        assert_eq!(points, copy);
    }

    #[test]
    fn order_above_degree_uses_subtract() {
        let points = [Vec3::new(1.0, 1.0, 1.0), Vec3::new(2.0, 0.0, 5.0)];
        assert_eq!(evaluate_de_casteljau(&points, 0.4, 2), Vec3::ZERO);
        assert_eq!(evaluate_de_casteljau(&points, 0.4, 1), Vec3::new(1.0, -1.0, 4.0));
    }

    #[test]
    fn custom_operations_on_integer_pairs() {
        // A point type with no f64 arithmetic of its own.
        type Pair = (i64, i64);
        let lerp = |a: Pair, b: Pair, s: f64| {
            let mix = |x: i64, y: i64| (x as f64 + (y - x) as f64 * s).round() as i64;
            (mix(a.0, b.0), mix(a.1, b.1))
        };
        let subtract = |a: Pair, b: Pair| (a.0 - b.0, a.1 - b.1);

        let points: [Pair; 3] = [(0, 0), (10, 20), (20, 0)];
        assert_eq!(evaluate_with(&points, 0.5, 0, lerp, subtract), Some((10, 10)));
        assert_eq!(evaluate_with(&points, 0.0, 1, lerp, subtract), Some((20, 40)));
        assert_eq!(evaluate_with::<Pair, _, _>(&[], 0.5, 0, lerp, subtract), None);
    }
}
