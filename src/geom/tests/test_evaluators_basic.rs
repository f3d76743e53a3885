use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geom::{
    ComputationMethod, Tolerance, Vec3, evaluate_de_casteljau, evaluate_horner,
    evaluate_power_sum,
};

fn random_points(rng: &mut StdRng, count: usize) -> Vec<Vec3> {
    (0..count)
        .map(|_| {
            Vec3::new(
                rng.random_range(-10.0..10.0),
                rng.random_range(-10.0..10.0),
                rng.random_range(-10.0..10.0),
            )
        })
        .collect()
}

#[test]
fn evaluators_agree_for_degrees_and_orders() {
    let mut rng = StdRng::seed_from_u64(0xB3_2132);
    let tol = Tolerance::LOOSE;

    for degree in 1..=10 {
        for order in 0..=3 {
            for _ in 0..4 {
                let points = random_points(&mut rng, degree + 1);
                let t: f64 = rng.random_range(0.0..=1.0);

                let power_sum = evaluate_power_sum(&points, t, order);
                let horner = evaluate_horner(&points, t, order);
                let de_casteljau = evaluate_de_casteljau(&points, t, order);

                assert!(
                    tol.approx_eq_vec3_relative(horner, power_sum),
                    "horner vs power sum: degree {degree} order {order} t {t}: {horner:?} != {power_sum:?}"
                );
                assert!(
                    tol.approx_eq_vec3_relative(de_casteljau, power_sum),
                    "de casteljau vs power sum: degree {degree} order {order} t {t}: {de_casteljau:?} != {power_sum:?}"
                );
            }
        }
    }
}

#[test]
fn endpoints_interpolate_first_and_last_point() {
    let mut rng = StdRng::seed_from_u64(7);
    let tol = Tolerance::DEFAULT;
    // The power basis loses a few digits at t = 1 for high degrees.
    let end_tol = Tolerance::LOOSE;

    for degree in 1..=12 {
        let points = random_points(&mut rng, degree + 1);
        let first = points[0];
        let last = points[degree];
        for method in ComputationMethod::ALL {
            let evaluate = method.evaluator();
            assert!(tol.approx_eq_vec3(evaluate(&points, 0.0, 0), first), "{method:?} start, degree {degree}");
            assert!(
                end_tol.approx_eq_vec3_relative(evaluate(&points, 1.0, 0), last),
                "{method:?} end, degree {degree}"
            );
        }
    }
}

#[test]
fn derivative_order_above_degree_is_zero_for_every_method() {
    let points = vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(-4.0, 0.5, 2.0), Vec3::new(0.0, 9.0, 1.0)];
    for method in ComputationMethod::ALL {
        let evaluate = method.evaluator();
        for order in 3..6 {
            assert_eq!(evaluate(&points, 0.42, order), Vec3::ZERO, "{method:?} order {order}");
        }
    }
}

#[test]
fn extrapolation_does_not_fail() {
    let points = vec![Vec3::ZERO, Vec3::new(1.0, 2.0, 0.0), Vec3::new(2.0, 0.0, 0.0)];
    let tol = Tolerance::LOOSE;
    for t in [-1.5, 2.0, 10.0] {
        let reference = evaluate_power_sum(&points, t, 0);
        assert!(reference.is_finite());
        assert!(tol.approx_eq_vec3_relative(evaluate_horner(&points, t, 0), reference));
        assert!(tol.approx_eq_vec3_relative(evaluate_de_casteljau(&points, t, 0), reference));
    }
}
