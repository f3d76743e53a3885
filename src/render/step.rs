use crate::geom::{Evaluator, Vec3, clamped_curvature};

/// Which optional quantities a sampling step computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepFlags {
    pub velocity: bool,
    pub acceleration: bool,
    pub curvature: bool,
    pub size: bool,
}

impl StepFlags {
    pub const ALL: Self = Self {
        velocity: true,
        acceleration: true,
        curvature: true,
        size: true,
    };

    pub const POSITION_ONLY: Self = Self {
        velocity: false,
        acceleration: false,
        curvature: false,
        size: false,
    };
}

/// One sample of the curve. `None` means "not computed", which is distinct
/// from a computed zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveComputationStep {
    pub position: Vec3,
    pub velocity: Option<Vec3>,
    pub acceleration: Option<Vec3>,
    pub curvature: Option<f64>,
    pub size: Option<f64>,
}

/// Progress of sample `index` out of `resolution`; both endpoints are
/// sampled and a single sample sits at `t = 0`.
#[must_use]
pub fn sample_progress(index: usize, resolution: usize) -> f64 {
    if resolution <= 1 {
        0.0
    } else {
        index as f64 / (resolution - 1) as f64
    }
}

/// Length of the path segment drawn for one sample.
///
/// With curvature: `|v| / ((R - 2) + 1 - 1.5κ) + min(κ/3, 0.1)`; without:
/// `|v| / R`. When the curvature-aware denominator is not positive (small
/// `R`), the curvature-free form is used.
#[must_use]
pub fn segment_size(velocity: Vec3, resolution: usize, curvature: Option<f64>) -> f64 {
    let speed = velocity.length();
    let fallback = speed / resolution.max(1) as f64;
    let Some(k) = curvature else {
        return fallback;
    };
    let denom = (resolution as f64 - 2.0) + (1.0 - k * 1.5);
    if denom > 0.0 && denom.is_finite() {
        speed / denom + (k / 3.0).min(0.1)
    } else {
        fallback
    }
}

/// Computes [`CurveComputationStep`]s with a fixed evaluator and flag set.
#[derive(Debug, Clone, Copy)]
pub struct StepComputer {
    evaluator: Evaluator,
    flags: StepFlags,
    resolution: usize,
}

impl StepComputer {
    #[must_use]
    pub const fn new(evaluator: Evaluator, flags: StepFlags, resolution: usize) -> Self {
        Self {
            evaluator,
            flags,
            resolution,
        }
    }

    #[must_use]
    pub const fn flags(&self) -> StepFlags {
        self.flags
    }

    /// Samples the curve at `t`.
    ///
    /// Curvature and size are derived from velocity and acceleration, which
    /// are evaluated for them even if their own slots were not requested.
    #[must_use]
    pub fn compute(&self, points: &[Vec3], t: f64) -> CurveComputationStep {
        let flags = self.flags;
        let position = (self.evaluator)(points, t, 0);

        let need_velocity = flags.velocity || flags.curvature || flags.size;
        let need_acceleration = flags.acceleration || flags.curvature;
        let velocity = need_velocity.then(|| (self.evaluator)(points, t, 1));
        let acceleration = need_acceleration.then(|| (self.evaluator)(points, t, 2));

        let curvature = match (flags.curvature, velocity, acceleration) {
            (true, Some(v), Some(a)) => Some(clamped_curvature(v, a)),
            _ => None,
        };
        let size = match (flags.size, velocity) {
            (true, Some(v)) => Some(segment_size(v, self.resolution, curvature)),
            _ => None,
        };

        CurveComputationStep {
            position,
            velocity: velocity.filter(|_| flags.velocity),
            acceleration: acceleration.filter(|_| flags.acceleration),
            curvature,
            size,
        }
    }

    /// Samples index `index` of the configured resolution.
    #[must_use]
    pub fn compute_index(&self, points: &[Vec3], index: usize) -> CurveComputationStep {
        self.compute(points, sample_progress(index, self.resolution))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{ComputationMethod, Tolerance};

    fn arch() -> Vec<Vec3> {
        vec![
            Vec3::new(-5.0, 3.0, -10.0),
            Vec3::new(0.0, 7.0, -10.0),
            Vec3::new(5.0, 3.0, -10.0),
        ]
    }

    #[test]
    fn progress_includes_both_endpoints() {
        assert_eq!(sample_progress(0, 1), 0.0);
        assert_eq!(sample_progress(0, 5), 0.0);
        assert_eq!(sample_progress(2, 5), 0.5);
        assert_eq!(sample_progress(4, 5), 1.0);
    }

    #[test]
    fn unrequested_slots_are_absent() {
        let computer = StepComputer::new(
            ComputationMethod::Polynomial.evaluator(),
            StepFlags::POSITION_ONLY,
            10,
        );
        let step = computer.compute(&arch(), 0.5);
        assert_eq!(step.position, Vec3::new(0.0, 5.0, -10.0));
        assert_eq!(step.velocity, None);
        assert_eq!(step.acceleration, None);
        assert_eq!(step.curvature, None);
        assert_eq!(step.size, None);
    }

    #[test]
    fn all_slots_at_apex() {
        let computer = StepComputer::new(ComputationMethod::Polynomial.evaluator(), StepFlags::ALL, 250);
        let step = computer.compute(&arch(), 0.5);
        let tol = Tolerance::DEFAULT;

        let velocity = step.velocity.unwrap();
        let acceleration = step.acceleration.unwrap();
        assert!(tol.approx_eq_vec3(velocity, Vec3::new(10.0, 0.0, 0.0)));
        assert!(tol.approx_eq_vec3(acceleration, Vec3::new(0.0, -16.0, 0.0)));
        // |v × a| / |v|³ = 160 / 1000
        assert!(tol.approx_eq_f64(step.curvature.unwrap(), 0.16));
        let expected_size = 10.0 / (248.0 + 1.0 - 0.24) + 0.16 / 3.0;
        assert!(tol.approx_eq_f64(step.size.unwrap(), expected_size));
    }

    #[test]
    fn zero_velocity_gives_zero_curvature() {
        let points = vec![Vec3::new(1.0, 1.0, 1.0); 3];
        let computer = StepComputer::new(ComputationMethod::DeCasteljau.evaluator(), StepFlags::ALL, 1);
        let step = computer.compute_index(&points, 0);
        assert_eq!(step.velocity, Some(Vec3::ZERO));
        assert_eq!(step.curvature, Some(0.0));
        assert_eq!(step.size, Some(0.0));
    }

    #[test]
    fn size_without_curvature_uses_resolution() {
        let flags = StepFlags {
            velocity: true,
            size: true,
            ..StepFlags::POSITION_ONLY
        };
        let computer = StepComputer::new(ComputationMethod::Polynomial.evaluator(), flags, 100);
        let step = computer.compute(&arch(), 0.5);
        assert_eq!(step.curvature, None);
        assert!(Tolerance::DEFAULT.approx_eq_f64(step.size.unwrap(), 0.1));
    }

    #[test]
    fn size_falls_back_when_denominator_vanishes() {
        // R = 1 and κ = 1: (1 - 2) + (1 - 1.5) < 0
        let size = segment_size(Vec3::new(3.0, 4.0, 0.0), 1, Some(1.0));
        assert_eq!(size, 5.0);
        assert!(segment_size(Vec3::X, 2, Some(0.5)).is_finite());
    }
}
