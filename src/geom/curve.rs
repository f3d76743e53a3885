use std::sync::Arc;

use super::core::{Tolerance, Vec3};
use super::de_casteljau::evaluate_de_casteljau;
use super::polynomial::{evaluate_horner, evaluate_power_sum};
use super::quadrature::{AdaptivePolicy, arc_length_with};

/// Minimum number of control points of a curve.
pub const MIN_CONTROL_POINTS: usize = 2;

/// Evaluates the `order`-th derivative of a curve at `t`.
pub type Evaluator = fn(&[Vec3], f64, usize) -> Vec3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CurveError {
    #[error("a curve requires at least 2 control points, got {count}")]
    TooFewPoints { count: usize },
    #[error("control point {index} contains non-finite coordinates")]
    NonFinitePoint { index: usize },
    #[error("control point index {index} is out of range for {len} points")]
    IndexOutOfRange { index: isize, len: usize },
}

/// Algorithm used to evaluate curve points and derivatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum ComputationMethod {
    /// Power sum over memoized Bernstein coefficients.
    #[default]
    Polynomial,
    /// Horner accumulation over the same coefficients.
    PolynomialHorner,
    /// Hodograph differencing plus repeated interpolation.
    DeCasteljau,
}

impl ComputationMethod {
    pub const ALL: [Self; 3] = [Self::Polynomial, Self::PolynomialHorner, Self::DeCasteljau];

    /// Resolves the method to its evaluator once, so per-sample code does not
    /// branch on the variant.
    #[must_use]
    pub fn evaluator(self) -> Evaluator {
        match self {
            Self::Polynomial => evaluate_power_sum::<Vec3>,
            Self::PolynomialHorner => evaluate_horner::<Vec3>,
            Self::DeCasteljau => evaluate_de_casteljau::<Vec3>,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Polynomial => "polynomial",
            Self::PolynomialHorner => "horner",
            Self::DeCasteljau => "de-casteljau",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|method| method.name().eq_ignore_ascii_case(name))
    }
}

/// Ordered, validated control points (at least [`MIN_CONTROL_POINTS`], all finite).
#[derive(Debug, Clone, PartialEq)]
pub struct ControlPoints {
    points: Arc<[Vec3]>,
}

impl ControlPoints {
    /// # Errors
    /// [`CurveError::TooFewPoints`] or [`CurveError::NonFinitePoint`].
    pub fn new(points: impl Into<Vec<Vec3>>) -> Result<Self, CurveError> {
        let points: Vec<Vec3> = points.into();
        if points.len() < MIN_CONTROL_POINTS {
            return Err(CurveError::TooFewPoints {
                count: points.len(),
            });
        }
        if let Some(index) = points.iter().position(|p| !p.is_finite()) {
            return Err(CurveError::NonFinitePoint { index });
        }
        Ok(Self {
            points: points.into(),
        })
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Vec3] {
        &self.points
    }

    /// Cheap handle for sharing with workers.
    #[must_use]
    pub fn shared(&self) -> Arc<[Vec3]> {
        Arc::clone(&self.points)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn degree(&self) -> usize {
        self.points.len() - 1
    }

    /// Resolves a possibly negative index (`-1` is the last point).
    fn resolve_index(&self, index: isize) -> Result<usize, CurveError> {
        let len = self.points.len();
        let resolved = if index < 0 {
            len.checked_sub(index.unsigned_abs())
        } else {
            Some(index.unsigned_abs())
        };
        resolved
            .filter(|i| *i < len)
            .ok_or(CurveError::IndexOutOfRange { index, len })
    }

    /// Inserts `point` before position `at`, or appends it when `at` is `None`.
    ///
    /// # Errors
    /// Non-finite point or `at > len`.
    pub fn insert_point(&mut self, at: Option<usize>, point: Vec3) -> Result<usize, CurveError> {
        let len = self.points.len();
        let at = at.unwrap_or(len);
        if at > len {
            return Err(CurveError::IndexOutOfRange {
                index: isize::try_from(at).unwrap_or(isize::MAX),
                len,
            });
        }
        if !point.is_finite() {
            return Err(CurveError::NonFinitePoint { index: at });
        }
        let mut points = self.points.to_vec();
        points.insert(at, point);
        self.points = points.into();
        Ok(at)
    }

    /// Removes the point at `at` (negative counts from the end).
    ///
    /// # Errors
    /// Out-of-range index, or removal would leave fewer than
    /// [`MIN_CONTROL_POINTS`] points.
    pub fn remove_point(&mut self, at: isize) -> Result<Vec3, CurveError> {
        let index = self.resolve_index(at)?;
        if self.points.len() <= MIN_CONTROL_POINTS {
            return Err(CurveError::TooFewPoints {
                count: self.points.len() - 1,
            });
        }
        let mut points = self.points.to_vec();
        let removed = points.remove(index);
        self.points = points.into();
        Ok(removed)
    }

    /// Swaps two points (negative indices count from the end).
    ///
    /// # Errors
    /// Either index out of range.
    pub fn swap_points(&mut self, a: isize, b: isize) -> Result<(), CurveError> {
        let a = self.resolve_index(a)?;
        let b = self.resolve_index(b)?;
        let mut points = self.points.to_vec();
        points.swap(a, b);
        self.points = points.into();
        Ok(())
    }

    /// Replaces the point at `index`.
    ///
    /// # Errors
    /// Out-of-range index or non-finite point.
    pub fn set_point(&mut self, index: isize, point: Vec3) -> Result<(), CurveError> {
        let index = self.resolve_index(index)?;
        if !point.is_finite() {
            return Err(CurveError::NonFinitePoint { index });
        }
        let mut points = self.points.to_vec();
        points[index] = point;
        self.points = points.into();
        Ok(())
    }
}

impl TryFrom<Vec<Vec3>> for ControlPoints {
    type Error = CurveError;

    fn try_from(points: Vec<Vec3>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

/// Curvature `|v × a| / |v|³` clamped to `[0, 1]`; `0` when the speed is
/// zero or below [`Tolerance::ZERO_LENGTH`].
#[must_use]
pub fn clamped_curvature(velocity: Vec3, acceleration: Vec3) -> f64 {
    if Tolerance::ZERO_LENGTH.is_zero_vec3(velocity) {
        return 0.0;
    }
    let speed = velocity.length();
    let denom = speed * speed * speed;
    if denom <= 0.0 || !denom.is_finite() {
        return 0.0;
    }
    let k = velocity.cross(acceleration).length() / denom;
    if k.is_nan() { 0.0 } else { k.clamp(0.0, 1.0) }
}

/// A Bézier curve bound to an evaluation method.
#[derive(Debug, Clone)]
pub struct BezierCurve {
    points: ControlPoints,
    method: ComputationMethod,
    evaluator: Evaluator,
}

impl BezierCurve {
    #[must_use]
    pub fn new(points: ControlPoints, method: ComputationMethod) -> Self {
        Self {
            points,
            method,
            evaluator: method.evaluator(),
        }
    }

    #[must_use]
    pub const fn control_points(&self) -> &ControlPoints {
        &self.points
    }

    #[must_use]
    pub const fn method(&self) -> ComputationMethod {
        self.method
    }

    #[must_use]
    pub fn degree(&self) -> usize {
        self.points.degree()
    }

    #[must_use]
    pub fn point_at(&self, t: f64) -> Vec3 {
        (self.evaluator)(self.points.as_slice(), t, 0)
    }

    /// `order`-th derivative at `t`; zero when `order` exceeds the degree.
    #[must_use]
    pub fn derivative_at(&self, t: f64, order: usize) -> Vec3 {
        (self.evaluator)(self.points.as_slice(), t, order)
    }

    #[must_use]
    pub fn curvature_at(&self, t: f64) -> f64 {
        clamped_curvature(self.derivative_at(t, 1), self.derivative_at(t, 2))
    }

    /// Arc length over `[0, 1]` under `policy`.
    #[must_use]
    pub fn arc_length(&self, policy: &AdaptivePolicy) -> f64 {
        arc_length_with(|t| self.derivative_at(t, 1), policy).value
    }
}
