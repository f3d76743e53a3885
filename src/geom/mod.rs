mod cache;
mod coefficients;
mod core;
mod curve;
mod de_casteljau;
mod metrics;
mod polynomial;
mod quadrature;

pub use cache::{MemoStats, MemoTable};
pub use coefficients::{CoefficientTable, PointTerms, coefficient_cache_stats, coefficients};
pub use core::{LinearSpace, ORIENTATION_BASIS, Tolerance, Transform, Vec3};
pub use curve::{
    BezierCurve, ComputationMethod, ControlPoints, CurveError, Evaluator, MIN_CONTROL_POINTS,
    clamped_curvature,
};
pub use de_casteljau::{evaluate_de_casteljau, evaluate_with};
pub use metrics::{RenderMetrics, RenderTimingReport, Stopwatch, TimingBucket};
pub use polynomial::{evaluate_horner, evaluate_power_sum};
pub use quadrature::{
    AdaptivePolicy, GaussLegendreRule, KahanSum, QuadratureEstimate, adaptive_integrate,
    arc_length_with, gauss_legendre, integrate, kahan_sum, quadrature_cache_stats,
};

#[cfg(test)]
mod tests;
