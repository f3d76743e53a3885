//! Bézier curve sampling: points, derivatives and arc length of arbitrary
//! degree curves, and a pooled renderer that turns samples into oriented,
//! colored path segments.
//!
//! [`geom`] holds the numeric core and never blocks. [`render`] holds
//! configuration, the worker pool, and the aggregation into frames.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod geom;
pub mod render;

pub use geom::{BezierCurve, ComputationMethod, ControlPoints, CurveError, Transform, Vec3};
pub use render::{
    AggregatedFrame, ColorSource, CurveConfiguration, CurveDisplay, RenderError,
    ResolvedConfiguration,
};

/// Installs a debug-level logger when built with `debug_logs`; otherwise a
/// no-op. Safe to call more than once.
#[cfg(feature = "debug_logs")]
pub fn init_logger() {
    use log::LevelFilter;
    let _ = env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Debug)
        .is_test(cfg!(test))
        .try_init();
}

#[cfg(not(feature = "debug_logs"))]
pub fn init_logger() {}
