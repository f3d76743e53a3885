//! A curve together with the settings and machinery that render it.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::geom::{AdaptivePolicy, BezierCurve, ControlPoints, RenderTimingReport, Vec3};

use super::aggregate::{AggregatedFrame, PathBuffer};
use super::config::{CurveConfiguration, ResolvedConfiguration};
use super::job::JobResultBuffer;
use super::orchestrator::{Orchestrator, OrchestratorOptions, RenderError, render_blocking};
use super::pool::{TaskPool, WorkerPool};

/// Resolution from which a single-threaded render still goes through the
/// pool.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 750;

static TOTAL_RENDERS: AtomicU64 = AtomicU64::new(0);

/// Renders completed by every display in the process.
#[must_use]
pub fn total_render_count() -> u64 {
    TOTAL_RENDERS.load(Ordering::Relaxed)
}

#[derive(Debug)]
pub struct CurveDisplay<P: TaskPool<JobResultBuffer> = WorkerPool<JobResultBuffer>> {
    points: ControlPoints,
    config: ResolvedConfiguration,
    orchestrator: Orchestrator<P>,
    sink: PathBuffer,
    parallel_threshold: usize,
    render_count: u64,
    last_timings: Option<RenderTimingReport>,
}

impl CurveDisplay {
    /// # Errors
    /// An invalid configuration, or a pool that failed to start.
    pub fn new(points: ControlPoints, config: &CurveConfiguration) -> Result<Self, RenderError> {
        Self::with_options(points, config, OrchestratorOptions::default())
    }

    /// # Errors
    /// See [`CurveDisplay::new`].
    pub fn with_options(
        points: ControlPoints,
        config: &CurveConfiguration,
        options: OrchestratorOptions,
    ) -> Result<Self, RenderError> {
        let config = config.resolve()?;
        let orchestrator = Orchestrator::new(config.threads, options)?;
        Ok(Self::with_orchestrator(points, config, orchestrator))
    }
}

impl<P: TaskPool<JobResultBuffer>> CurveDisplay<P> {
    pub const fn with_orchestrator(
        points: ControlPoints,
        config: ResolvedConfiguration,
        orchestrator: Orchestrator<P>,
    ) -> Self {
        Self {
            points,
            config,
            orchestrator,
            sink: PathBuffer {
                colors: Vec::new(),
                sizes: Vec::new(),
                transforms: Vec::new(),
                bulk_moves: 0,
            },
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            render_count: 0,
            last_timings: None,
        }
    }

    #[must_use]
    pub const fn control_points(&self) -> &ControlPoints {
        &self.points
    }

    #[must_use]
    pub const fn configuration(&self) -> &ResolvedConfiguration {
        &self.config
    }

    /// Segments as of the last render.
    #[must_use]
    pub const fn paths(&self) -> &PathBuffer {
        &self.sink
    }

    #[must_use]
    pub const fn orchestrator(&self) -> &Orchestrator<P> {
        &self.orchestrator
    }

    #[must_use]
    pub const fn render_count(&self) -> u64 {
        self.render_count
    }

    #[must_use]
    pub const fn last_timings(&self) -> Option<&RenderTimingReport> {
        self.last_timings.as_ref()
    }

    #[must_use]
    pub const fn parallel_threshold(&self) -> usize {
        self.parallel_threshold
    }

    pub const fn set_parallel_threshold(&mut self, threshold: usize) {
        self.parallel_threshold = threshold;
    }

    /// Whether the next render goes through the worker pool.
    #[must_use]
    pub const fn uses_pool(&self) -> bool {
        self.config.threads > 1 || self.config.resolution >= self.parallel_threshold
    }

    /// Samples the curve and updates the segments.
    ///
    /// # Errors
    /// See [`Orchestrator::render`]; the blocking path cannot fail.
    pub fn render(&mut self) -> Result<AggregatedFrame, RenderError> {
        let frame = if self.uses_pool() {
            self.orchestrator
                .render(&self.points, &self.config, &mut self.sink)?
        } else {
            render_blocking(&self.points, &self.config, &mut self.sink)
        };
        self.render_count += 1;
        TOTAL_RENDERS.fetch_add(1, Ordering::Relaxed);
        self.last_timings = Some(frame.timings.clone());
        log::debug!(
            "render #{}: {} samples, {:.3} ms",
            self.render_count,
            frame.len(),
            frame.timings.total_ms()
        );
        Ok(frame)
    }

    /// Replaces every setting at once; the pool is resized before returning.
    ///
    /// # Errors
    /// The configuration is invalid or the pool could not be resized. The
    /// previous settings stay in effect.
    pub fn set_configuration(&mut self, config: &CurveConfiguration) -> Result<(), RenderError> {
        let resolved = config.resolve()?;
        self.orchestrator.resize(resolved.threads)?;
        self.config = resolved;
        Ok(())
    }

    /// # Errors
    /// See [`CurveDisplay::set_configuration`].
    pub fn set_threads(&mut self, threads: usize) -> Result<(), RenderError> {
        let config = self.config.to_configuration().with_threads(threads);
        self.set_configuration(&config)
    }

    /// # Errors
    /// See [`CurveDisplay::set_configuration`].
    pub fn set_resolution(&mut self, resolution: usize) -> Result<(), RenderError> {
        let config = self.config.to_configuration().with_resolution(resolution);
        self.set_configuration(&config)
    }

    /// Arc length under [`AdaptivePolicy::REFERENCE`].
    #[must_use]
    pub fn length(&self) -> f64 {
        BezierCurve::new(self.points.clone(), self.config.method).arc_length(&AdaptivePolicy::REFERENCE)
    }

    /// Inserts a control point; `None` appends. Returns its index.
    ///
    /// # Errors
    /// The index is past the end or the point is not finite.
    pub fn add_point(&mut self, at: Option<usize>, point: Vec3) -> Result<usize, RenderError> {
        Ok(self.points.insert_point(at, point)?)
    }

    /// Removes a control point; negative indices count from the end.
    ///
    /// # Errors
    /// The index is out of range or only two points remain.
    pub fn remove_point(&mut self, at: isize) -> Result<Vec3, RenderError> {
        Ok(self.points.remove_point(at)?)
    }

    /// # Errors
    /// Either index is out of range.
    pub fn swap_points(&mut self, a: isize, b: isize) -> Result<(), RenderError> {
        Ok(self.points.swap_points(a, b)?)
    }

    /// # Errors
    /// The index is out of range or the point is not finite.
    pub fn set_point(&mut self, index: isize, point: Vec3) -> Result<(), RenderError> {
        Ok(self.points.set_point(index, point)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::config::{ColorSource, ConfigError};

    fn line() -> ControlPoints {
        ControlPoints::new(vec![Vec3::ZERO, Vec3::new(3.0, 4.0, 0.0)]).unwrap()
    }

    #[test]
    fn small_single_threaded_render_stays_on_caller() {
        let config = CurveConfiguration::new().with_resolution(10).with_threads(1);
        let mut display = CurveDisplay::new(line(), &config).unwrap();
        assert!(!display.uses_pool());
        let frame = display.render().unwrap();
        assert_eq!(frame.len(), 10);
        assert_eq!(display.paths().transforms.len(), 10);
        assert_eq!(display.render_count(), 1);
        assert!(total_render_count() >= 1);
        assert!(display.last_timings().is_some());

        display.set_parallel_threshold(10);
        assert!(display.uses_pool());
        display.render().unwrap();
        assert_eq!(display.render_count(), 2);
    }

    #[test]
    fn thread_change_resizes_pool() {
        let config = CurveConfiguration::new().with_resolution(100).with_threads(2);
        let mut display = CurveDisplay::new(line(), &config).unwrap();
        display.set_threads(5).unwrap();
        assert_eq!(display.configuration().threads, 5);
        assert_eq!(display.orchestrator().worker_count(), 5);
        let frame = display.render().unwrap();
        assert_eq!(frame.len(), 100);
    }

    #[test]
    fn rejected_settings_leave_previous_in_place() {
        let config = CurveConfiguration::new().with_resolution(10).with_threads(2);
        let mut display = CurveDisplay::new(line(), &config).unwrap();
        let err = display.set_threads(11).unwrap_err();
        let RenderError::Config(errors) = err else {
            panic!("expected a configuration error");
        };
        assert!(errors.contains(&ConfigError::ThreadsExceedResolution {
            threads: 11,
            resolution: 10
        }));
        assert_eq!(display.configuration().threads, 2);
        assert!(display.set_resolution(0).is_err());
        assert_eq!(display.configuration().resolution, 10);
    }

    #[test]
    fn length_and_point_edits() {
        let config = CurveConfiguration::new()
            .with_resolution(8)
            .with_threads(1)
            .with_color_source(ColorSource::Direction);
        let mut display = CurveDisplay::new(line(), &config).unwrap();
        assert!((display.length() - 5.0).abs() < 1e-9);

        display.add_point(None, Vec3::new(3.0, 4.0, 12.0)).unwrap();
        assert_eq!(display.control_points().len(), 3);
        assert_eq!(display.remove_point(-1).unwrap(), Vec3::new(3.0, 4.0, 12.0));
        display.swap_points(0, 1).unwrap();
        assert_eq!(display.control_points().as_slice()[0], Vec3::new(3.0, 4.0, 0.0));
        assert!(display.remove_point(0).is_err());
        display.set_point(1, Vec3::new(6.0, 8.0, 0.0)).unwrap();
        assert!((display.length() - 5.0).abs() < 1e-9);
    }
}
