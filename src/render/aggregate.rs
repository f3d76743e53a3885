//! Turns job results into a frame: destination transforms, colors and timings.
//!
//! Aggregation runs in three passes:
//!
//! 1. per sample, as each job result arrives: destination transform, size,
//!    and either an immediate color or a recorded magnitude;
//! 2. deferred, for measured color sources only: colors from each magnitude
//!    relative to the frame maximum;
//! 3. one batched transform update on the sink.

use crate::geom::{ORIENTATION_BASIS, RenderMetrics, RenderTimingReport, TimingBucket, Transform, Vec3};

use super::config::ColorSource;
use super::job::JobResultBuffer;
use super::step::CurveComputationStep;

// ─────────────────────────────────────────────────────────────────────────────
// Colors
// ─────────────────────────────────────────────────────────────────────────────

/// Linear RGB with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);
    pub const GREEN: Self = Self::new(0.0, 1.0, 0.0);
    pub const YELLOW: Self = Self::new(1.0, 1.0, 0.0);
    pub const RED: Self = Self::new(1.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        Self::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub position: f64,
    pub color: Color,
}

/// Green at 0, yellow at 0.3, red at 1.
pub const INTENSITY_GRADIENT: [GradientStop; 3] = [
    GradientStop {
        position: 0.0,
        color: Color::GREEN,
    },
    GradientStop {
        position: 0.3,
        color: Color::YELLOW,
    },
    GradientStop {
        position: 1.0,
        color: Color::RED,
    },
];

/// Piecewise-linear color at `value`, clamped to `[0, 1]`; NaN reads as 0.
///
/// `stops` must be sorted by position. An empty gradient is black.
#[must_use]
pub fn evaluate_gradient(stops: &[GradientStop], value: f64) -> Color {
    let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return Color::BLACK;
    };
    if value <= first.position {
        return first.color;
    }
    for pair in stops.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        if value <= next.position {
            let span = next.position - current.position;
            if span <= 0.0 {
                return next.color;
            }
            return current.color.lerp(next.color, (value - current.position) / span);
        }
    }
    last.color
}

#[must_use]
pub fn intensity_color(value: f64) -> Color {
    evaluate_gradient(&INTENSITY_GRADIENT, value)
}

/// Absolute components of the unit velocity; black for zero velocity.
#[must_use]
pub fn direction_color(velocity: Vec3) -> Color {
    velocity
        .abs()
        .normalized()
        .map_or(Color::BLACK, |n| Color::new(n.x, n.y, n.z))
}

#[must_use]
pub fn random_color() -> Color {
    use rand::Rng;
    let mut rng = rand::rng();
    Color::new(rng.random(), rng.random(), rng.random())
}

// ─────────────────────────────────────────────────────────────────────────────
// Color rules
// ─────────────────────────────────────────────────────────────────────────────

/// Per-sample outcome of a color rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleColor {
    Skip,
    Immediate(Color),
    /// Magnitude to be colored once the frame maximum is known.
    Measured(f64),
}

pub type ColorRule = fn(&CurveComputationStep) -> SampleColor;

fn skip_color(_: &CurveComputationStep) -> SampleColor {
    SampleColor::Skip
}

fn curvature_color(step: &CurveComputationStep) -> SampleColor {
    SampleColor::Immediate(intensity_color(step.curvature.unwrap_or(0.0)))
}

fn velocity_direction_color(step: &CurveComputationStep) -> SampleColor {
    SampleColor::Immediate(step.velocity.map_or(Color::BLACK, direction_color))
}

fn measured_speed(step: &CurveComputationStep) -> SampleColor {
    SampleColor::Measured(step.velocity.map_or(0.0, Vec3::length))
}

fn measured_acceleration(step: &CurveComputationStep) -> SampleColor {
    SampleColor::Measured(step.acceleration.map_or(0.0, Vec3::length))
}

fn random_sample_color(_: &CurveComputationStep) -> SampleColor {
    SampleColor::Immediate(random_color())
}

/// Resolves a color source to its per-sample rule.
#[must_use]
pub fn color_rule(source: ColorSource) -> ColorRule {
    match source {
        ColorSource::None => skip_color,
        ColorSource::Curvature => curvature_color,
        ColorSource::Direction => velocity_direction_color,
        ColorSource::Velocity => measured_speed,
        ColorSource::Acceleration => measured_acceleration,
        ColorSource::Random => random_sample_color,
    }
}

/// Placement of one path segment: oriented along the velocity, or a plain
/// translation when there is no usable velocity.
#[must_use]
pub fn destination_transform(position: Vec3, velocity: Option<Vec3>) -> Transform {
    velocity
        .and_then(|v| Transform::look_along(position, v))
        .map_or_else(|| Transform::translate(position), |look| look * ORIENTATION_BASIS)
}

// ─────────────────────────────────────────────────────────────────────────────
// Sinks
// ─────────────────────────────────────────────────────────────────────────────

/// Consumer of rendered path segments.
pub trait PathSink {
    fn assign_color(&mut self, index: usize, color: Color);
    fn assign_size(&mut self, index: usize, size: f64);
    /// Applies every destination transform in one batch.
    fn bulk_move(&mut self, destinations: &[Transform]);
}

/// In-memory [`PathSink`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathBuffer {
    pub colors: Vec<Option<Color>>,
    pub sizes: Vec<Option<f64>>,
    pub transforms: Vec<Transform>,
    /// Number of `bulk_move` calls received.
    pub bulk_moves: usize,
}

impl PathBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn slot<T: Clone>(values: &mut Vec<Option<T>>, index: usize) -> &mut Option<T> {
    if values.len() <= index {
        values.resize(index + 1, None);
    }
    &mut values[index]
}

impl PathSink for PathBuffer {
    fn assign_color(&mut self, index: usize, color: Color) {
        *slot(&mut self.colors, index) = Some(color);
    }

    fn assign_size(&mut self, index: usize, size: f64) {
        *slot(&mut self.sizes, index) = Some(size);
    }

    fn bulk_move(&mut self, destinations: &[Transform]) {
        self.transforms.clear();
        self.transforms.extend_from_slice(destinations);
        self.colors.truncate(destinations.len());
        self.sizes.truncate(destinations.len());
        self.bulk_moves += 1;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregation
// ─────────────────────────────────────────────────────────────────────────────

/// One render's output.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedFrame {
    pub destinations: Vec<Transform>,
    pub colors: Vec<Option<Color>>,
    pub sizes: Vec<Option<f64>>,
    /// Per-sample magnitudes, present for measured color sources.
    pub measured: Option<Vec<f64>>,
    pub max_measured: Option<f64>,
    pub timings: RenderTimingReport,
}

impl AggregatedFrame {
    #[must_use]
    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }
}

/// Builds an [`AggregatedFrame`] from job results arriving in any order.
#[derive(Debug)]
pub struct Aggregator {
    resolution: usize,
    rule: ColorRule,
    destinations: Vec<Transform>,
    colors: Vec<Option<Color>>,
    sizes: Vec<Option<f64>>,
    measured: Option<Vec<f64>>,
    max_measured: f64,
    metrics: RenderMetrics,
}

impl Aggregator {
    /// Starts the wall-clock total for the frame.
    #[must_use]
    pub fn new(resolution: usize, color_source: ColorSource) -> Self {
        let mut metrics = RenderMetrics::default();
        metrics.begin();
        Self {
            resolution,
            rule: color_rule(color_source),
            destinations: vec![Transform::identity(); resolution],
            colors: vec![None; resolution],
            sizes: vec![None; resolution],
            measured: color_source.is_measured().then(|| vec![0.0; resolution]),
            max_measured: 0.0,
            metrics,
        }
    }

    /// Per-sample pass over one job's results, placed by the job's range.
    pub fn absorb(&mut self, buffer: &JobResultBuffer, sink: &mut impl PathSink) {
        self.metrics.record(TimingBucket::Bezier, buffer.bezier_ns);
        let rule = self.rule;

        for (index, step) in buffer.range.indices().zip(&buffer.steps) {
            if index >= self.resolution {
                log::warn!("sample {index} is outside resolution {}", self.resolution);
                break;
            }
            self.destinations[index] = destination_transform(step.position, step.velocity);

            if let Some(size) = step.size {
                self.sizes[index] = Some(size);
                self.metrics
                    .time(TimingBucket::SizeAssignment, || sink.assign_size(index, size));
            }

            match self.metrics.time(TimingBucket::ColorEvaluation, || rule(step)) {
                SampleColor::Skip => {}
                SampleColor::Immediate(color) => {
                    self.colors[index] = Some(color);
                    self.metrics
                        .time(TimingBucket::ColorAssignment, || sink.assign_color(index, color));
                }
                SampleColor::Measured(magnitude) => {
                    if let Some(measured) = self.measured.as_mut() {
                        measured[index] = magnitude;
                    }
                    if magnitude > self.max_measured {
                        self.max_measured = magnitude;
                    }
                }
            }
        }
    }

    /// Deferred color pass and bulk apply.
    pub fn finish(mut self, sink: &mut impl PathSink) -> AggregatedFrame {
        let max = self.max_measured;
        if let Some(measured) = self.measured.as_ref() {
            for (index, magnitude) in measured.iter().enumerate() {
                let color = self.metrics.time(TimingBucket::ColorEvaluation, || {
                    let intensity = if max > 0.0 && max.is_finite() { magnitude / max } else { 0.0 };
                    intensity_color(intensity)
                });
                self.colors[index] = Some(color);
                self.metrics
                    .time(TimingBucket::ColorAssignment, || sink.assign_color(index, color));
            }
        }

        let destinations = self.destinations;
        self.metrics
            .time(TimingBucket::BulkApply, || sink.bulk_move(&destinations));

        AggregatedFrame {
            destinations,
            colors: self.colors,
            sizes: self.sizes,
            max_measured: self.measured.as_ref().map(|_| max),
            measured: self.measured,
            timings: self.metrics.end(),
        }
    }
}
