//! Curve render configuration and its cross-field validation.
//!
//! [`CurveConfiguration`] is a plain struct of optional settings. Resolving it
//! fills documented defaults, turns on flags other settings depend on, and
//! reports every constraint an explicit setting violates.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geom::{ComputationMethod, Evaluator};

use super::step::StepFlags;

pub const DEFAULT_RESOLUTION: usize = 250;
/// Upper bound for the derived default thread count.
pub const MAX_DEFAULT_THREADS: usize = 100;

/// Where a sample's color comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ColorSource {
    #[default]
    None,
    /// Absolute components of the unit velocity.
    Direction,
    /// Gradient over the clamped curvature.
    Curvature,
    /// Gradient over speed relative to the frame maximum.
    Velocity,
    /// Gradient over acceleration magnitude relative to the frame maximum.
    Acceleration,
    Random,
}

impl ColorSource {
    pub const ALL: [Self; 6] = [
        Self::None,
        Self::Direction,
        Self::Curvature,
        Self::Velocity,
        Self::Acceleration,
        Self::Random,
    ];

    /// Measured sources need the frame-wide maximum before any color is final.
    #[must_use]
    pub const fn is_measured(self) -> bool {
        matches!(self, Self::Velocity | Self::Acceleration)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Direction => "direction",
            Self::Curvature => "curvature",
            Self::Velocity => "velocity",
            Self::Acceleration => "acceleration",
            Self::Random => "random",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|source| source.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for ColorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A computed per-sample quantity that can be switched on or off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Velocity,
    Acceleration,
    Curvature,
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Velocity => "velocity",
            Self::Acceleration => "acceleration",
            Self::Curvature => "curvature",
        })
    }
}

/// The setting that forces a [`Flag`] on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Curvature,
    Size,
    ColorSource(ColorSource),
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Curvature => f.write_str("curvature"),
            Self::Size => f.write_str("size"),
            Self::ColorSource(source) => write!(f, "color source `{source}`"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("thread count must be a positive integer")]
    ZeroThreads,
    #[error("resolution must be a positive integer")]
    ZeroResolution,
    #[error("thread count {threads} cannot be higher than the resolution {resolution}")]
    ThreadsExceedResolution { threads: usize, resolution: usize },
    #[error("{flag} cannot be disabled: it is required by {required_by}")]
    RequiredFlagDisabled { flag: Flag, required_by: Requirement },
}

/// Every constraint violated by one configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid curve configuration: {}", join_errors(.0))]
pub struct ConfigErrors(pub Vec<ConfigError>);

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ConfigErrors {
    #[must_use]
    pub fn errors(&self) -> &[ConfigError] {
        &self.0
    }

    #[must_use]
    pub fn contains(&self, error: &ConfigError) -> bool {
        self.0.contains(error)
    }
}

/// Requested settings; `None` means "use the default".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveConfiguration {
    pub threads: Option<usize>,
    pub resolution: Option<usize>,
    pub method: Option<ComputationMethod>,
    pub velocity: Option<bool>,
    pub acceleration: Option<bool>,
    pub curvature: Option<bool>,
    pub size: Option<bool>,
    pub color_source: Option<ColorSource>,
}

/// A validated configuration with every field decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedConfiguration {
    pub threads: usize,
    pub resolution: usize,
    pub method: ComputationMethod,
    pub velocity: bool,
    pub acceleration: bool,
    pub curvature: bool,
    pub size: bool,
    pub color_source: ColorSource,
}

/// `clamp(resolution / 100, 1, 100)`.
#[must_use]
pub fn default_threads(resolution: usize) -> usize {
    (resolution / 100).clamp(1, MAX_DEFAULT_THREADS)
}

/// Collects which settings force a flag on, and reports explicit `false`
/// values that contradict them.
struct Requirements {
    flag: Flag,
    explicit: Option<bool>,
    required_by: Vec<Requirement>,
}

impl Requirements {
    fn new(flag: Flag, explicit: Option<bool>) -> Self {
        Self {
            flag,
            explicit,
            required_by: Vec::new(),
        }
    }

    fn require(&mut self, by: Requirement) {
        if !self.required_by.contains(&by) {
            self.required_by.push(by);
        }
    }

    fn check(&self, errors: &mut Vec<ConfigError>) {
        if self.explicit == Some(false) {
            for by in &self.required_by {
                errors.push(ConfigError::RequiredFlagDisabled {
                    flag: self.flag,
                    required_by: *by,
                });
            }
        }
    }

    fn resolve(&self, default: bool) -> bool {
        if self.required_by.is_empty() {
            return self.explicit.unwrap_or(default);
        }
        if self.explicit.is_none() {
            log::debug!("{} forced on by {}", self.flag, self.required_by[0]);
        }
        true
    }
}

impl CurveConfiguration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    #[must_use]
    pub const fn with_resolution(mut self, resolution: usize) -> Self {
        self.resolution = Some(resolution);
        self
    }

    #[must_use]
    pub const fn with_method(mut self, method: ComputationMethod) -> Self {
        self.method = Some(method);
        self
    }

    #[must_use]
    pub const fn with_velocity(mut self, enabled: bool) -> Self {
        self.velocity = Some(enabled);
        self
    }

    #[must_use]
    pub const fn with_acceleration(mut self, enabled: bool) -> Self {
        self.acceleration = Some(enabled);
        self
    }

    #[must_use]
    pub const fn with_curvature(mut self, enabled: bool) -> Self {
        self.curvature = Some(enabled);
        self
    }

    #[must_use]
    pub const fn with_size(mut self, enabled: bool) -> Self {
        self.size = Some(enabled);
        self
    }

    #[must_use]
    pub const fn with_color_source(mut self, source: ColorSource) -> Self {
        self.color_source = Some(source);
        self
    }

    /// Validates the settings and fills in defaults.
    ///
    /// Defaults: resolution 250, threads `clamp(resolution / 100, 1, 100)`,
    /// method `Polynomial`, velocity and acceleration on, curvature and size
    /// on when both velocity and acceleration are, color source `Velocity`
    /// when velocity is on and `None` otherwise.
    ///
    /// # Errors
    /// Every violated constraint, collected into [`ConfigErrors`].
    pub fn resolve(&self) -> Result<ResolvedConfiguration, ConfigErrors> {
        let mut errors = Vec::new();

        let resolution = self.resolution.unwrap_or(DEFAULT_RESOLUTION);
        if resolution == 0 {
            errors.push(ConfigError::ZeroResolution);
        }
        let threads = self.threads.unwrap_or_else(|| default_threads(resolution));
        if threads == 0 {
            errors.push(ConfigError::ZeroThreads);
        } else if resolution > 0 && threads > resolution {
            errors.push(ConfigError::ThreadsExceedResolution {
                threads,
                resolution,
            });
        }

        let mut velocity = Requirements::new(Flag::Velocity, self.velocity);
        let mut acceleration = Requirements::new(Flag::Acceleration, self.acceleration);
        let mut curvature = Requirements::new(Flag::Curvature, self.curvature);

        let curvature_requested = self.curvature == Some(true)
            || self.color_source == Some(ColorSource::Curvature);
        if curvature_requested {
            velocity.require(Requirement::Curvature);
            acceleration.require(Requirement::Curvature);
        }
        if self.size == Some(true) {
            velocity.require(Requirement::Size);
            acceleration.require(Requirement::Size);
        }
        if let Some(source) = self.color_source {
            match source {
                ColorSource::Curvature => curvature.require(Requirement::ColorSource(source)),
                ColorSource::Direction | ColorSource::Velocity => {
                    velocity.require(Requirement::ColorSource(source));
                }
                ColorSource::Acceleration => {
                    acceleration.require(Requirement::ColorSource(source));
                }
                ColorSource::None | ColorSource::Random => {}
            }
        }

        velocity.check(&mut errors);
        acceleration.check(&mut errors);
        curvature.check(&mut errors);
        if !errors.is_empty() {
            return Err(ConfigErrors(errors));
        }

        let velocity = velocity.resolve(true);
        let acceleration = acceleration.resolve(true);
        let both = velocity && acceleration;
        let curvature = curvature.resolve(both);
        let size = self.size.unwrap_or(both);
        let color_source = self.color_source.unwrap_or(if velocity {
            ColorSource::Velocity
        } else {
            ColorSource::None
        });

        Ok(ResolvedConfiguration {
            threads,
            resolution,
            method: self.method.unwrap_or_default(),
            velocity,
            acceleration,
            curvature,
            size,
            color_source,
        })
    }
}

impl ResolvedConfiguration {
    /// Resolves the default configuration.
    ///
    /// # Errors
    /// Never in practice; the defaults satisfy every constraint.
    pub fn default_resolved() -> Result<Self, ConfigErrors> {
        CurveConfiguration::default().resolve()
    }

    #[must_use]
    pub const fn step_flags(&self) -> StepFlags {
        StepFlags {
            velocity: self.velocity,
            acceleration: self.acceleration,
            curvature: self.curvature,
            size: self.size,
        }
    }

    #[must_use]
    pub fn evaluator(&self) -> Evaluator {
        self.method.evaluator()
    }

    /// The fully explicit request that resolves back to `self`.
    #[must_use]
    pub const fn to_configuration(&self) -> CurveConfiguration {
        CurveConfiguration {
            threads: Some(self.threads),
            resolution: Some(self.resolution),
            method: Some(self.method),
            velocity: Some(self.velocity),
            acceleration: Some(self.acceleration),
            curvature: Some(self.curvature),
            size: Some(self.size),
            color_source: Some(self.color_source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve() {
        let resolved = CurveConfiguration::default().resolve().unwrap();
        assert_eq!(resolved.resolution, 250);
        assert_eq!(resolved.threads, 2);
        assert_eq!(resolved.method, ComputationMethod::Polynomial);
        assert!(resolved.velocity && resolved.acceleration);
        assert!(resolved.curvature && resolved.size);
        assert_eq!(resolved.color_source, ColorSource::Velocity);
    }

    #[test]
    fn partial_settings_deserialize_with_defaults() {
        let config: CurveConfiguration =
            serde_json::from_str(r#"{"resolution": 40, "color_source": "Direction"}"#).unwrap();
        assert_eq!(config.threads, None);
        assert_eq!(config.velocity, None);

        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.resolution, 40);
        assert_eq!(resolved.threads, 1);
        assert_eq!(resolved.color_source, ColorSource::Direction);

        let json = serde_json::to_string(&resolved).unwrap();
        let back: ResolvedConfiguration = serde_json::from_str(&json).unwrap();
        assert_eq!(back, resolved);
        assert_eq!(back.to_configuration().resolve().unwrap(), resolved);
    }

    #[test]
    fn default_threads_clamped() {
        assert_eq!(default_threads(1), 1);
        assert_eq!(default_threads(99), 1);
        assert_eq!(default_threads(750), 7);
        assert_eq!(default_threads(1_000_000), 100);
    }

    #[test]
    fn curvature_forces_velocity_and_acceleration() {
        let resolved = CurveConfiguration::new()
            .with_curvature(true)
            .resolve()
            .unwrap();
        assert!(resolved.velocity);
        assert!(resolved.acceleration);
        assert!(resolved.curvature);
    }

    #[test]
    fn disabling_required_flag_is_an_error() {
        let errors = CurveConfiguration::new()
            .with_curvature(true)
            .with_velocity(false)
            .resolve()
            .unwrap_err();
        assert_eq!(
            errors.errors(),
            &[ConfigError::RequiredFlagDisabled {
                flag: Flag::Velocity,
                required_by: Requirement::Curvature,
            }]
        );
    }

    #[test]
    fn color_sources_force_their_flags() {
        let direction = CurveConfiguration::new()
            .with_color_source(ColorSource::Direction)
            .with_velocity(false)
            .resolve()
            .unwrap_err();
        assert!(direction.contains(&ConfigError::RequiredFlagDisabled {
            flag: Flag::Velocity,
            required_by: Requirement::ColorSource(ColorSource::Direction),
        }));

        let curvature = CurveConfiguration::new()
            .with_color_source(ColorSource::Curvature)
            .with_curvature(false)
            .resolve()
            .unwrap_err();
        assert!(curvature.contains(&ConfigError::RequiredFlagDisabled {
            flag: Flag::Curvature,
            required_by: Requirement::ColorSource(ColorSource::Curvature),
        }));

        let acceleration = CurveConfiguration::new()
            .with_color_source(ColorSource::Acceleration)
            .with_velocity(false)
            .resolve()
            .unwrap();
        assert!(acceleration.acceleration);
        assert!(!acceleration.velocity);
        assert!(!acceleration.curvature);
    }

    #[test]
    fn thread_and_resolution_bounds() {
        let errors = CurveConfiguration::new()
            .with_threads(0)
            .with_resolution(0)
            .resolve()
            .unwrap_err();
        assert!(errors.contains(&ConfigError::ZeroThreads));
        assert!(errors.contains(&ConfigError::ZeroResolution));

        let errors = CurveConfiguration::new()
            .with_threads(11)
            .with_resolution(10)
            .resolve()
            .unwrap_err();
        assert_eq!(
            errors.errors(),
            &[ConfigError::ThreadsExceedResolution {
                threads: 11,
                resolution: 10
            }]
        );
    }

    #[test]
    fn all_violations_are_reported() {
        let errors = CurveConfiguration::new()
            .with_threads(5)
            .with_resolution(2)
            .with_size(true)
            .with_velocity(false)
            .with_acceleration(false)
            .resolve()
            .unwrap_err();
        assert_eq!(errors.errors().len(), 3);
        assert!(errors.to_string().starts_with("invalid curve configuration: "));
    }

    #[test]
    fn disabled_velocity_changes_derived_defaults() {
        let resolved = CurveConfiguration::new()
            .with_velocity(false)
            .resolve()
            .unwrap();
        assert!(!resolved.curvature);
        assert!(!resolved.size);
        assert_eq!(resolved.color_source, ColorSource::None);
    }

    #[test]
    fn resolved_round_trips_through_explicit_configuration() {
        let resolved = CurveConfiguration::new()
            .with_resolution(40)
            .with_method(ComputationMethod::DeCasteljau)
            .with_color_source(ColorSource::Random)
            .resolve()
            .unwrap();
        assert_eq!(resolved.to_configuration().resolve(), Ok(resolved));
    }

    #[test]
    fn color_source_names() {
        for source in ColorSource::ALL {
            assert_eq!(ColorSource::from_name(source.name()), Some(source));
        }
        assert!(ColorSource::Velocity.is_measured());
        assert!(ColorSource::Acceleration.is_measured());
        assert!(!ColorSource::Curvature.is_measured());
    }
}
