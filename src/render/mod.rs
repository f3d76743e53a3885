mod aggregate;
mod config;
mod display;
mod job;
mod orchestrator;
mod pool;
mod step;

pub use aggregate::{
    AggregatedFrame, Aggregator, Color, ColorRule, GradientStop, INTENSITY_GRADIENT, PathBuffer,
    PathSink, SampleColor, color_rule, destination_transform, direction_color, evaluate_gradient,
    intensity_color, random_color,
};
pub use config::{
    ColorSource, ConfigError, ConfigErrors, CurveConfiguration, DEFAULT_RESOLUTION, Flag,
    MAX_DEFAULT_THREADS, Requirement, ResolvedConfiguration, default_threads,
};
pub use display::{CurveDisplay, DEFAULT_PARALLEL_THRESHOLD, total_render_count};
pub use job::{JobRange, JobResultBuffer, SamplingJob, partition};
pub use orchestrator::{
    Orchestrator, OrchestratorOptions, PendingRender, RenderError, RenderState, render_blocking,
};
#[cfg(feature = "parallel")]
pub use pool::RayonPool;
pub use pool::{PoolError, PoolOptions, Task, TaskOutcome, TaskPool, Ticket, WorkerPool};
pub use step::{CurveComputationStep, StepComputer, StepFlags, sample_progress, segment_size};
