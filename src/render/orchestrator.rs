//! Dispatches a render across a [`TaskPool`] and aggregates the results.
//!
//! Each render gets a generation id. Job results carry the generation they
//! were spawned under, so leftovers from an abandoned render are dropped
//! instead of being merged into a newer frame.

use std::time::{Duration, Instant};

use crate::geom::{ControlPoints, CurveError};

use super::aggregate::{AggregatedFrame, Aggregator, PathSink};
use super::config::{ConfigErrors, ResolvedConfiguration};
use super::job::{JobRange, JobResultBuffer, SamplingJob, partition};
use super::pool::{PoolError, PoolOptions, TaskOutcome, TaskPool, Ticket, WorkerPool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderState {
    #[default]
    Idle,
    Dispatching,
    Collecting {
        received: usize,
        expected: usize,
    },
    Merged,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("render incomplete: {completed} of {expected} jobs finished within {timeout_ms} ms")]
    Incomplete {
        completed: usize,
        expected: usize,
        timeout_ms: u128,
    },
    #[error("job for samples {start}..={end} panicked: {message}")]
    WorkerPanicked {
        start: usize,
        end: usize,
        message: String,
    },
    #[error(transparent)]
    Config(#[from] ConfigErrors),
    #[error(transparent)]
    Curve(#[from] CurveError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorOptions {
    /// Upper bound on how long one render waits for all of its jobs.
    pub job_timeout: Duration,
    pub pool: PoolOptions,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            job_timeout: Duration::from_secs(10),
            pool: PoolOptions::default(),
        }
    }
}

/// Owns the worker pool and the render state machine.
///
/// A render in flight holds the orchestrator mutably through
/// [`PendingRender`], so at most one render is ever outstanding.
#[derive(Debug)]
pub struct Orchestrator<P = WorkerPool<JobResultBuffer>> {
    pool: P,
    options: OrchestratorOptions,
    generation: u64,
    state: RenderState,
}

impl Orchestrator<WorkerPool<JobResultBuffer>> {
    /// Starts a thread pool with `threads` workers.
    ///
    /// # Errors
    /// The pool failed to start.
    pub fn new(threads: usize, options: OrchestratorOptions) -> Result<Self, RenderError> {
        let pool = WorkerPool::new(threads, options.pool.clone())?;
        Ok(Self::with_pool(pool, options))
    }
}

impl<P: TaskPool<JobResultBuffer>> Orchestrator<P> {
    pub const fn with_pool(pool: P, options: OrchestratorOptions) -> Self {
        Self {
            pool,
            options,
            generation: 0,
            state: RenderState::Idle,
        }
    }

    #[must_use]
    pub const fn state(&self) -> RenderState {
        self.state
    }

    /// Id of the most recently dispatched render.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    #[must_use]
    pub const fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Resizes the pool; returns once new workers have registered.
    ///
    /// # Errors
    /// See [`TaskPool::resize`].
    pub fn resize(&mut self, threads: usize) -> Result<(), RenderError> {
        if threads != self.pool.worker_count() {
            log::debug!("resizing pool from {} to {threads}", self.pool.worker_count());
            self.pool.resize(threads)?;
        }
        Ok(())
    }

    /// Partitions the render into `config.threads` jobs and spawns them.
    ///
    /// # Errors
    /// The pool could not be resized or refused a job.
    pub fn dispatch(
        &mut self,
        points: &ControlPoints,
        config: &ResolvedConfiguration,
    ) -> Result<PendingRender<'_, P>, RenderError> {
        self.resize(config.threads)?;

        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        self.state = RenderState::Dispatching;

        let ranges = partition(config.resolution, config.threads);
        let aggregator = Aggregator::new(config.resolution, config.color_source);
        let shared = points.shared();
        let flags = config.step_flags();

        for (job, range) in ranges.iter().enumerate() {
            let sampling = SamplingJob {
                range: *range,
                resolution: config.resolution,
                method: config.method,
                flags,
                points: shared.clone(),
            };
            let ticket = Ticket { generation, job };
            if let Err(err) = self.pool.spawn(ticket, Box::new(move || sampling.run())) {
                self.state = RenderState::Idle;
                return Err(err.into());
            }
        }
        log::debug!(
            "render {generation}: {} samples over {} jobs",
            config.resolution,
            ranges.len()
        );

        self.state = RenderState::Collecting {
            received: 0,
            expected: ranges.len(),
        };
        Ok(PendingRender {
            received: vec![false; ranges.len()],
            ranges,
            generation,
            aggregator: Some(aggregator),
            orchestrator: self,
        })
    }

    /// Dispatches and waits in one call.
    ///
    /// # Errors
    /// See [`Orchestrator::dispatch`] and [`PendingRender::wait`].
    pub fn render(
        &mut self,
        points: &ControlPoints,
        config: &ResolvedConfiguration,
        sink: &mut impl PathSink,
    ) -> Result<AggregatedFrame, RenderError> {
        self.dispatch(points, config)?.wait(sink)
    }
}

/// A dispatched render awaiting its job results.
///
/// Dropping it without calling [`wait`](Self::wait) abandons the render;
/// late results are discarded by the next one.
#[derive(Debug)]
pub struct PendingRender<'a, P: TaskPool<JobResultBuffer>> {
    orchestrator: &'a mut Orchestrator<P>,
    generation: u64,
    ranges: Vec<JobRange>,
    received: Vec<bool>,
    aggregator: Option<Aggregator>,
}

impl<P: TaskPool<JobResultBuffer>> PendingRender<'_, P> {
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn state(&self) -> RenderState {
        self.orchestrator.state
    }

    #[must_use]
    pub fn ranges(&self) -> &[JobRange] {
        &self.ranges
    }

    /// Collects every job of this render, absorbing each result as it
    /// arrives, then runs the deferred color pass and the bulk apply.
    ///
    /// # Errors
    /// - [`RenderError::Incomplete`] if the jobs do not all finish within the
    ///   job timeout
    /// - [`RenderError::WorkerPanicked`] if a job panicked
    /// - [`RenderError::Pool`] if the result channel closed
    pub fn wait(mut self, sink: &mut impl PathSink) -> Result<AggregatedFrame, RenderError> {
        let Some(mut aggregator) = self.aggregator.take() else {
            return Err(PoolError::Disconnected.into());
        };
        let timeout = self.orchestrator.options.job_timeout;
        let deadline = Instant::now() + timeout;
        let expected = self.ranges.len();
        let mut completed = 0;

        while completed < expected {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(outcome) = self.orchestrator.pool.next_outcome(remaining)? else {
                log::warn!(
                    "render {}: {completed}/{expected} jobs after {} ms",
                    self.generation,
                    timeout.as_millis()
                );
                return Err(RenderError::Incomplete {
                    completed,
                    expected,
                    timeout_ms: timeout.as_millis(),
                });
            };

            let ticket = outcome.ticket();
            if ticket.generation != self.generation {
                log::debug!("dropping result from stale render {}", ticket.generation);
                continue;
            }
            let Some(range) = self.ranges.get(ticket.job).copied() else {
                log::warn!("render {}: unknown job {}", self.generation, ticket.job);
                continue;
            };
            if self.received[ticket.job] {
                log::warn!("render {}: duplicate result for job {}", self.generation, ticket.job);
                continue;
            }

            match outcome {
                TaskOutcome::Completed { value, .. } => {
                    if value.range != range {
                        log::warn!(
                            "render {}: job {} returned {:?}, expected {range:?}",
                            self.generation,
                            ticket.job,
                            value.range
                        );
                        continue;
                    }
                    self.received[ticket.job] = true;
                    completed += 1;
                    self.orchestrator.state = RenderState::Collecting {
                        received: completed,
                        expected,
                    };
                    aggregator.absorb(&value, sink);
                }
                TaskOutcome::Panicked { message, .. } => {
                    log::error!("render {}: job {} panicked: {message}", self.generation, ticket.job);
                    return Err(RenderError::WorkerPanicked {
                        start: range.start,
                        end: range.end,
                        message,
                    });
                }
            }
        }

        self.orchestrator.state = RenderState::Merged;
        let frame = aggregator.finish(sink);
        log::debug!(
            "render {} merged in {:.3} ms",
            self.generation,
            frame.timings.total_ms()
        );
        Ok(frame)
    }
}

impl<P: TaskPool<JobResultBuffer>> Drop for PendingRender<'_, P> {
    fn drop(&mut self) {
        self.orchestrator.state = RenderState::Idle;
    }
}

/// Renders on the calling thread with the same aggregation as the pooled
/// path.
pub fn render_blocking(
    points: &ControlPoints,
    config: &ResolvedConfiguration,
    sink: &mut impl PathSink,
) -> AggregatedFrame {
    let mut aggregator = Aggregator::new(config.resolution, config.color_source);
    let shared = points.shared();
    for range in partition(config.resolution, 1) {
        let job = SamplingJob {
            range,
            resolution: config.resolution,
            method: config.method,
            flags: config.step_flags(),
            points: shared.clone(),
        };
        aggregator.absorb(&job.run(), sink);
    }
    aggregator.finish(sink)
}
