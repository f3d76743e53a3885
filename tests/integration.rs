use std::collections::VecDeque;
use std::time::Duration;

use bezier_engine::geom::{AdaptivePolicy, BezierCurve, ComputationMethod, ControlPoints, Tolerance, Vec3};
use bezier_engine::render::{
    Color, ColorSource, ConfigError, CurveConfiguration, CurveDisplay, Flag, JobRange,
    JobResultBuffer, Orchestrator, OrchestratorOptions, PathBuffer, PoolError, RenderError,
    RenderState, Requirement, Task, TaskOutcome, TaskPool, Ticket, partition,
};

fn arch() -> ControlPoints {
    ControlPoints::new(vec![
        Vec3::new(-5.0, 3.0, -10.0),
        Vec3::new(0.0, 7.0, -10.0),
        Vec3::new(5.0, 3.0, -10.0),
    ])
    .expect("valid control points")
}

#[test]
fn single_and_many_threads_produce_same_transforms() {
    let base = CurveConfiguration::new()
        .with_resolution(250)
        .with_velocity(true)
        .with_acceleration(true)
        .with_curvature(true)
        .with_size(true);

    let mut serial = CurveDisplay::new(arch(), &base.with_threads(1)).expect("serial display");
    let mut parallel = CurveDisplay::new(arch(), &base.with_threads(250)).expect("parallel display");
    assert!(!serial.uses_pool());
    assert!(parallel.uses_pool());

    let a = serial.render().expect("serial render");
    let b = parallel.render().expect("parallel render");
    assert_eq!(a.len(), 250);
    assert_eq!(b.len(), 250);
    for (i, (ta, tb)) in a.destinations.iter().zip(&b.destinations).enumerate() {
        assert!(ta.max_abs_diff(tb) < 1e-6, "sample {i} differs");
    }
    assert_eq!(a.sizes, b.sizes);
    assert_eq!(parallel.paths().transforms, b.destinations);
}

#[test]
fn velocity_colors_peak_at_fastest_sample() {
    let config = CurveConfiguration::new()
        .with_resolution(100)
        .with_threads(5)
        .with_color_source(ColorSource::Velocity);
    let mut display = CurveDisplay::new(arch(), &config).expect("display");
    let frame = display.render().expect("render");

    let measured = frame.measured.as_ref().expect("velocity is measured");
    let max = frame.max_measured.expect("maximum recorded");
    let (fastest, _) = measured
        .iter()
        .enumerate()
        .fold((0, f64::MIN), |best, (i, m)| if *m > best.1 { (i, *m) } else { best });
    assert!(Tolerance::DEFAULT.approx_eq_f64(max, 164.0_f64.sqrt()));

    let color = frame.colors[fastest].expect("colored");
    assert!((color.r - 1.0).abs() < 1e-9);
    assert!(color.g.abs() < 1e-9);
    assert!(frame.colors.iter().all(Option::is_some));
    assert_eq!(display.paths().colors, frame.colors);
}

#[test]
fn zero_speed_sample_gets_zero_intensity() {
    let points = ControlPoints::new(vec![Vec3::ZERO, Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0)])
        .expect("valid control points");
    let config = CurveConfiguration::new()
        .with_resolution(5)
        .with_threads(5)
        .with_color_source(ColorSource::Velocity);
    let mut display = CurveDisplay::new(points, &config).expect("display");
    let frame = display.render().expect("render");

    assert_eq!(frame.measured.as_ref().map(|m| m[0]), Some(0.0));
    assert_eq!(frame.colors[0], Some(Color::GREEN));
    for color in frame.colors.iter().flatten() {
        assert!(color.r.is_finite() && color.g.is_finite() && color.b.is_finite());
    }
    // The zero velocity also leaves the first segment unrotated.
    assert_eq!(frame.destinations[0].translation(), Vec3::ZERO);
    assert_eq!(frame.destinations[0].apply_vec(Vec3::X), Vec3::X);
}

#[test]
fn single_sample_render_is_finite() {
    let config = CurveConfiguration::new()
        .with_resolution(1)
        .with_threads(1)
        .with_color_source(ColorSource::Curvature);
    let mut display = CurveDisplay::new(arch(), &config).expect("display");

    for pooled in [false, true] {
        display.set_parallel_threshold(if pooled { 1 } else { usize::MAX });
        assert_eq!(display.uses_pool(), pooled);
        let frame = display.render().expect("render");
        assert_eq!(frame.len(), 1);
        let size = frame.sizes[0].expect("size computed");
        assert!(size.is_finite());
        let color = frame.colors[0].expect("curvature color");
        assert!(color.r.is_finite() && color.g.is_finite());
        assert!(frame.destinations[0].as_matrix().iter().flatten().all(|v| v.is_finite()));
    }
    assert_eq!(display.render_count(), 2);
}

#[test]
fn curvature_forces_velocity_and_acceleration() {
    let resolved = CurveConfiguration::new()
        .with_velocity(false)
        .with_acceleration(false)
        .with_curvature(true);
    let errors = resolved.resolve().expect_err("explicit disable conflicts");
    assert!(errors.contains(&ConfigError::RequiredFlagDisabled {
        flag: Flag::Velocity,
        required_by: Requirement::Curvature,
    }));
    assert!(errors.contains(&ConfigError::RequiredFlagDisabled {
        flag: Flag::Acceleration,
        required_by: Requirement::Curvature,
    }));

    let resolved = CurveConfiguration {
        curvature: Some(true),
        ..CurveConfiguration::default()
    }
    .resolve()
    .expect("valid");
    assert!(resolved.velocity && resolved.acceleration && resolved.curvature);
}

#[test]
fn partitions_cover_every_index_once() {
    for resolution in [1, 7, 100, 250, 1001] {
        for threads in [1, 2, 3, 5, 16, 250] {
            let ranges = partition(resolution, threads);
            let mut seen = vec![0_u8; resolution];
            for range in &ranges {
                for i in range.indices() {
                    seen[i] += 1;
                }
            }
            assert!(seen.iter().all(|count| *count == 1));
            assert_eq!(ranges.len(), threads.min(resolution));
        }
    }
}

#[test]
fn methods_agree_on_arc_length() {
    let lengths: Vec<f64> = ComputationMethod::ALL
        .iter()
        .map(|method| BezierCurve::new(arch(), *method).arc_length(&AdaptivePolicy::REFERENCE))
        .collect();
    for pair in lengths.windows(2) {
        assert!((pair[0] - pair[1]).abs() < 1e-9);
    }
    // Chord length bounds the arc from below, the control polygon from above.
    assert!(lengths[0] > 10.0);
    assert!(lengths[0] < 2.0 * 41.0_f64.sqrt());
}

/// Runs tasks inline on `spawn` and replays their outcomes newest first, with
/// hooks for stalls, panics and stale results.
struct ScriptedPool {
    workers: usize,
    outcomes: VecDeque<TaskOutcome<JobResultBuffer>>,
    stall_job: Option<usize>,
    panic_job: Option<usize>,
    inject_stale: bool,
}

impl ScriptedPool {
    fn new(workers: usize) -> Self {
        Self {
            workers,
            outcomes: VecDeque::new(),
            stall_job: None,
            panic_job: None,
            inject_stale: false,
        }
    }
}

impl TaskPool<JobResultBuffer> for ScriptedPool {
    fn worker_count(&self) -> usize {
        self.workers
    }

    fn resize(&mut self, workers: usize) -> Result<(), PoolError> {
        if workers == 0 {
            return Err(PoolError::NoWorkers);
        }
        self.workers = workers;
        Ok(())
    }

    fn spawn(&mut self, ticket: Ticket, task: Task<JobResultBuffer>) -> Result<(), PoolError> {
        if self.stall_job == Some(ticket.job) {
            return Ok(());
        }
        if self.panic_job == Some(ticket.job) {
            self.outcomes.push_back(TaskOutcome::Panicked {
                ticket,
                message: "sampling failed".to_string(),
            });
            return Ok(());
        }
        self.outcomes.push_back(TaskOutcome::Completed { ticket, value: task() });
        if self.inject_stale && ticket.job == 0 {
            self.outcomes.push_back(TaskOutcome::Completed {
                ticket: Ticket {
                    generation: ticket.generation.wrapping_sub(1),
                    job: 0,
                },
                value: JobResultBuffer {
                    range: JobRange { start: 0, end: 0 },
                    steps: Vec::new(),
                    bezier_ns: 0,
                },
            });
        }
        Ok(())
    }

    fn next_outcome(&mut self, _timeout: Duration) -> Result<Option<TaskOutcome<JobResultBuffer>>, PoolError> {
        Ok(self.outcomes.pop_back())
    }
}

fn scripted(pool: ScriptedPool) -> Orchestrator<ScriptedPool> {
    let options = OrchestratorOptions {
        job_timeout: Duration::from_millis(20),
        ..OrchestratorOptions::default()
    };
    Orchestrator::with_pool(pool, options)
}

fn four_job_config() -> bezier_engine::render::ResolvedConfiguration {
    CurveConfiguration::new()
        .with_resolution(40)
        .with_threads(4)
        .resolve()
        .expect("valid")
}

#[test]
fn out_of_order_and_stale_results_are_handled() {
    let mut pool = ScriptedPool::new(4);
    pool.inject_stale = true;
    let mut orchestrator = scripted(pool);
    let mut sink = PathBuffer::new();
    let frame = orchestrator
        .render(&arch(), &four_job_config(), &mut sink)
        .expect("render");
    assert_eq!(frame.len(), 40);
    let first = frame.destinations[0].translation();
    let last = frame.destinations[39].translation();
    assert!(Tolerance::DEFAULT.approx_eq_vec3(first, Vec3::new(-5.0, 3.0, -10.0)));
    assert!(Tolerance::DEFAULT.approx_eq_vec3(last, Vec3::new(5.0, 3.0, -10.0)));
    assert_eq!(orchestrator.state(), RenderState::Idle);
}

#[test]
fn missing_job_reports_incomplete_render() {
    let mut pool = ScriptedPool::new(4);
    pool.stall_job = Some(2);
    let mut orchestrator = scripted(pool);
    let err = orchestrator
        .render(&arch(), &four_job_config(), &mut PathBuffer::new())
        .expect_err("one job never reports");
    assert_eq!(
        err,
        RenderError::Incomplete {
            completed: 3,
            expected: 4,
            timeout_ms: 20
        }
    );
    assert_eq!(orchestrator.state(), RenderState::Idle);
}

#[test]
fn panicking_job_fails_the_render() {
    let mut pool = ScriptedPool::new(4);
    pool.panic_job = Some(1);
    let mut orchestrator = scripted(pool);
    let err = orchestrator
        .render(&arch(), &four_job_config(), &mut PathBuffer::new())
        .expect_err("job 1 panics");
    assert_eq!(
        err,
        RenderError::WorkerPanicked {
            start: 10,
            end: 19,
            message: "sampling failed".to_string()
        }
    );
}
