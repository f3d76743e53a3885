//! Timing hooks for the render pipeline.
//!
//! Timing is collected on every native target. On `wasm32`, where
//! `std::time::Instant` is unavailable, every measurement reads as zero.
//!
//! # Usage
//!
//! ```ignore
//! use bezier_engine::geom::{RenderMetrics, TimingBucket};
//!
//! let mut metrics = RenderMetrics::default();
//! metrics.begin();
//!
//! let steps = metrics.time(TimingBucket::Bezier, || compute_steps(job));
//! metrics.time(TimingBucket::BulkApply, || sink.bulk_move(&transforms));
//!
//! let report = metrics.end();
//! println!("bezier: {} ns of {} ns", report.bezier_ns, report.total_ns);
//! ```

cfg_if::cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
        /// Monotonic stopwatch; a no-op on `wasm32`.
        #[derive(Debug, Clone, Copy)]
        pub struct Stopwatch;

        impl Stopwatch {
            #[must_use]
            pub fn start() -> Self {
                Self
            }

            #[must_use]
            pub fn elapsed_ns(self) -> u64 {
                0
            }
        }
    } else {
        /// Monotonic stopwatch backed by `std::time::Instant`.
        #[derive(Debug, Clone, Copy)]
        pub struct Stopwatch(std::time::Instant);

        impl Stopwatch {
            #[must_use]
            pub fn start() -> Self {
                Self(std::time::Instant::now())
            }

            /// Elapsed nanoseconds, capped at `u64::MAX`.
            #[must_use]
            pub fn elapsed_ns(self) -> u64 {
                u64::try_from(self.0.elapsed().as_nanos()).unwrap_or(u64::MAX)
            }
        }
    }
}

/// Phases of one render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimingBucket {
    /// Curve evaluation inside the sampling jobs.
    Bezier,
    /// Computing colors (immediate and deferred gradient pass).
    ColorEvaluation,
    /// Handing colors to the sink.
    ColorAssignment,
    /// Handing sizes to the sink.
    SizeAssignment,
    /// The single batched transform update.
    BulkApply,
}

impl TimingBucket {
    pub const ALL: [Self; 5] = [
        Self::Bezier,
        Self::ColorEvaluation,
        Self::ColorAssignment,
        Self::SizeAssignment,
        Self::BulkApply,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bezier => "bezier",
            Self::ColorEvaluation => "color_eval",
            Self::ColorAssignment => "color_assign",
            Self::SizeAssignment => "size_assign",
            Self::BulkApply => "bulk_apply",
        }
    }
}

/// Cumulative nanosecond timings; repeated calls to a bucket add up.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RenderTimingReport {
    /// Wall-clock time between `begin` and `end`.
    pub total_ns: u64,
    pub bezier_ns: u64,
    pub color_evaluation_ns: u64,
    pub color_assignment_ns: u64,
    pub size_assignment_ns: u64,
    pub bulk_apply_ns: u64,
}

impl RenderTimingReport {
    #[must_use]
    pub const fn bucket_ns(&self, bucket: TimingBucket) -> u64 {
        match bucket {
            TimingBucket::Bezier => self.bezier_ns,
            TimingBucket::ColorEvaluation => self.color_evaluation_ns,
            TimingBucket::ColorAssignment => self.color_assignment_ns,
            TimingBucket::SizeAssignment => self.size_assignment_ns,
            TimingBucket::BulkApply => self.bulk_apply_ns,
        }
    }

    /// Sum of all phase buckets (excludes `total_ns`).
    ///
    /// With parallel workers the bezier bucket sums per-worker time, so this
    /// can exceed the wall-clock total.
    #[must_use]
    pub fn accounted_ns(&self) -> u64 {
        TimingBucket::ALL
            .iter()
            .fold(0_u64, |acc, bucket| acc.saturating_add(self.bucket_ns(*bucket)))
    }

    /// Adds every bucket and the total of `other` into `self`.
    pub fn accumulate(&mut self, other: &Self) {
        for bucket in TimingBucket::ALL {
            let slot = self.bucket_mut(bucket);
            *slot = slot.saturating_add(other.bucket_ns(bucket));
        }
        self.total_ns = self.total_ns.saturating_add(other.total_ns);
    }

    /// Returns the total time in milliseconds (for display purposes).
    #[must_use]
    pub fn total_ms(&self) -> f64 {
        self.total_ns as f64 / 1_000_000.0
    }

    fn bucket_mut(&mut self, bucket: TimingBucket) -> &mut u64 {
        match bucket {
            TimingBucket::Bezier => &mut self.bezier_ns,
            TimingBucket::ColorEvaluation => &mut self.color_evaluation_ns,
            TimingBucket::ColorAssignment => &mut self.color_assignment_ns,
            TimingBucket::SizeAssignment => &mut self.size_assignment_ns,
            TimingBucket::BulkApply => &mut self.bulk_apply_ns,
        }
    }
}

/// Accumulator for timing a render pass.
///
/// Call [`begin`](Self::begin) to reset, wrap phases with
/// [`time`](Self::time) or feed externally measured durations to
/// [`record`](Self::record), then read the report with [`end`](Self::end).
#[derive(Debug, Default)]
pub struct RenderMetrics {
    started: Option<Stopwatch>,
    report: RenderTimingReport,
}

impl RenderMetrics {
    /// Resets all counters and starts the wall-clock total.
    pub fn begin(&mut self) {
        self.report = RenderTimingReport::default();
        self.started = Some(Stopwatch::start());
    }

    /// Returns the accumulated report with `total_ns` measured since
    /// [`begin`](Self::begin).
    #[must_use]
    pub fn end(&self) -> RenderTimingReport {
        let mut report = self.report.clone();
        report.total_ns = self.started.map_or(0, Stopwatch::elapsed_ns);
        report
    }

    /// Times the execution of `f` and accumulates the elapsed time in `bucket`.
    pub fn time<R>(&mut self, bucket: TimingBucket, f: impl FnOnce() -> R) -> R {
        let stopwatch = Stopwatch::start();
        let result = f();
        self.record(bucket, stopwatch.elapsed_ns());
        result
    }

    /// Adds nanoseconds measured elsewhere (e.g. inside a worker) to `bucket`.
    pub fn record(&mut self, bucket: TimingBucket, nanos: u64) {
        let slot = self.report.bucket_mut(bucket);
        *slot = slot.saturating_add(nanos);
    }
}
