//! Partitioning of the sample range into per-worker jobs.

use std::sync::Arc;

use crate::geom::{ComputationMethod, Stopwatch, Vec3};

use super::step::{CurveComputationStep, StepComputer, StepFlags};

/// Inclusive sample index range `start..=end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobRange {
    pub start: usize,
    pub end: usize,
}

impl JobRange {
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Always false: a range holds at least one index.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    pub fn indices(&self) -> std::ops::RangeInclusive<usize> {
        self.start..=self.end
    }
}

/// Splits `[0, resolution)` into `threads` contiguous ranges whose sizes
/// differ by at most one; the first `resolution % threads` ranges get the
/// extra index.
///
/// Returns no ranges when either argument is zero. A thread count above the
/// resolution is capped so no range is empty.
#[must_use]
pub fn partition(resolution: usize, threads: usize) -> Vec<JobRange> {
    if resolution == 0 || threads == 0 {
        return Vec::new();
    }
    let threads = threads.min(resolution);
    let per_thread = resolution / threads;
    let remainder = resolution % threads;

    let mut ranges = Vec::with_capacity(threads);
    let mut start = 0;
    for i in 0..threads {
        let extra = usize::from(i < remainder);
        let len = per_thread + extra;
        ranges.push(JobRange {
            start,
            end: start + len - 1,
        });
        start += len;
    }
    ranges
}

/// One worker's share of a render.
#[derive(Debug, Clone)]
pub struct SamplingJob {
    pub range: JobRange,
    pub resolution: usize,
    pub method: ComputationMethod,
    pub flags: StepFlags,
    pub points: Arc<[Vec3]>,
}

/// Steps computed by one job, tagged with its range.
#[derive(Debug, Clone, PartialEq)]
pub struct JobResultBuffer {
    pub range: JobRange,
    /// One entry per index of `range`, in increasing index order.
    pub steps: Vec<CurveComputationStep>,
    /// Time spent evaluating the curve.
    pub bezier_ns: u64,
}

impl SamplingJob {
    /// Computes every sample of the range in increasing index order.
    #[must_use]
    pub fn run(&self) -> JobResultBuffer {
        let stopwatch = Stopwatch::start();
        let computer = StepComputer::new(self.method.evaluator(), self.flags, self.resolution);
        let steps = self
            .range
            .indices()
            .map(|index| computer.compute_index(&self.points, index))
            .collect();
        JobResultBuffer {
            range: self.range,
            steps,
            bezier_ns: stopwatch.elapsed_ns(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_distributes_remainder_first() {
        let ranges = partition(10, 3);
        assert_eq!(
            ranges,
            vec![
                JobRange { start: 0, end: 3 },
                JobRange { start: 4, end: 6 },
                JobRange { start: 7, end: 9 },
            ]
        );
    }

    #[test]
    fn partition_edge_cases() {
        assert_eq!(partition(1, 1), vec![JobRange { start: 0, end: 0 }]);
        assert_eq!(partition(5, 5).len(), 5);
        assert!(partition(0, 3).is_empty());
        assert!(partition(3, 0).is_empty());
        assert_eq!(partition(2, 4).len(), 2);
    }

    #[test]
    fn partition_covers_range_exactly() {
        for resolution in 1..=64 {
            for threads in 1..=resolution {
                let ranges = partition(resolution, threads);
                assert_eq!(ranges.len(), threads);
                assert_eq!(ranges[0].start, 0);
                assert_eq!(ranges[threads - 1].end, resolution - 1);
                for pair in ranges.windows(2) {
                    assert_eq!(pair[0].end + 1, pair[1].start);
                }
                let min = ranges.iter().map(JobRange::len).min().unwrap();
                let max = ranges.iter().map(JobRange::len).max().unwrap();
                assert!(max - min <= 1);
            }
        }
    }

    #[test]
    fn job_computes_its_range_in_order() {
        let job = SamplingJob {
            range: JobRange { start: 3, end: 5 },
            resolution: 6,
            method: ComputationMethod::PolynomialHorner,
            flags: StepFlags::ALL,
            points: Arc::from(vec![Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0)]),
        };
        let result = job.run();
        assert_eq!(result.range, job.range);
        assert_eq!(result.steps.len(), 3);
        let xs: Vec<f64> = result.steps.iter().map(|s| s.position.x).collect();
        assert!((xs[0] - 3.0).abs() < 1e-12);
        assert!((xs[1] - 4.0).abs() < 1e-12);
        assert!((xs[2] - 5.0).abs() < 1e-12);
    }
}
