//! Gauss-Legendre quadrature and adaptive refinement for arc length.

use std::f64::consts::PI;
use std::sync::{Arc, OnceLock};

use super::cache::{MemoStats, MemoTable};
use super::core::{LinearSpace, Vec3};

/// Newton iteration stops once successive root estimates differ by less than this.
const NEWTON_EPS: f64 = 1e-15;
/// Upper bound on Newton steps per root.
const NEWTON_MAX_ITERATIONS: usize = 100;

/// Node/weight pairs of an `n`-point Gauss-Legendre rule on `[-1, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussLegendreRule {
    nodes: Vec<f64>,
    weights: Vec<f64>,
}

/// `(P_n(x), P_n'(x))` via the three-term recurrence.
fn legendre(n: usize, x: f64) -> (f64, f64) {
    if n == 0 {
        return (1.0, 0.0);
    }
    let mut previous = 1.0;
    let mut current = x;
    for k in 2..=n {
        let k_f = k as f64;
        let next = ((2.0 * k_f - 1.0) * x * current - (k_f - 1.0) * previous) / k_f;
        previous = current;
        current = next;
    }
    let derivative = n as f64 * (x * current - previous) / (x * x - 1.0);
    (current, derivative)
}

impl GaussLegendreRule {
    /// Computes the rule by Newton iteration on the roots of `P_n`.
    #[must_use]
    pub fn compute(node_count: usize) -> Self {
        log::trace!("computing Gauss-Legendre rule with {node_count} nodes");
        let n_f = node_count as f64;
        let mut nodes = Vec::with_capacity(node_count);
        let mut weights = Vec::with_capacity(node_count);

        for i in 1..=node_count {
            let mut x = (PI * (i as f64 - 0.25) / (n_f + 0.5)).cos();
            for _ in 0..NEWTON_MAX_ITERATIONS {
                let (value, slope) = legendre(node_count, x);
                let next = x - value / slope;
                let step = (next - x).abs();
                x = next;
                if step < NEWTON_EPS {
                    break;
                }
            }
            let derivative = legendre(node_count, x).1;
            nodes.push(x);
            weights.push(2.0 / ((1.0 - x * x) * derivative * derivative));
        }

        Self { nodes, weights }
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Integrates `f` over `[a, b]` by mapping the nodes onto the interval.
    pub fn integrate<P: LinearSpace>(&self, f: impl Fn(f64) -> P, a: f64, b: f64) -> P {
        let half = 0.5 * (b - a);
        let mid = 0.5 * (a + b);
        self.nodes
            .iter()
            .zip(&self.weights)
            .fold(P::ZERO, |acc, (x, w)| acc + f(mid + half * x) * (w * half))
    }
}

fn global_rules() -> &'static MemoTable<usize, GaussLegendreRule> {
    static RULES: OnceLock<MemoTable<usize, GaussLegendreRule>> = OnceLock::new();
    RULES.get_or_init(MemoTable::new)
}

/// Process-wide memoized rule with `node_count` nodes.
#[must_use]
pub fn gauss_legendre(node_count: usize) -> Arc<GaussLegendreRule> {
    global_rules().get_or_insert_with(node_count, || GaussLegendreRule::compute(node_count))
}

#[must_use]
pub fn quadrature_cache_stats() -> MemoStats {
    global_rules().stats()
}

/// Fixed-order Gauss-Legendre integral of `f` over `[a, b]`.
pub fn integrate<P: LinearSpace>(f: impl Fn(f64) -> P, a: f64, b: f64, node_count: usize) -> P {
    gauss_legendre(node_count).integrate(f, a, b)
}

/// Compensated summation.
#[derive(Debug, Clone, Copy, Default)]
pub struct KahanSum {
    sum: f64,
    compensation: f64,
}

impl KahanSum {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sum: 0.0,
            compensation: 0.0,
        }
    }

    pub fn add(&mut self, value: f64) {
        let y = value - self.compensation;
        let t = self.sum + y;
        self.compensation = (t - self.sum) - y;
        self.sum = t;
    }

    #[must_use]
    pub const fn total(&self) -> f64 {
        self.sum
    }
}

/// Sums `values` with [`KahanSum`].
pub fn kahan_sum(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut acc = KahanSum::new();
    for value in values {
        acc.add(value);
    }
    acc.total()
}

/// Result of [`adaptive_integrate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadratureEstimate {
    pub value: f64,
    /// Number of accepted sub-intervals; at most `2^max_depth`.
    pub leaf_count: usize,
}

/// Refinement policy for [`adaptive_integrate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptivePolicy {
    pub node_count: usize,
    pub max_depth: usize,
    /// Accepted discrepancy at depth 0; halves with every level.
    pub tolerance: f64,
}

impl AdaptivePolicy {
    /// 10 nodes, max depth 5, tolerance `0.01 / 2^depth`.
    pub const REFERENCE: Self = Self {
        node_count: 10,
        max_depth: 5,
        tolerance: 0.01,
    };

    #[must_use]
    pub fn is_error_marginal(&self, error: f64, depth: usize) -> bool {
        let scale = 2_f64.powi(i32::try_from(depth).unwrap_or(i32::MAX));
        error < self.tolerance / scale
    }
}

impl Default for AdaptivePolicy {
    fn default() -> Self {
        Self::REFERENCE
    }
}

/// Adaptive Gauss-Legendre integral of `f` over `[a, b]`.
///
/// Each interval compares its whole-interval estimate with the sum of its two
/// halves. The half sum is accepted when `depth == max_depth` or
/// `is_error_marginal(|half - whole|, depth)` holds; otherwise both halves are
/// refined one level deeper. Accepted leaves are combined with Kahan
/// summation.
pub fn adaptive_integrate(
    f: impl Fn(f64) -> f64,
    a: f64,
    b: f64,
    node_count: usize,
    max_depth: usize,
    is_error_marginal: impl Fn(f64, usize) -> bool,
) -> QuadratureEstimate {
    let rule = gauss_legendre(node_count);
    let mut leaves = Vec::new();
    refine(&rule, &f, &is_error_marginal, a, b, 0, max_depth, &mut leaves);
    QuadratureEstimate {
        value: kahan_sum(leaves.iter().copied()),
        leaf_count: leaves.len(),
    }
}

#[allow(clippy::too_many_arguments)]
fn refine(
    rule: &GaussLegendreRule,
    f: &impl Fn(f64) -> f64,
    is_error_marginal: &impl Fn(f64, usize) -> bool,
    a: f64,
    b: f64,
    depth: usize,
    max_depth: usize,
    leaves: &mut Vec<f64>,
) {
    let mid = 0.5 * (a + b);
    let whole = rule.integrate(f, a, b);
    let halves = rule.integrate(f, a, mid) + rule.integrate(f, mid, b);

    if depth >= max_depth || is_error_marginal((halves - whole).abs(), depth) {
        leaves.push(halves);
        return;
    }
    refine(rule, f, is_error_marginal, a, mid, depth + 1, max_depth, leaves);
    refine(rule, f, is_error_marginal, mid, b, depth + 1, max_depth, leaves);
}

/// Arc length `∫₀¹ |B'(t)| dt` of the curve whose velocity is given by
/// `velocity_at`, under `policy`.
pub fn arc_length_with(velocity_at: impl Fn(f64) -> Vec3, policy: &AdaptivePolicy) -> QuadratureEstimate {
    adaptive_integrate(
        |t| velocity_at(t).length(),
        0.0,
        1.0,
        policy.node_count,
        policy.max_depth,
        |error, depth| policy.is_error_marginal(error, depth),
    )
}
