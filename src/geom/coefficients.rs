//! Bernstein coefficient tables in power-basis form.
//!
//! A degree-`n` Bézier curve is `B(t) = Σ_i P_i · C(n,i) · t^i (1-t)^(n-i)`.
//! Expanding `(1-t)^(n-i)` gives, for point `i` and power `p ≥ i`:
//!
//! ```text
//! coef(i, p) = C(n, i) · C(n - i, p - i) · (-1)^(p - i)
//! ```
//!
//! Each derivative pass multiplies the `t^p` coefficient by `(p - pass)` and
//! drops powers that would go negative, so the `d`-th derivative table holds
//! `coef(i, p) · p! / (p - d)!` for `p ≥ max(i, d)`.
//!
//! # Layout
//!
//! Points are stored from `n` down to `0`; for each point the powers run from
//! `n` down to `max(i, d)`. Points with `max(i, d) > n` have no terms, so a
//! derivative order above the degree produces an empty table.

use std::sync::{Arc, OnceLock};

use super::cache::{MemoStats, MemoTable};

/// Signed coefficients for one `(degree, derivative_order)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientTable {
    degree: usize,
    derivative_order: usize,
    coefficients: Vec<f64>,
}

/// Terms contributed by one control point.
#[derive(Debug, Clone, Copy)]
pub struct PointTerms<'a> {
    /// Control point index.
    pub point: usize,
    /// Lowest power present (`max(point, derivative_order)`).
    pub lowest_power: usize,
    /// Coefficients for powers `degree, degree - 1, ..., lowest_power`.
    pub coefficients: &'a [f64],
}

impl CoefficientTable {
    /// Builds the table from Pascal rows `0..=degree`.
    #[must_use]
    pub fn compute(degree: usize, derivative_order: usize) -> Self {
        log::trace!("computing Bernstein table degree={degree} order={derivative_order}");
        let pascal = pascal_rows(degree);
        let mut coefficients = Vec::new();

        for point in (0..=degree).rev() {
            let outer = pascal[degree][point];
            let inner_row = &pascal[degree - point];
            for power in (point..=degree).rev() {
                let offset = power - point;
                let sign = if offset % 2 == 0 { 1.0 } else { -1.0 };
                let mut coefficient = outer * inner_row[offset] * sign;

                let mut skipped = false;
                for pass in 0..derivative_order {
                    if power <= pass {
                        skipped = true;
                        break;
                    }
                    coefficient *= (power - pass) as f64;
                }
                if !skipped {
                    coefficients.push(coefficient);
                }
            }
        }

        Self {
            degree,
            derivative_order,
            coefficients,
        }
    }

    #[must_use]
    pub const fn degree(&self) -> usize {
        self.degree
    }

    #[must_use]
    pub const fn derivative_order(&self) -> usize {
        self.derivative_order
    }

    /// The flat coefficient sequence in table layout.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.coefficients
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    /// Iterates per-point term groups, highest point index first. Points that
    /// lost every term to differentiation are omitted.
    pub fn terms(&self) -> impl Iterator<Item = PointTerms<'_>> + '_ {
        let degree = self.degree;
        let order = self.derivative_order;
        let mut offset = 0;
        (0..=degree).rev().filter_map(move |point| {
            let lowest_power = point.max(order);
            if lowest_power > degree {
                return None;
            }
            let len = degree - lowest_power + 1;
            let coefficients = &self.coefficients[offset..offset + len];
            offset += len;
            Some(PointTerms {
                point,
                lowest_power,
                coefficients,
            })
        })
    }
}

/// Pascal's triangle rows `0..=degree` as floats (exact up to degree ~56).
fn pascal_rows(degree: usize) -> Vec<Vec<f64>> {
    let mut rows: Vec<Vec<f64>> = Vec::with_capacity(degree + 1);
    for r in 0..=degree {
        let mut row = vec![1.0; r + 1];
        if let Some(prev) = rows.last() {
            for k in 1..r {
                row[k] = prev[k - 1] + prev[k];
            }
        }
        rows.push(row);
    }
    rows
}

fn global_table() -> &'static MemoTable<(usize, usize), CoefficientTable> {
    static TABLES: OnceLock<MemoTable<(usize, usize), CoefficientTable>> = OnceLock::new();
    TABLES.get_or_init(MemoTable::new)
}

/// Process-wide memoized coefficient table for `(degree, derivative_order)`.
#[must_use]
pub fn coefficients(degree: usize, derivative_order: usize) -> Arc<CoefficientTable> {
    global_table().get_or_insert_with((degree, derivative_order), || {
        CoefficientTable::compute(degree, derivative_order)
    })
}

/// Statistics of the process-wide coefficient cache.
#[must_use]
pub fn coefficient_cache_stats() -> MemoStats {
    global_table().stats()
}
