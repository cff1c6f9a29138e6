//! Solution Pool
//!
//! Alternative integer solutions are enumerated by re-solving with no-good cuts: each retained
//! assignment is excluded by requiring at least one run column to move above or below its
//! current value. An optional objective floor keeps alternatives within the configured gap.

use good_lp::ResolutionError;
use smallvec::smallvec;
use tracing::debug;

use crate::{
    data::{DoorKey, SkuKey},
    solver::{
        ColumnKind, LinearRow, MilpProblem, Relation, SolveOptions, Solved, SolverError, Terms,
        solve,
    },
};

/// Pool size used when none is given.
pub const DEFAULT_POOL_SIZE: usize = 10;

/// Floor rows are loosened by this much so the best solution itself stays feasible.
const OBJECTIVE_TOLERANCE: f64 = 1e-6;

/// Retention settings for alternative solutions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolConfig {
    /// Maximum number of solutions to retain, including the optimum
    pub size: usize,

    /// Keep only solutions within this fraction of the best objective
    pub relative_gap: Option<f64>,

    /// Keep only solutions within this distance of the best objective
    pub absolute_gap: Option<f64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

impl PoolConfig {
    /// Retain up to `size` solutions (at least one) with no gap restriction.
    pub fn new(size: usize) -> Self {
        Self {
            size: size.max(1),
            relative_gap: None,
            absolute_gap: None,
        }
    }

    /// Restrict alternatives to a relative gap.
    #[must_use]
    pub fn with_relative_gap(mut self, relative_gap: f64) -> Self {
        self.relative_gap = Some(relative_gap);
        self
    }

    /// Restrict alternatives to an absolute gap.
    #[must_use]
    pub fn with_absolute_gap(mut self, absolute_gap: f64) -> Self {
        self.absolute_gap = Some(absolute_gap);
        self
    }

    /// How far below `best` an alternative may fall, if any gap is configured.
    ///
    /// When both gaps are set, the looser one applies.
    pub fn allowance(&self, best: f64) -> Option<f64> {
        if self.relative_gap.is_none() && self.absolute_gap.is_none() {
            return None;
        }

        let absolute = self.absolute_gap.unwrap_or_default().max(0.0);
        let relative = self.relative_gap.unwrap_or_default().max(0.0) * best.abs();

        Some(absolute.max(relative))
    }
}

/// Runs of one door/SKU pair in a pooled solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PooledRun {
    /// Door
    pub door: DoorKey,

    /// SKU
    pub sku: SkuKey,

    /// Solved runs
    pub runs: u32,
}

/// One retained assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct PooledSolution {
    objective: f64,
    runs: Vec<PooledRun>,
}

impl PooledSolution {
    pub(crate) fn new(objective: f64, runs: Vec<PooledRun>) -> Self {
        Self { objective, runs }
    }

    /// Objective value of this assignment
    pub fn objective(&self) -> f64 {
        self.objective
    }

    /// Runs for every generated variable, in variable order
    pub fn runs(&self) -> &[PooledRun] {
        &self.runs
    }

    /// Runs for a door/SKU pair; pairs without a variable have zero runs.
    pub fn runs_for(&self, door: DoorKey, sku: SkuKey) -> u32 {
        self.runs
            .iter()
            .find(|run| run.door == door && run.sku == sku)
            .map_or(0, |run| run.runs)
    }
}

/// Retained alternatives, ordered best to worst.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolutionPool {
    solutions: Vec<PooledSolution>,
}

impl SolutionPool {
    pub(crate) fn new(solutions: Vec<PooledSolution>) -> Self {
        Self { solutions }
    }

    /// Alternatives ordered by non-increasing objective; the first is the optimum.
    pub fn solutions(&self) -> &[PooledSolution] {
        &self.solutions
    }

    /// Number of retained solutions
    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    /// Whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    /// Best retained solution
    pub fn best(&self) -> Option<&PooledSolution> {
        self.solutions.first()
    }
}

/// An integer column the pool may move, with its upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PoolColumn {
    pub(crate) column: usize,
    pub(crate) upper: u32,
}

/// Collect up to `config.size` distinct solutions, starting from `best`.
///
/// Returned solutions carry values for the columns of `problem` only and are ordered by
/// non-increasing objective. Enumeration stops early once no further distinct assignment
/// satisfies the constraints and the objective floor.
///
/// # Errors
///
/// Returns any [`SolverError`] other than infeasibility raised while re-solving.
pub(crate) fn collect(
    problem: &MilpProblem,
    columns: &[PoolColumn],
    best: Solved,
    config: &PoolConfig,
    options: &SolveOptions,
) -> Result<Vec<Solved>, SolverError> {
    let best_objective = problem.objective_value(&best.values);

    let mut working = problem.clone();

    if let Some(allowance) = config.allowance(best_objective) {
        working.push_row(LinearRow {
            terms: problem.objective().clone(),
            relation: Relation::Geq,
            rhs: best_objective - allowance - OBJECTIVE_TOLERANCE,
        });
    }

    let mut found = vec![best];

    while found.len() < config.size {
        let Some(last) = found.last() else {
            break;
        };

        if !exclude(&mut working, columns, &last.values) {
            break;
        }

        match solve(&working, options) {
            Ok(mut solved) => {
                solved.values.truncate(problem.column_count());
                found.push(solved);
            }
            Err(SolverError::ResolutionError(ResolutionError::Infeasible)) => {
                debug!(found = found.len(), "no further distinct solutions");
                break;
            }
            Err(err) => return Err(err),
        }
    }

    found.sort_by(|a, b| {
        problem
            .objective_value(&b.values)
            .total_cmp(&problem.objective_value(&a.values))
    });

    Ok(found)
}

/// Add a no-good cut excluding `values` on `columns`.
///
/// Returns `false` if every column is pinned (upper bound zero), so nothing can differ.
fn exclude(problem: &mut MilpProblem, columns: &[PoolColumn], values: &[f64]) -> bool {
    let mut indicators = Terms::new();

    for PoolColumn { column, upper } in columns {
        let current = values.get(*column).copied().unwrap_or_default();
        let upper = f64::from(*upper);

        // above = 1 forces x >= current + 1
        if current < upper {
            let above = problem.add_column(ColumnKind::Binary);

            problem.push_row(LinearRow {
                terms: smallvec![(*column, 1.0), (above, -(current + 1.0))],
                relation: Relation::Geq,
                rhs: 0.0,
            });

            indicators.push((above, 1.0));
        }

        // below = 1 forces x <= current - 1
        if current > 0.0 {
            let below = problem.add_column(ColumnKind::Binary);

            problem.push_row(LinearRow {
                terms: smallvec![(*column, 1.0), (below, upper - current + 1.0)],
                relation: Relation::Leq,
                rhs: upper,
            });

            indicators.push((below, 1.0));
        }
    }

    if indicators.is_empty() {
        return false;
    }

    problem.push_row(LinearRow {
        terms: indicators,
        relation: Relation::Geq,
        rhs: 1.0,
    });

    true
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    /// max 3x + 2y  s.t.  x + y <= 4,  x <= 3,  y <= 4
    fn knapsack() -> (MilpProblem, Vec<PoolColumn>) {
        let mut problem = MilpProblem::default();

        let x = problem.add_column(ColumnKind::Integer);
        let y = problem.add_column(ColumnKind::Integer);

        problem.add_objective_term(x, 3.0);
        problem.add_objective_term(y, 2.0);

        problem.push_row(LinearRow {
            terms: smallvec![(x, 1.0), (y, 1.0)],
            relation: Relation::Leq,
            rhs: 4.0,
        });

        problem.push_row(LinearRow {
            terms: smallvec![(x, 1.0)],
            relation: Relation::Leq,
            rhs: 3.0,
        });

        problem.push_row(LinearRow {
            terms: smallvec![(y, 1.0)],
            relation: Relation::Leq,
            rhs: 4.0,
        });

        let columns = vec![
            PoolColumn {
                column: x,
                upper: 3,
            },
            PoolColumn {
                column: y,
                upper: 4,
            },
        ];

        (problem, columns)
    }

    fn objectives(problem: &MilpProblem, solutions: &[Solved]) -> Vec<f64> {
        solutions
            .iter()
            .map(|solved| problem.objective_value(&solved.values))
            .collect()
    }

    #[test]
    fn pool_returns_distinct_solutions_best_first() -> TestResult {
        let (problem, columns) = knapsack();
        let options = SolveOptions::default();

        let best = solve(&problem, &options)?;
        let pool = collect(&problem, &columns, best, &PoolConfig::new(3), &options)?;

        assert_eq!(objectives(&problem, &pool), vec![11.0, 10.0, 9.0]);
        assert_eq!(pool.first().map(|solved| solved.values.clone()), Some(vec![3.0, 1.0]));

        let distinct: Vec<&Vec<f64>> = pool.iter().map(|solved| &solved.values).collect();

        for (i, a) in distinct.iter().enumerate() {
            for b in distinct.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }

        Ok(())
    }

    #[test]
    fn absolute_gap_limits_alternatives() -> TestResult {
        let (problem, columns) = knapsack();
        let options = SolveOptions::default();

        let best = solve(&problem, &options)?;
        let config = PoolConfig::new(5).with_absolute_gap(1.0);

        let pool = collect(&problem, &columns, best, &config, &options)?;

        assert_eq!(objectives(&problem, &pool), vec![11.0, 10.0]);

        Ok(())
    }

    #[test]
    fn pool_of_one_is_the_optimum() -> TestResult {
        let (problem, columns) = knapsack();
        let options = SolveOptions::default();

        let best = solve(&problem, &options)?;
        let pool = collect(&problem, &columns, best, &PoolConfig::new(1), &options)?;

        assert_eq!(objectives(&problem, &pool), vec![11.0]);

        Ok(())
    }

    #[test]
    fn allowance_takes_the_looser_gap() {
        assert_eq!(PoolConfig::new(3).allowance(100.0), None);

        let config = PoolConfig::new(3)
            .with_relative_gap(0.25)
            .with_absolute_gap(2.0);

        assert_eq!(config.allowance(100.0), Some(25.0));
        assert_eq!(config.allowance(-4.0), Some(2.0));
    }

    #[test]
    fn zero_size_is_clamped_to_one() {
        assert_eq!(PoolConfig::new(0).size, 1);
        assert_eq!(PoolConfig::default().size, DEFAULT_POOL_SIZE);
    }
}
