//! MILP Solver
//!
//! Thin, backend-agnostic wrapper over `good_lp`. Constraints are recorded as index-based
//! [`LinearRow`]s so they can be re-evaluated at the solved point (slacks) and re-submitted
//! with extra rows (solution pool) without rebuilding the model.

use std::{
    fmt,
    time::{Duration, Instant},
};

use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable,
    VariableDefinition, variable,
};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;
use tracing::warn;

#[cfg(feature = "solver-highs")]
use good_lp::solvers::highs::highs as default_solver;
#[cfg(all(not(feature = "solver-highs"), feature = "solver-microlp"))]
use good_lp::solvers::microlp::microlp as default_solver;

pub mod pool;

/// Sparse linear terms: (column index, coefficient).
pub type Terms = SmallVec<[(usize, f64); 8]>;

/// Solver Errors
#[derive(Debug, Error)]
pub enum SolverError {
    /// Wrapped solver resolution error
    #[error(transparent)]
    ResolutionError(#[from] ResolutionError),

    /// Internal solver invariant was violated (this is a bug).
    #[error("solver invariant violated: {message}")]
    InvariantViolation {
        /// What invariant was violated
        message: &'static str,
    },
}

/// Relation operator for a linear constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relation {
    /// Less than or equal (`lhs <= rhs`)
    #[serde(rename = "<=")]
    Leq,

    /// Greater than or equal (`lhs >= rhs`)
    #[serde(rename = ">=")]
    Geq,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Leq => f.write_str("<="),
            Relation::Geq => f.write_str(">="),
        }
    }
}

/// Recorded linear constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRow {
    /// Left-hand side terms
    pub terms: Terms,

    /// Relation operator
    pub relation: Relation,

    /// Right-hand side scalar
    pub rhs: f64,
}

impl LinearRow {
    /// Evaluate the left-hand side at the given column values.
    ///
    /// Columns outside `values` contribute zero.
    pub fn lhs_value(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(column, coefficient)| {
                values.get(*column).copied().unwrap_or_default() * coefficient
            })
            .sum()
    }

    /// Unused headroom at the given column values, oriented so a satisfied row is non-negative.
    pub fn slack(&self, values: &[f64]) -> f64 {
        let lhs = self.lhs_value(values);

        match self.relation {
            Relation::Leq => self.rhs - lhs,
            Relation::Geq => lhs - self.rhs,
        }
    }
}

/// Terminal status of a solve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// Proven optimal integer solution
    Optimal,

    /// Feasible solution returned when the time limit was reached
    BestFound,

    /// No integer assignment satisfies the constraints
    Infeasible,

    /// The objective can grow without bound
    Unbounded,

    /// The backend failed
    Error(String),
}

impl SolveStatus {
    /// Whether a solved assignment is available.
    pub fn has_solution(&self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::BestFound)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Optimal => f.write_str("optimal"),
            SolveStatus::BestFound => f.write_str("best found within limits"),
            SolveStatus::Infeasible => f.write_str("infeasible"),
            SolveStatus::Unbounded => f.write_str("unbounded"),
            SolveStatus::Error(message) => write!(f, "solver error: {message}"),
        }
    }
}

impl From<SolverError> for SolveStatus {
    fn from(err: SolverError) -> Self {
        match err {
            SolverError::ResolutionError(ResolutionError::Infeasible) => SolveStatus::Infeasible,
            SolverError::ResolutionError(ResolutionError::Unbounded) => SolveStatus::Unbounded,
            other => SolveStatus::Error(other.to_string()),
        }
    }
}

/// Options passed through to the backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolveOptions {
    /// Wall-clock limit; yields [`SolveStatus::BestFound`] on backends that enforce it
    pub time_limit: Option<Duration>,

    /// Backend thread count
    pub threads: Option<u32>,

    /// Relative MIP optimality gap
    pub relative_gap: Option<f64>,
}

impl SolveOptions {
    /// Set the time limit.
    #[must_use]
    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = Some(time_limit);
        self
    }

    /// Set the thread count.
    #[must_use]
    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Set the relative optimality gap.
    #[must_use]
    pub fn with_relative_gap(mut self, relative_gap: f64) -> Self {
        self.relative_gap = Some(relative_gap);
        self
    }

    fn is_empty(&self) -> bool {
        self.time_limit.is_none() && self.threads.is_none() && self.relative_gap.is_none()
    }
}

/// Kind of a problem column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ColumnKind {
    /// Non-negative integer
    Integer,

    /// 0/1 indicator
    Binary,
}

impl ColumnKind {
    fn definition(self) -> VariableDefinition {
        match self {
            ColumnKind::Integer => variable().integer().min(0.0),
            ColumnKind::Binary => variable().binary(),
        }
    }
}

/// Backend-agnostic maximisation problem.
#[derive(Debug, Clone, Default)]
pub(crate) struct MilpProblem {
    columns: Vec<ColumnKind>,
    objective: Terms,
    rows: Vec<LinearRow>,
}

impl MilpProblem {
    /// Add a column and return its index.
    pub(crate) fn add_column(&mut self, kind: ColumnKind) -> usize {
        self.columns.push(kind);
        self.columns.len() - 1
    }

    /// Add a term to the objective.
    pub(crate) fn add_objective_term(&mut self, column: usize, coefficient: f64) {
        self.objective.push((column, coefficient));
    }

    /// Record a constraint row.
    pub(crate) fn push_row(&mut self, row: LinearRow) {
        self.rows.push(row);
    }

    pub(crate) fn objective(&self) -> &Terms {
        &self.objective
    }

    pub(crate) fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Evaluate the objective at the given column values.
    pub(crate) fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective
            .iter()
            .map(|(column, coefficient)| {
                values.get(*column).copied().unwrap_or_default() * coefficient
            })
            .sum()
    }
}

/// Column values returned by a successful solve, rounded to integers.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Solved {
    pub(crate) values: Vec<f64>,
    pub(crate) elapsed: Duration,
}

/// Whether the active backend applies time limit, thread and gap options.
pub(crate) const HONOURS_OPTIONS: bool = cfg!(feature = "solver-highs");

/// Warn about options the active backend cannot honour.
pub(crate) fn check_options(options: &SolveOptions) {
    if options.is_empty() {
        return;
    }

    if !HONOURS_OPTIONS {
        warn!(
            ?options,
            "the bundled microlp backend ignores time limit, thread and gap options"
        );
    }
}

/// Submit the problem to the backend and block until it returns.
///
/// # Errors
///
/// Returns [`SolverError::ResolutionError`] for infeasible, unbounded or failed solves.
pub(crate) fn solve(problem: &MilpProblem, options: &SolveOptions) -> Result<Solved, SolverError> {
    // Some backends reject an empty model outright.
    if problem.columns.is_empty() {
        return Ok(Solved {
            values: Vec::new(),
            elapsed: Duration::ZERO,
        });
    }

    let mut pb = ProblemVariables::new();

    let vars: Vec<Variable> = problem
        .columns
        .iter()
        .map(|kind| pb.add(kind.definition()))
        .collect();

    let objective = expression(&vars, &problem.objective)?;

    let mut model = configure(pb.maximise(objective).using(default_solver), options);

    for row in &problem.rows {
        let lhs = expression(&vars, &row.terms)?;

        model = match row.relation {
            Relation::Leq => model.with(lhs.leq(row.rhs)),
            Relation::Geq => model.with(lhs.geq(row.rhs)),
        };
    }

    let started = Instant::now();
    let solution = model.solve()?;
    let elapsed = started.elapsed();

    let values = vars
        .iter()
        .map(|var| solution.value(*var).round().max(0.0))
        .collect();

    Ok(Solved { values, elapsed })
}

/// Status of a solve that returned an assignment.
///
/// Only a backend that enforces the time limit can stop early, so a solve that ran past the
/// limit on any other backend finished on its own and is optimal.
pub(crate) fn solved_status(
    options: &SolveOptions,
    elapsed: Duration,
    honours_options: bool,
) -> SolveStatus {
    let limit_reached = options.time_limit.is_some_and(|limit| elapsed >= limit);

    if honours_options && limit_reached {
        SolveStatus::BestFound
    } else {
        SolveStatus::Optimal
    }
}

/// Convert a solved column value into a run count.
///
/// # Errors
///
/// Returns [`SolverError::InvariantViolation`] if the value does not fit a `u32`.
pub(crate) fn round_runs(value: f64) -> Result<u32, SolverError> {
    value
        .round()
        .max(0.0)
        .to_u32()
        .ok_or(SolverError::InvariantViolation {
            message: "solved run count does not fit in u32",
        })
}

fn expression(vars: &[Variable], terms: &Terms) -> Result<Expression, SolverError> {
    let mut expr = Expression::default();

    for (column, coefficient) in terms {
        let var = vars.get(*column).ok_or(SolverError::InvariantViolation {
            message: "linear term references an unknown column",
        })?;

        expr += *var * *coefficient;
    }

    Ok(expr)
}

#[cfg(feature = "solver-highs")]
fn configure(
    mut model: good_lp::solvers::highs::HighsProblem,
    options: &SolveOptions,
) -> good_lp::solvers::highs::HighsProblem {
    if let Some(time_limit) = options.time_limit {
        model = model.set_option("time_limit", time_limit.as_secs_f64());
    }

    if let Some(threads) = options.threads {
        model = model.set_option("threads", i32::try_from(threads).unwrap_or(i32::MAX));
    }

    if let Some(relative_gap) = options.relative_gap {
        model = model.set_option("mip_rel_gap", relative_gap);
    }

    model
}

#[cfg(all(not(feature = "solver-highs"), feature = "solver-microlp"))]
fn configure<M: SolverModel>(model: M, _options: &SolveOptions) -> M {
    model
}
