//! Allocation Model
//!
//! [`ModelBuilder`] turns validated [`AllocationData`] into a MILP with one integer
//! `runs[door, sku]` variable per eligible pair:
//!
//! ```text
//! maximise   Σ runs[d,s] × Score(d,s)
//! subject to runs[d,s] ≤ MaxRuns(d,s)                       (eligibility cap)
//!            Σ_d coeff(s) × runs[d,s] ≤ Supply(s)            (supply; coeff is 1 or the ratio)
//!            anti-concentration caps                          (per formulation)
//!            runs[d,s] ≥ MinRuns(d,s)                         (declared floors only)
//! ```
//!
//! Score/ceiling lookup and the anti-concentration family are pluggable strategies, so both
//! named formulations share the same builder.

use rustc_hash::FxHashMap;
use smallvec::smallvec;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    data::{AllocationData, DoorKey, Formulation, MissingEntry, SkuKey},
    model::{
        concentration::{ConcentrationCap, HeatWeightedSizeCap, TierTotalCap},
        observer::{ModelObserver, NoopObserver},
        scoring::{DoorSizeScoring, ScoreResolver, TierHeatScoring},
        state::{ConstraintFamily, ConstraintRecord, ConstraintScope, ModelState, RunVariable},
    },
    report::ReportError,
    solver::{
        self, MilpProblem, SolveOptions, SolveStatus, SolverError,
        pool::{self, PoolColumn, PoolConfig, PooledRun, PooledSolution, SolutionPool},
    },
};

pub mod concentration;
pub mod observer;
pub mod scoring;
pub mod state;

/// Model construction errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// A score, ceiling, weight or cap lookup failed.
    #[error(transparent)]
    MissingEntry(#[from] MissingEntry),
}

/// Builds an [`AllocationModel`] from validated data.
#[derive(Debug)]
pub struct ModelBuilder<'a> {
    data: &'a AllocationData,
    scoring: Box<dyn ScoreResolver + 'a>,
    concentration: Box<dyn ConcentrationCap + 'a>,
}

impl<'a> ModelBuilder<'a> {
    /// Create a builder using the strategies of the data's formulation.
    pub fn new(data: &'a AllocationData) -> Self {
        match data.formulation() {
            Formulation::DoorSize => {
                Self::with_strategies(data, Box::new(DoorSizeScoring), Box::new(HeatWeightedSizeCap))
            }
            Formulation::TierHeat => {
                Self::with_strategies(data, Box::new(TierHeatScoring), Box::new(TierTotalCap))
            }
        }
    }

    /// Create a builder with custom score and anti-concentration strategies.
    pub fn with_strategies(
        data: &'a AllocationData,
        scoring: Box<dyn ScoreResolver + 'a>,
        concentration: Box<dyn ConcentrationCap + 'a>,
    ) -> Self {
        Self {
            data,
            scoring,
            concentration,
        }
    }

    /// Build the model.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if a strategy lookup fails for an eligible pair.
    pub fn build(self) -> Result<AllocationModel<'a>, ModelError> {
        let mut observer = NoopObserver;

        self.build_with_observer(&mut observer)
    }

    /// Build the model, reporting every variable, objective term and constraint to `observer`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if a strategy lookup fails for an eligible pair.
    pub fn build_with_observer(
        self,
        observer: &mut dyn ModelObserver,
    ) -> Result<AllocationModel<'a>, ModelError> {
        let data = self.data;
        let mut state = ModelState::new();

        // Ineligible pairs get no variable at all.
        for (door, _) in data.doors() {
            for (sku, _) in data.skus() {
                if !data.is_eligible(door, sku) {
                    continue;
                }

                let score = self.scoring.score(data, door, sku)?;
                let max_runs = self.scoring.max_runs(data, door, sku)?;

                state.add_run_variable(door, sku, max_runs, score, observer);
            }
        }

        let variables = state.variables().to_vec();

        for variable in &variables {
            state.add_leq_constraint(
                ConstraintFamily::EligibilityCap,
                ConstraintScope::DoorSku {
                    door: variable.door(),
                    sku: variable.sku(),
                },
                smallvec![(variable.column(), 1.0)],
                f64::from(variable.max_runs()),
                observer,
            );
        }

        for (sku_key, sku) in data.skus() {
            let supply = sku.supply();

            let terms = state
                .variables_for_sku(sku_key)
                .map(|variable| (variable.column(), supply.coefficient()))
                .collect::<solver::Terms>();

            if terms.is_empty() {
                continue;
            }

            state.add_leq_constraint(
                ConstraintFamily::Supply,
                ConstraintScope::SkuSize {
                    sku: sku_key,
                    size: sku.size(),
                },
                terms,
                supply.capacity(),
                observer,
            );
        }

        self.concentration.add_constraints(data, &mut state, observer)?;

        for variable in &variables {
            let Some(floor) = data.min_runs(variable.door(), variable.sku()) else {
                continue;
            };

            state.add_geq_constraint(
                ConstraintFamily::Floor,
                ConstraintScope::DoorSku {
                    door: variable.door(),
                    sku: variable.sku(),
                },
                smallvec![(variable.column(), 1.0)],
                f64::from(floor),
                observer,
            );
        }

        let model = AllocationModel::new(data, state);

        for family in [
            ConstraintFamily::EligibilityCap,
            ConstraintFamily::Supply,
            ConstraintFamily::Concentration,
            ConstraintFamily::Floor,
        ] {
            debug!(
                %family,
                count = model
                    .constraints
                    .iter()
                    .filter(|record| record.family() == family)
                    .count(),
                "constraint family"
            );
        }

        info!(
            formulation = %data.formulation(),
            variables = model.variables.len(),
            constraints = model.constraints.len(),
            "built allocation model"
        );

        Ok(model)
    }
}

/// Result of the most recent solve.
#[derive(Debug, Clone)]
pub(crate) struct Outcome {
    pub(crate) status: SolveStatus,
    pub(crate) values: Vec<f64>,
    pub(crate) runs: Vec<u32>,
    pub(crate) objective: Option<f64>,
    pub(crate) pool: SolutionPool,
}

impl Outcome {
    fn failed(status: SolveStatus) -> Self {
        Self {
            status,
            values: Vec::new(),
            runs: Vec::new(),
            objective: None,
            pool: SolutionPool::default(),
        }
    }
}

/// Built allocation model, owning its solver session.
#[derive(Debug)]
pub struct AllocationModel<'a> {
    data: &'a AllocationData,
    problem: MilpProblem,
    variables: Vec<RunVariable>,
    constraints: Vec<ConstraintRecord>,
    index: FxHashMap<(DoorKey, SkuKey), usize>,
    pool_config: Option<PoolConfig>,
    outcome: Option<Outcome>,
}

impl<'a> AllocationModel<'a> {
    fn new(data: &'a AllocationData, state: ModelState) -> Self {
        let (problem, variables, constraints) = state.into_parts();

        let index = variables
            .iter()
            .enumerate()
            .map(|(i, variable)| ((variable.door(), variable.sku()), i))
            .collect();

        Self {
            data,
            problem,
            variables,
            constraints,
            index,
            pool_config: None,
            outcome: None,
        }
    }

    /// Data the model was built from
    pub fn data(&self) -> &'a AllocationData {
        self.data
    }

    /// Generated run variables, one per eligible pair
    pub fn run_variables(&self) -> &[RunVariable] {
        &self.variables
    }

    /// Generated constraint instances
    pub fn constraints(&self) -> &[ConstraintRecord] {
        &self.constraints
    }

    /// Whether a `runs[door, sku]` variable exists.
    pub fn has_variable(&self, door: DoorKey, sku: SkuKey) -> bool {
        self.index.contains_key(&(door, sku))
    }

    /// Retain alternative solutions on the next [`optimize`](Self::optimize).
    pub fn enable_solution_pool(&mut self, config: PoolConfig) {
        self.pool_config = Some(config);
    }

    /// Solve the model, blocking until the backend returns a terminal status.
    ///
    /// Infeasible, unbounded and failed solves are reported through the returned status;
    /// they never leave a zero allocation behind.
    pub fn optimize(&mut self, options: &SolveOptions) -> SolveStatus {
        solver::check_options(options);

        info!(
            variables = self.variables.len(),
            constraints = self.constraints.len(),
            pool = self.pool_config.map(|config| config.size),
            "solving allocation model"
        );

        let outcome = self
            .solve_with_pool(options)
            .unwrap_or_else(|err| Outcome::failed(SolveStatus::from(err)));

        match outcome.objective {
            Some(objective) => info!(status = %outcome.status, objective, "solve finished"),
            None => warn!(status = %outcome.status, "solve finished without a solution"),
        }

        let status = outcome.status.clone();

        self.outcome = Some(outcome);

        status
    }

    /// Status of the most recent solve, if any
    pub fn status(&self) -> Option<&SolveStatus> {
        self.outcome.as_ref().map(|outcome| &outcome.status)
    }

    /// Objective value at the solved point, if a solution exists
    pub fn objective_value(&self) -> Option<f64> {
        self.outcome.as_ref().and_then(|outcome| outcome.objective)
    }

    /// Solved runs for a door/SKU pair; pairs without a variable have zero runs.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] if the model has not been solved or has no solution.
    pub fn runs(&self, door: DoorKey, sku: SkuKey) -> Result<u32, ReportError> {
        let outcome = self.solution()?;

        Ok(self
            .index
            .get(&(door, sku))
            .and_then(|i| outcome.runs.get(*i))
            .copied()
            .unwrap_or(0))
    }

    /// Retained alternatives, best first. Holds only the optimum unless a pool was enabled.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] if the model has not been solved or has no solution.
    pub fn solution_pool(&self) -> Result<&SolutionPool, ReportError> {
        self.solution().map(|outcome| &outcome.pool)
    }

    /// Outcome of a solve that produced a solution.
    pub(crate) fn solution(&self) -> Result<&Outcome, ReportError> {
        let outcome = self.outcome.as_ref().ok_or(ReportError::NotSolved)?;

        if !outcome.status.has_solution() {
            return Err(ReportError::NoSolution(outcome.status.clone()));
        }

        Ok(outcome)
    }

    fn solve_with_pool(&self, options: &SolveOptions) -> Result<Outcome, SolverError> {
        let solved = solver::solve(&self.problem, options)?;

        let status = solver::solved_status(options, solved.elapsed, solver::HONOURS_OPTIONS);

        let objective = self.problem.objective_value(&solved.values);
        let runs = self.runs_at(&solved.values)?;

        let pool = match &self.pool_config {
            Some(config) => self.collect_pool(&solved, config, options)?,
            None => SolutionPool::new(vec![PooledSolution::new(
                objective,
                self.pooled_runs(&runs),
            )]),
        };

        Ok(Outcome {
            status,
            values: solved.values,
            runs,
            objective: Some(objective),
            pool,
        })
    }

    fn collect_pool(
        &self,
        best: &solver::Solved,
        config: &PoolConfig,
        options: &SolveOptions,
    ) -> Result<SolutionPool, SolverError> {
        let columns: Vec<PoolColumn> = self
            .variables
            .iter()
            .map(|variable| PoolColumn {
                column: variable.column(),
                upper: variable.max_runs(),
            })
            .collect();

        let found = match pool::collect(&self.problem, &columns, best.clone(), config, options) {
            Ok(found) => found,
            Err(err) => {
                warn!(%err, "solution pool enumeration failed, keeping the optimum only");

                vec![best.clone()]
            }
        };

        if found.len() < config.size {
            warn!(
                requested = config.size,
                found = found.len(),
                "solution pool holds fewer solutions than requested"
            );
        }

        let solutions = found
            .iter()
            .map(|solved| {
                let runs = self.runs_at(&solved.values)?;

                Ok(PooledSolution::new(
                    self.problem.objective_value(&solved.values),
                    self.pooled_runs(&runs),
                ))
            })
            .collect::<Result<Vec<_>, SolverError>>()?;

        Ok(SolutionPool::new(solutions))
    }

    fn runs_at(&self, values: &[f64]) -> Result<Vec<u32>, SolverError> {
        self.variables
            .iter()
            .map(|variable| {
                let value = values
                    .get(variable.column())
                    .copied()
                    .ok_or(SolverError::InvariantViolation {
                        message: "solution is missing a run variable",
                    })?;

                solver::round_runs(value)
            })
            .collect()
    }

    fn pooled_runs(&self, runs: &[u32]) -> Vec<PooledRun> {
        self.variables
            .iter()
            .zip(runs)
            .map(|(variable, runs)| PooledRun {
                door: variable.door(),
                sku: variable.sku(),
                runs: *runs,
            })
            .collect()
    }
}
