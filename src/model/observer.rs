//! Model Observer

use tracing::trace;

use crate::{
    data::AllocationData,
    model::state::{ConstraintRecord, RunVariable},
};

/// Observer trait for capturing the allocation formulation as it is built.
///
/// The builder remains the only place the model is constructed; observers passively record
/// variables, objective terms and constraints for logging or analysis.
pub trait ModelObserver {
    /// Called when a `runs[door, sku]` variable is created.
    fn on_run_variable(&mut self, variable: &RunVariable);

    /// Called when a term is added to the objective.
    fn on_objective_term(&mut self, _variable: &RunVariable, _coefficient: f64) {}

    /// Called when a constraint instance is recorded.
    fn on_constraint(&mut self, record: &ConstraintRecord);
}

/// Observer that ignores every callback.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ModelObserver for NoopObserver {
    fn on_run_variable(&mut self, _variable: &RunVariable) {}

    fn on_constraint(&mut self, _record: &ConstraintRecord) {}
}

/// Observer that logs the formulation at `trace` level.
#[derive(Debug, Clone, Copy)]
pub struct TracingObserver<'a> {
    data: &'a AllocationData,
}

impl<'a> TracingObserver<'a> {
    /// Create an observer that renders keys through `data`.
    pub fn new(data: &'a AllocationData) -> Self {
        Self { data }
    }
}

impl ModelObserver for TracingObserver<'_> {
    fn on_run_variable(&mut self, variable: &RunVariable) {
        trace!(
            door = self.data.door_name(variable.door()),
            sku = self.data.sku_name(variable.sku()),
            column = variable.column(),
            max_runs = variable.max_runs(),
            "run variable"
        );
    }

    fn on_objective_term(&mut self, variable: &RunVariable, coefficient: f64) {
        trace!(column = variable.column(), coefficient, "objective term");
    }

    fn on_constraint(&mut self, record: &ConstraintRecord) {
        let row = record.row();

        trace!(
            name = %record.name(self.data),
            family = %record.family(),
            terms = row.terms.len(),
            relation = %row.relation,
            rhs = row.rhs,
            "constraint"
        );
    }
}
