//! Constraint Slacks
//!
//! Headroom left in every generated constraint at the solved point, evaluated from the recorded
//! rows without re-solving. A slack of zero marks a binding constraint.

use serde::Serialize;

use crate::{
    model::{AllocationModel, state::ConstraintFamily},
    report::ReportError,
    solver::Relation,
};

/// Slacks within this distance of zero are treated as binding.
pub const BINDING_TOLERANCE: f64 = 1e-6;

/// Unused headroom of one constraint instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstraintSlack {
    /// Constraint name, e.g. `supply[SKU1,S]`
    pub name: String,

    /// Constraint family
    pub family: ConstraintFamily,

    /// Door, when the constraint is keyed by one
    pub door: Option<String>,

    /// SKU, when the constraint is keyed by one
    pub sku: Option<String>,

    /// Size, when the constraint is keyed by one
    pub size: Option<String>,

    /// Tier, when the constraint is keyed by one
    pub tier: Option<String>,

    /// Relation operator
    pub sense: Relation,

    /// Left-hand side at the solved point
    pub lhs: f64,

    /// Right-hand side capacity
    pub rhs: f64,

    /// `rhs - lhs` for `<=` rows, `lhs - rhs` for `>=` rows
    pub slack: f64,
}

impl ConstraintSlack {
    /// Whether the constraint is tight at the solved point.
    pub fn is_binding(&self, tolerance: f64) -> bool {
        self.slack.abs() <= tolerance
    }
}

impl AllocationModel<'_> {
    /// Slack of every generated constraint, in generation order.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] if the model has not been solved or has no solution.
    pub fn constraint_slacks(&self) -> Result<Vec<ConstraintSlack>, ReportError> {
        let data = self.data();
        let outcome = self.solution()?;

        let slacks = self
            .constraints()
            .iter()
            .map(|record| {
                let scope = record.scope();
                let row = record.row();

                ConstraintSlack {
                    name: record.name(data),
                    family: record.family(),
                    door: scope.door().map(|door| data.door_name(door).to_string()),
                    sku: scope.sku().map(|sku| data.sku_name(sku).to_string()),
                    size: scope.size().map(|size| data.size_name(size).to_string()),
                    tier: scope.tier().map(|tier| data.tier_name(tier).to_string()),
                    sense: row.relation,
                    lhs: row.lhs_value(&outcome.values),
                    rhs: row.rhs,
                    slack: row.slack(&outcome.values),
                }
            })
            .collect();

        Ok(slacks)
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::{
        data::test_support::{toy_door_size, toy_tier_heat},
        model::ModelBuilder,
        solver::SolveOptions,
    };

    use super::*;

    fn slack_of<'s>(slacks: &'s [ConstraintSlack], name: &str) -> Option<&'s ConstraintSlack> {
        slacks.iter().find(|slack| slack.name == name)
    }

    #[test]
    fn toy_slacks_identify_bottlenecks() -> TestResult {
        let data = toy_door_size()?;
        let mut model = ModelBuilder::new(&data).build()?;

        model.optimize(&SolveOptions::default());

        let slacks = model.constraint_slacks()?;

        assert_eq!(slacks.len(), model.constraints().len());
        assert!(slacks.iter().all(|slack| slack.slack >= -BINDING_TOLERANCE));

        let supply_sku1 = slack_of(&slacks, "supply[SKU1,S]").ok_or("missing supply[SKU1,S]")?;
        let supply_sku2 = slack_of(&slacks, "supply[SKU2,M]").ok_or("missing supply[SKU2,M]")?;
        let cap_d1_sku1 =
            slack_of(&slacks, "eligibility[D1,SKU1]").ok_or("missing eligibility[D1,SKU1]")?;

        assert!(supply_sku1.is_binding(BINDING_TOLERANCE));
        assert!((supply_sku2.slack - 1.0).abs() < 1e-9);
        assert!(cap_d1_sku1.is_binding(BINDING_TOLERANCE));
        assert_eq!(supply_sku1.sku.as_deref(), Some("SKU1"));
        assert_eq!(supply_sku1.size.as_deref(), Some("S"));
        assert_eq!(supply_sku1.door, None);

        Ok(())
    }

    #[test]
    fn floor_slack_is_measured_above_the_floor() -> TestResult {
        let data = crate::data::test_support::toy_door_size_builder()
            .min_runs("D2", "SKU1", 1)
            .build()?;

        let mut model = ModelBuilder::new(&data).build()?;

        model.optimize(&SolveOptions::default());

        let slacks = model.constraint_slacks()?;
        let floor = slack_of(&slacks, "min_runs[D2,SKU1]").ok_or("missing min_runs[D2,SKU1]")?;

        assert_eq!(floor.sense, Relation::Geq);
        assert!((floor.slack - 1.0).abs() < 1e-9);

        Ok(())
    }

    #[test]
    fn unit_supply_slack_is_in_units() -> TestResult {
        let data = toy_tier_heat()?;
        let mut model = ModelBuilder::new(&data).build()?;

        model.optimize(&SolveOptions::default());

        let slacks = model.constraint_slacks()?;

        let supply_sku1 = slack_of(&slacks, "supply[SKU1,M]").ok_or("missing supply[SKU1,M]")?;
        let total_d1 =
            slack_of(&slacks, "cap_runs_total[D1]").ok_or("missing cap_runs_total[D1]")?;

        assert!(supply_sku1.is_binding(BINDING_TOLERANCE));
        assert!((supply_sku1.lhs - 24.0).abs() < 1e-9);
        assert!(total_d1.is_binding(BINDING_TOLERANCE));
        assert_eq!(total_d1.tier.as_deref(), Some("A"));

        Ok(())
    }

    #[test]
    fn slacks_require_a_solution() -> TestResult {
        let data = toy_door_size()?;
        let model = ModelBuilder::new(&data).build()?;

        assert!(matches!(
            model.constraint_slacks(),
            Err(ReportError::NotSolved)
        ));

        Ok(())
    }
}
