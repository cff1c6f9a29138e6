//! Integration tests for the door/size formulation

use std::path::Path;

use testresult::TestResult;

use runalloc::{
    data::{AllocationData, AllocationTables, tables::MinRunsRecord},
    io::load_yaml_fixture,
    model::{ModelBuilder, state::ConstraintFamily},
    report::ReportError,
    slack::BINDING_TOLERANCE,
    solver::{SolveOptions, SolveStatus},
};

fn fixture() -> Result<AllocationTables, Box<dyn std::error::Error>> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/door_size.yml");

    Ok(load_yaml_fixture(&path)?)
}

fn floor(door: &str, sku: &str, min_runs: u32) -> MinRunsRecord {
    MinRunsRecord {
        door: door.to_string(),
        sku: sku.to_string(),
        min_runs,
    }
}

#[test]
fn toy_instance_reaches_known_optimum() -> TestResult {
    let data = AllocationData::from_tables(fixture()?)?;
    let mut model = ModelBuilder::new(&data).build()?;

    assert_eq!(model.run_variables().len(), 3);

    let status = model.optimize(&SolveOptions::default());

    assert_eq!(status, SolveStatus::Optimal);
    assert_eq!(model.objective_value(), Some(64.0));

    let d1 = data.door_key("D1").ok_or("missing D1")?;
    let d2 = data.door_key("D2").ok_or("missing D2")?;
    let sku1 = data.sku_key("SKU1").ok_or("missing SKU1")?;
    let sku2 = data.sku_key("SKU2").ok_or("missing SKU2")?;

    assert_eq!(model.runs(d1, sku1)?, 3);
    assert_eq!(model.runs(d2, sku1)?, 2);
    assert_eq!(model.runs(d1, sku2)?, 2);

    // Ineligible pairs have no variable and always report zero runs.
    assert!(!model.has_variable(d2, sku2));
    assert_eq!(model.runs(d2, sku2)?, 0);

    Ok(())
}

#[test]
fn constraint_families_have_expected_counts() -> TestResult {
    let data = AllocationData::from_tables(fixture()?)?;
    let model = ModelBuilder::new(&data).build()?;

    let count = |family: ConstraintFamily| {
        model
            .constraints()
            .iter()
            .filter(|record| record.family() == family)
            .count()
    };

    assert_eq!(count(ConstraintFamily::EligibilityCap), 3);
    assert_eq!(count(ConstraintFamily::Supply), 2);
    assert_eq!(count(ConstraintFamily::Concentration), 3);
    assert_eq!(count(ConstraintFamily::Floor), 0);

    Ok(())
}

#[test]
fn solution_respects_every_constraint() -> TestResult {
    let data = AllocationData::from_tables(fixture()?)?;
    let mut model = ModelBuilder::new(&data).build()?;

    model.optimize(&SolveOptions::default());

    let slacks = model.constraint_slacks()?;

    assert_eq!(slacks.len(), model.constraints().len());
    assert!(slacks.iter().all(|slack| slack.slack >= -BINDING_TOLERANCE));

    for variable in model.run_variables() {
        assert!(model.runs(variable.door(), variable.sku())? <= variable.max_runs());
    }

    Ok(())
}

#[test]
fn floors_are_honoured() -> TestResult {
    let mut tables = fixture()?;

    tables.min_runs.push(floor("D2", "SKU1", 3));

    let data = AllocationData::from_tables(tables)?;
    let mut model = ModelBuilder::new(&data).build()?;

    assert_eq!(model.optimize(&SolveOptions::default()), SolveStatus::Optimal);

    let d2 = data.door_key("D2").ok_or("missing D2")?;
    let sku1 = data.sku_key("SKU1").ok_or("missing SKU1")?;

    assert_eq!(model.runs(d2, sku1)?, 3);
    assert_eq!(model.objective_value(), Some(63.0));

    Ok(())
}

#[test]
fn zero_floors_add_no_constraint() -> TestResult {
    let mut tables = fixture()?;

    tables.min_runs.push(floor("D1", "SKU1", 0));

    let data = AllocationData::from_tables(tables)?;
    let model = ModelBuilder::new(&data).build()?;

    assert!(
        model
            .constraints()
            .iter()
            .all(|record| record.family() != ConstraintFamily::Floor)
    );

    Ok(())
}

#[test]
fn conflicting_floors_are_infeasible() -> TestResult {
    let mut tables = fixture()?;

    tables.min_runs.push(floor("D1", "SKU1", 3));
    tables.min_runs.push(floor("D2", "SKU1", 3));

    let data = AllocationData::from_tables(tables)?;
    let mut model = ModelBuilder::new(&data).build()?;

    let status = model.optimize(&SolveOptions::default());

    assert_eq!(status, SolveStatus::Infeasible);
    assert!(!status.has_solution());
    assert_eq!(model.objective_value(), None);
    assert!(matches!(
        model.summarize_allocations(),
        Err(ReportError::NoSolution(SolveStatus::Infeasible))
    ));

    Ok(())
}
