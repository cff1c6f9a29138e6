//! Table Loading

use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

use csv::{ReaderBuilder, Trim};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info};

use crate::data::{AllocationData, AllocationTables, Formulation, ValidationError};

/// Table Loading Errors
#[derive(Debug, Error)]
pub enum LoadError {
    /// A table the formulation needs has no file.
    #[error("required table `{table}` not found at {}", path.display())]
    MissingTable {
        /// Table name
        table: &'static str,
        /// Expected file location
        path: PathBuf,
    },

    /// IO error reading a table or fixture.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Malformed CSV or a cell that does not fit its column type.
    #[error("failed to parse {}: {source}", path.display())]
    Csv {
        /// File being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: csv::Error,
    },

    /// YAML parsing error
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Loaded tables failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// A CSV table and the headers it must carry.
#[derive(Debug, Clone, Copy)]
struct TableSpec {
    name: &'static str,
    columns: &'static [&'static str],
}

impl TableSpec {
    const fn new(name: &'static str, columns: &'static [&'static str]) -> Self {
        Self { name, columns }
    }

    fn path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(format!("{}.csv", self.name))
    }
}

const DOORS: TableSpec = TableSpec::new("doors", &["door"]);
const DOORS_WITH_TIER: TableSpec = TableSpec::new("doors", &["door", "tier"]);
const ARTICLES: TableSpec = TableSpec::new("articles", &["sku", "size"]);
const ELIGIBILITY: TableSpec = TableSpec::new("eligibility", &["door", "sku", "eligible"]);
const SUPPLY: TableSpec = TableSpec::new("supply", &["sku", "size"]);
const SUPPLY_WITH_MAX_RUNS: TableSpec =
    TableSpec::new("supply", &["sku", "size", "max_runs"]);
const HEAT: TableSpec = TableSpec::new("heat", &["sku", "heat"]);
const TIER_CAP_RUNS: TableSpec =
    TableSpec::new("tier_cap_runs", &["tier", "heat", "max_runs", "score"]);
const TIER_CAPACITY: TableSpec = TableSpec::new("tier_capacity", &["tier", "cap_runs_total"]);
const SCORE: TableSpec = TableSpec::new("score", &["door", "size", "score"]);
const CAP_RUNS: TableSpec = TableSpec::new("cap_runs", &["size", "cap_runs"]);
const MIN_RUNS: TableSpec = TableSpec::new("min_runs", &["door", "sku", "min_runs"]);

/// Read every table the formulation needs from `data_dir`.
///
/// `min_runs.csv` is optional; tables belonging to the other formulation are not read.
///
/// # Errors
///
/// Returns [`LoadError`] if a required file or column is missing or a row cannot be parsed.
pub fn load_tables(
    data_dir: &Path,
    formulation: Formulation,
) -> Result<AllocationTables, LoadError> {
    let (doors, supply) = match formulation {
        Formulation::DoorSize => (DOORS, SUPPLY_WITH_MAX_RUNS),
        Formulation::TierHeat => (DOORS_WITH_TIER, SUPPLY),
    };

    let mut tables = AllocationTables {
        formulation,
        doors: read_required(data_dir, doors)?,
        articles: read_required(data_dir, ARTICLES)?,
        eligibility: read_required(data_dir, ELIGIBILITY)?,
        supply: read_required(data_dir, supply)?,
        heat: read_required(data_dir, HEAT)?,
        min_runs: read_optional(data_dir, MIN_RUNS)?,
        ..AllocationTables::default()
    };

    match formulation {
        Formulation::DoorSize => {
            tables.score = read_required(data_dir, SCORE)?;
            tables.cap_runs = read_required(data_dir, CAP_RUNS)?;
        }
        Formulation::TierHeat => {
            tables.tier_cap_runs = read_required(data_dir, TIER_CAP_RUNS)?;
            tables.tier_capacity = read_required(data_dir, TIER_CAPACITY)?;
        }
    }

    info!(
        data_dir = %data_dir.display(),
        %formulation,
        doors = tables.doors.len(),
        skus = tables.articles.len(),
        "loaded tables"
    );

    Ok(tables)
}

/// Read and validate the tables in `data_dir`.
///
/// # Errors
///
/// Returns [`LoadError`] if loading or validation fails.
pub fn load_data(data_dir: &Path, formulation: Formulation) -> Result<AllocationData, LoadError> {
    let tables = load_tables(data_dir, formulation)?;

    Ok(AllocationData::from_tables(tables)?)
}

/// Read a YAML fixture holding every table.
///
/// # Errors
///
/// Returns [`LoadError`] if the file cannot be read or parsed.
pub fn load_yaml_fixture(path: &Path) -> Result<AllocationTables, LoadError> {
    let contents = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(serde_norway::from_str(&contents)?)
}

fn read_required<T: DeserializeOwned>(
    data_dir: &Path,
    spec: TableSpec,
) -> Result<Vec<T>, LoadError> {
    let path = spec.path(data_dir);

    if !path.is_file() {
        return Err(LoadError::MissingTable {
            table: spec.name,
            path,
        });
    }

    read_table(&path, spec)
}

fn read_optional<T: DeserializeOwned>(
    data_dir: &Path,
    spec: TableSpec,
) -> Result<Vec<T>, LoadError> {
    let path = spec.path(data_dir);

    if !path.is_file() {
        debug!(table = spec.name, "optional table not present");

        return Ok(Vec::new());
    }

    read_table(&path, spec)
}

fn read_table<T: DeserializeOwned>(path: &Path, spec: TableSpec) -> Result<Vec<T>, LoadError> {
    let csv_error = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_path(path)
        .map_err(csv_error)?;

    let headers = reader.headers().map_err(csv_error)?;

    for column in spec.columns.iter().copied() {
        if !headers.iter().any(|header| header == column) {
            return Err(ValidationError::MissingColumn {
                table: spec.name,
                column,
            }
            .into());
        }
    }

    let rows = reader
        .deserialize()
        .collect::<Result<Vec<T>, csv::Error>>()
        .map_err(csv_error)?;

    debug!(table = spec.name, rows = rows.len(), "read table");

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;
    use testresult::TestResult;

    use crate::data::{Door, HeatValue};

    use super::*;

    fn write(dir: &TempDir, name: &str, contents: &str) -> Result<(), Box<dyn std::error::Error>> {
        fs::write(dir.path().join(name), contents)?;

        Ok(())
    }

    fn door_size_dir() -> Result<TempDir, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;

        write(&dir, "doors.csv", "door\nD1\nD2\n")?;
        write(&dir, "articles.csv", "sku,size\nSKU1,S\nSKU2,M\n")?;
        write(
            &dir,
            "eligibility.csv",
            "door,sku,eligible\nD1,SKU1,1\nD1,SKU2,1\nD2,SKU1,1\nD2,SKU2,0\n",
        )?;
        write(
            &dir,
            "supply.csv",
            "sku,size,supply,max_runs\nSKU1,S,5,3\nSKU2,M,3,2\n",
        )?;
        write(&dir, "heat.csv", "sku,heat\nSKU1,1.0\nSKU2,1.2\n")?;
        write(
            &dir,
            "score.csv",
            "door,size,score\nD1,S,10\nD1,M,8\nD2,S,9\nD2,M,7\n",
        )?;
        write(&dir, "cap_runs.csv", "size,cap_runs\nS,10\nM,10\n")?;

        Ok(dir)
    }

    #[test]
    fn loads_door_size_tables() -> TestResult {
        let dir = door_size_dir()?;

        let tables = load_tables(dir.path(), Formulation::DoorSize)?;

        assert_eq!(tables.doors.len(), 2);
        assert_eq!(tables.supply.first().and_then(|row| row.max_runs), Some(3));
        assert_eq!(tables.heat.get(1).map(|row| row.heat.as_str()), Some("1.2"));
        assert!(tables.min_runs.is_empty());

        let data = AllocationData::from_tables(tables)?;

        assert_eq!(data.sku_count(), 2);

        Ok(())
    }

    #[test]
    fn missing_required_table_is_reported() -> TestResult {
        let dir = door_size_dir()?;

        fs::remove_file(dir.path().join("score.csv"))?;

        let result = load_tables(dir.path(), Formulation::DoorSize);

        assert!(matches!(
            result,
            Err(LoadError::MissingTable { table: "score", .. })
        ));

        Ok(())
    }

    #[test]
    fn missing_column_is_a_validation_error() -> TestResult {
        let dir = door_size_dir()?;

        write(&dir, "cap_runs.csv", "size,cap\nS,10\nM,10\n")?;

        let result = load_tables(dir.path(), Formulation::DoorSize);

        assert!(matches!(
            result,
            Err(LoadError::Validation(ValidationError::MissingColumn {
                table: "cap_runs",
                column: "cap_runs",
            }))
        ));

        Ok(())
    }

    #[test]
    fn tier_heat_requires_door_tiers() -> TestResult {
        let dir = door_size_dir()?;

        let result = load_tables(dir.path(), Formulation::TierHeat);

        assert!(matches!(
            result,
            Err(LoadError::Validation(ValidationError::MissingColumn {
                table: "doors",
                column: "tier",
            }))
        ));

        Ok(())
    }

    #[test]
    fn optional_min_runs_is_read_when_present() -> TestResult {
        let dir = door_size_dir()?;

        write(&dir, "min_runs.csv", "door,sku,min_runs\nD2,SKU1,1\n")?;

        let data = load_data(dir.path(), Formulation::DoorSize)?;

        let d2 = data.door_key("D2").ok_or("missing D2")?;
        let sku1 = data.sku_key("SKU1").ok_or("missing SKU1")?;

        assert_eq!(data.min_runs(d2, sku1), Some(1));

        Ok(())
    }

    fn numeric_heat_dir() -> Result<TempDir, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;

        write(&dir, "doors.csv", "door,tier\nD1,A\n")?;
        write(&dir, "articles.csv", "sku,size\nSKU1,M\nSKU2,M\n")?;
        write(
            &dir,
            "eligibility.csv",
            "door,sku,eligible\nD1,SKU1,1\nD1,SKU2,1\n",
        )?;
        write(
            &dir,
            "supply.csv",
            "sku,size,supply_units,ratio\nSKU1,M,8,4\nSKU2,M,12,4\n",
        )?;
        write(&dir, "heat.csv", "sku,heat\nSKU1,3\nSKU2,1\n")?;
        write(
            &dir,
            "tier_cap_runs.csv",
            "tier,heat,max_runs,score\nA,3,2,5\nA,1,3,2\n",
        )?;
        write(&dir, "tier_capacity.csv", "tier,cap_runs_total\nA,4\n")?;

        Ok(dir)
    }

    #[test]
    fn numeric_heat_labels_are_categories() -> TestResult {
        let dir = numeric_heat_dir()?;

        let data = load_data(dir.path(), Formulation::TierHeat)?;

        let d1 = data.door_key("D1").ok_or("missing D1")?;
        let sku1 = data.sku_key("SKU1").ok_or("missing SKU1")?;
        let sku2 = data.sku_key("SKU2").ok_or("missing SKU2")?;

        assert_eq!(data.heat_value(sku1)?, HeatValue::Category("3".to_string()));
        assert_eq!(data.heat_value(sku2)?, HeatValue::Category("1".to_string()));

        let tier = data.door(d1).and_then(Door::tier).ok_or("missing tier")?;
        let rule = data.tier_heat_rule(tier, data.sku_heat(sku1)?)?;

        assert_eq!(rule.max_runs, 2);

        Ok(())
    }

    #[test]
    fn unquoted_yaml_heat_labels_are_categories() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("numeric_heat.yml");

        fs::write(
            &path,
            "formulation: tier_heat\n\
             heat:\n  - { sku: SKU1, heat: 3 }\n\
             tier_cap_runs:\n  - { tier: A, heat: 3, max_runs: 2, score: 5 }\n",
        )?;

        let tables = load_yaml_fixture(&path)?;

        assert_eq!(tables.heat.first().map(|row| row.heat.as_str()), Some("3"));
        assert_eq!(
            tables.tier_cap_runs.first().map(|row| row.heat.as_str()),
            Some("3")
        );

        Ok(())
    }

    #[test]
    fn malformed_cell_is_a_parse_error() -> TestResult {
        let dir = door_size_dir()?;

        write(&dir, "eligibility.csv", "door,sku,eligible\nD1,SKU1,yes\n")?;

        let result = load_tables(dir.path(), Formulation::DoorSize);

        assert!(matches!(result, Err(LoadError::Csv { .. })));

        Ok(())
    }
}
