//! Result Export

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::{
    data::AllocationData,
    report::AllocationSummary,
    slack::ConstraintSlack,
    solver::pool::SolutionPool,
};

/// Export Errors
#[derive(Debug, Error)]
pub enum ExportError {
    /// Creating the output directory failed.
    #[error("failed to create {}: {source}", path.display())]
    Io {
        /// Directory being created
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Writing a CSV file failed.
    #[error("failed to write {}: {source}", path.display())]
    Csv {
        /// File being written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: csv::Error,
    },
}

/// Output files derived from a common prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    /// Per door/SKU allocation rows
    pub allocations: PathBuf,

    /// Door × size unit totals
    pub door_size_units: PathBuf,

    /// Constraint slacks
    pub slacks: PathBuf,

    /// Pooled alternatives
    pub pool: PathBuf,
}

impl ExportPaths {
    /// `outputs/allocation` becomes `outputs/allocation_allocations.csv` and so on.
    pub fn from_prefix(prefix: &Path) -> Self {
        let with_suffix = |suffix: &str| {
            let mut name = prefix.as_os_str().to_os_string();

            name.push(format!("_{suffix}.csv"));

            PathBuf::from(name)
        };

        Self {
            allocations: with_suffix("allocations"),
            door_size_units: with_suffix("door_size_units"),
            slacks: with_suffix("slacks"),
            pool: with_suffix("pool"),
        }
    }
}

/// Row of the pool export.
#[derive(Debug, Clone, PartialEq, Serialize)]
struct PoolRow<'a> {
    solution: usize,
    objective: f64,
    door: &'a str,
    sku: &'a str,
    runs: u32,
}

/// Write the allocation detail rows.
///
/// # Errors
///
/// Returns [`ExportError`] if the file cannot be written.
pub fn write_allocations(path: &Path, summary: &AllocationSummary) -> Result<(), ExportError> {
    write_rows(path, &summary.rows)
}

/// Write the door × size unit aggregate.
///
/// # Errors
///
/// Returns [`ExportError`] if the file cannot be written.
pub fn write_door_size_units(path: &Path, summary: &AllocationSummary) -> Result<(), ExportError> {
    write_rows(path, &summary.door_size_units)
}

/// Write one row per generated constraint.
///
/// # Errors
///
/// Returns [`ExportError`] if the file cannot be written.
pub fn write_slacks(path: &Path, slacks: &[ConstraintSlack]) -> Result<(), ExportError> {
    write_rows(path, slacks)
}

/// Write the positive runs of every pooled solution, ranked from 1.
///
/// # Errors
///
/// Returns [`ExportError`] if the file cannot be written.
pub fn write_pool(
    path: &Path,
    data: &AllocationData,
    pool: &SolutionPool,
) -> Result<(), ExportError> {
    let rows = pool
        .solutions()
        .iter()
        .enumerate()
        .flat_map(|(rank, solution)| {
            solution
                .runs()
                .iter()
                .filter(|run| run.runs > 0)
                .map(move |run| PoolRow {
                    solution: rank + 1,
                    objective: solution.objective(),
                    door: data.door_name(run.door),
                    sku: data.sku_name(run.sku),
                    runs: run.runs,
                })
        });

    write_rows(path, rows)
}

fn write_rows<T: Serialize>(
    path: &Path,
    rows: impl IntoIterator<Item = T>,
) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ExportError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let csv_error = |source| ExportError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    let mut count = 0_usize;

    for row in rows {
        writer.serialize(row).map_err(csv_error)?;
        count += 1;
    }

    writer
        .flush()
        .map_err(|source| csv_error(csv::Error::from(source)))?;

    debug!(path = %path.display(), rows = count, "wrote export");

    Ok(())
}
