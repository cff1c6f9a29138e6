//! Allocation Reports

use std::io;

use rustc_hash::FxHashMap;
use serde::Serialize;
use tabled::{
    builder::Builder,
    settings::{Alignment, Style, object::Columns},
};
use thiserror::Error;

use crate::{
    data::{DoorKey, HeatValue, MissingEntry, SizeKey, SkuKey},
    model::AllocationModel,
    solver::SolveStatus,
};

/// Errors raised when reading results from a model.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The model has not been optimized yet.
    #[error("model has not been solved; call optimize() first")]
    NotSolved,

    /// The last solve produced no solution.
    #[error("model has no solution ({0})")]
    NoSolution(SolveStatus),

    /// A reporting lookup failed.
    #[error(transparent)]
    MissingEntry(#[from] MissingEntry),

    /// Writing the rendered table failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// One door/SKU pair with positive solved runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationRow {
    /// Door key
    #[serde(skip)]
    pub door_key: DoorKey,

    /// SKU key
    #[serde(skip)]
    pub sku_key: SkuKey,

    /// Door identifier
    pub door: String,

    /// SKU identifier
    pub sku: String,

    /// The SKU's size
    pub size: String,

    /// Solved runs
    pub runs: u32,

    /// Declared units-per-run ratio
    pub ratio: Option<f64>,

    /// Shipped units: `ratio × runs`, or `runs` without a ratio
    pub units: f64,

    /// Objective coefficient of the pair
    pub score: f64,

    /// SKU heat weight or label
    pub heat: HeatValue,

    /// Total units shipped to the door at this size
    pub door_size_units: f64,
}

/// Units shipped to one door at one size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoorSizeUnits {
    /// Door key
    #[serde(skip)]
    pub door_key: DoorKey,

    /// Size key
    #[serde(skip)]
    pub size_key: SizeKey,

    /// Door identifier
    pub door: String,

    /// Size
    pub size: String,

    /// Total units, zero when nothing was allocated
    pub units: f64,
}

/// Detail rows plus the door × size unit aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationSummary {
    /// Positive allocations in door, then SKU, declaration order
    pub rows: Vec<AllocationRow>,

    /// Every door × size combination, zero-filled
    pub door_size_units: Vec<DoorSizeUnits>,
}

impl AllocationSummary {
    /// Units shipped to a door at a size.
    pub fn units_for(&self, door: DoorKey, size: SizeKey) -> f64 {
        self.door_size_units
            .iter()
            .find(|entry| entry.door_key == door && entry.size_key == size)
            .map_or(0.0, |entry| entry.units)
    }

    /// Total runs across all rows
    pub fn total_runs(&self) -> u64 {
        self.rows.iter().map(|row| u64::from(row.runs)).sum()
    }

    /// Total units across all rows
    pub fn total_units(&self) -> f64 {
        self.rows.iter().map(|row| row.units).sum()
    }

    /// Render the detail rows as a terminal table followed by totals.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Io`] if writing fails.
    pub fn write_to(&self, mut out: impl io::Write) -> Result<(), ReportError> {
        let mut builder = Builder::default();

        builder.push_record([
            "Door", "SKU", "Size", "Runs", "Ratio", "Units", "Score", "Heat", "Door/Size Units",
        ]);

        for row in &self.rows {
            builder.push_record([
                row.door.clone(),
                row.sku.clone(),
                row.size.clone(),
                row.runs.to_string(),
                row.ratio.map_or_else(|| "-".to_string(), |ratio| ratio.to_string()),
                row.units.to_string(),
                row.score.to_string(),
                row.heat.to_string(),
                row.door_size_units.to_string(),
            ]);
        }

        let mut table = builder.build();

        table.with(Style::modern_rounded());
        table.modify(Columns::new(3..7), Alignment::right());
        table.modify(Columns::new(8..9), Alignment::right());

        writeln!(out, "\n{table}")?;
        writeln!(
            out,
            "Allocations: {}   Runs: {}   Units: {}",
            self.rows.len(),
            self.total_runs(),
            self.total_units()
        )?;

        Ok(())
    }
}

impl AllocationModel<'_> {
    /// Translate the solved runs into per door/SKU rows and door/size unit totals.
    ///
    /// Rows with zero runs are omitted; the door/size aggregate still lists them as zero.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] if the model has not been solved, has no solution, or a heat
    /// lookup fails.
    pub fn summarize_allocations(&self) -> Result<AllocationSummary, ReportError> {
        let data = self.data();
        let outcome = self.solution()?;

        let mut rows = Vec::new();
        let mut units_by_door_size: FxHashMap<(DoorKey, SizeKey), f64> = FxHashMap::default();

        for (variable, runs) in self.run_variables().iter().zip(&outcome.runs) {
            if *runs == 0 {
                continue;
            }

            let sku = data
                .sku(variable.sku())
                .ok_or_else(|| MissingEntry::new("articles", "unknown SKU key"))?;

            let units = sku.units_per_run() * f64::from(*runs);

            *units_by_door_size
                .entry((variable.door(), sku.size()))
                .or_default() += units;

            rows.push(AllocationRow {
                door_key: variable.door(),
                sku_key: variable.sku(),
                door: data.door_name(variable.door()).to_string(),
                sku: sku.name().to_string(),
                size: data.size_name(sku.size()).to_string(),
                runs: *runs,
                ratio: sku.ratio(),
                units,
                score: variable.score(),
                heat: data.heat_value(variable.sku())?,
                door_size_units: 0.0,
            });
        }

        for row in &mut rows {
            let size = data.sku_size(row.sku_key)?;

            row.door_size_units = units_by_door_size
                .get(&(row.door_key, size))
                .copied()
                .unwrap_or_default();
        }

        let mut door_size_units = Vec::with_capacity(data.door_count() * data.sizes().count());

        for (door, door_entry) in data.doors() {
            for (size, size_name) in data.sizes() {
                door_size_units.push(DoorSizeUnits {
                    door_key: door,
                    size_key: size,
                    door: door_entry.name().to_string(),
                    size: size_name.to_string(),
                    units: units_by_door_size
                        .get(&(door, size))
                        .copied()
                        .unwrap_or_default(),
                });
            }
        }

        Ok(AllocationSummary {
            rows,
            door_size_units,
        })
    }
}
