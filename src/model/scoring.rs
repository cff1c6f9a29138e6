//! Score Resolvers
//!
//! A [`ScoreResolver`] supplies the objective coefficient and run ceiling for an eligible
//! door/SKU pair. The two formulations resolve them from different tables.

use std::fmt;

use crate::data::{AllocationData, DoorKey, MissingEntry, SkuKey};

/// Resolves `Score(d, s)` and `MaxRuns(d, s)`.
pub trait ScoreResolver: fmt::Debug {
    /// Objective coefficient per run.
    ///
    /// # Errors
    ///
    /// Returns [`MissingEntry`] if the lookup table has no entry for the pair.
    fn score(&self, data: &AllocationData, door: DoorKey, sku: SkuKey) -> Result<f64, MissingEntry>;

    /// Run ceiling for the pair.
    ///
    /// # Errors
    ///
    /// Returns [`MissingEntry`] if the lookup table has no entry for the pair.
    fn max_runs(&self, data: &AllocationData, door: DoorKey, sku: SkuKey)
    -> Result<u32, MissingEntry>;
}

/// Score keyed by `(door, size(sku))`, ceiling keyed by `(sku, size(sku))`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DoorSizeScoring;

impl ScoreResolver for DoorSizeScoring {
    fn score(&self, data: &AllocationData, door: DoorKey, sku: SkuKey) -> Result<f64, MissingEntry> {
        data.door_size_score(door, data.sku_size(sku)?)
    }

    fn max_runs(
        &self,
        data: &AllocationData,
        _door: DoorKey,
        sku: SkuKey,
    ) -> Result<u32, MissingEntry> {
        data.sku_max_runs(sku)
    }
}

/// Score and ceiling keyed by `(tier(door), heat(sku))`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TierHeatScoring;

impl ScoreResolver for TierHeatScoring {
    fn score(&self, data: &AllocationData, door: DoorKey, sku: SkuKey) -> Result<f64, MissingEntry> {
        data.tier_heat_rule(data.door_tier(door)?, data.sku_heat(sku)?)
            .map(|rule| rule.score)
    }

    fn max_runs(
        &self,
        data: &AllocationData,
        door: DoorKey,
        sku: SkuKey,
    ) -> Result<u32, MissingEntry> {
        data.tier_heat_rule(data.door_tier(door)?, data.sku_heat(sku)?)
            .map(|rule| rule.max_runs)
    }
}
