//! Allocation Data
//!
//! Validated, cross-referenced container for every input of an allocation run. Identifiers are
//! interned into [`SlotMap`]s on construction so the model layer works with copyable keys, and
//! every table lookup is an explicit lookup-or-fail returning [`MissingEntry`].

use std::{fmt, hash::Hash};

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};

pub mod builder;
pub mod error;
pub mod tables;

#[cfg(test)]
pub(crate) mod test_support;

pub use builder::AllocationDataBuilder;
pub use error::{MissingEntry, ValidationError};
pub use tables::AllocationTables;

new_key_type! {
    /// Door Key
    pub struct DoorKey;

    /// SKU Key
    pub struct SkuKey;

    /// Size Key
    pub struct SizeKey;

    /// Tier Key
    pub struct TierKey;

    /// Heat Label Key
    pub struct HeatKey;
}

/// Named model configuration.
///
/// The two formulations share one builder but resolve scores, run ceilings and
/// anti-concentration caps from different tables.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Formulation {
    /// Score keyed by (door, size); heat-weighted per door/size caps.
    DoorSize,

    /// Score and run ceiling keyed by (tier, heat); per door total-run caps by tier.
    #[default]
    TierHeat,
}

impl fmt::Display for Formulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formulation::DoorSize => f.write_str("door_size"),
            Formulation::TierHeat => f.write_str("tier_heat"),
        }
    }
}

/// Supply capacity for a SKU at its size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SupplyLimit {
    /// At most this many runs across all doors.
    Runs(f64),

    /// At most this many units across all doors, where each run ships `ratio` units.
    Units {
        /// Unit supply
        units: f64,

        /// Units shipped per run
        ratio: f64,
    },
}

impl SupplyLimit {
    /// Right-hand side of the supply constraint.
    pub fn capacity(&self) -> f64 {
        match self {
            SupplyLimit::Runs(runs) => *runs,
            SupplyLimit::Units { units, .. } => *units,
        }
    }

    /// Coefficient applied to each run in the supply constraint.
    pub fn coefficient(&self) -> f64 {
        match self {
            SupplyLimit::Runs(_) => 1.0,
            SupplyLimit::Units { ratio, .. } => *ratio,
        }
    }
}

/// Heat attached to a SKU, as used by the active formulation.
///
/// Serializes untagged, so exports carry the bare weight or label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeatValue {
    /// Numeric heat coefficient (door/size formulation)
    Weight(f64),

    /// Categorical heat label (tier/heat formulation)
    Category(String),
}

impl fmt::Display for HeatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeatValue::Weight(weight) => write!(f, "{weight}"),
            HeatValue::Category(label) => f.write_str(label),
        }
    }
}

/// Door
#[derive(Debug, Clone, PartialEq)]
pub struct Door {
    name: String,
    tier: Option<TierKey>,
}

impl Door {
    /// Door identifier
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tier the door belongs to, if any
    pub fn tier(&self) -> Option<TierKey> {
        self.tier
    }
}

/// SKU with its single size and resolved supply.
#[derive(Debug, Clone, PartialEq)]
pub struct Sku {
    name: String,
    size: SizeKey,
    supply: SupplyLimit,
    ratio: Option<f64>,
    units_per_run: f64,
}

impl Sku {
    /// SKU identifier
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The SKU's size
    pub fn size(&self) -> SizeKey {
        self.size
    }

    /// Supply capacity at the SKU's size
    pub fn supply(&self) -> SupplyLimit {
        self.supply
    }

    /// Declared units-per-run ratio, if the supply table provided one
    pub fn ratio(&self) -> Option<f64> {
        self.ratio
    }

    /// Units shipped per run: the ratio when declared, otherwise one.
    pub fn units_per_run(&self) -> f64 {
        self.units_per_run
    }
}

/// Score and run ceiling for one (tier, heat) combination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierHeatRule {
    /// Maximum runs per door/SKU
    pub max_runs: u32,

    /// Objective score per run
    pub score: f64,
}

/// Tables used by the door/size formulation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DoorSizeTables {
    scores: FxHashMap<(DoorKey, SizeKey), f64>,
    max_runs: FxHashMap<SkuKey, u32>,
    heat_weights: FxHashMap<SkuKey, f64>,
    cap_runs: FxHashMap<SizeKey, f64>,
}

/// Tables used by the tier/heat formulation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TierHeatTables {
    sku_heat: FxHashMap<SkuKey, HeatKey>,
    rules: FxHashMap<(TierKey, HeatKey), TierHeatRule>,
    cap_runs_total: FxHashMap<TierKey, f64>,
}

/// Formulation-specific scoring and capacity tables.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoringTables {
    /// Door/size formulation tables
    DoorSize(DoorSizeTables),

    /// Tier/heat formulation tables
    TierHeat(TierHeatTables),
}

/// Validated allocation inputs.
///
/// Immutable once built. Construct with [`AllocationData::builder`] or
/// [`AllocationData::from_tables`].
#[derive(Debug, Clone)]
pub struct AllocationData {
    formulation: Formulation,
    doors: SlotMap<DoorKey, Door>,
    sizes: SlotMap<SizeKey, String>,
    skus: SlotMap<SkuKey, Sku>,
    tiers: SlotMap<TierKey, String>,
    heats: SlotMap<HeatKey, String>,
    door_keys: FxHashMap<String, DoorKey>,
    sku_keys: FxHashMap<String, SkuKey>,
    size_keys: FxHashMap<String, SizeKey>,
    eligible: FxHashSet<(DoorKey, SkuKey)>,
    min_runs: FxHashMap<(DoorKey, SkuKey), u32>,
    scoring: ScoringTables,
}

impl AllocationData {
    /// Start building allocation data for the given formulation.
    pub fn builder(formulation: Formulation) -> AllocationDataBuilder {
        AllocationDataBuilder::new(formulation)
    }

    /// Build allocation data from tabular records.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the tables fail validation.
    pub fn from_tables(tables: AllocationTables) -> Result<Self, ValidationError> {
        tables.into_builder().build()
    }

    /// Active formulation
    pub fn formulation(&self) -> Formulation {
        self.formulation
    }

    /// Iterate doors in declaration order.
    pub fn doors(&self) -> impl Iterator<Item = (DoorKey, &Door)> {
        self.doors.iter()
    }

    /// Iterate SKUs in declaration order.
    pub fn skus(&self) -> impl Iterator<Item = (SkuKey, &Sku)> {
        self.skus.iter()
    }

    /// Iterate sizes in declaration order.
    pub fn sizes(&self) -> impl Iterator<Item = (SizeKey, &str)> {
        self.sizes.iter().map(|(key, name)| (key, name.as_str()))
    }

    /// Iterate tiers in declaration order.
    pub fn tiers(&self) -> impl Iterator<Item = (TierKey, &str)> {
        self.tiers.iter().map(|(key, name)| (key, name.as_str()))
    }

    /// Number of doors
    pub fn door_count(&self) -> usize {
        self.doors.len()
    }

    /// Number of SKUs
    pub fn sku_count(&self) -> usize {
        self.skus.len()
    }

    /// Get a door by key
    pub fn door(&self, key: DoorKey) -> Option<&Door> {
        self.doors.get(key)
    }

    /// Get a SKU by key
    pub fn sku(&self, key: SkuKey) -> Option<&Sku> {
        self.skus.get(key)
    }

    /// Look up a door key by identifier
    pub fn door_key(&self, name: &str) -> Option<DoorKey> {
        self.door_keys.get(name).copied()
    }

    /// Look up a SKU key by identifier
    pub fn sku_key(&self, name: &str) -> Option<SkuKey> {
        self.sku_keys.get(name).copied()
    }

    /// Look up a size key by identifier
    pub fn size_key(&self, name: &str) -> Option<SizeKey> {
        self.size_keys.get(name).copied()
    }

    /// Door identifier, or an empty string for a foreign key
    pub fn door_name(&self, key: DoorKey) -> &str {
        self.doors.get(key).map_or("", Door::name)
    }

    /// SKU identifier, or an empty string for a foreign key
    pub fn sku_name(&self, key: SkuKey) -> &str {
        self.skus.get(key).map_or("", Sku::name)
    }

    /// Size identifier, or an empty string for a foreign key
    pub fn size_name(&self, key: SizeKey) -> &str {
        self.sizes.get(key).map_or("", String::as_str)
    }

    /// Tier identifier, or an empty string for a foreign key
    pub fn tier_name(&self, key: TierKey) -> &str {
        self.tiers.get(key).map_or("", String::as_str)
    }

    /// Heat label, or an empty string for a foreign key
    pub fn heat_name(&self, key: HeatKey) -> &str {
        self.heats.get(key).map_or("", String::as_str)
    }

    /// Whether the door may receive runs of the SKU.
    pub fn is_eligible(&self, door: DoorKey, sku: SkuKey) -> bool {
        self.eligible.contains(&(door, sku))
    }

    /// Declared floor for a door/SKU pair. Absent means no floor constraint.
    pub fn min_runs(&self, door: DoorKey, sku: SkuKey) -> Option<u32> {
        self.min_runs.get(&(door, sku)).copied()
    }

    /// The SKU's size.
    ///
    /// # Errors
    ///
    /// Returns [`MissingEntry`] if the key does not belong to this data set.
    pub fn sku_size(&self, sku: SkuKey) -> Result<SizeKey, MissingEntry> {
        self.skus
            .get(sku)
            .map(Sku::size)
            .ok_or_else(|| MissingEntry::new("articles", "unknown SKU key"))
    }

    /// The door's tier.
    ///
    /// # Errors
    ///
    /// Returns [`MissingEntry`] if the door has no tier.
    pub fn door_tier(&self, door: DoorKey) -> Result<TierKey, MissingEntry> {
        self.doors
            .get(door)
            .and_then(Door::tier)
            .ok_or_else(|| {
                MissingEntry::new("doors", format!("tier of door `{}`", self.door_name(door)))
            })
    }

    /// Score for a (door, size) pair in the door/size formulation.
    ///
    /// # Errors
    ///
    /// Returns [`MissingEntry`] if no score is declared for the pair.
    pub fn door_size_score(&self, door: DoorKey, size: SizeKey) -> Result<f64, MissingEntry> {
        let tables = self.door_size_tables()?;

        lookup(&tables.scores, &(door, size), "score", || {
            format!("({}, {})", self.door_name(door), self.size_name(size))
        })
        .copied()
    }

    /// Run ceiling for a SKU at its size in the door/size formulation.
    ///
    /// # Errors
    ///
    /// Returns [`MissingEntry`] if no ceiling is declared for the SKU.
    pub fn sku_max_runs(&self, sku: SkuKey) -> Result<u32, MissingEntry> {
        let tables = self.door_size_tables()?;

        lookup(&tables.max_runs, &sku, "max_runs", || {
            format!("SKU `{}`", self.sku_name(sku))
        })
        .copied()
    }

    /// Heat weight of a SKU in the door/size formulation.
    ///
    /// # Errors
    ///
    /// Returns [`MissingEntry`] if no heat weight is declared for the SKU.
    pub fn heat_weight(&self, sku: SkuKey) -> Result<f64, MissingEntry> {
        let tables = self.door_size_tables()?;

        lookup(&tables.heat_weights, &sku, "heat", || {
            format!("SKU `{}`", self.sku_name(sku))
        })
        .copied()
    }

    /// Per door/size anti-concentration cap in the door/size formulation.
    ///
    /// # Errors
    ///
    /// Returns [`MissingEntry`] if no cap is declared for the size.
    pub fn size_cap(&self, size: SizeKey) -> Result<f64, MissingEntry> {
        let tables = self.door_size_tables()?;

        lookup(&tables.cap_runs, &size, "cap_runs", || {
            format!("size `{}`", self.size_name(size))
        })
        .copied()
    }

    /// Heat label of a SKU in the tier/heat formulation.
    ///
    /// # Errors
    ///
    /// Returns [`MissingEntry`] if no heat label is declared for the SKU.
    pub fn sku_heat(&self, sku: SkuKey) -> Result<HeatKey, MissingEntry> {
        let tables = self.tier_heat_tables()?;

        lookup(&tables.sku_heat, &sku, "heat", || {
            format!("SKU `{}`", self.sku_name(sku))
        })
        .copied()
    }

    /// Score and run ceiling for a (tier, heat) pair in the tier/heat formulation.
    ///
    /// # Errors
    ///
    /// Returns [`MissingEntry`] if the pair is not declared.
    pub fn tier_heat_rule(
        &self,
        tier: TierKey,
        heat: HeatKey,
    ) -> Result<TierHeatRule, MissingEntry> {
        let tables = self.tier_heat_tables()?;

        lookup(&tables.rules, &(tier, heat), "tier_cap_runs", || {
            format!("({}, {})", self.tier_name(tier), self.heat_name(heat))
        })
        .copied()
    }

    /// Per door total-run cap for a tier in the tier/heat formulation.
    ///
    /// # Errors
    ///
    /// Returns [`MissingEntry`] if no cap is declared for the tier.
    pub fn tier_cap(&self, tier: TierKey) -> Result<f64, MissingEntry> {
        let tables = self.tier_heat_tables()?;

        lookup(&tables.cap_runs_total, &tier, "tier_capacity", || {
            format!("tier `{}`", self.tier_name(tier))
        })
        .copied()
    }

    /// Heat of a SKU as reported alongside its allocations.
    ///
    /// # Errors
    ///
    /// Returns [`MissingEntry`] if the SKU has no heat entry.
    pub fn heat_value(&self, sku: SkuKey) -> Result<HeatValue, MissingEntry> {
        match self.formulation {
            Formulation::DoorSize => self.heat_weight(sku).map(HeatValue::Weight),
            Formulation::TierHeat => self
                .sku_heat(sku)
                .map(|heat| HeatValue::Category(self.heat_name(heat).to_string())),
        }
    }

    fn door_size_tables(&self) -> Result<&DoorSizeTables, MissingEntry> {
        match &self.scoring {
            ScoringTables::DoorSize(tables) => Ok(tables),
            ScoringTables::TierHeat(_) => Err(MissingEntry::new(
                "door/size",
                format!("{} formulation", self.formulation),
            )),
        }
    }

    fn tier_heat_tables(&self) -> Result<&TierHeatTables, MissingEntry> {
        match &self.scoring {
            ScoringTables::TierHeat(tables) => Ok(tables),
            ScoringTables::DoorSize(_) => Err(MissingEntry::new(
                "tier/heat",
                format!("{} formulation", self.formulation),
            )),
        }
    }
}

/// Look up a key, failing with [`MissingEntry`] instead of substituting a default.
///
/// # Errors
///
/// Returns [`MissingEntry`] naming `table` and the key rendered by `describe`.
pub fn lookup<'m, K, V>(
    map: &'m FxHashMap<K, V>,
    key: &K,
    table: &'static str,
    describe: impl FnOnce() -> String,
) -> Result<&'m V, MissingEntry>
where
    K: Eq + Hash,
{
    map.get(key).ok_or_else(|| MissingEntry::new(table, describe()))
}
