//! Tabular Records
//!
//! One record type per input table. Column names are the serde field names, so the same
//! records deserialize from CSV rows and from YAML fixtures.

use std::fmt;

use serde::{
    Deserialize, Deserializer, Serialize,
    de::{self, Visitor},
};

use crate::data::{AllocationDataBuilder, Formulation};

/// Row of the `doors` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoorRecord {
    /// Door identifier
    pub door: String,

    /// Tier, required by the tier/heat formulation
    #[serde(default)]
    pub tier: Option<String>,
}

/// Row of the `articles` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// SKU identifier
    pub sku: String,

    /// The SKU's size
    pub size: String,
}

/// Row of the `eligibility` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityRecord {
    /// Door identifier
    pub door: String,

    /// SKU identifier
    pub sku: String,

    /// 1 if the door may receive the SKU, 0 otherwise
    pub eligible: u8,
}

/// Row of the `supply` table.
///
/// Exactly one of `supply` (runs) and `supply_units` must be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplyRecord {
    /// SKU identifier
    pub sku: String,

    /// The SKU's size
    pub size: String,

    /// Run-capped supply
    #[serde(default)]
    pub supply: Option<f64>,

    /// Unit-capped supply
    #[serde(default)]
    pub supply_units: Option<f64>,

    /// Units shipped per run
    #[serde(default)]
    pub ratio: Option<f64>,

    /// Run ceiling per door (door/size formulation)
    #[serde(default)]
    pub max_runs: Option<u32>,
}

/// Row of the `heat` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatRecord {
    /// SKU identifier
    pub sku: String,

    /// Heat cell as written; the formulation decides whether it is a weight or a label
    #[serde(deserialize_with = "heat_cell")]
    pub heat: String,
}

/// Row of the `tier_cap_runs` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierHeatRecord {
    /// Tier
    pub tier: String,

    /// Heat label
    #[serde(deserialize_with = "heat_cell")]
    pub heat: String,

    /// Run ceiling per door/SKU
    pub max_runs: u32,

    /// Objective score per run
    pub score: f64,
}

/// Row of the `tier_capacity` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierCapacityRecord {
    /// Tier
    pub tier: String,

    /// Total runs a door of this tier may receive
    pub cap_runs_total: f64,
}

/// Row of the `score` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Door identifier
    pub door: String,

    /// Size
    pub size: String,

    /// Objective score per run
    pub score: f64,
}

/// Row of the `cap_runs` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapRunsRecord {
    /// Size
    pub size: String,

    /// Heat-weighted runs a door may receive at this size
    pub cap_runs: f64,
}

/// Row of the `min_runs` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinRunsRecord {
    /// Door identifier
    pub door: String,

    /// SKU identifier
    pub sku: String,

    /// Floor on runs
    pub min_runs: u32,
}

/// All input tables for one allocation run.
///
/// Tables the formulation does not use may be left empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationTables {
    /// Named formulation
    #[serde(default)]
    pub formulation: Formulation,

    /// `doors` table
    #[serde(default)]
    pub doors: Vec<DoorRecord>,

    /// `articles` table
    #[serde(default)]
    pub articles: Vec<ArticleRecord>,

    /// `eligibility` table
    #[serde(default)]
    pub eligibility: Vec<EligibilityRecord>,

    /// `supply` table
    #[serde(default)]
    pub supply: Vec<SupplyRecord>,

    /// `heat` table
    #[serde(default)]
    pub heat: Vec<HeatRecord>,

    /// `tier_cap_runs` table
    #[serde(default)]
    pub tier_cap_runs: Vec<TierHeatRecord>,

    /// `tier_capacity` table
    #[serde(default)]
    pub tier_capacity: Vec<TierCapacityRecord>,

    /// `score` table
    #[serde(default)]
    pub score: Vec<ScoreRecord>,

    /// `cap_runs` table
    #[serde(default)]
    pub cap_runs: Vec<CapRunsRecord>,

    /// `min_runs` table
    #[serde(default)]
    pub min_runs: Vec<MinRunsRecord>,
}

impl AllocationTables {
    /// Feed every record into a builder, one entry per row.
    pub fn into_builder(self) -> AllocationDataBuilder {
        let mut builder = AllocationDataBuilder::new(self.formulation);

        for DoorRecord { door, tier } in self.doors {
            builder = match tier {
                Some(tier) => builder.door_in_tier(door, tier),
                None => builder.door(door),
            };
        }

        for ArticleRecord { sku, size } in self.articles {
            builder = builder.sku(sku, size);
        }

        for EligibilityRecord { door, sku, eligible } in self.eligibility {
            builder = builder.eligible(door, sku, eligible);
        }

        for record in self.supply {
            builder = builder.supply(record);
        }

        for HeatRecord { sku, heat } in self.heat {
            builder = builder.heat_label(sku, heat);
        }

        for TierHeatRecord {
            tier,
            heat,
            max_runs,
            score,
        } in self.tier_cap_runs
        {
            builder = builder.tier_heat(tier, heat, max_runs, score);
        }

        for TierCapacityRecord {
            tier,
            cap_runs_total,
        } in self.tier_capacity
        {
            builder = builder.tier_capacity(tier, cap_runs_total);
        }

        for ScoreRecord { door, size, score } in self.score {
            builder = builder.score(door, size, score);
        }

        for CapRunsRecord { size, cap_runs } in self.cap_runs {
            builder = builder.cap_runs(size, cap_runs);
        }

        for MinRunsRecord {
            door,
            sku,
            min_runs,
        } in self.min_runs
        {
            builder = builder.min_runs(door, sku, min_runs);
        }

        builder
    }
}

/// Read a heat cell as text, keeping numeric-looking labels such as `3` as written.
fn heat_cell<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    struct HeatCell;

    impl Visitor<'_> for HeatCell {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a heat label or weight")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_string<E: de::Error>(self, value: String) -> Result<String, E> {
            Ok(value)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<String, E> {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_string(HeatCell)
}
