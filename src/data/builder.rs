//! Allocation Data Builder

use std::{
    collections::hash_map::Entry,
    hash::Hash,
};

use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SlotMap;
use tracing::debug;

use crate::data::{
    AllocationData, Door, DoorKey, DoorSizeTables, Formulation, HeatKey, MissingEntry,
    ScoringTables, SizeKey, Sku, SkuKey, SupplyLimit, TierHeatRule, TierHeatTables, TierKey,
    ValidationError, tables::SupplyRecord,
};

/// Heat as supplied to the builder, before the formulation decides how to read it.
#[derive(Debug, Clone, PartialEq)]
enum HeatInput {
    Weight(f64),
    Label(String),
}

/// Collects raw, string-keyed entries and validates them into [`AllocationData`].
///
/// Entries are only checked in [`AllocationDataBuilder::build`], so the order in which they
/// are added does not matter. Duplicate keys are reported there as well.
#[derive(Debug, Clone)]
pub struct AllocationDataBuilder {
    formulation: Formulation,
    doors: Vec<(String, Option<String>)>,
    sizes: Vec<String>,
    articles: Vec<(String, String)>,
    eligibility: Vec<(String, String, u8)>,
    supply: Vec<SupplyRecord>,
    max_runs: Vec<(String, String, u32)>,
    heat: Vec<(String, HeatInput)>,
    scores: Vec<(String, String, f64)>,
    cap_runs: Vec<(String, f64)>,
    tier_rules: Vec<(String, String, TierHeatRule)>,
    tier_capacity: Vec<(String, f64)>,
    min_runs: Vec<(String, String, u32)>,
}

impl AllocationDataBuilder {
    /// Create an empty builder for the given formulation.
    pub fn new(formulation: Formulation) -> Self {
        Self {
            formulation,
            doors: Vec::new(),
            sizes: Vec::new(),
            articles: Vec::new(),
            eligibility: Vec::new(),
            supply: Vec::new(),
            max_runs: Vec::new(),
            heat: Vec::new(),
            scores: Vec::new(),
            cap_runs: Vec::new(),
            tier_rules: Vec::new(),
            tier_capacity: Vec::new(),
            min_runs: Vec::new(),
        }
    }

    /// Declare a door without a tier.
    #[must_use]
    pub fn door(mut self, name: impl Into<String>) -> Self {
        self.doors.push((name.into(), None));
        self
    }

    /// Declare a door belonging to a tier.
    #[must_use]
    pub fn door_in_tier(mut self, name: impl Into<String>, tier: impl Into<String>) -> Self {
        self.doors.push((name.into(), Some(tier.into())));
        self
    }

    /// Declare a size that may carry no SKUs (it still appears in door/size aggregates).
    #[must_use]
    pub fn size(mut self, name: impl Into<String>) -> Self {
        self.sizes.push(name.into());
        self
    }

    /// Declare a SKU and its single size.
    #[must_use]
    pub fn sku(mut self, name: impl Into<String>, size: impl Into<String>) -> Self {
        self.articles.push((name.into(), size.into()));
        self
    }

    /// Set the eligibility flag (0 or 1) for a door/SKU pair. Undeclared pairs are ineligible.
    #[must_use]
    pub fn eligible(mut self, door: impl Into<String>, sku: impl Into<String>, flag: u8) -> Self {
        self.eligibility.push((door.into(), sku.into(), flag));
        self
    }

    /// Add a supply row. A `max_runs` value on the row is recorded as the SKU's run ceiling.
    #[must_use]
    pub fn supply(mut self, record: SupplyRecord) -> Self {
        if let Some(max_runs) = record.max_runs {
            self.max_runs
                .push((record.sku.clone(), record.size.clone(), max_runs));
        }

        self.supply.push(record);
        self
    }

    /// Add a run-capped supply row.
    #[must_use]
    pub fn supply_runs(self, sku: impl Into<String>, size: impl Into<String>, runs: f64) -> Self {
        self.supply(SupplyRecord {
            sku: sku.into(),
            size: size.into(),
            supply: Some(runs),
            ..SupplyRecord::default()
        })
    }

    /// Add a unit-capped supply row with its units-per-run ratio.
    #[must_use]
    pub fn supply_units(
        self,
        sku: impl Into<String>,
        size: impl Into<String>,
        units: f64,
        ratio: f64,
    ) -> Self {
        self.supply(SupplyRecord {
            sku: sku.into(),
            size: size.into(),
            supply_units: Some(units),
            ratio: Some(ratio),
            ..SupplyRecord::default()
        })
    }

    /// Set the run ceiling for a SKU at its size (door/size formulation).
    #[must_use]
    pub fn max_runs(
        mut self,
        sku: impl Into<String>,
        size: impl Into<String>,
        max_runs: u32,
    ) -> Self {
        self.max_runs.push((sku.into(), size.into(), max_runs));
        self
    }

    /// Set a numeric heat weight for a SKU (door/size formulation).
    #[must_use]
    pub fn heat_weight(mut self, sku: impl Into<String>, weight: f64) -> Self {
        self.heat.push((sku.into(), HeatInput::Weight(weight)));
        self
    }

    /// Set a heat label for a SKU.
    ///
    /// The tier/heat formulation treats it as a category; the door/size formulation parses it
    /// as a number.
    #[must_use]
    pub fn heat_label(mut self, sku: impl Into<String>, label: impl Into<String>) -> Self {
        self.heat.push((sku.into(), HeatInput::Label(label.into())));
        self
    }

    /// Set the score for a (door, size) pair (door/size formulation).
    #[must_use]
    pub fn score(mut self, door: impl Into<String>, size: impl Into<String>, score: f64) -> Self {
        self.scores.push((door.into(), size.into(), score));
        self
    }

    /// Set the per door/size anti-concentration cap (door/size formulation).
    #[must_use]
    pub fn cap_runs(mut self, size: impl Into<String>, cap: f64) -> Self {
        self.cap_runs.push((size.into(), cap));
        self
    }

    /// Set score and run ceiling for a (tier, heat) pair (tier/heat formulation).
    ///
    /// The heat labels named here form the vocabulary SKU heat labels are checked against.
    #[must_use]
    pub fn tier_heat(
        mut self,
        tier: impl Into<String>,
        heat: impl Into<String>,
        max_runs: u32,
        score: f64,
    ) -> Self {
        self.tier_rules
            .push((tier.into(), heat.into(), TierHeatRule { max_runs, score }));
        self
    }

    /// Set the per door total-run cap for a tier (tier/heat formulation).
    #[must_use]
    pub fn tier_capacity(mut self, tier: impl Into<String>, cap_runs_total: f64) -> Self {
        self.tier_capacity.push((tier.into(), cap_runs_total));
        self
    }

    /// Declare a floor on the runs a door receives of a SKU.
    #[must_use]
    pub fn min_runs(mut self, door: impl Into<String>, sku: impl Into<String>, floor: u32) -> Self {
        self.min_runs.push((door.into(), sku.into(), floor));
        self
    }

    /// Validate every entry and build the immutable [`AllocationData`].
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found: unknown references, duplicate keys,
    /// negative quantities, heat labels missing from the tier/heat table, or missing lookup
    /// entries for any eligible door/SKU pair.
    pub fn build(self) -> Result<AllocationData, ValidationError> {
        let mut universe = Universe::default();

        universe.register_doors(&self.doors)?;

        for size in &self.sizes {
            universe.intern_size(size);
        }

        let articles = self.resolve_articles(&mut universe)?;
        let supply = self.resolve_supply(&universe, &articles)?;

        universe.register_skus(&articles, &supply)?;

        let eligible = self.resolve_eligibility(&universe)?;
        let min_runs = self.resolve_floors(&universe, &eligible)?;

        let scoring = match self.formulation {
            Formulation::DoorSize => {
                if !self.tier_rules.is_empty() || !self.tier_capacity.is_empty() {
                    debug!("ignoring tier/heat tables for the door/size formulation");
                }

                ScoringTables::DoorSize(self.door_size_tables(&universe, &eligible)?)
            }
            Formulation::TierHeat => {
                if !self.scores.is_empty() || !self.cap_runs.is_empty() || !self.max_runs.is_empty()
                {
                    debug!("ignoring door/size tables for the tier/heat formulation");
                }

                ScoringTables::TierHeat(self.tier_heat_tables(&mut universe, &eligible)?)
            }
        };

        debug!(
            formulation = %self.formulation,
            doors = universe.doors.len(),
            skus = universe.skus.len(),
            sizes = universe.sizes.len(),
            eligible_pairs = eligible.len(),
            floors = min_runs.len(),
            "validated allocation data"
        );

        Ok(AllocationData {
            formulation: self.formulation,
            doors: universe.doors,
            sizes: universe.sizes,
            skus: universe.skus,
            tiers: universe.tiers,
            heats: universe.heats,
            door_keys: universe.door_keys,
            sku_keys: universe.sku_keys,
            size_keys: universe.size_keys,
            eligible,
            min_runs,
            scoring,
        })
    }

    fn resolve_articles(
        &self,
        universe: &mut Universe,
    ) -> Result<Vec<(String, SizeKey)>, ValidationError> {
        let mut seen = FxHashSet::default();
        let mut articles = Vec::with_capacity(self.articles.len());

        for (sku, size) in &self.articles {
            if !seen.insert(sku.as_str()) {
                return Err(ValidationError::DuplicateKey {
                    table: "articles",
                    key: format!("`{sku}`"),
                });
            }

            articles.push((sku.clone(), universe.intern_size(size)));
        }

        Ok(articles)
    }

    fn resolve_supply(
        &self,
        universe: &Universe,
        articles: &[(String, SizeKey)],
    ) -> Result<FxHashMap<String, (SupplyLimit, Option<f64>)>, ValidationError> {
        let sku_sizes: FxHashMap<&str, SizeKey> = articles
            .iter()
            .map(|(sku, size)| (sku.as_str(), *size))
            .collect();

        let mut unit_capped: Option<bool> = None;
        let mut supply = FxHashMap::default();

        for row in &self.supply {
            let expected = sku_sizes.get(row.sku.as_str()).copied().ok_or_else(|| {
                ValidationError::UnknownReference {
                    table: "supply",
                    kind: "sku",
                    name: row.sku.clone(),
                }
            })?;

            universe.expect_size("supply", &row.sku, expected, &row.size)?;

            let ratio = row
                .ratio
                .map(|ratio| positive_ratio(&row.sku, ratio))
                .transpose()?;

            let key = || format!("({}, {})", row.sku, row.size);

            let (limit, is_units) = match (row.supply, row.supply_units) {
                (Some(_), None) if ratio.is_some() => {
                    return Err(ValidationError::RatioWithRunSupply {
                        sku: row.sku.clone(),
                    });
                }
                (Some(runs), None) => (
                    SupplyLimit::Runs(non_negative("supply", key, "supply", runs)?),
                    false,
                ),
                (None, Some(units)) => {
                    let ratio = ratio.ok_or_else(|| ValidationError::MissingRatio {
                        sku: row.sku.clone(),
                    })?;

                    let units = non_negative("supply", key, "supply_units", units)?;

                    (SupplyLimit::Units { units, ratio }, true)
                }
                _ => {
                    return Err(ValidationError::AmbiguousSupply {
                        sku: row.sku.clone(),
                    });
                }
            };

            match unit_capped {
                Some(mode) if mode != is_units => return Err(ValidationError::MixedSupplyModes),
                _ => unit_capped = Some(is_units),
            }

            insert_unique(&mut supply, row.sku.clone(), (limit, ratio), "supply", key)?;
        }

        Ok(supply)
    }

    fn resolve_eligibility(
        &self,
        universe: &Universe,
    ) -> Result<FxHashSet<(DoorKey, SkuKey)>, ValidationError> {
        let mut seen = FxHashSet::default();
        let mut eligible = FxHashSet::default();

        for (door, sku, flag) in &self.eligibility {
            let door_key = universe.door("eligibility", door)?;
            let sku_key = universe.sku("eligibility", sku)?;

            if !seen.insert((door_key, sku_key)) {
                return Err(ValidationError::DuplicateKey {
                    table: "eligibility",
                    key: format!("({door}, {sku})"),
                });
            }

            match flag {
                0 => {}
                1 => {
                    eligible.insert((door_key, sku_key));
                }
                other => {
                    return Err(ValidationError::InvalidEligibility {
                        door: door.clone(),
                        sku: sku.clone(),
                        value: *other,
                    });
                }
            }
        }

        Ok(eligible)
    }

    fn resolve_floors(
        &self,
        universe: &Universe,
        eligible: &FxHashSet<(DoorKey, SkuKey)>,
    ) -> Result<FxHashMap<(DoorKey, SkuKey), u32>, ValidationError> {
        let mut seen = FxHashSet::default();
        let mut floors = FxHashMap::default();

        for (door, sku, floor) in &self.min_runs {
            let door_key = universe.door("min_runs", door)?;
            let sku_key = universe.sku("min_runs", sku)?;

            if !seen.insert((door_key, sku_key)) {
                return Err(ValidationError::DuplicateKey {
                    table: "min_runs",
                    key: format!("({door}, {sku})"),
                });
            }

            // A zero floor is the same as no floor.
            if *floor == 0 {
                continue;
            }

            if !eligible.contains(&(door_key, sku_key)) {
                return Err(ValidationError::FloorOnIneligiblePair {
                    door: door.clone(),
                    sku: sku.clone(),
                });
            }

            floors.insert((door_key, sku_key), *floor);
        }

        Ok(floors)
    }

    fn door_size_tables(
        &self,
        universe: &Universe,
        eligible: &FxHashSet<(DoorKey, SkuKey)>,
    ) -> Result<DoorSizeTables, ValidationError> {
        let mut tables = DoorSizeTables::default();

        for (door, size, score) in &self.scores {
            let key = (universe.door("score", door)?, universe.size("score", size)?);
            let describe = || format!("({door}, {size})");

            if !score.is_finite() {
                return Err(ValidationError::InvalidScore {
                    key: describe(),
                    value: *score,
                });
            }

            insert_unique(&mut tables.scores, key, *score, "score", describe)?;
        }

        for (sku, size, max_runs) in &self.max_runs {
            let sku_key = universe.sku("max_runs", sku)?;
            let expected = universe.sku_size(sku_key)?;

            universe.expect_size("max_runs", sku, expected, size)?;

            insert_unique(&mut tables.max_runs, sku_key, *max_runs, "max_runs", || {
                format!("({sku}, {size})")
            })?;
        }

        for (sku, heat) in &self.heat {
            let sku_key = universe.sku("heat", sku)?;

            let weight = match heat {
                HeatInput::Weight(weight) => *weight,
                HeatInput::Label(raw) => raw.trim().parse::<f64>().map_err(|_err| {
                    ValidationError::InvalidHeatWeight {
                        sku: sku.clone(),
                        value: raw.clone(),
                    }
                })?,
            };

            let describe = || format!("`{sku}`");
            let weight = non_negative("heat", describe, "heat", weight)?;

            insert_unique(&mut tables.heat_weights, sku_key, weight, "heat", describe)?;
        }

        for (size, cap) in &self.cap_runs {
            let size_key = universe.size("cap_runs", size)?;
            let describe = || format!("`{size}`");
            let cap = non_negative("cap_runs", describe, "cap_runs", *cap)?;

            insert_unique(&mut tables.cap_runs, size_key, cap, "cap_runs", describe)?;
        }

        // Every lookup an eligible pair can trigger must resolve.
        for (door_key, door) in &universe.doors {
            for (sku_key, sku) in &universe.skus {
                if !eligible.contains(&(door_key, sku_key)) {
                    continue;
                }

                let size_name = universe.sizes.get(sku.size).map_or("", String::as_str);

                if !tables.scores.contains_key(&(door_key, sku.size)) {
                    return Err(MissingEntry::new(
                        "score",
                        format!("({}, {size_name})", door.name),
                    )
                    .into());
                }

                if !tables.max_runs.contains_key(&sku_key) {
                    return Err(MissingEntry::new(
                        "max_runs",
                        format!("({}, {size_name})", sku.name),
                    )
                    .into());
                }

                if !tables.heat_weights.contains_key(&sku_key) {
                    return Err(MissingEntry::new("heat", format!("`{}`", sku.name)).into());
                }

                if !tables.cap_runs.contains_key(&sku.size) {
                    return Err(MissingEntry::new("cap_runs", format!("`{size_name}`")).into());
                }
            }
        }

        Ok(tables)
    }

    fn tier_heat_tables(
        &self,
        universe: &mut Universe,
        eligible: &FxHashSet<(DoorKey, SkuKey)>,
    ) -> Result<TierHeatTables, ValidationError> {
        let mut tables = TierHeatTables::default();

        for (tier, heat, rule) in &self.tier_rules {
            let tier_key = universe.tier("tier_cap_runs", tier)?;
            let heat_key = universe.intern_heat(heat);
            let describe = || format!("({tier}, {heat})");

            if !rule.score.is_finite() {
                return Err(ValidationError::InvalidScore {
                    key: describe(),
                    value: rule.score,
                });
            }

            insert_unique(
                &mut tables.rules,
                (tier_key, heat_key),
                *rule,
                "tier_cap_runs",
                describe,
            )?;
        }

        for (tier, cap) in &self.tier_capacity {
            let tier_key = universe.tier("tier_capacity", tier)?;
            let describe = || format!("`{tier}`");
            let cap = non_negative("tier_capacity", describe, "cap_runs_total", *cap)?;

            insert_unique(
                &mut tables.cap_runs_total,
                tier_key,
                cap,
                "tier_capacity",
                describe,
            )?;
        }

        for (sku, heat) in &self.heat {
            let sku_key = universe.sku("heat", sku)?;

            let HeatInput::Label(label) = heat else {
                return Err(ValidationError::UnexpectedHeatWeight { sku: sku.clone() });
            };

            // The tier/heat table defines the heat vocabulary; anything else is a data error.
            let heat_key = universe.heat_keys.get(label).copied().ok_or_else(|| {
                ValidationError::UnknownHeat {
                    sku: sku.clone(),
                    heat: label.clone(),
                }
            })?;

            insert_unique(&mut tables.sku_heat, sku_key, heat_key, "heat", || {
                format!("`{sku}`")
            })?;
        }

        for (door_key, door) in &universe.doors {
            for (sku_key, sku) in &universe.skus {
                if !eligible.contains(&(door_key, sku_key)) {
                    continue;
                }

                let tier = door.tier.ok_or_else(|| {
                    MissingEntry::new("doors", format!("tier of door `{}`", door.name))
                })?;

                let heat = tables
                    .sku_heat
                    .get(&sku_key)
                    .copied()
                    .ok_or_else(|| MissingEntry::new("heat", format!("`{}`", sku.name)))?;

                let tier_name = universe.tiers.get(tier).map_or("", String::as_str);

                if !tables.rules.contains_key(&(tier, heat)) {
                    let heat_name = universe.heats.get(heat).map_or("", String::as_str);

                    return Err(MissingEntry::new(
                        "tier_cap_runs",
                        format!("({tier_name}, {heat_name})"),
                    )
                    .into());
                }

                if !tables.cap_runs_total.contains_key(&tier) {
                    return Err(
                        MissingEntry::new("tier_capacity", format!("`{tier_name}`")).into(),
                    );
                }
            }
        }

        Ok(tables)
    }
}

/// Identifier universes interned while building.
#[derive(Debug, Default)]
struct Universe {
    doors: SlotMap<DoorKey, Door>,
    sizes: SlotMap<SizeKey, String>,
    skus: SlotMap<SkuKey, Sku>,
    tiers: SlotMap<TierKey, String>,
    heats: SlotMap<HeatKey, String>,
    door_keys: FxHashMap<String, DoorKey>,
    sku_keys: FxHashMap<String, SkuKey>,
    size_keys: FxHashMap<String, SizeKey>,
    tier_keys: FxHashMap<String, TierKey>,
    heat_keys: FxHashMap<String, HeatKey>,
}

impl Universe {
    fn register_doors(&mut self, doors: &[(String, Option<String>)]) -> Result<(), ValidationError> {
        for (name, tier) in doors {
            if self.door_keys.contains_key(name) {
                return Err(ValidationError::DuplicateKey {
                    table: "doors",
                    key: format!("`{name}`"),
                });
            }

            let tier = tier.as_deref().map(|tier| self.intern_tier(tier));
            let key = self.doors.insert(Door {
                name: name.clone(),
                tier,
            });

            self.door_keys.insert(name.clone(), key);
        }

        Ok(())
    }

    fn register_skus(
        &mut self,
        articles: &[(String, SizeKey)],
        supply: &FxHashMap<String, (SupplyLimit, Option<f64>)>,
    ) -> Result<(), ValidationError> {
        for (name, size) in articles {
            let (limit, ratio) = supply.get(name).copied().ok_or_else(|| {
                let size_name = self.sizes.get(*size).map_or("", String::as_str);

                MissingEntry::new("supply", format!("({name}, {size_name})"))
            })?;

            let key = self.skus.insert(Sku {
                name: name.clone(),
                size: *size,
                supply: limit,
                ratio,
                units_per_run: ratio.unwrap_or(1.0),
            });

            self.sku_keys.insert(name.clone(), key);
        }

        Ok(())
    }

    fn intern_size(&mut self, name: &str) -> SizeKey {
        if let Some(key) = self.size_keys.get(name) {
            return *key;
        }

        let key = self.sizes.insert(name.to_string());
        self.size_keys.insert(name.to_string(), key);

        key
    }

    fn intern_tier(&mut self, name: &str) -> TierKey {
        if let Some(key) = self.tier_keys.get(name) {
            return *key;
        }

        let key = self.tiers.insert(name.to_string());
        self.tier_keys.insert(name.to_string(), key);

        key
    }

    fn intern_heat(&mut self, name: &str) -> HeatKey {
        if let Some(key) = self.heat_keys.get(name) {
            return *key;
        }

        let key = self.heats.insert(name.to_string());
        self.heat_keys.insert(name.to_string(), key);

        key
    }

    fn door(&self, table: &'static str, name: &str) -> Result<DoorKey, ValidationError> {
        resolve(&self.door_keys, table, "door", name)
    }

    fn sku(&self, table: &'static str, name: &str) -> Result<SkuKey, ValidationError> {
        resolve(&self.sku_keys, table, "sku", name)
    }

    fn size(&self, table: &'static str, name: &str) -> Result<SizeKey, ValidationError> {
        resolve(&self.size_keys, table, "size", name)
    }

    fn tier(&self, table: &'static str, name: &str) -> Result<TierKey, ValidationError> {
        resolve(&self.tier_keys, table, "tier", name)
    }

    fn sku_size(&self, sku: SkuKey) -> Result<SizeKey, MissingEntry> {
        self.skus
            .get(sku)
            .map(|sku| sku.size)
            .ok_or_else(|| MissingEntry::new("articles", "unknown SKU key"))
    }

    /// Check that a row keyed by (SKU, size) uses the SKU's own size.
    fn expect_size(
        &self,
        table: &'static str,
        sku: &str,
        expected: SizeKey,
        found: &str,
    ) -> Result<(), ValidationError> {
        let found_key = self.size(table, found)?;

        if found_key == expected {
            return Ok(());
        }

        Err(ValidationError::SizeMismatch {
            table,
            sku: sku.to_string(),
            expected: self.sizes.get(expected).cloned().unwrap_or_default(),
            found: found.to_string(),
        })
    }
}

fn resolve<K: Copy>(
    keys: &FxHashMap<String, K>,
    table: &'static str,
    kind: &'static str,
    name: &str,
) -> Result<K, ValidationError> {
    keys.get(name)
        .copied()
        .ok_or_else(|| ValidationError::UnknownReference {
            table,
            kind,
            name: name.to_string(),
        })
}

fn insert_unique<K: Eq + Hash, V>(
    map: &mut FxHashMap<K, V>,
    key: K,
    value: V,
    table: &'static str,
    describe: impl FnOnce() -> String,
) -> Result<(), ValidationError> {
    match map.entry(key) {
        Entry::Occupied(_) => Err(ValidationError::DuplicateKey {
            table,
            key: describe(),
        }),
        Entry::Vacant(slot) => {
            slot.insert(value);

            Ok(())
        }
    }
}

fn non_negative(
    table: &'static str,
    key: impl FnOnce() -> String,
    field: &'static str,
    value: f64,
) -> Result<f64, ValidationError> {
    if value.is_finite() && value >= 0.0 {
        return Ok(value);
    }

    Err(ValidationError::InvalidQuantity {
        table,
        key: key(),
        field,
        value,
    })
}

fn positive_ratio(sku: &str, ratio: f64) -> Result<f64, ValidationError> {
    if ratio.is_finite() && ratio > 0.0 {
        return Ok(ratio);
    }

    Err(ValidationError::InvalidRatio {
        sku: sku.to_string(),
        value: ratio,
    })
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::data::test_support::{toy_door_size, toy_door_size_builder, toy_tier_heat_builder};

    use super::*;

    #[test]
    fn toy_data_omits_ineligible_pairs() -> TestResult {
        let data = toy_door_size()?;

        let d1 = data.door_key("D1").ok_or("missing D1")?;
        let d2 = data.door_key("D2").ok_or("missing D2")?;
        let sku1 = data.sku_key("SKU1").ok_or("missing SKU1")?;
        let sku2 = data.sku_key("SKU2").ok_or("missing SKU2")?;

        assert!(data.is_eligible(d1, sku1));
        assert!(data.is_eligible(d1, sku2));
        assert!(data.is_eligible(d2, sku1));
        assert!(!data.is_eligible(d2, sku2));

        Ok(())
    }

    #[test]
    fn duplicate_door_is_rejected() {
        let result = toy_door_size_builder().door("D1").build();

        assert!(matches!(
            result,
            Err(ValidationError::DuplicateKey { table: "doors", .. })
        ));
    }

    #[test]
    fn duplicate_eligibility_is_rejected() {
        let result = toy_door_size_builder().eligible("D1", "SKU1", 0).build();

        assert!(matches!(
            result,
            Err(ValidationError::DuplicateKey {
                table: "eligibility",
                ..
            })
        ));
    }

    #[test]
    fn unknown_door_reference_is_rejected() {
        let result = toy_door_size_builder().eligible("D9", "SKU1", 1).build();

        assert_eq!(
            result.err(),
            Some(ValidationError::UnknownReference {
                table: "eligibility",
                kind: "door",
                name: "D9".to_string(),
            })
        );
    }

    #[test]
    fn eligibility_flag_must_be_binary() {
        let result = AllocationData::builder(Formulation::DoorSize)
            .door("D1")
            .sku("SKU1", "S")
            .supply_runs("SKU1", "S", 1.0)
            .eligible("D1", "SKU1", 2)
            .build();

        assert!(matches!(
            result,
            Err(ValidationError::InvalidEligibility { value: 2, .. })
        ));
    }

    #[test]
    fn missing_score_for_eligible_pair_is_an_error() {
        let result = AllocationData::builder(Formulation::DoorSize)
            .door("D1")
            .sku("SKU1", "S")
            .supply_runs("SKU1", "S", 1.0)
            .max_runs("SKU1", "S", 1)
            .heat_weight("SKU1", 1.0)
            .cap_runs("S", 1.0)
            .eligible("D1", "SKU1", 1)
            .build();

        assert_eq!(
            result.err(),
            Some(ValidationError::MissingEntry(MissingEntry::new(
                "score", "(D1, S)"
            )))
        );
    }

    #[test]
    fn missing_score_for_ineligible_pair_is_allowed() -> TestResult {
        // D2 has no score at M, which is fine since D2 cannot receive SKU1.
        let data = AllocationData::builder(Formulation::DoorSize)
            .door("D1")
            .door("D2")
            .sku("SKU1", "M")
            .supply_runs("SKU1", "M", 1.0)
            .max_runs("SKU1", "M", 1)
            .heat_weight("SKU1", 1.0)
            .cap_runs("M", 1.0)
            .score("D1", "M", 3.0)
            .eligible("D1", "SKU1", 1)
            .eligible("D2", "SKU1", 0)
            .build()?;

        assert_eq!(data.door_count(), 2);

        Ok(())
    }

    #[test]
    fn negative_supply_is_rejected() {
        let result = AllocationData::builder(Formulation::DoorSize)
            .sku("SKU1", "S")
            .supply_runs("SKU1", "S", -1.0)
            .build();

        assert!(matches!(
            result,
            Err(ValidationError::InvalidQuantity {
                table: "supply",
                field: "supply",
                ..
            })
        ));
    }

    #[test]
    fn zero_ratio_is_rejected() {
        let result = AllocationData::builder(Formulation::TierHeat)
            .sku("SKU1", "S")
            .supply_units("SKU1", "S", 10.0, 0.0)
            .build();

        assert!(matches!(
            result,
            Err(ValidationError::InvalidRatio { value, .. }) if value == 0.0
        ));
    }

    #[test]
    fn unit_supply_requires_ratio() {
        let result = AllocationData::builder(Formulation::TierHeat)
            .sku("SKU1", "S")
            .supply(SupplyRecord {
                sku: "SKU1".to_string(),
                size: "S".to_string(),
                supply_units: Some(10.0),
                ..SupplyRecord::default()
            })
            .build();

        assert_eq!(
            result.err(),
            Some(ValidationError::MissingRatio {
                sku: "SKU1".to_string()
            })
        );
    }

    #[test]
    fn ratio_on_run_capped_supply_is_rejected() {
        let result = AllocationData::builder(Formulation::DoorSize)
            .sku("SKU1", "S")
            .supply(SupplyRecord {
                sku: "SKU1".to_string(),
                size: "S".to_string(),
                supply: Some(5.0),
                ratio: Some(4.0),
                max_runs: Some(5),
                ..SupplyRecord::default()
            })
            .build();

        assert_eq!(
            result.err(),
            Some(ValidationError::RatioWithRunSupply {
                sku: "SKU1".to_string()
            })
        );
    }

    #[test]
    fn mixed_supply_modes_are_rejected() {
        let result = AllocationData::builder(Formulation::TierHeat)
            .sku("SKU1", "S")
            .sku("SKU2", "S")
            .supply_units("SKU1", "S", 10.0, 2.0)
            .supply_runs("SKU2", "S", 3.0)
            .build();

        assert_eq!(result.err(), Some(ValidationError::MixedSupplyModes));
    }

    #[test]
    fn supply_at_another_size_is_rejected() {
        let result = AllocationData::builder(Formulation::DoorSize)
            .sku("SKU1", "S")
            .sku("SKU2", "M")
            .supply_runs("SKU1", "M", 3.0)
            .build();

        assert!(matches!(
            result,
            Err(ValidationError::SizeMismatch { table: "supply", .. })
        ));
    }

    #[test]
    fn every_sku_needs_supply() {
        let result = AllocationData::builder(Formulation::DoorSize)
            .sku("SKU1", "S")
            .build();

        assert_eq!(
            result.err(),
            Some(ValidationError::MissingEntry(MissingEntry::new(
                "supply",
                "(SKU1, S)"
            )))
        );
    }

    #[test]
    fn floor_on_ineligible_pair_is_rejected() {
        let result = toy_door_size_builder().min_runs("D2", "SKU2", 1).build();

        assert_eq!(
            result.err(),
            Some(ValidationError::FloorOnIneligiblePair {
                door: "D2".to_string(),
                sku: "SKU2".to_string(),
            })
        );
    }

    #[test]
    fn zero_floor_is_dropped() -> TestResult {
        let data = toy_door_size_builder().min_runs("D2", "SKU2", 0).build()?;

        let d2 = data.door_key("D2").ok_or("missing D2")?;
        let sku2 = data.sku_key("SKU2").ok_or("missing SKU2")?;

        assert_eq!(data.min_runs(d2, sku2), None);

        Ok(())
    }

    #[test]
    fn non_numeric_heat_weight_is_rejected() {
        let result = AllocationData::builder(Formulation::DoorSize)
            .sku("SKU1", "S")
            .supply_runs("SKU1", "S", 1.0)
            .heat_label("SKU1", "Hype")
            .build();

        assert_eq!(
            result.err(),
            Some(ValidationError::InvalidHeatWeight {
                sku: "SKU1".to_string(),
                value: "Hype".to_string(),
            })
        );
    }

    #[test]
    fn unknown_heat_label_is_rejected() {
        let result = toy_tier_heat_builder()
            .sku("SKU9", "M")
            .supply_units("SKU9", "M", 4.0, 4.0)
            .heat_label("SKU9", "Limited")
            .build();

        assert_eq!(
            result.err(),
            Some(ValidationError::UnknownHeat {
                sku: "SKU9".to_string(),
                heat: "Limited".to_string(),
            })
        );
    }

    #[test]
    fn tier_heat_rejects_numeric_heat() {
        let result = toy_tier_heat_builder()
            .sku("SKU9", "M")
            .supply_units("SKU9", "M", 4.0, 4.0)
            .heat_weight("SKU9", 1.0)
            .build();

        assert_eq!(
            result.err(),
            Some(ValidationError::UnexpectedHeatWeight {
                sku: "SKU9".to_string()
            })
        );
    }

    #[test]
    fn tier_rule_for_undeclared_tier_is_rejected() {
        let result = toy_tier_heat_builder().tier_heat("Z", "Hype", 1, 1.0).build();

        assert!(matches!(
            result,
            Err(ValidationError::UnknownReference {
                table: "tier_cap_runs",
                kind: "tier",
                ..
            })
        ));
    }

    #[test]
    fn eligible_door_without_tier_is_rejected() {
        let result = toy_tier_heat_builder()
            .door("D9")
            .eligible("D9", "SKU1", 1)
            .build();

        assert_eq!(
            result.err(),
            Some(ValidationError::MissingEntry(MissingEntry::new(
                "doors",
                "tier of door `D9`"
            )))
        );
    }

    #[test]
    fn missing_tier_capacity_is_rejected() {
        let result = AllocationData::builder(Formulation::TierHeat)
            .door_in_tier("D1", "A")
            .sku("SKU1", "M")
            .supply_units("SKU1", "M", 8.0, 4.0)
            .heat_label("SKU1", "Hype")
            .tier_heat("A", "Hype", 2, 5.0)
            .eligible("D1", "SKU1", 1)
            .build();

        assert_eq!(
            result.err(),
            Some(ValidationError::MissingEntry(MissingEntry::new(
                "tier_capacity",
                "`A`"
            )))
        );
    }

    #[test]
    fn ratio_resolves_units_per_run_once() -> TestResult {
        let data = toy_tier_heat_builder().build()?;

        let sku1 = data.sku_key("SKU1").ok_or("missing SKU1")?;
        let sku = data.sku(sku1).ok_or("missing SKU1 entry")?;

        assert_eq!(sku.ratio(), Some(4.0));
        assert!((sku.units_per_run() - 4.0).abs() < f64::EPSILON);

        Ok(())
    }
}
