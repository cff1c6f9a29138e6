//! Validation Errors

use thiserror::Error;

/// A lookup against a validated table found no entry for the requested key.
///
/// Lookups never fall back to a default value; an absent key always surfaces as this error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing {table} entry for {key}")]
pub struct MissingEntry {
    /// Table the lookup was made against
    pub table: &'static str,

    /// Rendered key that was looked up
    pub key: String,
}

impl MissingEntry {
    /// Create a missing entry error for the given table and rendered key.
    pub fn new(table: &'static str, key: impl Into<String>) -> Self {
        Self {
            table,
            key: key.into(),
        }
    }
}

/// Errors raised while constructing [`AllocationData`](super::AllocationData).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// The same key appears more than once in a table that requires uniqueness.
    #[error("duplicate key {key} in {table} table")]
    DuplicateKey {
        /// Table containing the duplicate
        table: &'static str,
        /// Rendered duplicate key
        key: String,
    },

    /// A table references a door, SKU, size or tier that was never declared.
    #[error("{table} table references unknown {kind} `{name}`")]
    UnknownReference {
        /// Table containing the reference
        table: &'static str,
        /// Kind of identifier (door, sku, size, tier)
        kind: &'static str,
        /// Unresolved identifier
        name: String,
    },

    /// A SKU carries a heat label that the tier/heat table does not define.
    #[error("SKU `{sku}` has heat `{heat}`, which is not defined in the tier/heat table")]
    UnknownHeat {
        /// SKU identifier
        sku: String,
        /// Heat label
        heat: String,
    },

    /// A required lookup entry is absent.
    #[error(transparent)]
    MissingEntry(#[from] MissingEntry),

    /// A table is missing a column that the formulation requires.
    #[error("{table} table is missing required column `{column}`")]
    MissingColumn {
        /// Table name
        table: &'static str,
        /// Missing column name
        column: &'static str,
    },

    /// A supply, cap or run quantity is negative or not finite.
    #[error("{field} for {key} in {table} table must be a non-negative finite number, got {value}")]
    InvalidQuantity {
        /// Table name
        table: &'static str,
        /// Rendered row key
        key: String,
        /// Column holding the value
        field: &'static str,
        /// Offending value
        value: f64,
    },

    /// A units-per-run ratio is zero, negative or not finite.
    #[error("ratio for SKU `{sku}` must be a positive finite number, got {value}")]
    InvalidRatio {
        /// SKU identifier
        sku: String,
        /// Offending ratio
        value: f64,
    },

    /// A score is not a finite number.
    #[error("score for {key} must be finite, got {value}")]
    InvalidScore {
        /// Rendered score key
        key: String,
        /// Offending score
        value: f64,
    },

    /// An eligibility flag is neither 0 nor 1.
    #[error("eligible flag for ({door}, {sku}) must be 0 or 1, got {value}")]
    InvalidEligibility {
        /// Door identifier
        door: String,
        /// SKU identifier
        sku: String,
        /// Offending flag
        value: u8,
    },

    /// A heat weight in the door/size formulation is not numeric.
    #[error("heat weight for SKU `{sku}` is not a number: `{value}`")]
    InvalidHeatWeight {
        /// SKU identifier
        sku: String,
        /// Raw heat value
        value: String,
    },

    /// A numeric heat weight was supplied to the tier/heat formulation, which expects labels.
    #[error("heat for SKU `{sku}` must be a categorical label in the tier/heat formulation")]
    UnexpectedHeatWeight {
        /// SKU identifier
        sku: String,
    },

    /// A row keyed by (SKU, size) names a size other than the SKU's own size.
    #[error("{table} row for SKU `{sku}` is at size `{found}`, but the SKU is size `{expected}`")]
    SizeMismatch {
        /// Table name
        table: &'static str,
        /// SKU identifier
        sku: String,
        /// Size declared for the SKU in the articles table
        expected: String,
        /// Size found in the row
        found: String,
    },

    /// A supply row sets both or neither of `supply` and `supply_units`.
    #[error("supply row for SKU `{sku}` must set exactly one of `supply` or `supply_units`")]
    AmbiguousSupply {
        /// SKU identifier
        sku: String,
    },

    /// The supply table mixes run-capped and unit-capped rows.
    #[error("supply table mixes run-capped (`supply`) and unit-capped (`supply_units`) rows")]
    MixedSupplyModes,

    /// A unit-capped supply row has no ratio to convert runs into units.
    #[error("unit-capped supply for SKU `{sku}` requires a ratio")]
    MissingRatio {
        /// SKU identifier
        sku: String,
    },

    /// A run-capped supply row also carries a ratio, which only applies to unit caps.
    #[error("run-capped supply for SKU `{sku}` cannot carry a ratio; use supply_units instead")]
    RatioWithRunSupply {
        /// SKU identifier
        sku: String,
    },

    /// A positive floor was declared for a door/SKU pair that is not eligible.
    #[error("minimum runs declared for ineligible pair ({door}, {sku})")]
    FloorOnIneligiblePair {
        /// Door identifier
        door: String,
        /// SKU identifier
        sku: String,
    },
}
