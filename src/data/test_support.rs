//! Shared test data

use crate::data::{AllocationData, AllocationDataBuilder, Formulation, ValidationError};

/// Two doors, two sizes, two SKUs; `(D2, SKU2)` is ineligible.
pub(crate) fn toy_door_size_builder() -> AllocationDataBuilder {
    AllocationData::builder(Formulation::DoorSize)
        .door("D1")
        .door("D2")
        .sku("SKU1", "S")
        .sku("SKU2", "M")
        .score("D1", "S", 10.0)
        .score("D1", "M", 8.0)
        .score("D2", "S", 9.0)
        .score("D2", "M", 7.0)
        .eligible("D1", "SKU1", 1)
        .eligible("D1", "SKU2", 1)
        .eligible("D2", "SKU1", 1)
        .eligible("D2", "SKU2", 0)
        .supply_runs("SKU1", "S", 5.0)
        .supply_runs("SKU2", "M", 3.0)
        .max_runs("SKU1", "S", 3)
        .max_runs("SKU2", "M", 2)
        .cap_runs("S", 10.0)
        .cap_runs("M", 10.0)
        .heat_weight("SKU1", 1.0)
        .heat_weight("SKU2", 1.2)
}

pub(crate) fn toy_door_size() -> Result<AllocationData, ValidationError> {
    toy_door_size_builder().build()
}

/// Three doors over two tiers, unit-capped supply; `(D3, SKU2)` is ineligible.
pub(crate) fn toy_tier_heat_builder() -> AllocationDataBuilder {
    AllocationData::builder(Formulation::TierHeat)
        .door_in_tier("D1", "A")
        .door_in_tier("D2", "B")
        .door_in_tier("D3", "B")
        .sku("SKU1", "M")
        .sku("SKU2", "L")
        .supply_units("SKU1", "M", 24.0, 4.0)
        .supply_units("SKU2", "L", 12.0, 6.0)
        .heat_label("SKU1", "Hype")
        .heat_label("SKU2", "Core")
        .tier_heat("A", "Hype", 3, 10.0)
        .tier_heat("A", "Core", 2, 4.0)
        .tier_heat("B", "Hype", 2, 6.0)
        .tier_heat("B", "Core", 2, 3.0)
        .tier_capacity("A", 4.0)
        .tier_capacity("B", 3.0)
        .eligible("D1", "SKU1", 1)
        .eligible("D1", "SKU2", 1)
        .eligible("D2", "SKU1", 1)
        .eligible("D2", "SKU2", 1)
        .eligible("D3", "SKU1", 1)
        .eligible("D3", "SKU2", 0)
}

pub(crate) fn toy_tier_heat() -> Result<AllocationData, ValidationError> {
    toy_tier_heat_builder().build()
}
