//! Anti-concentration Caps
//!
//! A [`ConcentrationCap`] limits how much of the allocation a single door can absorb.

use std::fmt;

use crate::{
    data::{AllocationData, MissingEntry},
    model::{
        observer::ModelObserver,
        state::{ConstraintFamily, ConstraintScope, ModelState},
    },
    solver::Terms,
};

/// Emits the anti-concentration constraint family.
pub trait ConcentrationCap: fmt::Debug {
    /// Add one constraint per capped group that has at least one run variable.
    ///
    /// # Errors
    ///
    /// Returns [`MissingEntry`] if a cap or weight lookup fails.
    fn add_constraints(
        &self,
        data: &AllocationData,
        state: &mut ModelState,
        observer: &mut dyn ModelObserver,
    ) -> Result<(), MissingEntry>;
}

/// `Σ_{s: size(s)=z} heat(s) × runs[d,s] ≤ cap_runs[z]` for every door `d` and size `z`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeatWeightedSizeCap;

impl ConcentrationCap for HeatWeightedSizeCap {
    fn add_constraints(
        &self,
        data: &AllocationData,
        state: &mut ModelState,
        observer: &mut dyn ModelObserver,
    ) -> Result<(), MissingEntry> {
        for (door, _) in data.doors() {
            for (size, _) in data.sizes() {
                let mut terms = Terms::new();

                for variable in state.variables_for_door(door) {
                    if data.sku_size(variable.sku())? != size {
                        continue;
                    }

                    terms.push((variable.column(), data.heat_weight(variable.sku())?));
                }

                if terms.is_empty() {
                    continue;
                }

                let cap = data.size_cap(size)?;

                state.add_leq_constraint(
                    ConstraintFamily::Concentration,
                    ConstraintScope::DoorSize { door, size },
                    terms,
                    cap,
                    observer,
                );
            }
        }

        Ok(())
    }
}

/// `Σ_s runs[d,s] ≤ cap_runs_total[tier(d)]` for every door `d`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TierTotalCap;

impl ConcentrationCap for TierTotalCap {
    fn add_constraints(
        &self,
        data: &AllocationData,
        state: &mut ModelState,
        observer: &mut dyn ModelObserver,
    ) -> Result<(), MissingEntry> {
        for (door, _) in data.doors() {
            let terms: Terms = state
                .variables_for_door(door)
                .map(|variable| (variable.column(), 1.0))
                .collect();

            if terms.is_empty() {
                continue;
            }

            let tier = data.door_tier(door)?;
            let cap = data.tier_cap(tier)?;

            state.add_leq_constraint(
                ConstraintFamily::Concentration,
                ConstraintScope::DoorTier { door, tier },
                terms,
                cap,
                observer,
            );
        }

        Ok(())
    }
}
