//! Model State

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{
    data::{AllocationData, DoorKey, SizeKey, SkuKey, TierKey},
    model::observer::ModelObserver,
    solver::{ColumnKind, LinearRow, MilpProblem, Relation, Terms},
};

/// Decision variable `runs[door, sku]` for one eligible pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunVariable {
    door: DoorKey,
    sku: SkuKey,
    column: usize,
    max_runs: u32,
    score: f64,
}

impl RunVariable {
    /// Door receiving the runs
    pub fn door(&self) -> DoorKey {
        self.door
    }

    /// SKU being allocated
    pub fn sku(&self) -> SkuKey {
        self.sku
    }

    /// Solver column index
    pub fn column(&self) -> usize {
        self.column
    }

    /// Run ceiling resolved for the pair
    pub fn max_runs(&self) -> u32 {
        self.max_runs
    }

    /// Objective coefficient resolved for the pair
    pub fn score(&self) -> f64 {
        self.score
    }
}

/// Constraint family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintFamily {
    /// `runs[d,s] <= MaxRuns(d,s)`
    EligibilityCap,

    /// Per-SKU run or unit supply
    Supply,

    /// Anti-concentration cap per door/size or per door
    Concentration,

    /// `runs[d,s] >= MinRuns(d,s)`
    Floor,
}

impl fmt::Display for ConstraintFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintFamily::EligibilityCap => f.write_str("eligibility_cap"),
            ConstraintFamily::Supply => f.write_str("supply"),
            ConstraintFamily::Concentration => f.write_str("concentration"),
            ConstraintFamily::Floor => f.write_str("floor"),
        }
    }
}

/// Keys identifying one constraint instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintScope {
    /// One door/SKU pair
    DoorSku {
        /// Door
        door: DoorKey,
        /// SKU
        sku: SkuKey,
    },

    /// One SKU at its size
    SkuSize {
        /// SKU
        sku: SkuKey,
        /// Size
        size: SizeKey,
    },

    /// One door at one size
    DoorSize {
        /// Door
        door: DoorKey,
        /// Size
        size: SizeKey,
    },

    /// One door, capped through its tier
    DoorTier {
        /// Door
        door: DoorKey,
        /// Door's tier
        tier: TierKey,
    },
}

impl ConstraintScope {
    /// Door this constraint applies to, if any
    pub fn door(&self) -> Option<DoorKey> {
        match self {
            ConstraintScope::DoorSku { door, .. }
            | ConstraintScope::DoorSize { door, .. }
            | ConstraintScope::DoorTier { door, .. } => Some(*door),
            ConstraintScope::SkuSize { .. } => None,
        }
    }

    /// SKU this constraint applies to, if any
    pub fn sku(&self) -> Option<SkuKey> {
        match self {
            ConstraintScope::DoorSku { sku, .. } | ConstraintScope::SkuSize { sku, .. } => {
                Some(*sku)
            }
            ConstraintScope::DoorSize { .. } | ConstraintScope::DoorTier { .. } => None,
        }
    }

    /// Size this constraint applies to, if any
    pub fn size(&self) -> Option<SizeKey> {
        match self {
            ConstraintScope::SkuSize { size, .. } | ConstraintScope::DoorSize { size, .. } => {
                Some(*size)
            }
            ConstraintScope::DoorSku { .. } | ConstraintScope::DoorTier { .. } => None,
        }
    }

    /// Tier this constraint applies to, if any
    pub fn tier(&self) -> Option<TierKey> {
        match self {
            ConstraintScope::DoorTier { tier, .. } => Some(*tier),
            _ => None,
        }
    }
}

/// One generated constraint instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintRecord {
    family: ConstraintFamily,
    scope: ConstraintScope,
    row: LinearRow,
}

impl ConstraintRecord {
    /// Constraint family
    pub fn family(&self) -> ConstraintFamily {
        self.family
    }

    /// Identifying keys
    pub fn scope(&self) -> ConstraintScope {
        self.scope
    }

    /// Recorded linear row
    pub fn row(&self) -> &LinearRow {
        &self.row
    }

    /// Constraint name, e.g. `supply[SKU1,S]` or `cap_runs_total[D1]`.
    pub fn name(&self, data: &AllocationData) -> String {
        let prefix = match (self.family, self.scope) {
            (ConstraintFamily::EligibilityCap, _) => "eligibility",
            (ConstraintFamily::Supply, _) => "supply",
            (ConstraintFamily::Concentration, ConstraintScope::DoorTier { .. }) => {
                "cap_runs_total"
            }
            (ConstraintFamily::Concentration, _) => "cap_runs",
            (ConstraintFamily::Floor, _) => "min_runs",
        };

        let keys = match self.scope {
            ConstraintScope::DoorSku { door, sku } => {
                format!("{},{}", data.door_name(door), data.sku_name(sku))
            }
            ConstraintScope::SkuSize { sku, size } => {
                format!("{},{}", data.sku_name(sku), data.size_name(size))
            }
            ConstraintScope::DoorSize { door, size } => {
                format!("{},{}", data.door_name(door), data.size_name(size))
            }
            ConstraintScope::DoorTier { door, .. } => data.door_name(door).to_string(),
        };

        format!("{prefix}[{keys}]")
    }
}

/// Variables, objective and constraints recorded while building an allocation model.
pub struct ModelState {
    problem: MilpProblem,
    variables: Vec<RunVariable>,
    constraints: Vec<ConstraintRecord>,
    by_door: FxHashMap<DoorKey, SmallVec<[usize; 8]>>,
    by_sku: FxHashMap<SkuKey, SmallVec<[usize; 8]>>,
}

impl fmt::Debug for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelState")
            .field("problem", &"<MilpProblem>")
            .field(
                "variables",
                &format!("[{} variables]", self.variables.len()),
            )
            .field(
                "constraints",
                &format!("[{} constraints]", self.constraints.len()),
            )
            .finish_non_exhaustive()
    }
}

impl Default for ModelState {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self {
            problem: MilpProblem::default(),
            variables: Vec::new(),
            constraints: Vec::new(),
            by_door: FxHashMap::default(),
            by_sku: FxHashMap::default(),
        }
    }

    /// Add a non-negative integer `runs[door, sku]` variable and its objective term.
    pub fn add_run_variable<O: ModelObserver + ?Sized>(
        &mut self,
        door: DoorKey,
        sku: SkuKey,
        max_runs: u32,
        score: f64,
        observer: &mut O,
    ) -> RunVariable {
        let column = self.problem.add_column(ColumnKind::Integer);

        self.problem.add_objective_term(column, score);

        let variable = RunVariable {
            door,
            sku,
            column,
            max_runs,
            score,
        };

        observer.on_run_variable(&variable);
        observer.on_objective_term(&variable, score);

        let index = self.variables.len();

        self.by_door.entry(door).or_default().push(index);
        self.by_sku.entry(sku).or_default().push(index);
        self.variables.push(variable);

        variable
    }

    /// All run variables, in creation order
    pub fn variables(&self) -> &[RunVariable] {
        &self.variables
    }

    /// Run variables for one door
    pub fn variables_for_door(&self, door: DoorKey) -> impl Iterator<Item = &RunVariable> {
        self.indexed(self.by_door.get(&door))
    }

    /// Run variables for one SKU
    pub fn variables_for_sku(&self, sku: SkuKey) -> impl Iterator<Item = &RunVariable> {
        self.indexed(self.by_sku.get(&sku))
    }

    /// All recorded constraints, in creation order
    pub fn constraints(&self) -> &[ConstraintRecord] {
        &self.constraints
    }

    /// Record a less-than-or-equal constraint.
    pub fn add_leq_constraint<O: ModelObserver + ?Sized>(
        &mut self,
        family: ConstraintFamily,
        scope: ConstraintScope,
        terms: Terms,
        rhs: f64,
        observer: &mut O,
    ) {
        self.add_constraint(family, scope, terms, Relation::Leq, rhs, observer);
    }

    /// Record a greater-than-or-equal constraint.
    pub fn add_geq_constraint<O: ModelObserver + ?Sized>(
        &mut self,
        family: ConstraintFamily,
        scope: ConstraintScope,
        terms: Terms,
        rhs: f64,
        observer: &mut O,
    ) {
        self.add_constraint(family, scope, terms, Relation::Geq, rhs, observer);
    }

    /// Extract the solver problem, run variables and constraint records.
    pub(crate) fn into_parts(self) -> (MilpProblem, Vec<RunVariable>, Vec<ConstraintRecord>) {
        (self.problem, self.variables, self.constraints)
    }

    fn add_constraint<O: ModelObserver + ?Sized>(
        &mut self,
        family: ConstraintFamily,
        scope: ConstraintScope,
        terms: Terms,
        relation: Relation,
        rhs: f64,
        observer: &mut O,
    ) {
        let row = LinearRow {
            terms,
            relation,
            rhs,
        };

        self.problem.push_row(row.clone());

        let record = ConstraintRecord { family, scope, row };

        observer.on_constraint(&record);

        self.constraints.push(record);
    }

    fn indexed<'a>(
        &'a self,
        indexes: Option<&'a SmallVec<[usize; 8]>>,
    ) -> impl Iterator<Item = &'a RunVariable> + 'a {
        indexes
            .into_iter()
            .flatten()
            .filter_map(|index| self.variables.get(*index))
    }
}
