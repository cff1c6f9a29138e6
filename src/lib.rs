//! Runalloc
//!
//! Runalloc allocates integer production runs of SKUs to retail doors by building and solving
//! a mixed-integer linear program.
//!
//! Validated [`data::AllocationData`] feeds a [`model::ModelBuilder`], which emits one
//! `runs[door, sku]` variable per eligible pair together with eligibility, supply,
//! anti-concentration and floor constraints. The solved [`model::AllocationModel`] is read back
//! through [`report`], [`slack`] and the solution pool in [`solver::pool`].

pub mod config;
pub mod data;
pub mod io;
pub mod logging;
pub mod model;
pub mod report;
pub mod slack;
pub mod solver;
