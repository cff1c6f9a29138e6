//! Ingestion and Export
//!
//! CSV tables in, CSV reports out. YAML fixtures carry the same tables in one file.

pub mod export;
pub mod load;

pub use export::{
    ExportError, ExportPaths, write_allocations, write_door_size_units, write_pool, write_slacks,
};
pub use load::{LoadError, load_data, load_tables, load_yaml_fixture};
