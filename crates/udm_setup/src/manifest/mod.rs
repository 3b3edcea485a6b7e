//! Model-input manifests: attractors, constraints, parameters and the
//! optional merged metadata table.
//!
//! Each manifest is built completely in memory first, then written with
//! replace semantics. A pipeline that fails part way never leaves its table
//! behind.

mod attractors;
mod constraints;
mod metadata;
mod parameters;
mod table;

pub use attractors::{build_attractors, AttractorRow, ATTRACTOR_COLUMNS};
pub use constraints::{build_constraints, ConstraintRow, CONSTRAINT_COLUMNS};
pub use metadata::{find_metadata_table, merge_metadata, MetadataMerge, MetadataTable};
pub use parameters::{ModelParameters, PARAMETER_COLUMNS};
pub use table::{write_table, ManifestTable};
