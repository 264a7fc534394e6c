//! Identity subsystem: stable unique IDs and index assignment.

pub mod resolver;
pub mod store;

pub use resolver::{resolve, ResolveOutcome};
pub use store::{unique_id_for, IdMapping, IdentityStore, MAPPING_FILE};
