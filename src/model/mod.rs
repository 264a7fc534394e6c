//! Data model: email records and AI enrichment.

pub mod email;

pub use email::{EmailRecord, Enrichment};
