//! Export cached emails and extracted events to files.

pub mod ics;
pub mod json;
pub mod markdown;
