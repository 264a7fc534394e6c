//! `mailsense` — an AI-assisted Gmail CLI.
//!
//! This crate provides the core library: fetching Gmail messages, assigning
//! stable reference indices that survive re-fetches, caching everything
//! locally, and enriching emails through a text-generation service.

pub mod ai;
pub mod cache;
pub mod config;
pub mod error;
pub mod export;
pub mod fetch;
pub mod gmail;
pub mod identity;
pub mod model;
