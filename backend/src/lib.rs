//! # Hours Backend
//!
//! Read API for hierarchical opening-hours data.
//!
//! Targets (units, services, services at units, ...) carry dated periods,
//! periods carry weekday openings with optional week/month recurrence, and
//! a per-date daily hours projection is materialized from them whenever a
//! target's schedule changes. The HTTP layer serves all of it read-only.
//!
//! ## Architecture
//!
//! - [`models`]: domain types and the labeled enum vocabularies
//! - [`services`]: resolution rules, ordering and ingestion of seed documents
//! - [`db`]: repository traits with in-memory and Postgres backends
//! - [`http`]: axum router, handlers and wire representations
//! - [`config`]: server settings from the environment

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod config;
pub mod db;
pub mod models;
pub mod services;

#[cfg(feature = "http-server")]
pub mod http;
