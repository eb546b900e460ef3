//! Roundhouse — blueprint job and spot cache core
//!
//! This library provides the background-job subsystem and result cache for
//! the roundhouse trainspotting backend: blueprint-generation jobs tracked
//! through a pluggable key-value store, and a disk-backed cache of enrichment
//! data keyed by normalized class/operator identities.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
