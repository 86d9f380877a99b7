//! Persistence layer for the geofencing service.
//!
//! SQLite-backed storage for zones, authorities and subscriptions. Functions
//! take the pool and return `anyhow::Result`; callers map failures at the
//! service boundary.

pub mod authorities;
pub mod db;
pub mod subscriptions;
pub mod zones;

pub use db::{clear_all, init_database, Database};
