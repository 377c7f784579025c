//! Point-in-polygon search over geocoded SIRENE establishments.
//!
//! Two interchangeable backends answer a search: a linear scan over a sample
//! CSV held in memory, or a PostGIS table. Which one is used is fixed at
//! startup by whether a database URL is configured.

pub mod columns;
pub mod config;
pub mod data;
pub mod error;
pub mod geometry;
pub mod import;
pub mod presets;
pub mod scan;
pub mod search;
pub mod server;
pub mod store;
pub mod types;
