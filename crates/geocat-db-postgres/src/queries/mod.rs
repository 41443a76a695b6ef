//! SQL query modules for the PostGIS storage backend.
//!
//! This module contains the SQL query implementations organized by entity.

pub mod documents;
pub mod location;
pub mod points;
pub mod reference;
