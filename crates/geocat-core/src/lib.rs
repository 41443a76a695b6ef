//! # geocat-core
//!
//! Core domain types for the GeoCat catalog: site types, epochs,
//! administrative divisions, points of interest, documents, plus small
//! geometry helpers (bounding boxes, GeoJSON axis order).
//!
//! This crate holds plain data types only. Storage access lives in
//! `geocat-storage`; HTTP concerns live in `geocat-server`.

pub mod entity;
pub mod geo;

pub use entity::{
    AdminAreaFeature, AdminDivision, DivisionRef, Document, DocumentRef, DocumentSummary,
    EntityRef, LocatedPlace, PointDetail, PointFeature, PointGeometry, PointSummary, SiteEpoch,
    SiteType,
};
pub use geo::{BoundingBox, GeoError, LonLat, swap_geometry_axes};
