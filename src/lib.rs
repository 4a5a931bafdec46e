//! Polygon Checker - geometric quality rules for polygon datasets
//!
//! Datasets are loaded into layers in one reference frame, checked for
//! invalid geometries, duplicates, gaps and overlaps, and the results are
//! turned into status messages, a map overlay document and a cleaned
//! GeoJSON file.

pub mod checks;
pub mod core;
pub mod crs;
pub mod layer;
pub mod loader;
pub mod present;
pub mod session;
