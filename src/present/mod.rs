//! Presentation of a report: status messages, map overlays and export

pub mod colors;
pub mod export;
pub mod map;
pub mod messages;

pub use colors::{rule_color, Color};
pub use export::{export_geojson, write_geojson, DEFAULT_OUTPUT};
pub use map::{MapLayer, MapView};
pub use messages::{status_messages, Level, StatusMessage};
