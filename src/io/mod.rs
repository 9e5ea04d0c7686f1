//! Textual and binary representations of every entity.

pub mod text;
pub mod wkb;

pub use text::{BoundFormat, ValueFormat, format_timestamp, parse_tgeogpoint, parse_timestamp};
pub use wkb::{WkbReadable, WkbValue, WkbWritable};
