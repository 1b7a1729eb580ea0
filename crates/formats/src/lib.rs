//! Loader shape contract: every source is parsed into flat, typed records
//! with canonical join keys before fusion sees it.

pub mod coerce;
pub mod dataset;
pub mod geojson;
pub mod records;
pub mod tables;
pub mod tabular;

pub use dataset::*;
pub use geojson::*;
pub use records::*;
pub use tables::*;
pub use tabular::*;
