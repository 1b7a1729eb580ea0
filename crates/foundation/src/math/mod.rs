pub mod centroid;
pub mod geodesy;
pub mod precision;

pub use centroid::*;
pub use geodesy::*;
pub use precision::*;
