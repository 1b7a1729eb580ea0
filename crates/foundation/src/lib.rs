pub mod math;

// Geo primitives with no dependencies; every other crate builds on these.
pub use math::*;
