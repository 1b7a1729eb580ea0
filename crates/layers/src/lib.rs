pub mod criteria;
pub mod filter;
pub mod radar;

pub use criteria::{CriteriaPatch, FilterCriteria, FilterInputError, Range};
pub use filter::{VisibleBay, filter_bays, filter_indices, filter_visible};
pub use radar::{RadarRing, radar_band, radar_rings};
