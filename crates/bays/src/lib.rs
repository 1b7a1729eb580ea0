pub mod collection;
pub mod fusion;
pub mod record;
pub mod selection;

pub use collection::BayCollection;
pub use fusion::{FusionReport, Fused, fuse, fuse_payloads};
pub use record::{BayRecord, meter_type};
pub use selection::{BayDetails, select_bay};
