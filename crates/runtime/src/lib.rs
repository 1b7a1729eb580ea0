pub mod controller;
pub mod metrics;
pub mod observers;
pub mod search;

pub use controller::*;
pub use metrics::{Metrics, MetricsSnapshot};
pub use observers::{SubscriptionId, ViewChange};
pub use search::{SearchOutcome, SearchTicket};
