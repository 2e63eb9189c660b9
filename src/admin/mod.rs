//! Back-office: order management and the live status counters.

pub mod counters;
pub mod dashboard;
pub mod orders;

pub use counters::{CounterOutcome, StatusCounters};
pub use dashboard::{CounterService, CountersClient, CountersError};
pub use orders::AdminOrders;
