//! Queue module: priority lanes and the retry policy.

mod lanes;
mod retry;

pub use lanes::{LaneCapacities, PriorityQueueSet, QueueError};
pub use retry::{RetryDecision, RetryPolicy};
