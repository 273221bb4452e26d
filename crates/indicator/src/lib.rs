//! indicator: single-flight presentation queue for transient UI indicators.
//!
//! Many requesters may ask to show a spinner, toast or banner; the queue keeps
//! at most one visible and promotes the next as soon as it goes away.

mod indicator;
mod queue;
mod request;
mod store;

#[cfg(test)]
mod testing;

pub use indicator::{Indicator, IndicatorId, IndicatorState};
pub use queue::{CAPACITY_ENV, IndicatorQueue, QueueConfig, QueueError, QueueSnapshot};
pub use request::{Dismissal, IndicatorRequest, Presenter};
pub use store::IndicatorStore;
