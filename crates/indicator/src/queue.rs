//! Single-flight indicator queue.
//!
//! Indicators are shown strictly one at a time in submission order. The queue
//! holds only weak references: whoever called `add` owns the indicator, and
//! dropping it cancels it. Every completion re-runs "start next", so the head
//! of the queue is promoted as soon as the previous indicator is dismissed.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::Serialize;

use crate::indicator::{
    CompletionCallback, Indicator, IndicatorId, IndicatorShared, IndicatorState,
};
use crate::request::{IndicatorRequest, Presenter};

/// Environment variable read by `QueueConfig::default()`.
pub const CAPACITY_ENV: &str = "INDICATOR_QUEUE_CAPACITY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Maximum number of live (pending or visible) indicators.
    ///
    /// `try_add` rejects beyond it; `add` logs and enqueues anyway.
    pub capacity: Option<usize>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: std::env::var(CAPACITY_ENV)
                .ok()
                .and_then(|raw| parse_capacity(&raw)),
        }
    }
}

impl QueueConfig {
    pub fn unbounded() -> Self {
        Self { capacity: None }
    }

    /// Bound the queue to `capacity` live indicators. Zero is not a valid
    /// bound and leaves the queue unbounded, as it does for the env variable.
    pub fn with_capacity(capacity: usize) -> Self {
        if capacity == 0 {
            tracing::warn!("Ignoring zero indicator queue capacity");
        }
        Self {
            capacity: NonZeroUsize::new(capacity).map(NonZeroUsize::get),
        }
    }
}

fn parse_capacity(raw: &str) -> Option<usize> {
    match raw.trim().parse::<usize>() {
        Ok(capacity) if capacity > 0 => Some(capacity),
        _ => {
            tracing::warn!(value = %raw, "Ignoring invalid {}", CAPACITY_ENV);
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("Indicator queue at capacity ({capacity} live indicators)")]
    AtCapacity { capacity: usize },
}

/// Point-in-time view of the queue for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    /// Live indicators, visible one included.
    pub depth: usize,
    pub pending: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executing: Option<IndicatorId>,
}

type Entries<P> = VecDeque<Weak<IndicatorShared<P>>>;

struct QueueShared<P: ?Sized + Presenter> {
    entries: Mutex<Entries<P>>,
    config: QueueConfig,
}

impl<P: ?Sized + Presenter + 'static> QueueShared<P> {
    fn entries(&self) -> MutexGuard<'_, Entries<P>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            tracing::error!("Indicator queue lock poisoned - recovering");
            poisoned.into_inner()
        })
    }

    /// Drop entries whose owner is gone or whose dismissal has run.
    ///
    /// A completed indicator still occupies the screen until it is finished.
    fn prune(entries: &mut Entries<P>) {
        entries.retain(|entry| {
            entry
                .upgrade()
                .is_some_and(|indicator| !indicator.is_finished())
        });
    }

    /// Append without a capacity check; logs when over capacity.
    fn admit(self: &Arc<Self>, request: IndicatorRequest<P>) -> Indicator<P> {
        let mut entries = self.entries();
        Self::prune(&mut entries);

        if let Some(capacity) = self.config.capacity
            && entries.len() >= capacity
        {
            tracing::warn!(
                depth = entries.len() + 1,
                capacity,
                "Indicator queue over capacity - callers may be leaking indicators"
            );
        }
        self.push(&mut entries, request)
    }

    fn try_admit(
        self: &Arc<Self>,
        request: IndicatorRequest<P>,
    ) -> Result<Indicator<P>, QueueError> {
        let mut entries = self.entries();
        Self::prune(&mut entries);

        if let Some(capacity) = self.config.capacity
            && entries.len() >= capacity
        {
            tracing::debug!(depth = entries.len(), capacity, "Rejecting indicator at capacity");
            return Err(QueueError::AtCapacity { capacity });
        }
        Ok(self.push(&mut entries, request))
    }

    fn push(
        self: &Arc<Self>,
        entries: &mut Entries<P>,
        request: IndicatorRequest<P>,
    ) -> Indicator<P> {
        let queue = Arc::downgrade(self);
        let on_complete: CompletionCallback = Box::new(move || {
            if let Some(queue) = queue.upgrade() {
                queue.start_next_if_idle();
            }
        });

        let indicator = Indicator::new(request, Some(on_complete));
        entries.push_back(indicator.downgrade());
        tracing::debug!(indicator = %indicator.id(), depth = entries.len(), "Indicator queued");
        indicator
    }

    fn start_next_if_idle(&self) {
        let head = {
            let mut entries = self.entries();
            Self::prune(&mut entries);
            entries.front().and_then(Weak::upgrade)
        };

        let Some(head) = head else {
            tracing::trace!("Indicator queue empty");
            return;
        };

        // Executing, or completed but not yet dismissed: its completion
        // callback runs this again.
        if head.state() == IndicatorState::Pending {
            head.start();
        }
    }

    fn live(&self) -> Vec<Arc<IndicatorShared<P>>> {
        let mut entries = self.entries();
        Self::prune(&mut entries);
        entries.iter().filter_map(Weak::upgrade).collect()
    }
}

/// FIFO arbiter that keeps at most one indicator visible.
///
/// Cloning is cheap; clones address the same queue.
pub struct IndicatorQueue<P: ?Sized + Presenter = dyn Presenter> {
    shared: Arc<QueueShared<P>>,
}

impl<P: ?Sized + Presenter> Clone for IndicatorQueue<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P: ?Sized + Presenter + 'static> Default for IndicatorQueue<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ?Sized + Presenter + 'static> IndicatorQueue<P> {
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    pub fn with_config(config: QueueConfig) -> Self {
        Self {
            shared: Arc::new(QueueShared {
                entries: Mutex::new(VecDeque::new()),
                config,
            }),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    /// Queue a presentation.
    ///
    /// If nothing is visible the indicator is presented before this returns.
    /// Otherwise it stays pending until everything queued before it completes.
    /// Dropping the returned handle cancels the presentation.
    pub fn add(&self, request: IndicatorRequest<P>) -> Indicator<P> {
        let indicator = self.shared.admit(request);
        self.shared.start_next_if_idle();
        indicator
    }

    /// Like [`add`](Self::add), but rejects when the configured capacity is reached.
    pub fn try_add(&self, request: IndicatorRequest<P>) -> Result<Indicator<P>, QueueError> {
        let indicator = self.shared.try_admit(request)?;
        self.shared.start_next_if_idle();
        Ok(indicator)
    }

    /// Number of live indicators, pending and visible.
    pub fn len(&self) -> usize {
        self.shared.live().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when no indicator is visible.
    ///
    /// An indicator whose `dismiss()` is still running counts as visible.
    pub fn is_idle(&self) -> bool {
        self.snapshot().executing.is_none()
    }

    /// `executing` names the head once it has left `Pending`, up to the
    /// moment its dismissal returns.
    pub fn snapshot(&self) -> QueueSnapshot {
        let live = self.shared.live();
        let mut snapshot = QueueSnapshot {
            depth: live.len(),
            pending: 0,
            executing: None,
        };
        for (position, indicator) in live.iter().enumerate() {
            match indicator.state() {
                IndicatorState::Pending => snapshot.pending += 1,
                _ if position == 0 => snapshot.executing = Some(indicator.id()),
                // Cancelled while pending, about to be pruned.
                _ => {}
            }
        }
        snapshot
    }
}
