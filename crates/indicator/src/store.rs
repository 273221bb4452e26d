//! Indicator store - retains indicators for callers that cannot hold a handle.
//!
//! Indicators are keyed by id and can be cancelled one at a time or all at once
//! (e.g. when the screen that requested them goes away). Dropping the store
//! cancels everything it still retains.

use dashmap::DashMap;

use crate::indicator::{Indicator, IndicatorId, IndicatorState};
use crate::queue::IndicatorQueue;
use crate::request::{IndicatorRequest, Presenter};

pub struct IndicatorStore<P: ?Sized + Presenter = dyn Presenter> {
    queue: IndicatorQueue<P>,
    indicators: DashMap<IndicatorId, Indicator<P>>,
}

impl<P: ?Sized + Presenter + 'static> IndicatorStore<P> {
    pub fn new(queue: IndicatorQueue<P>) -> Self {
        Self {
            queue,
            indicators: DashMap::new(),
        }
    }

    /// Queue a presentation and keep it alive until cancelled or completed.
    pub fn present(&self, request: IndicatorRequest<P>) -> IndicatorId {
        self.prune();

        // add() may present synchronously; no map lock is held while it does.
        let indicator = self.queue.add(request);
        let id = indicator.id();
        self.indicators.insert(id, indicator);
        id
    }
}

impl<P: ?Sized + Presenter> IndicatorStore<P> {
    pub fn queue(&self) -> &IndicatorQueue<P> {
        &self.queue
    }

    /// Cancel one retained indicator. Returns `false` if the id is unknown or
    /// the indicator already completed on its own.
    pub fn cancel(&self, id: IndicatorId) -> bool {
        // Removed before cancelling: cancellation may promote the next indicator,
        // whose presenter is free to call back into the store.
        match self
            .indicators
            .remove_if(&id, |_, indicator| !indicator.is_completed())
        {
            Some((_, indicator)) => {
                indicator.cancel();
                true
            }
            None => {
                tracing::debug!(indicator = %id, "Cancel for unknown or completed indicator");
                self.prune();
                false
            }
        }
    }

    /// Cancel every retained indicator.
    ///
    /// Pending ones go first so the visible one is not replaced by an
    /// indicator that is about to be cancelled anyway.
    pub fn cancel_all(&self) {
        let ids: Vec<IndicatorId> = self.indicators.iter().map(|entry| *entry.key()).collect();
        let mut drained: Vec<Indicator<P>> = ids
            .into_iter()
            .filter_map(|id| self.indicators.remove(&id).map(|(_, indicator)| indicator))
            .collect();

        if drained.is_empty() {
            return;
        }
        tracing::debug!(count = drained.len(), "Cancelling all retained indicators");

        drained.sort_by_key(|indicator| indicator.state() == IndicatorState::Executing);
        for indicator in drained {
            indicator.cancel();
        }
    }

    /// State of a retained indicator. Completed ones count as forgotten even
    /// before the next prune removes them.
    pub fn state(&self, id: IndicatorId) -> Option<IndicatorState> {
        self.indicators
            .get(&id)
            .map(|indicator| indicator.state())
            .filter(|state| !state.is_terminal())
    }

    /// Retained indicators that have not completed yet.
    pub fn len(&self) -> usize {
        self.prune();
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget indicators that completed on their own (timeouts).
    fn prune(&self) {
        // Completed indicators are inert on drop, so dropping under the shard lock is fine.
        self.indicators
            .retain(|_, indicator| !indicator.is_completed());
    }
}

impl<P: ?Sized + Presenter> Drop for IndicatorStore<P> {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
