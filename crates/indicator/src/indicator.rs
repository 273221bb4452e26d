//! Indicator tokens: one queued or visible presentation.
//!
//! Forward-only state machine:
//! - `Pending` → `Executing` via `start()` (presents, arms the timeout)
//! - `Executing` → `Completed` via cancel, timeout or drop (dismisses)
//! - `Pending` → `Completed` via cancel or drop (nothing shown, nothing dismissed)
//!
//! All completion paths converge on one routine guarded by the state lock, so
//! `dismiss()` and the completion callback run at most once.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::request::{Dismissal, IndicatorRequest, Presenter};

/// Unique identifier for an indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndicatorId(uuid::Uuid);

impl IndicatorId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for IndicatorId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for IndicatorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorState {
    Pending,
    Executing,
    Completed,
}

impl IndicatorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Executing => "executing",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompletionReason {
    Cancelled,
    TimedOut,
    Dropped,
}

pub(crate) type CompletionCallback = Box<dyn FnOnce() + Send>;

struct Lifecycle {
    state: IndicatorState,
    /// True while `present()` is running outside the lock.
    presenting: bool,
}

/// State shared between the owning [`Indicator`], the queue (weakly) and the
/// timeout task (weakly).
pub(crate) struct IndicatorShared<P: ?Sized + Presenter> {
    id: IndicatorId,
    request: IndicatorRequest<P>,
    lifecycle: Mutex<Lifecycle>,
    on_complete: Mutex<Option<CompletionCallback>>,
    /// Cancelled once dismissal has run; the queue treats the indicator as
    /// occupying the screen until then.
    finished: CancellationToken,
}

impl<P: ?Sized + Presenter> IndicatorShared<P> {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|poisoned| {
            tracing::error!(indicator = %self.id, "Indicator lock poisoned - recovering");
            poisoned.into_inner()
        })
    }

    pub(crate) fn id(&self) -> IndicatorId {
        self.id
    }

    pub(crate) fn state(&self) -> IndicatorState {
        self.lifecycle().state
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished.is_cancelled()
    }

    pub(crate) fn complete(&self, reason: CompletionReason) {
        let (previous, presenting) = {
            let mut lifecycle = self.lifecycle();
            if lifecycle.state.is_terminal() {
                return;
            }
            let previous = std::mem::replace(&mut lifecycle.state, IndicatorState::Completed);
            (previous, lifecycle.presenting)
        };

        tracing::debug!(
            indicator = %self.id,
            from = previous.as_str(),
            reason = ?reason,
            "Indicator completed"
        );

        // start() is still inside present(); it finishes once that returns.
        if presenting {
            return;
        }
        self.finish(previous == IndicatorState::Executing);
    }

    fn finish(&self, dismiss: bool) {
        if dismiss {
            tracing::debug!(indicator = %self.id, "Dismissing indicator");
            self.request.presenter().dismiss();
        }
        self.finished.cancel();

        let callback = self
            .on_complete
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(callback) = callback {
            callback();
        }
    }
}

impl<P: ?Sized + Presenter + 'static> IndicatorShared<P> {
    pub(crate) fn start(self: &Arc<Self>) {
        {
            let mut lifecycle = self.lifecycle();
            if lifecycle.state != IndicatorState::Pending {
                tracing::trace!(
                    indicator = %self.id,
                    state = lifecycle.state.as_str(),
                    "Ignoring start of non-pending indicator"
                );
                return;
            }
            lifecycle.state = IndicatorState::Executing;
            lifecycle.presenting = true;
        }

        tracing::debug!(indicator = %self.id, "Presenting indicator");
        self.request.presenter().present();

        let cancelled_while_presenting = {
            let mut lifecycle = self.lifecycle();
            lifecycle.presenting = false;
            lifecycle.state.is_terminal()
        };

        if cancelled_while_presenting {
            self.finish(true);
            return;
        }

        if let Dismissal::Timeout(after) = self.request.dismissal() {
            self.arm_timeout(after);
        }
    }

    fn arm_timeout(self: &Arc<Self>, after: Duration) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(
                    indicator = %self.id,
                    error = %e,
                    "No tokio runtime - timeout disabled, indicator needs manual dismissal"
                );
                return;
            }
        };

        // Weak: a pending timer must not keep a dropped indicator alive.
        let indicator: Weak<Self> = Arc::downgrade(self);
        let finished = self.finished.clone();
        let id = self.id;

        runtime.spawn(async move {
            tokio::select! {
                _ = finished.cancelled() => {}
                _ = tokio::time::sleep(after) => {
                    if let Some(indicator) = indicator.upgrade() {
                        tracing::debug!(indicator = %id, timeout = ?after, "Indicator timed out");
                        indicator.complete(CompletionReason::TimedOut);
                    }
                }
            }
        });
    }
}

/// Handle to one queued or visible presentation.
///
/// The holder owns the presentation: dropping the handle cancels it, which
/// dismisses it if visible and lets the queue promote the next indicator.
#[must_use = "dropping an Indicator cancels its presentation"]
pub struct Indicator<P: ?Sized + Presenter = dyn Presenter> {
    shared: Arc<IndicatorShared<P>>,
}

impl<P: ?Sized + Presenter> Indicator<P> {
    pub(crate) fn new(
        request: IndicatorRequest<P>,
        on_complete: Option<CompletionCallback>,
    ) -> Self {
        Self {
            shared: Arc::new(IndicatorShared {
                id: IndicatorId::new(),
                request,
                lifecycle: Mutex::new(Lifecycle {
                    state: IndicatorState::Pending,
                    presenting: false,
                }),
                on_complete: Mutex::new(on_complete),
                finished: CancellationToken::new(),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<IndicatorShared<P>> {
        Arc::downgrade(&self.shared)
    }

    pub fn id(&self) -> IndicatorId {
        self.shared.id
    }

    pub fn state(&self) -> IndicatorState {
        self.shared.state()
    }

    pub fn is_completed(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn dismissal(&self) -> Dismissal {
        self.shared.request.dismissal()
    }

    /// Cancel the presentation. Dismisses it if visible; idempotent.
    pub fn cancel(&self) {
        self.shared.complete(CompletionReason::Cancelled);
    }

    /// Resolves once the indicator has completed and, if it was visible,
    /// been dismissed.
    pub async fn wait(&self) {
        self.shared.finished.cancelled().await;
    }
}

impl<P: ?Sized + Presenter + 'static> Indicator<P> {
    pub(crate) fn start(&self) {
        self.shared.start();
    }
}

impl<P: ?Sized + Presenter> Drop for Indicator<P> {
    fn drop(&mut self) {
        self.shared.complete(CompletionReason::Dropped);
    }
}

impl<P: ?Sized + Presenter> std::fmt::Debug for Indicator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indicator")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .field("dismissal", &self.dismissal())
            .finish()
    }
}
