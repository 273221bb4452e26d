//! Presentation requests and the presenter capability they carry.

use std::sync::Arc;
use std::time::Duration;

/// Something that can show and hide a transient indicator.
///
/// The queue never inspects what is shown; it only sequences these two calls.
/// Both are invoked with no queue or indicator lock held, so implementations
/// may call back into the queue.
pub trait Presenter: Send + Sync {
    fn present(&self);
    fn dismiss(&self);
}

/// How a presented indicator goes away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dismissal {
    /// Stays visible until cancelled or dropped.
    #[default]
    Manual,
    /// Dismissed automatically once the duration has elapsed after presentation.
    Timeout(Duration),
}

impl Dismissal {
    pub fn timeout(&self) -> Option<Duration> {
        match self {
            Dismissal::Manual => None,
            Dismissal::Timeout(after) => Some(*after),
        }
    }
}

/// Immutable description of one indicator presentation.
pub struct IndicatorRequest<P: ?Sized + Presenter = dyn Presenter> {
    presenter: Arc<P>,
    dismissal: Dismissal,
}

impl<P: ?Sized + Presenter> IndicatorRequest<P> {
    pub fn new(presenter: Arc<P>, dismissal: Dismissal) -> Self {
        Self {
            presenter,
            dismissal,
        }
    }

    pub fn manual(presenter: Arc<P>) -> Self {
        Self::new(presenter, Dismissal::Manual)
    }

    pub fn timeout(presenter: Arc<P>, after: Duration) -> Self {
        Self::new(presenter, Dismissal::Timeout(after))
    }

    pub fn presenter(&self) -> &Arc<P> {
        &self.presenter
    }

    pub fn dismissal(&self) -> Dismissal {
        self.dismissal
    }
}

impl<P: ?Sized + Presenter> Clone for IndicatorRequest<P> {
    fn clone(&self) -> Self {
        Self {
            presenter: Arc::clone(&self.presenter),
            dismissal: self.dismissal,
        }
    }
}

impl<P: ?Sized + Presenter> std::fmt::Debug for IndicatorRequest<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndicatorRequest")
            .field("dismissal", &self.dismissal)
            .finish_non_exhaustive()
    }
}
