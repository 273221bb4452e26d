//! Test presenters that record what they were asked to do.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::request::Presenter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Call {
    Present(&'static str),
    Dismiss(&'static str),
}

/// Ordered log shared by several presenters.
#[derive(Default)]
pub(crate) struct Journal {
    calls: Mutex<Vec<Call>>,
}

impl Journal {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

type Hook = Box<dyn FnOnce() + Send>;

pub(crate) struct RecordingPresenter {
    name: &'static str,
    journal: Arc<Journal>,
    presented: AtomicUsize,
    dismissed: AtomicUsize,
    on_present: Mutex<Option<Hook>>,
    on_dismiss: Mutex<Option<Hook>>,
}

impl RecordingPresenter {
    pub(crate) fn new(name: &'static str) -> Arc<Self> {
        Self::with_journal(name, Journal::new())
    }

    pub(crate) fn with_journal(name: &'static str, journal: Arc<Journal>) -> Arc<Self> {
        Arc::new(Self {
            name,
            journal,
            presented: AtomicUsize::new(0),
            dismissed: AtomicUsize::new(0),
            on_present: Mutex::new(None),
            on_dismiss: Mutex::new(None),
        })
    }

    /// Run `hook` once, from inside the next `present()` call.
    pub(crate) fn on_present(&self, hook: impl FnOnce() + Send + 'static) {
        *self.on_present.lock().unwrap() = Some(Box::new(hook));
    }

    /// Run `hook` once, from inside the next `dismiss()` call.
    pub(crate) fn on_dismiss(&self, hook: impl FnOnce() + Send + 'static) {
        *self.on_dismiss.lock().unwrap() = Some(Box::new(hook));
    }

    pub(crate) fn presented(&self) -> usize {
        self.presented.load(Ordering::SeqCst)
    }

    pub(crate) fn dismissed(&self) -> usize {
        self.dismissed.load(Ordering::SeqCst)
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.journal.calls()
    }
}

impl Presenter for RecordingPresenter {
    fn present(&self) {
        self.presented.fetch_add(1, Ordering::SeqCst);
        self.journal.push(Call::Present(self.name));
        let hook = self.on_present.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
    }

    fn dismiss(&self) {
        self.dismissed.fetch_add(1, Ordering::SeqCst);
        self.journal.push(Call::Dismiss(self.name));
        let hook = self.on_dismiss.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
    }
}

/// Presenter shared by many indicators that tracks how many are visible at once.
#[derive(Default)]
pub(crate) struct Screen {
    visible: AtomicUsize,
    peak: AtomicUsize,
    shown: AtomicUsize,
}

impl Screen {
    pub(crate) fn visible(&self) -> usize {
        self.visible.load(Ordering::SeqCst)
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub(crate) fn shown(&self) -> usize {
        self.shown.load(Ordering::SeqCst)
    }
}

impl Presenter for Screen {
    fn present(&self) {
        let now = self.visible.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.shown.fetch_add(1, Ordering::SeqCst);
    }

    fn dismiss(&self) {
        self.visible.fetch_sub(1, Ordering::SeqCst);
    }
}
