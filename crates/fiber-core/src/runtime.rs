use std::cell::Cell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::platform::IdleScheduler;

struct RuntimeInner {
    scheduler: Arc<dyn IdleScheduler>,
    rerender_requested: Cell<bool>,
    idle_requests: Cell<u64>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn IdleScheduler>) -> Self {
        Self {
            scheduler,
            rerender_requested: Cell::new(false),
            idle_requests: Cell::new(0),
        }
    }

    fn request_idle_callback(&self) {
        self.idle_requests.set(self.idle_requests.get() + 1);
        self.scheduler.request_idle_callback();
    }

    fn request_rerender(&self) {
        if !self.rerender_requested.replace(true) {
            log::debug!("state update requested a new render pass");
        }
        self.request_idle_callback();
    }
}

/// Shared scheduling state of one reconciler. State setters reach it through
/// a [`RuntimeHandle`] and only raise a flag; the work loop picks the flag up
/// at the start of its next slice.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn IdleScheduler>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    pub fn request_idle_callback(&self) {
        self.inner.request_idle_callback();
    }

    pub fn has_rerender_request(&self) -> bool {
        self.inner.rerender_requested.get()
    }

    pub fn take_rerender_request(&self) -> bool {
        self.inner.rerender_requested.replace(false)
    }

    /// Number of idle callbacks requested from the scheduler so far.
    pub fn idle_requests(&self) -> u64 {
        self.inner.idle_requests.get()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(Arc::new(DefaultScheduler))
    }
}

#[derive(Default)]
pub struct DefaultScheduler;

impl IdleScheduler for DefaultScheduler {
    fn request_idle_callback(&self) {}
}

#[derive(Clone)]
pub struct RuntimeHandle(Weak<RuntimeInner>);

impl RuntimeHandle {
    pub fn request_rerender(&self) {
        if let Some(inner) = self.0.upgrade() {
            inner.request_rerender();
        }
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct CountingScheduler(AtomicUsize);

    impl IdleScheduler for CountingScheduler {
        fn request_idle_callback(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn rerender_request_sets_flag_and_schedules() {
        let scheduler = Arc::new(CountingScheduler::default());
        let runtime = Runtime::new(scheduler.clone());
        let handle = runtime.handle();

        handle.request_rerender();
        handle.request_rerender();

        assert!(runtime.take_rerender_request());
        assert!(!runtime.take_rerender_request());
        assert_eq!(scheduler.0.load(Ordering::SeqCst), 2);
        assert_eq!(runtime.idle_requests(), 2);
    }

    #[test]
    fn handle_outliving_runtime_is_inert() {
        let runtime = Runtime::default();
        let handle = runtime.handle();
        drop(runtime);
        assert!(!handle.is_alive());
        handle.request_rerender();
    }
}
