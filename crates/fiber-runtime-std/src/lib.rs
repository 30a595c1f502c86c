//! Standard runtime services backed by Rust's `std` library.
//!
//! This crate provides concrete implementations of the platform
//! abstraction traits defined in `fiber-core`. Applications construct a
//! [`StdRuntime`], hand its [`fiber_core::Runtime`] to a
//! [`fiber_core::Reconciler`], and drive the reconciler in time slices.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use fiber_core::{
    Clock, Deadline, HostAdapter, IdleScheduler, ReconcileError, Reconciler, Runtime,
    RuntimeHandle, WorkStatus,
};

type Waker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Idle scheduler that records callback requests in an atomic flag and
/// optionally pokes an event loop through a waker.
pub struct StdIdleScheduler {
    callback_requested: AtomicBool,
    waker: RwLock<Option<Waker>>,
}

impl StdIdleScheduler {
    pub fn new() -> Self {
        Self {
            callback_requested: AtomicBool::new(false),
            waker: RwLock::new(None),
        }
    }

    /// Returns whether an idle callback has been requested since the last call.
    pub fn take_callback_request(&self) -> bool {
        self.callback_requested.swap(false, Ordering::SeqCst)
    }

    /// Registers a waker that will be invoked whenever a callback is requested.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self.waker.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(waker));
    }

    /// Clears any registered waker.
    pub fn clear_waker(&self) {
        *self.waker.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn wake(&self) {
        let waker = self
            .waker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdIdleScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdIdleScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdIdleScheduler")
            .field(
                "callback_requested",
                &self.callback_requested.load(Ordering::SeqCst),
            )
            .finish()
    }
}

impl IdleScheduler for StdIdleScheduler {
    fn request_idle_callback(&self) {
        self.callback_requested.store(true, Ordering::SeqCst);
        self.wake();
    }
}

/// Clock implementation backed by [`std::time`].
#[derive(Debug, Default, Clone)]
pub struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn elapsed(&self, since: Self::Instant) -> Duration {
        since.elapsed()
    }
}

/// Deadline of one time slice measured against a [`Clock`].
pub struct SliceDeadline<'a, C: Clock> {
    clock: &'a C,
    start: C::Instant,
    budget: Duration,
}

impl<'a, C: Clock> SliceDeadline<'a, C> {
    pub fn start(clock: &'a C, budget: Duration) -> Self {
        Self {
            clock,
            start: clock.now(),
            budget,
        }
    }
}

impl<C: Clock> Deadline for SliceDeadline<'_, C> {
    fn time_remaining(&self) -> Duration {
        self.budget
            .saturating_sub(self.clock.elapsed(self.start))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SliceConfig {
    /// Length of one slice.
    pub budget: Duration,
    /// Upper bound on slices per [`StdRuntime::drive_until_idle`] call.
    pub max_slices: Option<usize>,
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            budget: Duration::from_millis(16),
            max_slices: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DriveReport {
    pub slices: usize,
    pub commits: usize,
}

/// Convenience container bundling the standard scheduler and clock.
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Arc<StdIdleScheduler>,
    clock: Arc<StdClock>,
    runtime: Runtime,
    slices: SliceConfig,
}

impl StdRuntime {
    /// Creates a new standard runtime instance.
    pub fn new() -> Self {
        Self::with_slice_config(SliceConfig::default())
    }

    pub fn with_slice_config(slices: SliceConfig) -> Self {
        let scheduler = Arc::new(StdIdleScheduler::default());
        let runtime = Runtime::new(scheduler.clone());
        Self {
            scheduler,
            clock: Arc::new(StdClock),
            runtime,
            slices,
        }
    }

    /// Returns a [`fiber_core::Runtime`] configured with the standard scheduler.
    pub fn runtime(&self) -> Runtime {
        self.runtime.clone()
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    pub fn scheduler(&self) -> Arc<StdIdleScheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn clock(&self) -> Arc<StdClock> {
        Arc::clone(&self.clock)
    }

    pub fn slice_config(&self) -> &SliceConfig {
        &self.slices
    }

    /// Returns whether an idle callback was requested since the last poll.
    pub fn take_callback_request(&self) -> bool {
        self.scheduler.take_callback_request()
    }

    /// Registers a waker to be called when the reconciler asks for more time.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.scheduler.set_waker(waker);
    }

    pub fn clear_waker(&self) {
        self.scheduler.clear_waker();
    }

    /// Runs one slice of the configured budget.
    pub fn run_slice<H: HostAdapter>(
        &self,
        reconciler: &mut Reconciler<H>,
    ) -> Result<WorkStatus, ReconcileError> {
        let deadline = SliceDeadline::start(&*self.clock, self.slices.budget);
        reconciler.work_loop(&deadline)
    }

    /// Runs slices until the reconciler has nothing left to do or the slice
    /// limit is reached.
    pub fn drive_until_idle<H: HostAdapter>(
        &self,
        reconciler: &mut Reconciler<H>,
    ) -> Result<DriveReport, ReconcileError> {
        if reconciler.is_poisoned() {
            return Err(ReconcileError::Poisoned);
        }
        let mut report = DriveReport::default();
        while reconciler.has_pending_work() {
            if self
                .slices
                .max_slices
                .is_some_and(|limit| report.slices >= limit)
            {
                log::debug!("slice limit reached with work still pending");
                break;
            }
            let status = self.run_slice(reconciler)?;
            report.slices += 1;
            if let WorkStatus::Committed(_) = status {
                report.commits += 1;
            }
        }
        Ok(report)
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .field("clock", &self.clock)
            .field("slices", &self.slices)
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use fiber_core::{children, create_element, use_state, Element, MemoryHost, Props};
    use fiber_testing::ManualClock;

    use super::*;

    fn counter(_: &Props) -> Element {
        let (count, set_count) = use_state(0i64);
        create_element(
            "button",
            Props::new().on("click", move |_| set_count.update(|c| c + 1)),
            children!["clicked ", count],
        )
    }

    #[test]
    fn scheduler_records_requests_and_wakes() {
        let scheduler = StdIdleScheduler::new();
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&wakes);
        scheduler.set_waker(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        scheduler.request_idle_callback();
        assert!(scheduler.take_callback_request());
        assert!(!scheduler.take_callback_request());

        scheduler.clear_waker();
        scheduler.request_idle_callback();
        assert_eq!(wakes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn slice_deadline_counts_down_with_the_clock() {
        let clock = ManualClock::new();
        let deadline = SliceDeadline::start(&clock, Duration::from_millis(16));
        assert_eq!(deadline.time_remaining(), Duration::from_millis(16));
        clock.advance(Duration::from_millis(10));
        assert_eq!(deadline.time_remaining(), Duration::from_millis(6));
        clock.advance(Duration::from_millis(10));
        assert_eq!(deadline.time_remaining(), Duration::ZERO);
    }

    #[test]
    fn zero_budget_slices_still_progress() {
        let deadline = SliceDeadline::start(&StdClock, Duration::ZERO);
        assert_eq!(deadline.time_remaining(), Duration::ZERO);

        let runtime = StdRuntime::with_slice_config(SliceConfig {
            budget: Duration::ZERO,
            max_slices: None,
        });
        let mut host = MemoryHost::new();
        let container = host.create_container("root");
        let mut reconciler = Reconciler::with_runtime(host, runtime.runtime());
        reconciler.render(Element::component(counter, Props::new()), container);

        let report = runtime.drive_until_idle(&mut reconciler).unwrap();
        // root, component, button and two text fibers, one unit per slice
        assert_eq!(report, DriveReport { slices: 5, commits: 1 });
        assert!(runtime.take_callback_request());
        assert_eq!(reconciler.host().text_content(container), "clicked 0");
    }

    #[test]
    fn state_update_requests_a_callback_and_rerenders() {
        let runtime = StdRuntime::new();
        let mut host = MemoryHost::new();
        let container = host.create_container("root");
        let mut reconciler = Reconciler::with_runtime(host, runtime.runtime());
        reconciler.render(Element::component(counter, Props::new()), container);
        runtime.drive_until_idle(&mut reconciler).unwrap();
        runtime.take_callback_request();

        let button = reconciler.host().children(container).unwrap()[0];
        reconciler.host().dispatch(button, "click").unwrap();
        assert!(runtime.take_callback_request());

        let report = runtime.drive_until_idle(&mut reconciler).unwrap();
        assert_eq!(report.commits, 1);
        assert_eq!(reconciler.host().text_content(container), "clicked 1");
    }

    #[test]
    fn slice_limit_stops_the_driver() {
        let runtime = StdRuntime::with_slice_config(SliceConfig {
            budget: Duration::ZERO,
            max_slices: Some(2),
        });
        let mut host = MemoryHost::new();
        let container = host.create_container("root");
        let mut reconciler = Reconciler::with_runtime(host, runtime.runtime());
        reconciler.render(Element::component(counter, Props::new()), container);

        let report = runtime.drive_until_idle(&mut reconciler).unwrap();
        assert_eq!(report, DriveReport { slices: 2, commits: 0 });
        assert!(reconciler.has_pending_work());
    }
}
