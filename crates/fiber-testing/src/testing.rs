use std::cell::Cell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fiber_core::{
    Clock, CommitStats, Deadline, Element, HostError, IdleScheduler, MemoryHost, NodeId,
    ReconcileError, Reconciler, ReconcilerConfig, Runtime, WorkStatus,
};

/// Idle scheduler that only counts how often it was asked for a callback.
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    requests: AtomicUsize,
}

impl RecordingScheduler {
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl IdleScheduler for RecordingScheduler {
    fn request_idle_callback(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Deadline that expires after a fixed number of units of work, independent
/// of wall-clock time. The work loop consults the deadline once per unit.
#[derive(Debug)]
pub struct UnitBudget {
    left: Cell<usize>,
}

impl UnitBudget {
    pub fn new(units: usize) -> Self {
        Self {
            left: Cell::new(units),
        }
    }
}

impl Deadline for UnitBudget {
    fn time_remaining(&self) -> Duration {
        let left = self.left.get().saturating_sub(1);
        self.left.set(left);
        if left == 0 {
            Duration::ZERO
        } else {
            Duration::MAX
        }
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward, saturating at `u64::MAX` nanoseconds.
    pub fn advance(&self, by: Duration) {
        let by = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        let _ = self
            .nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                Some(now.saturating_add(by))
            });
    }
}

impl Clock for ManualClock {
    type Instant = u64;

    fn now(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }

    fn elapsed(&self, since: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(since))
    }
}

/// Headless harness for exercising reconcilers in tests.
///
/// `TestRenderer` owns a reconciler over an in-memory host with a single
/// `root` container and exposes helpers for driving passes at any slice
/// granularity and for inspecting the resulting host tree.
pub struct TestRenderer {
    reconciler: Reconciler<MemoryHost>,
    container: NodeId,
    scheduler: Arc<RecordingScheduler>,
}

impl TestRenderer {
    pub fn new() -> Self {
        Self::with_config(ReconcilerConfig {
            check_hook_consistency: true,
            ..ReconcilerConfig::default()
        })
    }

    pub fn with_config(config: ReconcilerConfig) -> Self {
        let scheduler = Arc::new(RecordingScheduler::default());
        let mut host = MemoryHost::new();
        let container = host.create_container("root");
        let reconciler =
            Reconciler::with_runtime(host, Runtime::new(scheduler.clone())).with_config(config);
        Self {
            reconciler,
            container,
            scheduler,
        }
    }

    /// Schedule a pass for `element` without running it.
    pub fn render(&mut self, element: Element) {
        self.reconciler.render(element, self.container);
    }

    /// Schedule a pass for `element` and run everything to completion.
    pub fn mount(&mut self, element: Element) -> Result<Vec<CommitStats>, ReconcileError> {
        self.render(element);
        self.flush()
    }

    pub fn flush(&mut self) -> Result<Vec<CommitStats>, ReconcileError> {
        self.reconciler.flush()
    }

    /// Run one slice that yields after `units` units of work.
    pub fn step(&mut self, units: usize) -> Result<WorkStatus, ReconcileError> {
        self.reconciler.work_loop(&UnitBudget::new(units))
    }

    /// Drive all pending work in slices of `units_per_slice` units and return
    /// the number of slices it took.
    pub fn run_in_slices(&mut self, units_per_slice: usize) -> Result<usize, ReconcileError> {
        let mut slices = 0;
        while self.reconciler.has_pending_work() {
            self.step(units_per_slice)?;
            slices += 1;
        }
        Ok(slices)
    }

    pub fn dispatch(&self, node: NodeId, event: &str) -> Result<usize, HostError> {
        self.reconciler.host().dispatch(node, event)
    }

    /// First host node under the container carrying `name` with the given
    /// textual value.
    pub fn find_by_prop(&self, name: &str, value: &str) -> Option<NodeId> {
        self.reconciler.host().find(self.container, |node| {
            node.property(name)
                .is_some_and(|prop| prop.to_string() == value)
        })
    }

    pub fn markup(&self) -> String {
        self.reconciler.host().to_markup(self.container)
    }

    pub fn text(&self) -> String {
        self.reconciler.host().text_content(self.container)
    }

    pub fn dump(&self) -> String {
        self.reconciler.host().dump_tree(Some(self.container))
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn idle_requests(&self) -> usize {
        self.scheduler.requests()
    }

    pub fn host(&self) -> &MemoryHost {
        self.reconciler.host()
    }

    pub fn host_mut(&mut self) -> &mut MemoryHost {
        self.reconciler.host_mut()
    }

    pub fn reconciler(&self) -> &Reconciler<MemoryHost> {
        &self.reconciler
    }

    pub fn reconciler_mut(&mut self) -> &mut Reconciler<MemoryHost> {
        &mut self.reconciler
    }
}

impl Default for TestRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// `TestRenderer`.
pub fn run_test_render<R>(f: impl FnOnce(&mut TestRenderer) -> R) -> R {
    let mut renderer = TestRenderer::new();
    f(&mut renderer)
}
