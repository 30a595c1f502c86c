use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use crate::element::Element;
use crate::fiber::{Children, Fiber, FiberId, FiberKind, FiberTree};
use crate::hooks::{render_with_hooks, HookFrame};
use crate::host::{HostAdapter, HostNodeKind};
use crate::platform::{Deadline, Unbounded};
use crate::props::Props;
use crate::runtime::{DefaultScheduler, Runtime, RuntimeHandle};
use crate::{NodeId, ReconcileError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// The loop yields once the slice has less time left than this.
    pub yield_threshold: Duration,
    /// Reject renders whose hook count differs from the previous render.
    pub check_hook_consistency: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            yield_threshold: Duration::from_millis(1),
            check_hook_consistency: cfg!(debug_assertions),
        }
    }
}

/// Host-level effects applied by one commit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommitStats {
    pub placements: usize,
    pub updates: usize,
    pub deletions: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkStatus {
    /// Nothing was scheduled.
    Idle,
    /// The slice ran out of time with units still left.
    Yielded { units: usize },
    Committed(CommitStats),
}

/// Owns the fiber tree and the host of one root container and advances
/// render passes one unit of work at a time.
pub struct Reconciler<H: HostAdapter> {
    pub(crate) tree: FiberTree,
    pub(crate) host: H,
    runtime: Runtime,
    config: ReconcilerConfig,
    poisoned: bool,
}

impl<H: HostAdapter> Reconciler<H> {
    pub fn new(host: H) -> Self {
        Self::with_runtime(host, Runtime::new(Arc::new(DefaultScheduler)))
    }

    pub fn with_runtime(host: H, runtime: Runtime) -> Self {
        Self {
            tree: FiberTree::new(),
            host,
            runtime,
            config: ReconcilerConfig::default(),
            poisoned: false,
        }
    }

    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Schedules a pass that renders `element` into `container`. A pass
    /// still in flight is abandoned, and so is a pending state-update
    /// restart: the new pass diffs against the committed tree and picks up
    /// queued updates anyway.
    pub fn render(&mut self, element: Element, container: NodeId) {
        if self.poisoned {
            log::warn!("render on container {container} ignored after a failed commit");
            return;
        }
        self.runtime.take_rerender_request();
        let props = Props::new().with_children(vec![Some(element)]);
        self.start_pass(container, Rc::new(props));
    }

    /// Runs units of work until the deadline asks for a yield or the pass is
    /// complete, in which case it is committed before returning.
    ///
    /// Any error aborts the pass. Errors raised while rendering leave the
    /// committed tree as it was; a host error during commit poisons the
    /// reconciler and every later call fails with
    /// [`ReconcileError::Poisoned`].
    pub fn work_loop<D: Deadline + ?Sized>(
        &mut self,
        deadline: &D,
    ) -> Result<WorkStatus, ReconcileError> {
        if self.poisoned {
            return Err(ReconcileError::Poisoned);
        }
        let result = self.run_slice(deadline);
        if let Err(err) = &result {
            log::error!("render pass aborted: {err}");
            self.abort_pass();
        }
        self.runtime.request_idle_callback();
        result
    }

    /// Drives the work loop without a deadline until nothing is pending and
    /// returns the stats of every commit made on the way.
    pub fn flush(&mut self) -> Result<Vec<CommitStats>, ReconcileError> {
        if self.poisoned {
            return Err(ReconcileError::Poisoned);
        }
        let mut commits = Vec::new();
        while self.has_pending_work() {
            if let WorkStatus::Committed(stats) = self.work_loop(&Unbounded)? {
                commits.push(stats);
            }
        }
        Ok(commits)
    }

    pub fn has_pending_work(&self) -> bool {
        !self.poisoned
            && (self.tree.next_unit_of_work.is_some()
                || self.tree.wip_root.is_some()
                || (self.tree.current_root.is_some() && self.runtime.has_rerender_request()))
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn current_root(&self) -> Option<FiberId> {
        self.tree.current_root
    }

    pub fn fiber(&self, id: FiberId) -> Option<&Fiber> {
        self.tree.get(id)
    }

    pub fn children(&self, id: FiberId) -> Children<'_> {
        self.tree.children(id)
    }

    pub fn tree(&self) -> &FiberTree {
        &self.tree
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    fn run_slice<D: Deadline + ?Sized>(
        &mut self,
        deadline: &D,
    ) -> Result<WorkStatus, ReconcileError> {
        if self.tree.current_root.is_some() && self.runtime.take_rerender_request() {
            self.restart_from_current();
        }

        let mut units = 0;
        while let Some(fiber) = self.tree.next_unit_of_work {
            self.tree.next_unit_of_work = self.perform_unit_of_work(fiber)?;
            units += 1;
            if deadline.time_remaining() < self.config.yield_threshold {
                break;
            }
        }

        if self.tree.next_unit_of_work.is_some() {
            log::trace!("yielding after {units} units");
            return Ok(WorkStatus::Yielded { units });
        }
        match self.tree.wip_root {
            Some(root) => match self.commit_root(root) {
                Ok(stats) => Ok(WorkStatus::Committed(stats)),
                Err(err) => {
                    self.poisoned = true;
                    Err(err)
                }
            },
            None => Ok(WorkStatus::Idle),
        }
    }

    fn start_pass(&mut self, container: NodeId, props: Rc<Props>) {
        self.abort_pass();
        let alternate = self.tree.current_root;
        let root = self.tree.insert(Fiber::root(container, props, alternate));
        self.tree.wip_root = Some(root);
        self.tree.next_unit_of_work = Some(root);
        log::debug!(
            "render pass started on container {container} ({})",
            if alternate.is_some() { "update" } else { "mount" }
        );
        self.runtime.request_idle_callback();
    }

    fn restart_from_current(&mut self) {
        let Some(current) = self.tree.current_root else {
            return;
        };
        let root = &self.tree[current];
        let Some(container) = root.dom else {
            return;
        };
        let props = Rc::clone(&root.props);
        log::debug!("state update: restarting from the committed root");
        self.start_pass(container, props);
    }

    fn abort_pass(&mut self) {
        if let Some(root) = self.tree.wip_root.take() {
            self.tree.discard_subtree(root);
        }
        self.tree.next_unit_of_work = None;
        for id in std::mem::take(&mut self.tree.deletions) {
            if let Some(fiber) = self.tree.get_mut(id) {
                fiber.effect = None;
            }
        }
    }

    fn perform_unit_of_work(&mut self, id: FiberId) -> Result<Option<FiberId>, ReconcileError> {
        log::trace!("unit of work {id:?} ({:?})", self.tree[id].kind);
        if self.tree[id].kind.is_component() {
            self.update_component(id)?;
        } else {
            self.update_host(id)?;
        }
        let root = self.tree.wip_root.unwrap_or(id);
        Ok(self.tree.next_in_preorder(id, root))
    }

    fn update_host(&mut self, id: FiberId) -> Result<(), ReconcileError> {
        let fiber = &self.tree[id];
        let kind = match (&fiber.kind, fiber.dom) {
            (FiberKind::Host(tag), None) => Some(HostNodeKind::Element(tag)),
            (FiberKind::Text, None) => Some(HostNodeKind::Text),
            _ => None,
        };
        if let Some(kind) = kind {
            let node = self.host.create_node(kind)?;
            self.host.apply_props(node, &Props::new(), &fiber.props)?;
            self.tree[id].set_dom(node);
        }

        let props = Rc::clone(&self.tree[id].props);
        self.tree.reconcile_children(id, props.children());
        Ok(())
    }

    fn update_component(&mut self, id: FiberId) -> Result<(), ReconcileError> {
        let fiber = &self.tree[id];
        let FiberKind::Component(component) = &fiber.kind else {
            return Ok(());
        };
        let component = component.clone();
        let props = Rc::clone(&fiber.props);
        let previous = fiber.alternate.map(|alternate| self.tree[alternate].hooks.clone());

        let check_count = previous.is_some() && self.config.check_hook_consistency;
        let frame = HookFrame::new(
            component.name(),
            previous.unwrap_or_default(),
            self.runtime.handle(),
        );
        let (element, frame) = render_with_hooks(frame, || component.render(&props));
        self.tree[id].hooks = frame.finish(check_count)?;
        self.tree.reconcile_children(id, &[Some(element)]);
        Ok(())
    }
}
