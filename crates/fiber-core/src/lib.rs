#![doc = r"Core runtime pieces for the Fiber-RS incremental reconciler."]

pub mod collections;
mod commit;
pub mod element;
pub mod fiber;
pub mod hooks;
pub mod host;
pub mod platform;
pub mod props;
mod reconcile;
pub mod runtime;
pub mod work_loop;

pub use element::{create_element, text_element, Child, Component, Element, ElementKind};
pub use fiber::{EffectTag, Fiber, FiberId, FiberKind, FiberTree};
pub use hooks::{try_use_state, use_state, StateSetter};
pub use host::{HostAdapter, HostNodeKind, HostOp, MemoryHost, MemoryNode, MemoryNodeKind};
pub use platform::{Clock, Deadline, IdleScheduler, Unbounded};
pub use props::{diff_props, event_name, Event, EventHandler, PropChange, PropValue, Props};
pub use runtime::{DefaultScheduler, Runtime, RuntimeHandle};
pub use work_loop::{CommitStats, Reconciler, ReconcilerConfig, WorkStatus};

use thiserror::Error;

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("host node {id} missing")]
    MissingNode { id: NodeId },
    #[error("node {child} is not a child of node {parent}")]
    NotAChild { parent: NodeId, child: NodeId },
    #[error("host refused {operation} on node {node}")]
    Refused {
        operation: &'static str,
        node: NodeId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    #[error("use_state called outside of a component render")]
    NoActiveComponent,
    #[error("hook {index} of `{component}` changed type; expected {expected}")]
    TypeMismatch {
        component: &'static str,
        index: usize,
        expected: &'static str,
    },
    #[error("`{component}` called {current} hooks but its previous render called {previous}")]
    CountMismatch {
        component: &'static str,
        previous: usize,
        current: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error("fiber {fiber:?} has no host ancestor to attach to")]
    NoHostParent { fiber: FiberId },
    /// An earlier commit failed after touching the host, so the committed
    /// tree no longer describes it.
    #[error("reconciler is unusable after a failed commit")]
    Poisoned,
}

/// Builds a child list for [`create_element`] from heterogeneous values.
///
/// ```ignore
/// create_element("p", Props::new(), children!["count: ", count, button]);
/// ```
#[macro_export]
macro_rules! children {
    () => {
        ::std::vec::Vec::<$crate::Child>::new()
    };
    ($($child:expr),+ $(,)?) => {
        ::std::vec![$($crate::Child::from($child)),+]
    };
}
