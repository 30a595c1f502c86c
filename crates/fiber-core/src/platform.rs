//! Platform abstraction traits for the reconciler's scheduling services.
//!
//! The reconciler never decides on its own when to run. The host platform
//! hands it time slices, and these traits describe both directions of that
//! contract without depending on a particular event loop or on `std::time`.

use std::time::Duration;

/// Cooperative-yield primitive of the host.
///
/// Implementations arrange for the work loop to be invoked again in a later
/// idle period. The reconciler calls this at the end of every slice and
/// whenever new work is scheduled.
pub trait IdleScheduler: Send + Sync {
    /// Request that the host invoke the work loop during its next idle period.
    fn request_idle_callback(&self);
}

/// Budget of the slice the work loop is currently running in.
pub trait Deadline {
    /// Time left before the work loop should hand control back to the host.
    fn time_remaining(&self) -> Duration;
}

impl<F> Deadline for F
where
    F: Fn() -> Duration,
{
    fn time_remaining(&self) -> Duration {
        self()
    }
}

/// A deadline that never expires; the work loop runs the pass to completion.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unbounded;

impl Deadline for Unbounded {
    fn time_remaining(&self) -> Duration {
        Duration::MAX
    }
}

/// Provides timing information for deadline implementations.
pub trait Clock: Send + Sync {
    /// Instant type produced by this clock implementation.
    type Instant: Copy + Send + Sync;

    /// Returns the current instant.
    fn now(&self) -> Self::Instant;

    /// Returns the time elapsed since `since`.
    fn elapsed(&self, since: Self::Instant) -> Duration;
}
