//! Headless harness for driving a `fiber-core` reconciler from tests:
//! an in-memory renderer, deterministic clocks and slice budgets.

pub mod testing;

pub use testing::*;

pub mod prelude {
    pub use crate::testing::{
        run_test_render, ManualClock, RecordingScheduler, TestRenderer, UnitBudget,
    };
}
