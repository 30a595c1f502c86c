//! Positional state cells for component fibers.
//!
//! While a component renders, its fiber is installed as the active hook
//! frame. Every `use_state` call takes the next slot: the slot's value is read
//! from the same index on the fiber's alternate, folded through whatever
//! updates were queued there since, and stored in a fresh cell on the new
//! fiber. Slots are matched by call order only, so a component must call its
//! hooks in the same order on every render.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::runtime::RuntimeHandle;
use crate::HookError;

thread_local! {
    static ACTIVE_FRAMES: RefCell<Vec<HookFrame>> = const { RefCell::new(Vec::new()) };
}

type Updater<T> = Rc<dyn Fn(&T) -> T>;

struct UpdateQueue<T> {
    updates: RefCell<Vec<Updater<T>>>,
}

impl<T> UpdateQueue<T> {
    fn new() -> Self {
        Self {
            updates: RefCell::new(Vec::new()),
        }
    }

    fn push(&self, updater: Updater<T>) {
        self.updates.borrow_mut().push(updater);
    }

    fn snapshot(&self) -> Vec<Updater<T>> {
        self.updates.borrow().clone()
    }

    fn len(&self) -> usize {
        self.updates.borrow().len()
    }
}

/// One state slot. The queue is shared with the setters handed out for this
/// slot; the next render reads it without draining so an abandoned pass can be
/// redone from the same inputs.
#[derive(Clone)]
pub(crate) struct HookCell {
    state: Rc<dyn Any>,
    queue: Rc<dyn Any>,
}

impl HookCell {
    fn new<T: 'static>(state: T, queue: Rc<UpdateQueue<T>>) -> Self {
        Self {
            state: Rc::new(state),
            queue,
        }
    }

    fn read<T: Clone + 'static>(&self) -> Option<(T, Rc<UpdateQueue<T>>)> {
        let state = self.state.downcast_ref::<T>()?.clone();
        let queue = Rc::clone(&self.queue).downcast::<UpdateQueue<T>>().ok()?;
        Some((state, queue))
    }
}

pub(crate) struct HookFrame {
    component: &'static str,
    previous: Vec<HookCell>,
    cells: Vec<HookCell>,
    runtime: RuntimeHandle,
    error: Option<HookError>,
}

impl HookFrame {
    pub(crate) fn new(
        component: &'static str,
        previous: Vec<HookCell>,
        runtime: RuntimeHandle,
    ) -> Self {
        Self {
            component,
            previous,
            cells: Vec::new(),
            runtime,
            error: None,
        }
    }

    /// Returns the cells built during the render, or the first hook error.
    /// With `check_count` set, a render that used a different number of hooks
    /// than the previous one is rejected.
    pub(crate) fn finish(self, check_count: bool) -> Result<Vec<HookCell>, HookError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if check_count && self.previous.len() != self.cells.len() {
            return Err(HookError::CountMismatch {
                component: self.component,
                previous: self.previous.len(),
                current: self.cells.len(),
            });
        }
        Ok(self.cells)
    }
}

/// Runs `render` with `frame` installed as the active hook frame.
pub(crate) fn render_with_hooks<R>(frame: HookFrame, render: impl FnOnce() -> R) -> (R, HookFrame) {
    ACTIVE_FRAMES.with(|frames| frames.borrow_mut().push(frame));
    struct Guard {
        armed: bool,
    }
    impl Drop for Guard {
        fn drop(&mut self) {
            if self.armed {
                ACTIVE_FRAMES.with(|frames| {
                    frames.borrow_mut().pop();
                });
            }
        }
    }
    let mut guard = Guard { armed: true };
    let result = render();
    guard.armed = false;
    let frame = ACTIVE_FRAMES
        .with(|frames| frames.borrow_mut().pop())
        .expect("hook frame stack underflow");
    (result, frame)
}

/// Handle that queues updates for one state slot and asks the runtime for a
/// fresh pass. The new value becomes visible on the next render.
pub struct StateSetter<T> {
    queue: Rc<UpdateQueue<T>>,
    runtime: RuntimeHandle,
}

impl<T: 'static> StateSetter<T> {
    pub fn update(&self, updater: impl Fn(&T) -> T + 'static) {
        self.queue.push(Rc::new(updater));
        self.runtime.request_rerender();
    }

    /// Number of updates queued on this slot since it was rendered.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl<T: Clone + 'static> StateSetter<T> {
    pub fn set(&self, value: T) {
        self.update(move |_| value.clone());
    }
}

impl<T> Clone for StateSetter<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Rc::clone(&self.queue),
            runtime: self.runtime.clone(),
        }
    }
}

impl<T> PartialEq for StateSetter<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.queue, &other.queue)
    }
}

impl<T> fmt::Debug for StateSetter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSetter")
            .field("pending", &self.queue.len())
            .finish()
    }
}

/// Declares a state slot for the component currently rendering.
///
/// Returns the slot's value for this render and a setter bound to the slot.
/// Fails with [`HookError::NoActiveComponent`] outside a component render. A
/// slot whose previous value has a different type is reported when the
/// render finishes and `initial` is used in the meantime.
pub fn try_use_state<T: Clone + 'static>(initial: T) -> Result<(T, StateSetter<T>), HookError> {
    let (component, index, previous, runtime) = ACTIVE_FRAMES.with(|frames| {
        let frames = frames.borrow();
        let frame = frames.last().ok_or(HookError::NoActiveComponent)?;
        let index = frame.cells.len();
        Ok::<_, HookError>((
            frame.component,
            index,
            frame.previous.get(index).cloned(),
            frame.runtime.clone(),
        ))
    })?;

    let mut error = None;
    let state = match previous.as_ref().map(HookCell::read::<T>) {
        Some(Some((state, queue))) => queue
            .snapshot()
            .iter()
            .fold(state, |state, updater| updater(&state)),
        Some(None) => {
            error = Some(HookError::TypeMismatch {
                component,
                index,
                expected: std::any::type_name::<T>(),
            });
            initial
        }
        None => initial,
    };

    let queue = Rc::new(UpdateQueue::new());
    let cell = HookCell::new(state.clone(), Rc::clone(&queue));
    ACTIVE_FRAMES.with(|frames| {
        if let Some(frame) = frames.borrow_mut().last_mut() {
            frame.cells.push(cell);
            if frame.error.is_none() {
                frame.error = error;
            }
        }
    });

    Ok((state, StateSetter { queue, runtime }))
}

/// Panicking form of [`try_use_state`].
///
/// # Panics
///
/// Panics when called outside a component render.
pub fn use_state<T: Clone + 'static>(initial: T) -> (T, StateSetter<T>) {
    match try_use_state(initial) {
        Ok(slot) => slot,
        Err(err) => panic!("{err}"),
    }
}
