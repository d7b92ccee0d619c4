#![forbid(unsafe_code)]

//! Scoped disposer lists.
//!
//! Every registration a component makes (event listener, observer, frame
//! loop, timer) pushes its matching release into a [`Teardown`]. Disposing
//! the list releases everything exactly once, newest first, so unmount is
//! deterministic regardless of how many times the host calls it.

use std::cell::{Cell, RefCell};

type Disposer = Box<dyn FnOnce()>;

/// Ordered list of release actions run once on dispose.
#[derive(Default)]
pub struct Teardown {
    actions: RefCell<Vec<Disposer>>,
    disposed: Cell<bool>,
}

impl std::fmt::Debug for Teardown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Teardown")
            .field("pending", &self.actions.borrow().len())
            .field("disposed", &self.disposed.get())
            .finish()
    }
}

impl Teardown {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a release action.
    ///
    /// Registering on an already-disposed list runs the action immediately:
    /// a late registration must not outlive the unmount that preceded it.
    pub fn push(&self, action: impl FnOnce() + 'static) {
        if self.disposed.get() {
            action();
            return;
        }
        self.actions.borrow_mut().push(Box::new(action));
    }

    /// Run every registered action in reverse order. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        let actions = std::mem::take(&mut *self.actions.borrow_mut());
        tracing::debug!(count = actions.len(), "teardown: releasing registrations");
        for action in actions.into_iter().rev() {
            action();
        }
    }

    /// Whether [`dispose`](Self::dispose) has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// Number of actions waiting for dispose.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.borrow().len()
    }

    /// Whether no actions are waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        self.dispose();
    }
}
