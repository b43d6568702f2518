use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::base::error::JoinError;
use crate::fiber::scheduler::FiberId;

/// Where a fiber deposits its outcome. Shared between the fiber body and
/// the handle; written exactly once.
pub(crate) type ResultSlot<T> = Rc<RefCell<Option<Result<T, JoinError>>>>;

/// Owner's view of a scheduled fiber.
///
/// The handle does not borrow the scheduler; it shares only the slot the
/// fiber writes its result into. Dropping a handle never cancels the fiber,
/// and a handle can be joined any time after the scheduler has run.
pub struct FiberHandle<T> {
    id: FiberId,
    slot: ResultSlot<T>,
}

impl<T> FiberHandle<T> {
    pub(crate) fn new(id: FiberId, slot: ResultSlot<T>) -> Self {
        FiberHandle { id, slot }
    }

    /// Handle for a fiber that could not be scheduled because its scheduler
    /// no longer exists. Always joins as incomplete.
    pub(crate) fn detached() -> Self {
        FiberHandle {
            id: FiberId::DETACHED,
            slot: Rc::new(RefCell::new(None)),
        }
    }

    /// Scheduler-assigned identifier of the fiber.
    pub fn id(&self) -> FiberId {
        self.id
    }

    /// Whether the fiber has run to completion, normally or by panic.
    pub fn is_finished(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Consumes the handle and returns the fiber's result.
    ///
    /// Returns [`JoinError::Incomplete`] when the fiber has not finished
    /// (the scheduler has not run it to the end, or was dropped first) and
    /// [`JoinError::Panicked`] when its body panicked.
    pub fn join(self) -> Result<T, JoinError> {
        self.slot
            .borrow_mut()
            .take()
            .unwrap_or(Err(JoinError::Incomplete))
    }
}

impl<T> fmt::Debug for FiberHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FiberHandle")
            .field("id", &self.id)
            .field("finished", &self.is_finished())
            .finish()
    }
}
