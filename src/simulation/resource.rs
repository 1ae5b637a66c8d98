//! Capacity-1 resource with a FIFO request queue.

use std::collections::VecDeque;

use crate::models::OperationRef;

/// A unit-capacity resource.
///
/// At most one operation holds it; later requests wait in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitResource {
    holder: Option<OperationRef>,
    queue: VecDeque<OperationRef>,
}

impl UnitResource {
    /// Creates a free resource.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the resource. Returns `true` if granted immediately,
    /// otherwise the request is queued.
    pub fn request(&mut self, operation: OperationRef) -> bool {
        if self.holder.is_none() {
            self.holder = Some(operation);
            true
        } else {
            self.queue.push_back(operation);
            false
        }
    }

    /// Releases the resource held by `operation` and grants it to the
    /// oldest waiting request, which is returned.
    ///
    /// Releasing a resource the operation does not hold is a no-op.
    pub fn release(&mut self, operation: OperationRef) -> Option<OperationRef> {
        if self.holder != Some(operation) {
            return None;
        }
        self.holder = self.queue.pop_front();
        self.holder
    }

    /// Current holder.
    pub fn holder(&self) -> Option<OperationRef> {
        self.holder
    }

    /// Whether the resource is held.
    pub fn is_held(&self) -> bool {
        self.holder.is_some()
    }

    /// Waiting requests.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Waiting requests plus the holder.
    pub fn load(&self) -> usize {
        self.queue.len() + usize::from(self.holder.is_some())
    }
}
