//! Mock processor capabilities.

use parking_lot::Mutex;

use crate::graph::AutoProcess;

/// An auto-process capability with a settable answer that records how often
/// it was asked.
#[derive(Debug, Default)]
pub struct StaticAutoProcess {
    value: Mutex<bool>,
    call_count: Mutex<usize>,
}

impl StaticAutoProcess {
    /// Creates a capability answering `value`.
    #[must_use]
    pub fn new(value: bool) -> Self {
        Self {
            value: Mutex::new(value),
            call_count: Mutex::new(0),
        }
    }

    /// Changes the answer.
    pub fn set(&self, value: bool) {
        *self.value.lock() = value;
    }

    /// Returns the number of times the capability was queried.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock()
    }
}

impl AutoProcess for StaticAutoProcess {
    fn can_auto_process(&self) -> bool {
        *self.call_count.lock() += 1;
        *self.value.lock()
    }
}
