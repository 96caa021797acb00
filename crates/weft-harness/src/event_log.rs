#![forbid(unsafe_code)]

//! Ordered event recording for lifecycle tests.

use std::cell::RefCell;
use std::rc::Rc;

/// A shared, ordered log of named events.
///
/// Cloning shares the underlying buffer; [`prefixed`](EventLog::prefixed)
/// returns a handle that namespaces its entries, so several entities can
/// record into one log and the test still sees global order.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<String>>>,
    prefix: Option<String>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle recording into the same buffer with `prefix:` prepended.
    #[must_use]
    pub fn prefixed(&self, prefix: impl Into<String>) -> Self {
        Self {
            events: Rc::clone(&self.events),
            prefix: Some(prefix.into()),
        }
    }

    pub fn record(&self, event: &str) {
        let entry = match &self.prefix {
            Some(prefix) => format!("{prefix}:{event}"),
            None => event.to_string(),
        };
        self.events.borrow_mut().push(entry);
    }

    /// Drain and return everything recorded so far.
    #[must_use]
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    /// Assert the log contains exactly `expected` (in order), then clear it.
    ///
    /// # Panics
    ///
    /// Panics when the recorded sequence differs.
    #[track_caller]
    pub fn expect(&self, expected: &[&str]) {
        let actual = self.take();
        assert_eq!(actual, expected, "recorded events differ from expected");
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("prefix", &self.prefix)
            .field("events", &*self.events.borrow())
            .finish()
    }
}
