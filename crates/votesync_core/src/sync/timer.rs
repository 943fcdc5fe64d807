//! Single-slot cancellable timer.
//!
//! At most one timer is pending per slot. Arming replaces whatever was
//! pending; a fired timer is consumed and never fires twice.

/// One pending deadline tagged with what it is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Armed<K> {
    kind: K,
    deadline_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerSlot<K> {
    armed: Option<Armed<K>>,
}

impl<K> Default for TimerSlot<K> {
    fn default() -> Self {
        Self { armed: None }
    }
}

impl<K: Copy> TimerSlot<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the slot, returning the kind of the timer it replaced.
    pub fn arm(&mut self, kind: K, deadline_ms: u64) -> Option<K> {
        self.armed
            .replace(Armed { kind, deadline_ms })
            .map(|previous| previous.kind)
    }

    /// Cancels the pending timer, returning its kind.
    pub fn cancel(&mut self) -> Option<K> {
        self.armed.take().map(|armed| armed.kind)
    }

    /// Consumes and returns the pending timer if its deadline has passed.
    pub fn take_expired(&mut self, now_ms: u64) -> Option<K> {
        match self.armed {
            Some(armed) if armed.deadline_ms <= now_ms => {
                self.armed = None;
                Some(armed.kind)
            }
            _ => None,
        }
    }

    pub fn deadline_ms(&self) -> Option<u64> {
        self.armed.map(|armed| armed.deadline_ms)
    }
}
