//! Timed two-step confirmation for irreversible remote actions.
//!
//! # Responsibility
//! - Hold the open confirmation request (message + action kind).
//! - Withhold permission to commit until a fixed countdown elapsed.
//!
//! # Invariants
//! - Opening the gate always restarts the full countdown.
//! - Permission is granted only once every countdown tick elapsed.
//! - The gate knows nothing about what the action does remotely.

use crate::config::ConfirmationConfig;
use crate::sync::clock::Clock;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Destructive action awaiting confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationAction {
    DeleteCurrentEventData,
    DeleteAllEventData,
}

impl ConfirmationAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DeleteCurrentEventData => "delete_current_event_data",
            Self::DeleteAllEventData => "delete_all_event_data",
        }
    }
}

/// Snapshot of the gate for rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfirmationRequest {
    pub visible: bool,
    pub message: String,
    pub action: Option<ConfirmationAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationError {
    NotOpen,
    CountdownRunning { remaining_ticks: u32 },
}

impl Display for ConfirmationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotOpen => write!(f, "no confirmation is pending"),
            Self::CountdownRunning { remaining_ticks } => {
                write!(f, "confirmation available in {remaining_ticks} tick(s)")
            }
        }
    }
}

impl Error for ConfirmationError {}

pub struct ConfirmationGate<C: Clock> {
    config: ConfirmationConfig,
    clock: C,
    request: ConfirmationRequest,
    opened_at_ms: Option<u64>,
}

impl<C: Clock> ConfirmationGate<C> {
    pub fn new(config: ConfirmationConfig, clock: C) -> Self {
        Self {
            config,
            clock,
            request: ConfirmationRequest::default(),
            opened_at_ms: None,
        }
    }

    /// Opens (or re-opens) the gate and restarts the countdown.
    pub fn request(&mut self, message: impl Into<String>, action: ConfirmationAction) {
        self.request = ConfirmationRequest {
            visible: true,
            message: message.into(),
            action: Some(action),
        };
        self.opened_at_ms = Some(self.clock.now_ms());
    }

    /// Closes the gate and discards the request, whatever the countdown.
    pub fn abort(&mut self) {
        self.request = ConfirmationRequest::default();
        self.opened_at_ms = None;
    }

    /// Closes the gate after the confirmed action was handed off.
    pub fn complete(&mut self) {
        self.abort();
    }

    pub fn is_open(&self) -> bool {
        self.request.visible
    }

    pub fn pending(&self) -> &ConfirmationRequest {
        &self.request
    }

    /// Countdown ticks left before confirming is allowed.
    ///
    /// Returns the full count for a closed gate.
    pub fn remaining_ticks(&self) -> u32 {
        let Some(opened_at_ms) = self.opened_at_ms else {
            return self.config.countdown_ticks;
        };
        let elapsed_ms = self.clock.now_ms().saturating_sub(opened_at_ms);
        if elapsed_ms >= self.config.countdown_ms() {
            return 0;
        }
        let elapsed_ticks = u32::try_from(elapsed_ms / self.config.tick_ms.max(1)).unwrap_or(u32::MAX);
        self.config.countdown_ticks.saturating_sub(elapsed_ticks)
    }

    pub fn can_confirm(&self) -> bool {
        self.is_open() && self.remaining_ticks() == 0
    }

    /// Returns the action the caller may now perform.
    ///
    /// The gate stays open; call `complete` once the action was handed off.
    pub fn confirm(&self) -> Result<ConfirmationAction, ConfirmationError> {
        let Some(action) = self.request.action.filter(|_| self.request.visible) else {
            return Err(ConfirmationError::NotOpen);
        };
        match self.remaining_ticks() {
            0 => Ok(action),
            remaining_ticks => Err(ConfirmationError::CountdownRunning { remaining_ticks }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfirmationAction, ConfirmationError, ConfirmationGate};
    use crate::config::ConfirmationConfig;
    use crate::sync::clock::ManualClock;

    fn gate() -> (ConfirmationGate<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        (
            ConfirmationGate::new(ConfirmationConfig::default(), clock.clone()),
            clock,
        )
    }

    #[test]
    fn confirm_is_refused_until_countdown_elapses() {
        let (mut gate, clock) = gate();
        gate.request("sure?", ConfirmationAction::DeleteCurrentEventData);
        assert_eq!(gate.remaining_ticks(), 5);

        clock.advance(999);
        assert_eq!(gate.remaining_ticks(), 5);
        clock.advance(1);
        assert_eq!(gate.remaining_ticks(), 4);

        clock.advance(3_999);
        assert_eq!(
            gate.confirm(),
            Err(ConfirmationError::CountdownRunning { remaining_ticks: 1 })
        );
        clock.advance(1);
        assert_eq!(gate.confirm(), Ok(ConfirmationAction::DeleteCurrentEventData));
        assert!(gate.is_open());
    }

    #[test]
    fn reopening_restarts_countdown() {
        let (mut gate, clock) = gate();
        gate.request("first", ConfirmationAction::DeleteCurrentEventData);
        clock.advance(4_000);
        gate.request("second", ConfirmationAction::DeleteAllEventData);
        assert_eq!(gate.remaining_ticks(), 5);
        assert_eq!(gate.pending().message, "second");

        clock.advance(4_999);
        assert!(!gate.can_confirm());
        clock.advance(1);
        assert_eq!(gate.confirm(), Ok(ConfirmationAction::DeleteAllEventData));
    }

    #[test]
    fn abort_discards_request() {
        let (mut gate, clock) = gate();
        gate.request("sure?", ConfirmationAction::DeleteAllEventData);
        clock.advance(10_000);
        gate.abort();
        assert!(!gate.is_open());
        assert_eq!(gate.pending().message, "");
        assert_eq!(gate.pending().action, None);
        assert_eq!(gate.confirm(), Err(ConfirmationError::NotOpen));
    }

    #[test]
    fn closed_gate_cannot_confirm() {
        let (gate, _clock) = gate();
        assert!(!gate.can_confirm());
        assert_eq!(gate.confirm(), Err(ConfirmationError::NotOpen));
    }
}
