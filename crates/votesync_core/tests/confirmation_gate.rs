use votesync_core::{
    ConfirmationAction, ConfirmationConfig, ConfirmationError, ConfirmationGate, ManualClock,
};

fn gate() -> (ConfirmationGate<ManualClock>, ManualClock) {
    let clock = ManualClock::new();
    (ConfirmationGate::new(ConfirmationConfig::default(), clock.clone()), clock)
}

#[test]
fn confirm_has_no_effect_before_five_seconds() {
    let (mut gate, clock) = gate();
    gate.request("Delete?", ConfirmationAction::DeleteAllEventData);

    for remaining in (1..=5).rev() {
        assert_eq!(gate.remaining_ticks(), remaining);
        assert_eq!(
            gate.confirm().unwrap_err(),
            ConfirmationError::CountdownRunning {
                remaining_ticks: remaining
            }
        );
        clock.advance(1_000);
    }

    assert_eq!(gate.remaining_ticks(), 0);
    assert_eq!(gate.confirm().unwrap(), ConfirmationAction::DeleteAllEventData);
}

#[test]
fn reopening_mid_countdown_starts_over() {
    let (mut gate, clock) = gate();
    gate.request("first", ConfirmationAction::DeleteCurrentEventData);
    clock.advance(3_000);
    assert_eq!(gate.remaining_ticks(), 2);

    gate.request("first", ConfirmationAction::DeleteCurrentEventData);
    assert_eq!(gate.remaining_ticks(), 5);
    clock.advance(2_000);
    assert!(!gate.can_confirm());
    clock.advance(3_000);
    assert!(gate.can_confirm());
}

#[test]
fn completed_gate_is_closed() {
    let (mut gate, clock) = gate();
    gate.request("Delete?", ConfirmationAction::DeleteCurrentEventData);
    clock.advance(5_000);
    gate.confirm().unwrap();
    gate.complete();

    assert!(!gate.is_open());
    assert!(!gate.pending().visible);
    assert_eq!(gate.confirm().unwrap_err(), ConfirmationError::NotOpen);
}

#[test]
fn custom_countdown_is_honoured() {
    let clock = ManualClock::new();
    let config = ConfirmationConfig {
        countdown_ticks: 2,
        tick_ms: 250,
    };
    let mut gate = ConfirmationGate::new(config, clock.clone());
    gate.request("quick", ConfirmationAction::DeleteAllEventData);
    clock.advance(499);
    assert_eq!(gate.remaining_ticks(), 1);
    clock.advance(1);
    assert!(gate.can_confirm());
}
