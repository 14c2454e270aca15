//! Click / drag recognition from a per-frame pinch signal.
//!
//! A pinch released before `drag_threshold` is a click; one held at least
//! that long becomes a drag that lasts until release. The decision uses
//! elapsed time since pinch onset, never frame count, so it holds at any
//! camera frame rate.

use log::{debug, info, warn};
use serde::Serialize;
use std::time::Duration;

use crate::motion::ScreenPoint;

/// Time since session start.
pub type Timestamp = Duration;

/// What one frame asks the action sink to do.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "action", content = "at", rename_all = "snake_case")]
pub enum Action {
    Move(ScreenPoint),
    ClickFired,
    DragStart,
    DragMove(ScreenPoint),
    DragEnd,
    NoOp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    pub drag_threshold: Duration,
    /// Minimum spacing between two clicks. Zero disables the check.
    pub click_cooldown: Duration,
    /// How long a vanished hand may keep a pinch or drag alive.
    pub lost_hand_release: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            drag_threshold: Duration::from_millis(300),
            click_cooldown: Duration::from_millis(100),
            lost_hand_release: Duration::from_millis(250),
        }
    }
}

/// `Dragging` is only reachable through `Pinching`, and the pinch start time
/// exists exactly while pinched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PinchState {
    #[default]
    Idle,
    Pinching {
        since: Timestamp,
    },
    Dragging,
}

#[derive(Debug, Clone)]
pub struct GestureMachine {
    timing: Timing,
    state: PinchState,
    last_click: Option<Timestamp>,
    lost_since: Option<Timestamp>,
}

impl GestureMachine {
    pub fn new(timing: Timing) -> Self {
        Self {
            timing,
            state: PinchState::Idle,
            last_click: None,
            lost_since: None,
        }
    }

    pub fn set_timing(&mut self, timing: Timing) {
        self.timing = timing;
    }

    pub fn state(&self) -> PinchState {
        self.state
    }

    pub fn is_pinched(&self) -> bool {
        !matches!(self.state, PinchState::Idle)
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, PinchState::Dragging)
    }

    pub fn pinch_start_time(&self) -> Option<Timestamp> {
        match self.state {
            PinchState::Pinching { since } => Some(since),
            _ => None,
        }
    }

    /// Advance one frame with a visible hand. `at` is the current smoothed
    /// cursor, carried by `DragMove`.
    pub fn step(&mut self, pinching: bool, now: Timestamp, at: ScreenPoint) -> Action {
        self.lost_since = None;

        match (self.state, pinching) {
            (PinchState::Idle, false) => Action::NoOp,
            (PinchState::Idle, true) => {
                self.state = PinchState::Pinching { since: now };
                debug!("pinch started at {now:?}");
                Action::NoOp
            }
            (PinchState::Pinching { since }, true) => {
                if now.saturating_sub(since) >= self.timing.drag_threshold {
                    self.state = PinchState::Dragging;
                    info!("drag started");
                    Action::DragStart
                } else {
                    Action::NoOp
                }
            }
            (PinchState::Pinching { .. }, false) => {
                self.state = PinchState::Idle;
                if self.in_cooldown(now) {
                    debug!("click suppressed by cooldown");
                    return Action::NoOp;
                }
                self.last_click = Some(now);
                info!("click");
                Action::ClickFired
            }
            (PinchState::Dragging, true) => Action::DragMove(at),
            (PinchState::Dragging, false) => {
                self.state = PinchState::Idle;
                info!("drag ended");
                Action::DragEnd
            }
        }
    }

    /// Advance one frame without a hand.
    ///
    /// The state is held for `lost_hand_release`; past that a drag ends and a
    /// pending pinch is dropped without a click.
    pub fn hand_lost(&mut self, now: Timestamp) -> Action {
        if self.state == PinchState::Idle {
            self.lost_since = None;
            return Action::NoOp;
        }
        let since = *self.lost_since.get_or_insert(now);
        if now.saturating_sub(since) < self.timing.lost_hand_release {
            return Action::NoOp;
        }
        warn!(
            "hand lost for {:?} while {:?}; releasing",
            now.saturating_sub(since),
            self.state
        );
        self.force_release()
    }

    /// Return to `Idle` now, ending any drag.
    pub fn force_release(&mut self) -> Action {
        let was = std::mem::take(&mut self.state);
        self.lost_since = None;
        match was {
            PinchState::Dragging => Action::DragEnd,
            _ => Action::NoOp,
        }
    }

    fn in_cooldown(&self, now: Timestamp) -> bool {
        self.last_click
            .is_some_and(|t| now.saturating_sub(t) < self.timing.click_cooldown)
    }
}

impl Default for GestureMachine {
    fn default() -> Self {
        Self::new(Timing::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: ScreenPoint = ScreenPoint { x: 10.0, y: 20.0 };

    fn s(secs: f64) -> Timestamp {
        Duration::from_secs_f64(secs)
    }

    fn run(m: &mut GestureMachine, inputs: &[(bool, f64)]) -> Vec<Action> {
        inputs.iter().map(|&(p, t)| m.step(p, s(t), P)).collect()
    }

    fn count(actions: &[Action], want: Action) -> usize {
        actions
            .iter()
            .filter(|a| std::mem::discriminant(*a) == std::mem::discriminant(&want))
            .count()
    }

    #[test]
    fn hold_then_release_scenario() {
        let mut m = GestureMachine::default();
        let out = run(&mut m, &[(true, 0.0), (true, 0.1), (true, 0.35), (false, 0.4)]);
        assert_eq!(
            out,
            vec![
                Action::NoOp,
                Action::NoOp,
                Action::DragStart,
                Action::DragEnd
            ]
        );
        assert_eq!(m.state(), PinchState::Idle);
    }

    #[test]
    fn short_pinch_is_one_click() {
        let mut m = GestureMachine::default();
        let out = run(
            &mut m,
            &[(false, 0.0), (true, 0.1), (true, 0.2), (true, 0.39), (false, 0.4)],
        );
        assert_eq!(count(&out, Action::ClickFired), 1);
        assert_eq!(count(&out, Action::DragStart), 0);
        assert_eq!(count(&out, Action::DragEnd), 0);
        assert_eq!(out.last(), Some(&Action::ClickFired));
    }

    #[test]
    fn drag_starts_exactly_at_threshold() {
        let mut m = GestureMachine::default();
        let ms = Duration::from_millis;
        assert_eq!(m.step(true, ms(1000), P), Action::NoOp);
        assert_eq!(m.step(true, ms(1299), P), Action::NoOp);
        assert_eq!(m.step(true, ms(1300), P), Action::DragStart);
        assert!(m.is_dragging());
    }

    #[test]
    fn held_pinch_drags_once() {
        let mut m = GestureMachine::default();
        let mut inputs: Vec<(bool, f64)> = (0..30).map(|i| (true, i as f64 * 0.033)).collect();
        inputs.push((false, 1.0));
        let out = run(&mut m, &inputs);
        assert_eq!(count(&out, Action::DragStart), 1);
        assert_eq!(count(&out, Action::DragEnd), 1);
        assert_eq!(count(&out, Action::ClickFired), 0);
        assert!(count(&out, Action::DragMove(P)) > 0);
        assert!(out.contains(&Action::DragMove(P)));
    }

    #[test]
    fn pinch_state_tracks_start_time() {
        let mut m = GestureMachine::default();
        assert_eq!(m.pinch_start_time(), None);
        m.step(true, s(0.5), P);
        assert!(m.is_pinched());
        assert_eq!(m.pinch_start_time(), Some(s(0.5)));
        m.step(true, s(0.9), P);
        assert!(m.is_dragging());
        assert_eq!(m.pinch_start_time(), None);
    }

    #[test]
    fn cooldown_suppresses_rapid_second_click() {
        let mut m = GestureMachine::default();
        let out = run(
            &mut m,
            &[(true, 0.0), (false, 0.03), (true, 0.06), (false, 0.09), (true, 0.2), (false, 0.25)],
        );
        assert_eq!(
            out,
            vec![
                Action::NoOp,
                Action::ClickFired,
                Action::NoOp,
                Action::NoOp,
                Action::NoOp,
                Action::ClickFired
            ]
        );
    }

    #[test]
    fn zero_cooldown_allows_back_to_back_clicks() {
        let mut m = GestureMachine::new(Timing {
            click_cooldown: Duration::ZERO,
            ..Timing::default()
        });
        let out = run(&mut m, &[(true, 0.0), (false, 0.01), (true, 0.02), (false, 0.03)]);
        assert_eq!(count(&out, Action::ClickFired), 2);
    }

    #[test]
    fn brief_loss_keeps_drag() {
        let mut m = GestureMachine::default();
        run(&mut m, &[(true, 0.0), (true, 0.4)]);
        assert!(m.is_dragging());
        assert_eq!(m.hand_lost(s(0.45)), Action::NoOp);
        assert_eq!(m.hand_lost(s(0.6)), Action::NoOp);
        assert_eq!(m.step(true, s(0.65), P), Action::DragMove(P));
        // loss timer restarted by the visible frame
        assert_eq!(m.hand_lost(s(0.7)), Action::NoOp);
        assert!(m.is_dragging());
    }

    #[test]
    fn long_loss_ends_drag() {
        let mut m = GestureMachine::default();
        run(&mut m, &[(true, 0.0), (true, 0.4)]);
        assert_eq!(m.hand_lost(s(0.5)), Action::NoOp);
        assert_eq!(m.hand_lost(s(0.75)), Action::DragEnd);
        assert_eq!(m.state(), PinchState::Idle);
        assert_eq!(m.hand_lost(s(2.0)), Action::NoOp);
    }

    #[test]
    fn long_loss_drops_pinch_without_click() {
        let mut m = GestureMachine::default();
        m.step(true, s(0.0), P);
        assert_eq!(m.hand_lost(s(0.05)), Action::NoOp);
        assert_eq!(m.hand_lost(s(0.4)), Action::NoOp);
        assert_eq!(m.state(), PinchState::Idle);
        // hand comes back open: nothing to release
        assert_eq!(m.step(false, s(0.5), P), Action::NoOp);
    }

    #[test]
    fn force_release_only_reports_drags() {
        let mut m = GestureMachine::default();
        assert_eq!(m.force_release(), Action::NoOp);
        run(&mut m, &[(true, 0.0), (true, 0.31)]);
        assert_eq!(m.force_release(), Action::DragEnd);
        assert_eq!(m.force_release(), Action::NoOp);
    }

    #[test]
    fn clock_going_backwards_does_not_start_a_drag() {
        let mut m = GestureMachine::default();
        m.step(true, s(5.0), P);
        assert_eq!(m.step(true, s(4.0), P), Action::NoOp);
        assert!(!m.is_dragging());
    }

    // Drag only after a contiguous pinch run of at least the threshold since
    // leaving Idle; drag start/end strictly alternate.
    #[test]
    fn random_sequences_keep_drag_invariants() {
        let mut seed: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut next = || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };

        for _ in 0..50 {
            let mut m = GestureMachine::default();
            let mut t = 0.0;
            let mut run_start: Option<f64> = None;
            let mut dragging = false;
            for _ in 0..400 {
                t += 0.005 + (next() % 60) as f64 / 1000.0;
                let pinching = next() % 5 != 0;
                let a = m.step(pinching, s(t), P);

                if pinching {
                    run_start.get_or_insert(t);
                } else {
                    run_start = None;
                }
                match a {
                    Action::DragStart => {
                        assert!(!dragging, "two DragStarts without a DragEnd");
                        dragging = true;
                    }
                    Action::DragEnd => {
                        assert!(dragging, "DragEnd without DragStart");
                        dragging = false;
                    }
                    Action::ClickFired => assert!(!dragging),
                    _ => {}
                }
                assert_eq!(m.is_dragging(), dragging);
                if m.is_dragging() {
                    let start = run_start.expect("dragging without a pinch run");
                    assert!(t - start >= 0.3 - 1e-6);
                }
            }
        }
    }
}
