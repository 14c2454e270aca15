//! The per-frame driving loop: landmarks in, ordered actions out.

use crate::geometry::{self, PinchThresholds};
use crate::gestures::{Action, GestureMachine, PinchState, Timestamp, Timing};
use crate::landmarks::LandmarkFrame;
use crate::motion::{MotionFilter, Screen, ScreenPoint};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub screen: Screen,
    pub smoothing: f64,
    pub pinch: PinchThresholds,
    pub timing: Timing,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            screen: Screen::new(1920, 1080),
            smoothing: 0.2,
            pinch: PinchThresholds::default(),
            timing: Timing::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    filter: MotionFilter,
    machine: GestureMachine,
    pinch: PinchThresholds,
}

impl Session {
    pub fn new(cfg: &SessionConfig) -> Self {
        Self {
            filter: MotionFilter::new(cfg.screen, cfg.smoothing),
            machine: GestureMachine::new(cfg.timing),
            pinch: cfg.pinch,
        }
    }

    /// Apply new tunables. Cursor position and gesture state carry over.
    pub fn reconfigure(&mut self, cfg: &SessionConfig) {
        self.filter.set_screen(cfg.screen);
        self.filter.set_smoothing(cfg.smoothing);
        self.machine.set_timing(cfg.timing);
        self.pinch = cfg.pinch;
    }

    /// Process one frame.
    ///
    /// With a hand: `Move` every frame outside a drag, `DragMove` during one.
    /// A discrete action on the same frame follows the `Move`, so it lands on
    /// the fresh position. Without a hand the cursor stays put and only a
    /// lost-tracking release can come out.
    pub fn step(&mut self, frame: Option<&LandmarkFrame>, now: Timestamp) -> Vec<Action> {
        let Some(frame) = frame else {
            return match self.machine.hand_lost(now) {
                Action::NoOp => Vec::new(),
                a => vec![a],
            };
        };

        let at = self.filter.track(geometry::palm_center(frame));
        let pinching = geometry::is_pinching(frame, &self.pinch);
        match self.machine.step(pinching, now, at) {
            a @ Action::DragMove(_) => vec![a],
            Action::NoOp => vec![Action::Move(at)],
            a => vec![Action::Move(at), a],
        }
    }

    /// End of session: release anything still held.
    pub fn finish(&mut self) -> Vec<Action> {
        match self.machine.force_release() {
            Action::NoOp => Vec::new(),
            a => vec![a],
        }
    }

    pub fn cursor(&self) -> ScreenPoint {
        self.filter.current()
    }

    pub fn state(&self) -> PinchState {
        self.machine.state()
    }

    pub fn is_dragging(&self) -> bool {
        self.machine.is_dragging()
    }
}
