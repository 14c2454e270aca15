//! Cursor motion: normalized palm position to smoothed, bounded screen pixels.

use serde::Serialize;

use crate::landmarks::Point;

/// Absolute screen position in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Screen {
    pub width: f64,
    pub height: f64,
    /// Flip x for camera images that were not mirrored upstream.
    pub mirror_x: bool,
}

impl Screen {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1) as f64,
            height: height.max(1) as f64,
            mirror_x: false,
        }
    }

    pub fn center(&self) -> ScreenPoint {
        ScreenPoint::new(self.width / 2.0, self.height / 2.0)
    }

    /// Clamp into [0, width) x [0, height), i.e. onto the last pixel at most.
    pub fn clamp(&self, p: ScreenPoint) -> ScreenPoint {
        ScreenPoint::new(
            p.x.clamp(0.0, self.width - 1.0),
            p.y.clamp(0.0, self.height - 1.0),
        )
    }
}

/// Single-pole IIR low-pass over the cursor target.
///
/// `smoothing` is the weight kept from the previous position: 0 follows the
/// hand exactly, values towards 1 suppress more jitter and add more lag.
#[derive(Debug, Clone)]
pub struct MotionFilter {
    screen: Screen,
    smoothing: f64,
    smoothed: ScreenPoint,
}

impl MotionFilter {
    pub fn new(screen: Screen, smoothing: f64) -> Self {
        Self {
            screen,
            smoothing: smoothing.clamp(0.0, 0.999),
            smoothed: screen.center(),
        }
    }

    pub fn current(&self) -> ScreenPoint {
        self.smoothed
    }

    /// Retune without touching the accumulated position.
    pub fn set_smoothing(&mut self, smoothing: f64) {
        self.smoothing = smoothing.clamp(0.0, 0.999);
    }

    /// Retarget to a new display. The position is re-clamped, not reset.
    pub fn set_screen(&mut self, screen: Screen) {
        self.screen = screen;
        self.smoothed = screen.clamp(self.smoothed);
    }

    pub fn to_screen(&self, p: Point) -> ScreenPoint {
        let x = if self.screen.mirror_x { 1.0 - p.x } else { p.x };
        ScreenPoint::new(x * self.screen.width, p.y * self.screen.height)
    }

    pub fn update(&mut self, raw: ScreenPoint) -> ScreenPoint {
        let k = self.smoothing;
        let next = ScreenPoint::new(
            self.smoothed.x * k + raw.x * (1.0 - k),
            self.smoothed.y * k + raw.y * (1.0 - k),
        );
        self.smoothed = self.screen.clamp(next);
        self.smoothed
    }

    /// `to_screen` then `update`.
    pub fn track(&mut self, normalized: Point) -> ScreenPoint {
        let raw = self.to_screen(normalized);
        self.update(raw)
    }
}
