//! Overlay feed: the latest cursor position and click pulses, shared with a
//! renderer running on its own thread.

use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::motion::ScreenPoint;

/// How long a click ring stays up after a pulse.
pub const PULSE_DURATION: Duration = Duration::from_millis(100);

/// Single-slot, last-writer-wins cell. Readers may see a position one frame old.
#[derive(Debug, Default)]
pub struct OverlayFeed {
    // x and y as f32 bits, packed so one store replaces both
    pos: AtomicU64,
    pulses: AtomicU64,
}

impl OverlayFeed {
    pub fn new(at: ScreenPoint) -> Self {
        let feed = Self::default();
        feed.publish(at);
        feed
    }

    pub fn publish(&self, at: ScreenPoint) {
        let bits = (((at.x as f32).to_bits() as u64) << 32) | (at.y as f32).to_bits() as u64;
        self.pos.store(bits, Ordering::Release);
    }

    pub fn latest(&self) -> ScreenPoint {
        let bits = self.pos.load(Ordering::Acquire);
        let x = f32::from_bits((bits >> 32) as u32);
        let y = f32::from_bits(bits as u32);
        ScreenPoint::new(x as f64, y as f64)
    }

    pub fn pulse(&self) {
        self.pulses.fetch_add(1, Ordering::AcqRel);
    }

    /// Total pulses so far. Renderers compare against the last value they saw.
    pub fn pulses(&self) -> u64 {
        self.pulses.load(Ordering::Acquire)
    }
}

/// Draws the cursor overlay. Implementations must not block for long.
pub trait OverlayRenderer {
    fn draw(&mut self, at: ScreenPoint, pulsing: bool);
}

/// Renderer that only logs state changes; the default when no display is attached.
#[derive(Debug, Default)]
pub struct LogRenderer {
    last: Option<(ScreenPoint, bool)>,
}

impl OverlayRenderer for LogRenderer {
    fn draw(&mut self, at: ScreenPoint, pulsing: bool) {
        if self.last == Some((at, pulsing)) {
            return;
        }
        if pulsing && !self.last.is_some_and(|(_, p)| p) {
            debug!("overlay: pulse at ({:.0}, {:.0})", at.x, at.y);
        }
        self.last = Some((at, pulsing));
    }
}

/// Tracks pulse timing on the render side.
#[derive(Debug)]
pub struct PulseTracker {
    seen: u64,
    until: Option<Instant>,
}

impl PulseTracker {
    pub fn new(feed: &OverlayFeed) -> Self {
        Self {
            seen: feed.pulses(),
            until: None,
        }
    }

    pub fn pulsing(&mut self, feed: &OverlayFeed, now: Instant) -> bool {
        let n = feed.pulses();
        if n != self.seen {
            self.seen = n;
            self.until = Some(now + PULSE_DURATION);
        }
        match self.until {
            Some(t) if now < t => true,
            Some(_) => {
                self.until = None;
                false
            }
            None => false,
        }
    }
}

/// Poll the feed at `interval` and redraw until `stop` is set.
pub fn spawn_overlay<R>(
    feed: Arc<OverlayFeed>,
    mut renderer: R,
    interval: Duration,
    stop: Arc<AtomicBool>,
) -> thread::JoinHandle<()>
where
    R: OverlayRenderer + Send + 'static,
{
    thread::spawn(move || {
        let mut pulse = PulseTracker::new(&feed);
        while !stop.load(Ordering::Relaxed) {
            let pulsing = pulse.pulsing(&feed, Instant::now());
            renderer.draw(feed.latest(), pulsing);
            thread::sleep(interval);
        }
    })
}
