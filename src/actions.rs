use anyhow::Result;
#[cfg(target_os = "linux")]
use anyhow::anyhow;
use log::{info, warn};
use std::sync::Arc;

use crate::feedback::OverlayFeed;
use crate::motion::{Screen, ScreenPoint};

/// Where actions end up. Calls are best-effort: errors are logged by the
/// dispatcher and never reach the gesture core.
pub trait ActionSink {
    fn move_cursor(&mut self, at: ScreenPoint) -> Result<()>;
    fn press(&mut self) -> Result<()>;
    fn release(&mut self) -> Result<()>;
    fn click(&mut self) -> Result<()>;
    fn feedback_pulse(&mut self) -> Result<()> {
        Ok(())
    }
}

pub struct UinputSink {
    overlay: Option<Arc<OverlayFeed>>,
    #[allow(dead_code)]
    linux: Option<Box<LinuxUinput>>,
}

impl UinputSink {
    pub fn new(screen: Screen) -> Result<Self> {
        #[cfg(target_os = "linux")]
        {
            let dev = LinuxUinput::create(screen)?;
            return Ok(Self {
                overlay: None,
                linux: Some(Box::new(dev)),
            });
        }
        #[allow(unreachable_code)]
        {
            let _ = screen;
            warn!("uinput not available; running in NO-OP mode");
            Ok(Self::noop())
        }
    }

    pub fn noop() -> Self {
        Self {
            overlay: None,
            linux: None,
        }
    }

    /// Mirror every position and pulse into an overlay feed.
    pub fn with_overlay(mut self, feed: Arc<OverlayFeed>) -> Self {
        self.overlay = Some(feed);
        self
    }

    pub fn is_noop(&self) -> bool {
        self.linux.is_none()
    }

    pub fn click_mouse(&mut self, which: &str) -> Result<()> {
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            use uinput::event::controller::Mouse;
            let button = match which.to_ascii_lowercase().as_str() {
                "left" => Mouse::Left,
                "right" => Mouse::Right,
                "middle" => Mouse::Middle,
                other => return Err(anyhow!("unknown mouse button: {other}")),
            };
            dev.button(button, 1)?;
            dev.button(button, 0)?;
        }
        #[cfg(not(target_os = "linux"))]
        let _ = which;
        Ok(())
    }
}

impl ActionSink for UinputSink {
    fn move_cursor(&mut self, at: ScreenPoint) -> Result<()> {
        if let Some(feed) = &self.overlay {
            feed.publish(at);
        }
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.move_to(at.x.round() as i32, at.y.round() as i32)?;
        }
        Ok(())
    }

    fn press(&mut self) -> Result<()> {
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.button(uinput::event::controller::Mouse::Left, 1)?;
        }
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.button(uinput::event::controller::Mouse::Left, 0)?;
        }
        Ok(())
    }

    fn click(&mut self) -> Result<()> {
        self.click_mouse("left")
    }

    fn feedback_pulse(&mut self) -> Result<()> {
        if let Some(feed) = &self.overlay {
            feed.pulse();
        }
        Ok(())
    }
}

/// One recorded sink call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SinkCall {
    Move(ScreenPoint),
    Press,
    Release,
    Click,
    Pulse,
}

/// Sink that remembers what it was asked to do. Used by replays and tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub calls: Vec<SinkCall>,
}

impl ActionSink for RecordingSink {
    fn move_cursor(&mut self, at: ScreenPoint) -> Result<()> {
        self.calls.push(SinkCall::Move(at));
        Ok(())
    }
    fn press(&mut self) -> Result<()> {
        self.calls.push(SinkCall::Press);
        Ok(())
    }
    fn release(&mut self) -> Result<()> {
        self.calls.push(SinkCall::Release);
        Ok(())
    }
    fn click(&mut self) -> Result<()> {
        self.calls.push(SinkCall::Click);
        Ok(())
    }
    fn feedback_pulse(&mut self) -> Result<()> {
        self.calls.push(SinkCall::Pulse);
        Ok(())
    }
}

#[cfg(target_os = "linux")]
struct LinuxUinput {
    dev: uinput::device::Device,
    last: Option<(i32, i32)>,
}

#[cfg(target_os = "linux")]
impl LinuxUinput {
    fn create(screen: Screen) -> Result<Self> {
        use uinput::event::{absolute, controller::Mouse};

        let max_x = (screen.width as i32 - 1).max(1);
        let max_y = (screen.height as i32 - 1).max(1);
        let dev = uinput::default()?
            .name("Handctl Virtual Pointer")?
            // absolute axes sized to the screen so positions map 1:1
            .event(absolute::Position::X)?
            .min(0)
            .max(max_x)
            .event(absolute::Position::Y)?
            .min(0)
            .max(max_y)
            .event(Mouse::Left)?
            .event(Mouse::Right)?
            .event(Mouse::Middle)?
            .create()?;

        info!("uinput: created virtual pointer {}x{}", max_x + 1, max_y + 1);
        Ok(Self { dev, last: None })
    }

    fn sync(&mut self) -> Result<()> {
        self.dev.synchronize()?;
        Ok(())
    }

    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        use uinput::event::absolute::Position;
        if self.last == Some((x, y)) {
            return Ok(());
        }
        self.dev.send(Position::X, x)?;
        self.dev.send(Position::Y, y)?;
        self.sync()?;
        self.last = Some((x, y));
        Ok(())
    }

    fn button(&mut self, button: uinput::event::controller::Mouse, val: i32) -> Result<()> {
        self.dev.send(button, val)?;
        self.sync()
    }
}
