use anyhow::Result;
use log::{error, warn};

use crate::actions::ActionSink;
use crate::gestures::Action;

pub fn dispatch_action(action: &Action, sink: &mut dyn ActionSink) -> Result<()> {
    match *action {
        Action::Move(at) | Action::DragMove(at) => sink.move_cursor(at),
        Action::ClickFired => {
            sink.click()?;
            pulse(sink);
            Ok(())
        }
        Action::DragStart => {
            sink.press()?;
            pulse(sink);
            Ok(())
        }
        Action::DragEnd => sink.release(),
        Action::NoOp => Ok(()),
    }
}

// overlay feedback never blocks the button event it decorates
fn pulse(sink: &mut dyn ActionSink) {
    if let Err(e) = sink.feedback_pulse() {
        warn!("feedback pulse failed: {e}");
    }
}

/// Fire-and-forget: a failing sink call is logged and the rest still run.
pub fn dispatch_all(actions: &[Action], sink: &mut dyn ActionSink) {
    for a in actions {
        if let Err(e) = dispatch_action(a, sink) {
            error!("dispatch {a:?} failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{RecordingSink, SinkCall};
    use crate::motion::ScreenPoint;
    use anyhow::anyhow;

    #[test]
    fn maps_actions_to_sink_calls() {
        let p = ScreenPoint::new(5.0, 6.0);
        let q = ScreenPoint::new(7.0, 8.0);
        let mut sink = RecordingSink::default();
        dispatch_all(
            &[
                Action::Move(p),
                Action::ClickFired,
                Action::NoOp,
                Action::DragStart,
                Action::DragMove(q),
                Action::DragEnd,
            ],
            &mut sink,
        );
        assert_eq!(
            sink.calls,
            vec![
                SinkCall::Move(p),
                SinkCall::Click,
                SinkCall::Pulse,
                SinkCall::Press,
                SinkCall::Pulse,
                SinkCall::Move(q),
                SinkCall::Release,
            ]
        );
    }

    #[test]
    fn failing_call_does_not_stop_the_rest() {
        struct Flaky(Vec<&'static str>);
        impl ActionSink for Flaky {
            fn move_cursor(&mut self, _at: ScreenPoint) -> Result<()> {
                Err(anyhow!("device gone"))
            }
            fn press(&mut self) -> Result<()> {
                self.0.push("press");
                Ok(())
            }
            fn release(&mut self) -> Result<()> {
                self.0.push("release");
                Ok(())
            }
            fn click(&mut self) -> Result<()> {
                self.0.push("click");
                Ok(())
            }
        }
        let mut sink = Flaky(Vec::new());
        let p = ScreenPoint::new(0.0, 0.0);
        dispatch_all(&[Action::Move(p), Action::DragEnd], &mut sink);
        assert_eq!(sink.0, vec!["release"]);
    }

    #[test]
    fn broken_feedback_still_clicks_and_presses() {
        struct NoOverlay(Vec<&'static str>);
        impl ActionSink for NoOverlay {
            fn move_cursor(&mut self, _at: ScreenPoint) -> Result<()> {
                Ok(())
            }
            fn press(&mut self) -> Result<()> {
                self.0.push("press");
                Ok(())
            }
            fn release(&mut self) -> Result<()> {
                self.0.push("release");
                Ok(())
            }
            fn click(&mut self) -> Result<()> {
                self.0.push("click");
                Ok(())
            }
            fn feedback_pulse(&mut self) -> Result<()> {
                Err(anyhow!("overlay closed"))
            }
        }
        let mut sink = NoOverlay(Vec::new());
        dispatch_all(
            &[Action::ClickFired, Action::DragStart, Action::DragEnd],
            &mut sink,
        );
        assert_eq!(sink.0, vec!["click", "press", "release"]);
        assert!(dispatch_action(&Action::ClickFired, &mut sink).is_ok());
    }
}
