//! Drive a recorded JSON-lines frame stream through a session, offline.

use anyhow::Result;
use log::warn;
use std::io::BufRead;
use std::time::Duration;

use crate::gestures::{Action, Timestamp};
use crate::landmarks::decode_line;
use crate::session::{Session, SessionConfig};

/// Spacing assumed for frames that carry no `t`.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_nanos(33_333_333);

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    pub frames: usize,
    pub rejected: usize,
    pub clicks: usize,
    pub drags: usize,
}

/// Replay `reader`, calling `emit` for every action in order.
///
/// Recorded `t` values are relative; the first timed frame picks up where
/// any untimed frames before it left off. A timestamp that goes backwards is held at the previous value. Anything still held at the
/// end is released.
pub fn replay<R, F>(reader: R, cfg: &SessionConfig, mut emit: F) -> Result<ReplaySummary>
where
    R: BufRead,
    F: FnMut(Timestamp, &Action),
{
    let mut session = Session::new(cfg);
    let mut summary = ReplaySummary::default();
    let mut origin: Option<f64> = None;
    let mut now = Duration::ZERO;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let frame = match decode_line(&line) {
            Ok(f) => f,
            Err(e) => {
                warn!("line {}: {e}", idx + 1);
                summary.rejected += 1;
                continue;
            }
        };

        let next = if summary.frames == 0 {
            Duration::ZERO
        } else {
            now + DEFAULT_FRAME_INTERVAL
        };
        let t = match frame.t {
            Some(t) => {
                // the first timed frame lands where an untimed one would have
                let t0 = *origin.get_or_insert(t - next.as_secs_f64());
                Duration::try_from_secs_f64(t - t0).unwrap_or(now)
            }
            None => next,
        };
        now = now.max(t);
        summary.frames += 1;

        for a in session.step(frame.hand.as_ref(), now) {
            tally(&mut summary, &a);
            emit(now, &a);
        }
    }

    for a in session.finish() {
        emit(now, &a);
    }
    Ok(summary)
}

fn tally(summary: &mut ReplaySummary, a: &Action) {
    match a {
        Action::ClickFired => summary.clicks += 1,
        Action::DragStart => summary.drags += 1,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn open_hand(t: Option<f64>) -> String {
        let pts = vec!["[0.5,0.5]"; 21].join(",");
        match t {
            Some(t) => format!(r#"{{"t": {t}, "landmarks": [{pts}]}}"#),
            None => format!(r#"{{"landmarks": [{pts}]}}"#),
        }
    }

    #[test]
    fn untimed_frames_are_spaced_evenly() {
        let input = [open_hand(None), open_hand(None), open_hand(None)].join("\n");
        let mut times = Vec::new();
        let s = replay(Cursor::new(input), &SessionConfig::default(), |t, _| times.push(t)).unwrap();
        assert_eq!(s.frames, 3);
        assert_eq!(
            times,
            vec![
                Duration::ZERO,
                DEFAULT_FRAME_INTERVAL,
                DEFAULT_FRAME_INTERVAL * 2
            ]
        );
    }

    #[test]
    fn timestamps_are_relative_and_never_go_back() {
        let input = [open_hand(Some(100.0)), open_hand(Some(100.5)), open_hand(Some(100.25))]
            .join("\n");
        let mut times = Vec::new();
        replay(Cursor::new(input), &SessionConfig::default(), |t, _| times.push(t)).unwrap();
        assert_eq!(
            times,
            vec![
                Duration::ZERO,
                Duration::from_millis(500),
                Duration::from_millis(500)
            ]
        );
    }

    #[test]
    fn timed_frames_continue_after_untimed_ones() {
        let input = [
            open_hand(None),
            open_hand(None),
            open_hand(Some(50.0)),
            open_hand(Some(50.5)),
        ]
        .join("\n");
        let mut times = Vec::new();
        replay(Cursor::new(input), &SessionConfig::default(), |t, _| times.push(t)).unwrap();
        assert_eq!(times.len(), 4);
        let close = |a: Duration, b: Duration| a.abs_diff(b) < Duration::from_micros(1);
        assert!(close(times[2], DEFAULT_FRAME_INTERVAL * 2));
        assert!(close(times[3] - times[2], Duration::from_millis(500)));
    }

    #[test]
    fn bad_lines_are_counted_not_fatal() {
        let input = format!("{}\nnope\n\n{}\n", open_hand(None), open_hand(None));
        let s = replay(Cursor::new(input), &SessionConfig::default(), |_, _| {}).unwrap();
        assert_eq!(s.frames, 2);
        assert_eq!(s.rejected, 1);
    }
}
