use log::{info, warn};
use std::{
    io::{BufRead, BufReader, ErrorKind},
    os::unix::net::UnixListener,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
        mpsc::{Receiver, RecvTimeoutError, Sender},
    },
    thread,
    time::{Duration, Instant},
};

use super::dispatch::dispatch_all;
use crate::actions::ActionSink;
use crate::feedback::OverlayFeed;
use crate::landmarks::{FrameInput, decode_line};
use crate::session::{Session, SessionConfig};

/// How long the pipeline waits for a frame before ticking lost-tracking.
pub const POLL: Duration = Duration::from_millis(50);

/// Shared between the pipeline thread, frame readers and the control loop.
pub struct PipelineShared {
    config: Mutex<SessionConfig>,
    dirty: AtomicBool,
    pub feed: Arc<OverlayFeed>,
    pub shutdown: Arc<AtomicBool>,
    pub frames: AtomicU64,
    pub hand_frames: AtomicU64,
    pub rejected: AtomicU64,
    pub dragging: AtomicBool,
}

impl PipelineShared {
    pub fn new(cfg: SessionConfig, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            feed: Arc::new(OverlayFeed::new(cfg.screen.center())),
            config: Mutex::new(cfg),
            dirty: AtomicBool::new(false),
            shutdown,
            frames: AtomicU64::new(0),
            hand_frames: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            dragging: AtomicBool::new(false),
        }
    }

    /// Hand new settings to the running pipeline; applied before its next frame.
    pub fn update_config(&self, cfg: SessionConfig) {
        if let Ok(mut c) = self.config.lock() {
            *c = cfg;
        }
        self.dirty.store(true, Ordering::Release);
    }

    fn current_config(&self) -> SessionConfig {
        match self.config.lock() {
            Ok(c) => *c,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn take_update(&self) -> Option<SessionConfig> {
        if self.dirty.swap(false, Ordering::AcqRel) {
            Some(self.current_config())
        } else {
            None
        }
    }

    pub fn status_json(&self) -> serde_json::Value {
        serde_json::json!({
            "frames": self.frames.load(Ordering::Relaxed),
            "hand_frames": self.hand_frames.load(Ordering::Relaxed),
            "rejected": self.rejected.load(Ordering::Relaxed),
            "dragging": self.dragging.load(Ordering::Relaxed),
            "cursor": self.feed.latest(),
        })
    }
}

/// Decode JSON frame lines from `reader` into `tx` until EOF or the pipeline goes away.
pub fn spawn_line_reader<R>(
    reader: R,
    tx: Sender<FrameInput>,
    shared: Arc<PipelineShared>,
    label: String,
) -> thread::JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    thread::spawn(move || {
        for line in reader.lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    warn!("{label}: read failed: {e}");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match decode_line(&line) {
                Ok(frame) => {
                    if tx.send(frame).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    shared.rejected.fetch_add(1, Ordering::Relaxed);
                    warn!("{label}: skipping frame: {e}");
                }
            }
        }
        info!("{label}: frame source closed");
    })
}

/// Accept landmark producers on `listener`, one reader thread each.
pub fn serve_frames(
    listener: UnixListener,
    tx: Sender<FrameInput>,
    shared: Arc<PipelineShared>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        if let Err(e) = listener.set_nonblocking(true) {
            warn!("frames socket: cannot poll: {e}");
            return;
        }
        let mut next_id = 0u64;
        while !shared.shutdown.load(Ordering::Relaxed) {
            match listener.accept() {
                Ok((stream, _)) => {
                    if let Err(e) = stream.set_nonblocking(false) {
                        warn!("frames socket: rejecting producer: {e}");
                        continue;
                    }
                    next_id += 1;
                    info!("frames socket: producer #{next_id} connected");
                    spawn_line_reader(
                        BufReader::new(stream),
                        tx.clone(),
                        Arc::clone(&shared),
                        format!("producer #{next_id}"),
                    );
                }
                Err(e) => thread::sleep(accept_backoff(&e)),
            }
        }
    })
}

/// Idle poll when nothing is pending; a longer, logged pause on real failures.
fn accept_backoff(e: &std::io::Error) -> Duration {
    if e.kind() == ErrorKind::WouldBlock {
        Duration::from_millis(20)
    } else {
        warn!("frames socket: accept failed: {e}");
        Duration::from_millis(200)
    }
}

/// Drive the session from `rx` until shutdown or all senders are gone.
///
/// Frames are stamped on arrival. A gap longer than `POLL` counts as a frame
/// without a hand, so a stalled producer cannot keep the button held.
pub fn run_pipeline(rx: Receiver<FrameInput>, shared: &PipelineShared, sink: &mut dyn ActionSink) {
    let start = Instant::now();
    let mut session = Session::new(&shared.current_config());
    shared.feed.publish(session.cursor());

    // a previous run may have died mid-drag
    if let Err(e) = sink.release() {
        warn!("pipeline: initial release failed: {e}");
    }
    info!("pipeline: running");

    while !shared.shutdown.load(Ordering::Relaxed) {
        if let Some(cfg) = shared.take_update() {
            session.reconfigure(&cfg);
            info!("pipeline: settings applied");
        }

        let actions = match rx.recv_timeout(POLL) {
            Ok(input) => {
                shared.frames.fetch_add(1, Ordering::Relaxed);
                if input.hand.is_some() {
                    shared.hand_frames.fetch_add(1, Ordering::Relaxed);
                }
                session.step(input.hand.as_ref(), start.elapsed())
            }
            Err(RecvTimeoutError::Timeout) => session.step(None, start.elapsed()),
            Err(RecvTimeoutError::Disconnected) => {
                info!("pipeline: all frame sources closed");
                break;
            }
        };
        dispatch_all(&actions, sink);
        shared
            .dragging
            .store(session.is_dragging(), Ordering::Relaxed);
    }

    let actions = session.finish();
    if !actions.is_empty() {
        info!("pipeline: releasing drag on exit");
    }
    dispatch_all(&actions, sink);
    shared.dragging.store(false, Ordering::Relaxed);
}
