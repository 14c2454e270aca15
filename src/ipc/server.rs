use anyhow::{Result, anyhow};
use log::{error, info, warn};
use notify::{RecursiveMode, Watcher};
use signal_hook::consts::{SIGINT, SIGTERM};
use std::{
    fs,
    io::{BufRead, BufReader, Write},
    os::unix::net::{UnixListener, UnixStream},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, Sender},
    },
    thread,
    time::Duration,
};

use super::pipeline::{PipelineShared, run_pipeline, serve_frames};
use super::runtime::{frames_socket_path, socket_path};
use crate::actions::UinputSink;
use crate::config::DaemonConfigState;
use crate::feedback::{LogRenderer, spawn_overlay};
use crate::landmarks::FrameInput;
use crate::motion::Screen;

pub fn run_daemon() -> Result<()> {
    // control socket
    let sock = socket_path()?;
    if sock.exists() {
        let _ = fs::remove_file(&sock);
    }
    let listener = UnixListener::bind(&sock)?;
    info!("daemon: listening on {}", sock.display());

    // state
    let mut cfg = DaemonConfigState::load_or_install_default()?;
    info!("daemon: active profile '{}'", cfg.active_name);

    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&shutdown))?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&shutdown))?;

    let shared = Arc::new(PipelineShared::new(
        cfg.profile.session_config(),
        Arc::clone(&shutdown),
    ));

    // channels
    let (tx_req, rx_req) = mpsc::channel::<IpcMsg>();
    let (tx_frames, rx_frames) = mpsc::channel::<FrameInput>();

    // frames socket
    let frames_sock = frames_socket_path()?;
    if frames_sock.exists() {
        let _ = fs::remove_file(&frames_sock);
    }
    let frames_listener = UnixListener::bind(&frames_sock)?;
    info!("daemon: accepting frames on {}", frames_sock.display());
    let frames_thread = serve_frames(frames_listener, tx_frames, Arc::clone(&shared));

    // profile hot reload; the daemon still works without it
    let _watcher = match watch_profiles(&cfg.profiles_dir, tx_req.clone()) {
        Ok(w) => Some(w),
        Err(e) => {
            warn!("daemon: not watching profiles: {e}");
            None
        }
    };

    let overlay = spawn_overlay(
        Arc::clone(&shared.feed),
        LogRenderer::default(),
        Duration::from_millis(16),
        Arc::clone(&shutdown),
    );
    let pipeline = PipelineThread::start(rx_frames, Arc::clone(&shared), cfg.profile.screen());

    // accept loop
    listener.set_nonblocking(true)?;
    while !shutdown.load(Ordering::Relaxed) {
        if let Ok((stream, _)) = listener.accept() {
            let tx = tx_req.clone();
            let view = ClientView {
                cfg: cfg.clone(),
                shared: Arc::clone(&shared),
            };
            thread::spawn(move || {
                if let Err(e) = handle_client(stream, view, tx) {
                    error!("ipc client error: {e}");
                }
            });
        }

        while let Ok(msg) = rx_req.try_recv() {
            match msg {
                IpcMsg::Reload => reload(&mut cfg, &shared, "reload"),
                IpcMsg::ProfileChanged(paths) => {
                    if paths.iter().any(|p| cfg.is_active_profile(p)) {
                        reload(&mut cfg, &shared, "profile file changed");
                    }
                }
                IpcMsg::UseProfile(name) => {
                    let screen = cfg.profile.screen();
                    match cfg.set_active(&name) {
                        Ok(()) => {
                            apply(&cfg, &shared, screen);
                            info!("switched active profile to {}", cfg.active_name);
                        }
                        Err(e) => error!("use profile failed: {e}"),
                    }
                }
                IpcMsg::Shutdown => shutdown.store(true, Ordering::Relaxed),
            }
        }

        thread::sleep(Duration::from_millis(5));
    }

    info!("daemon: shutting down");
    pipeline.join();
    let _ = overlay.join();
    let _ = frames_thread.join();
    let _ = fs::remove_file(&sock);
    let _ = fs::remove_file(&frames_sock);
    Ok(())
}

fn reload(cfg: &mut DaemonConfigState, shared: &PipelineShared, why: &str) {
    let screen = cfg.profile.screen();
    if let Err(e) = cfg.reload() {
        error!("{why}: reload failed, keeping previous settings: {e}");
    } else {
        apply(cfg, shared, screen);
        info!("{why}: profile '{}' reloaded", cfg.active_name);
    }
}

fn apply(cfg: &DaemonConfigState, shared: &PipelineShared, old_screen: Screen) {
    let new_cfg = cfg.profile.session_config();
    if new_cfg.screen.width != old_screen.width || new_cfg.screen.height != old_screen.height {
        warn!("screen size changed; restart the daemon to resize the virtual pointer");
    }
    shared.update_config(new_cfg);
}

fn watch_profiles(dir: &Path, tx: Sender<IpcMsg>) -> Result<notify::RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(ev) if ev.kind.is_modify() || ev.kind.is_create() => {
                let _ = tx.send(IpcMsg::ProfileChanged(ev.paths));
            }
            Ok(_) => {}
            Err(e) => warn!("profile watch error: {e}"),
        }
    })?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    info!("daemon: watching {}", dir.display());
    Ok(watcher)
}

fn handle_client(mut stream: UnixStream, view: ClientView, tx_req: Sender<IpcMsg>) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(());
    }
    let req: serde_json::Value = serde_json::from_str(&line)?;
    let resp = respond(&req, &view, &tx_req);
    writeln!(stream, "{resp}")?;
    Ok(())
}

fn respond(req: &serde_json::Value, view: &ClientView, tx_req: &Sender<IpcMsg>) -> serde_json::Value {
    let op = req.get("op").and_then(|v| v.as_str()).unwrap_or("");
    match op {
        "status" => serde_json::json!({"ok": true, "data": {
            "active_profile": view.cfg.active_name,
            "socket": socket_path().ok(),
            "frames_socket": frames_socket_path().ok(),
            "pipeline": view.shared.status_json(),
        }}),
        "reload" => {
            let _ = tx_req.send(IpcMsg::Reload);
            serde_json::json!({"ok": true, "data": {"active_profile": view.cfg.active_name}})
        }
        "use" => {
            let name = req.get("profile").and_then(|v| v.as_str()).unwrap_or("");
            if name.is_empty() {
                return serde_json::json!({"ok": false, "error": "missing profile name"});
            }
            let _ = tx_req.send(IpcMsg::UseProfile(name.to_string()));
            serde_json::json!({"ok": true, "data": {"active_profile": name}})
        }
        "list" => {
            let list = view.cfg.list_profiles();
            serde_json::json!({"ok": true, "data": {"profiles": list, "active": view.cfg.active_name}})
        }
        "doctor" => {
            let report = view.cfg.doctor_report();
            serde_json::json!({"ok": true, "data": report})
        }
        "shutdown" => {
            let _ = tx_req.send(IpcMsg::Shutdown);
            serde_json::json!({"ok": true, "data": "shutting down"})
        }
        _ => serde_json::json!({"ok": false, "error": format!("unknown op: {op}")}),
    }
}

struct ClientView {
    cfg: DaemonConfigState,
    shared: Arc<PipelineShared>,
}

enum IpcMsg {
    Reload,
    UseProfile(String),
    ProfileChanged(Vec<PathBuf>),
    Shutdown,
}

struct PipelineThread {
    handle: thread::JoinHandle<()>,
}

impl PipelineThread {
    fn start(rx: Receiver<FrameInput>, shared: Arc<PipelineShared>, screen: Screen) -> Self {
        let handle = thread::spawn(move || {
            let sink = UinputSink::new(screen).unwrap_or_else(|e| {
                error!("uinput unavailable ({e}); actions will not reach the OS");
                UinputSink::noop()
            });
            let mut sink = sink.with_overlay(Arc::clone(&shared.feed));
            run_pipeline(rx, &shared, &mut sink);
        });
        Self { handle }
    }

    fn join(self) {
        if self.handle.join().is_err() {
            error!("gesture pipeline panicked");
        }
    }
}

// client helper
pub fn client_request(req: serde_json::Value) -> Result<serde_json::Value> {
    let sock = socket_path()?;
    if !sock.exists() {
        return Err(anyhow!(
            "handctl daemon is not running (socket missing at {})",
            sock.display()
        ));
    }
    let mut stream = UnixStream::connect(sock)?;
    let line = serde_json::to_string(&req)? + "\n";
    stream.write_all(line.as_bytes())?;
    let mut reader = BufReader::new(stream);
    let mut resp = String::new();
    reader.read_line(&mut resp)?;
    let v: serde_json::Value = serde_json::from_str(&resp)?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;
    use tempfile::TempDir;

    fn view(dir: &TempDir) -> ClientView {
        ClientView {
            cfg: DaemonConfigState::load_or_install_in(dir.path().to_path_buf()).unwrap(),
            shared: Arc::new(PipelineShared::new(
                SessionConfig::default(),
                Arc::new(AtomicBool::new(false)),
            )),
        }
    }

    #[test]
    fn status_reports_pipeline() {
        let dir = TempDir::new().unwrap();
        let (tx, _rx) = mpsc::channel();
        let resp = respond(&serde_json::json!({"op": "status"}), &view(&dir), &tx);
        assert_eq!(resp["ok"], true);
        assert_eq!(resp["data"]["active_profile"], "default");
        assert_eq!(resp["data"]["pipeline"]["dragging"], false);
        assert_eq!(resp["data"]["pipeline"]["cursor"]["x"], 960.0);
    }

    #[test]
    fn mutating_ops_are_forwarded() {
        let dir = TempDir::new().unwrap();
        let v = view(&dir);
        let (tx, rx) = mpsc::channel();
        respond(&serde_json::json!({"op": "reload"}), &v, &tx);
        respond(&serde_json::json!({"op": "use", "profile": "fast"}), &v, &tx);
        respond(&serde_json::json!({"op": "shutdown"}), &v, &tx);
        let msgs: Vec<IpcMsg> = rx.try_iter().collect();
        assert!(matches!(msgs[0], IpcMsg::Reload));
        assert!(matches!(&msgs[1], IpcMsg::UseProfile(n) if n == "fast"));
        assert!(matches!(msgs[2], IpcMsg::Shutdown));
    }

    #[test]
    fn bad_requests_get_errors() {
        let dir = TempDir::new().unwrap();
        let v = view(&dir);
        let (tx, rx) = mpsc::channel();
        let resp = respond(&serde_json::json!({"op": "dance"}), &v, &tx);
        assert_eq!(resp["ok"], false);
        let resp = respond(&serde_json::json!({"op": "use"}), &v, &tx);
        assert_eq!(resp["ok"], false);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn list_shows_installed_profiles() {
        let dir = TempDir::new().unwrap();
        let (tx, _rx) = mpsc::channel();
        let resp = respond(&serde_json::json!({"op": "list"}), &view(&dir), &tx);
        assert_eq!(resp["data"]["profiles"], serde_json::json!(["default"]));
    }
}
