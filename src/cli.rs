use anyhow::{Result, anyhow};
use handctl::{
    actions::{ActionSink, UinputSink},
    config::DaemonConfigState,
    feedback::{LogRenderer, spawn_overlay},
    ipc::{
        self,
        pipeline::{PipelineShared, run_pipeline, spawn_line_reader},
    },
    motion::ScreenPoint,
    replay,
};
use log::info;
use pico_args::Arguments;
use signal_hook::consts::{SIGINT, SIGTERM};
use std::{
    env, fs,
    io::{self, BufReader, Write},
    process::Command,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    time::Duration,
};

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // Hidden daemon mode (spawned by `start`)
    if pargs.contains("--daemon") {
        return ipc::run_daemon();
    }

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }
    let dry_run = pargs.contains("--dry-run");

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("start") => {
            let exe = env::current_exe()?;
            let child = Command::new(exe).arg("--daemon").spawn()?;
            println!("handctl: started daemon (pid={})", child.id());
            Ok(())
        }

        Some("stop") => request("shutdown"),
        Some("status") => request("status"),
        Some("reload") => request("reload"),
        Some("list") => request("list"),
        Some("doctor") => request("doctor"),

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handctl use <profile_name>"))?;
            let r = ipc::client_request(serde_json::json!({"op":"use","profile":name}))?;
            print_response(&r);
            Ok(())
        }

        Some("run") => run_foreground(dry_run),

        Some("replay") => {
            let path: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handctl replay <frames.jsonl>"))?;
            replay_file(&path)
        }

        Some("emit") => {
            // usage:
            //   handctl emit click [left|right|middle]
            //   handctl emit press | release
            //   handctl emit move 960 540
            let what: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handctl emit <click|press|release|move> ..."))?;
            let cfg = DaemonConfigState::load_or_install_default()?;
            let mut sink = UinputSink::new(cfg.profile.screen())?;
            match what.as_str() {
                "click" => {
                    let btn: Option<String> = pargs.opt_free_from_str()?;
                    let btn = btn.unwrap_or_else(|| "left".to_string());
                    sink.click_mouse(&btn)?;
                    println!("ok: clicked {btn}");
                }
                "press" => {
                    sink.press()?;
                    println!("ok: pressed left");
                }
                "release" => {
                    sink.release()?;
                    println!("ok: released left");
                }
                "move" => {
                    let x: f64 = pargs
                        .free_from_str()
                        .map_err(|_| anyhow!("usage: handctl emit move <x> <y>"))?;
                    let y: f64 = pargs
                        .free_from_str()
                        .map_err(|_| anyhow!("usage: handctl emit move <x> <y>"))?;
                    let at = cfg.profile.screen().clamp(ScreenPoint::new(x, y));
                    sink.move_cursor(at)?;
                    println!("ok: moved to {:.0},{:.0}", at.x, at.y);
                }
                other => return Err(anyhow!("unknown emit kind: {other}")),
            }
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn request(op: &str) -> Result<()> {
    let r = ipc::client_request(serde_json::json!({ "op": op }))?;
    print_response(&r);
    Ok(())
}

/// Read frames from stdin until EOF or a signal, injecting actions directly.
fn run_foreground(dry_run: bool) -> Result<()> {
    let cfg = DaemonConfigState::load_or_install_default()?;
    info!("run: profile '{}', frames from stdin", cfg.active_name);

    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&shutdown))?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&shutdown))?;

    let shared = Arc::new(PipelineShared::new(
        cfg.profile.session_config(),
        Arc::clone(&shutdown),
    ));
    let (tx, rx) = mpsc::channel();
    spawn_line_reader(
        BufReader::new(io::stdin()),
        tx,
        Arc::clone(&shared),
        "stdin".to_string(),
    );

    let sink = if dry_run {
        UinputSink::noop()
    } else {
        UinputSink::new(cfg.profile.screen())?
    };
    let mut sink = sink.with_overlay(Arc::clone(&shared.feed));

    let overlay_stop = Arc::new(AtomicBool::new(false));
    let overlay = spawn_overlay(
        Arc::clone(&shared.feed),
        LogRenderer::default(),
        Duration::from_millis(16),
        Arc::clone(&overlay_stop),
    );

    run_pipeline(rx, &shared, &mut sink);

    overlay_stop.store(true, Ordering::Relaxed);
    let _ = overlay.join();
    println!("{}", shared.status_json());
    Ok(())
}

fn replay_file(path: &str) -> Result<()> {
    let cfg = DaemonConfigState::load_or_install_default()?;
    let file = fs::File::open(path).map_err(|e| anyhow!("failed to open {path}: {e}"))?;

    let mut out = io::stdout().lock();
    let mut write_err: Option<io::Error> = None;
    let summary = replay::replay(
        BufReader::new(file),
        &cfg.profile.session_config(),
        |t, action| {
            if write_err.is_some() {
                return;
            }
            let mut v = serde_json::to_value(action).unwrap_or_default();
            v["t"] = serde_json::json!(t.as_secs_f64());
            if let Err(e) = writeln!(out, "{v}") {
                write_err = Some(e);
            }
        },
    )?;
    if let Some(e) = write_err {
        return Err(e.into());
    }
    eprintln!(
        "replayed {} frames ({} rejected): {} clicks, {} drags",
        summary.frames, summary.rejected, summary.clicks, summary.drags
    );
    Ok(())
}

fn print_help() {
    println!(
        r#"handctl — hand-tracking mouse daemon

USAGE:
  handctl help [command]                  Show general or command-specific help
  handctl start                           Start the daemon
  handctl stop                            Stop the daemon (releases any drag)
  handctl status                          Show daemon and pipeline state
  handctl reload                          Reload active profile
  handctl use <name>                      Switch active profile
  handctl list                            List profiles
  handctl doctor                          Diagnose uinput permissions
  handctl run [--dry-run]                 Read frames from stdin in the foreground
  handctl replay <frames.jsonl>           Print the actions a recording produces
  handctl emit click [left|right|middle]  Emit a mouse click
  handctl emit press|release              Press or release the left button
  handctl emit move <x> <y>               Move the pointer to a screen position

FRAMES:
  One JSON object per line: {{"t": 1.25, "landmarks": [[x,y], ... 21 points]}}
  "landmarks": null means no hand. The daemon reads them from
  ~/.local/run/handctl-frames.sock.

TIPS:
  - Profiles: ~/.config/handctl/profiles (edits to the active one apply live)
  - Active profile pointer: ~/.config/handctl/active
  - RUST_LOG=debug shows every pinch decision
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "start" => println!("usage: handctl start\nStarts the background daemon."),
        "stop" => println!(
            "usage: handctl stop\nStops the running daemon, releasing the button if a drag is active."
        ),
        "status" => println!(
            "usage: handctl status\nShows active profile, sockets, frame counters and cursor."
        ),
        "reload" => println!(
            "usage: handctl reload\nReloads the current profile; keeps last good on error."
        ),
        "use" => {
            println!("usage: handctl use <name>\nSwitches active profile to <name> and reloads.")
        }
        "list" => println!("usage: handctl list\nLists available profiles."),
        "doctor" => println!(
            "usage: handctl doctor\nChecks /dev/uinput and input group membership."
        ),
        "run" => println!(
            "usage: detector | handctl run [--dry-run]\nProcesses frames from stdin until EOF or Ctrl-C. --dry-run skips uinput."
        ),
        "replay" => println!(
            "usage: handctl replay <frames.jsonl>\nRuns a recording through the active profile and prints one JSON action per line."
        ),
        "emit" => println!(
            "usage:\n  handctl emit click [left|right|middle]\n  handctl emit press|release\n  handctl emit move <x> <y>"
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
