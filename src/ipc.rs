//! Daemon plumbing: control socket, frames socket and the gesture pipeline thread.

pub mod dispatch;
pub mod pipeline;
pub mod runtime;
pub mod server;

pub use server::{client_request, run_daemon};
