use anyhow::{Result, anyhow};
use directories::UserDirs;
use std::{fs, path::PathBuf};

pub fn runtime_dir() -> Result<PathBuf> {
    let home = UserDirs::new()
        .ok_or_else(|| anyhow!("cannot resolve home directory"))?
        .home_dir()
        .to_path_buf();
    let dir = home.join(".local").join("run");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Control requests: one JSON line in, one JSON line out.
pub fn socket_path() -> Result<PathBuf> {
    Ok(runtime_dir()?.join("handctl.sock"))
}

/// Landmark producers connect here and write JSON frame lines.
pub fn frames_socket_path() -> Result<PathBuf> {
    Ok(runtime_dir()?.join("handctl-frames.sock"))
}
