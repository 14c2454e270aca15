use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::geometry::PinchThresholds;
use crate::gestures::Timing;
use crate::motion::Screen;
use crate::session::SessionConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenSection {
    pub width: u32,
    pub height: u32,
    pub mirror_x: bool,
}

impl Default for ScreenSection {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            mirror_x: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionSection {
    pub smoothing: f64,
}

impl Default for MotionSection {
    fn default() -> Self {
        Self { smoothing: 0.2 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PinchSection {
    pub distance_threshold: f64,
    pub thumb_bend_threshold: f64,
}

impl Default for PinchSection {
    fn default() -> Self {
        Self {
            distance_threshold: 0.07,
            thumb_bend_threshold: 1.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSection {
    pub drag_threshold_seconds: f64,
    pub click_cooldown_seconds: f64,
    pub lost_hand_release_seconds: f64,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            drag_threshold_seconds: 0.3,
            click_cooldown_seconds: 0.1,
            lost_hand_release_seconds: 0.25,
        }
    }
}

/// A named set of tunables. Missing sections and keys fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub screen: ScreenSection,
    #[serde(default)]
    pub motion: MotionSection,
    #[serde(default)]
    pub pinch: PinchSection,
    #[serde(default)]
    pub timing: TimingSection,
}

impl Profile {
    pub fn parse(txt: &str) -> Result<Self> {
        let profile: Profile = toml::from_str(txt)?;
        validate_profile(&profile)?;
        Ok(profile)
    }

    pub fn screen(&self) -> Screen {
        let mut s = Screen::new(self.screen.width, self.screen.height);
        s.mirror_x = self.screen.mirror_x;
        s
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            screen: self.screen(),
            smoothing: self.motion.smoothing,
            pinch: PinchThresholds {
                distance: self.pinch.distance_threshold,
                thumb_bend: self.pinch.thumb_bend_threshold,
            },
            timing: Timing {
                drag_threshold: secs(self.timing.drag_threshold_seconds),
                click_cooldown: secs(self.timing.click_cooldown_seconds),
                lost_hand_release: secs(self.timing.lost_hand_release_seconds),
            },
        }
    }
}

fn secs(v: f64) -> Duration {
    Duration::try_from_secs_f64(v).unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct DaemonConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

pub fn config_dir() -> Result<PathBuf> {
    let home = UserDirs::new()
        .ok_or_else(|| anyhow!("cannot resolve home directory"))?
        .home_dir()
        .to_path_buf();
    Ok(home.join(".config").join("handctl"))
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl DaemonConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        Self::load_or_install_in(config_dir()?)
    }

    /// Same as `load_or_install_default`, rooted at `cfgdir`.
    pub fn load_or_install_in(cfgdir: PathBuf) -> Result<Self> {
        let profdir = cfgdir.join("profiles");
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = cfgdir.join("active");
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = load_profile(&profdir, &active_name)?;

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    /// Re-read the active profile. On error the last good profile stays.
    pub fn reload(&mut self) -> Result<()> {
        self.profile = load_profile(&self.profiles_dir, &self.active_name)?;
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profile_path(name);
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        let profile = load_profile(&self.profiles_dir, name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    pub fn profile_path(&self, name: &str) -> PathBuf {
        self.profiles_dir.join(format!("{name}.toml"))
    }

    /// Whether `path` is the active profile file.
    pub fn is_active_profile(&self, path: &Path) -> bool {
        path.file_stem().and_then(|s| s.to_str()) == Some(self.active_name.as_str())
            && path.extension().is_some_and(|e| e == "toml")
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let uinput_ok = Path::new("/dev/uinput").exists();
        let in_input_group = check_in_input_group();
        serde_json::json!({
            "uinput_present": uinput_ok,
            "input_group_member": in_input_group,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "screen": self.profile.screen,
            "hints": {
                "udev_rule": "/etc/udev/rules.d/80-uinput.rules",
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input",
                "frames": "pipe detector output into `handctl run`, or connect it to the frames socket"
            }
        })
    }
}

fn load_profile(profdir: &Path, name: &str) -> Result<Profile> {
    let path = profdir.join(format!("{name}.toml"));
    let txt = fs::read_to_string(&path)
        .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
    Profile::parse(&txt).map_err(|e| anyhow!("failed to load {}: {e}", path.display()))
}

fn validate_profile(p: &Profile) -> Result<()> {
    if p.screen.width == 0 || p.screen.height == 0 {
        return Err(anyhow!("screen width and height must be positive"));
    }
    if !(0.0..1.0).contains(&p.motion.smoothing) {
        return Err(anyhow!("motion.smoothing must be in [0,1)"));
    }
    if !(p.pinch.distance_threshold.is_finite() && p.pinch.distance_threshold > 0.0) {
        return Err(anyhow!("pinch.distance_threshold must be positive"));
    }
    if !(p.pinch.thumb_bend_threshold.is_finite() && p.pinch.thumb_bend_threshold > 0.0) {
        return Err(anyhow!("pinch.thumb_bend_threshold must be positive"));
    }

    let t = &p.timing;
    if !(t.drag_threshold_seconds.is_finite() && t.drag_threshold_seconds > 0.0) {
        return Err(anyhow!("timing.drag_threshold_seconds must be positive"));
    }
    for (key, v) in [
        ("click_cooldown_seconds", t.click_cooldown_seconds),
        ("lost_hand_release_seconds", t.lost_hand_release_seconds),
    ] {
        if !(v.is_finite() && v >= 0.0) {
            return Err(anyhow!("timing.{key} must be a non-negative duration"));
        }
    }
    Ok(())
}

fn check_in_input_group() -> bool {
    if let Ok(s) = fs::read_to_string("/etc/group") {
        let user = whoami::username();
        for line in s.lines() {
            if line.starts_with("input:")
                && line
                    .split(':')
                    .nth(3)
                    .unwrap_or("")
                    .split(',')
                    .any(|u| u == user)
            {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn bundled_default_matches_builtin_defaults() {
        let p = Profile::parse(default_profile_text()).unwrap();
        assert_eq!(p.meta.name.as_deref(), Some("default"));
        assert_eq!(p.session_config(), SessionConfig::default());
    }

    #[test]
    fn partial_profile_fills_defaults() {
        let p = Profile::parse("[motion]\nsmoothing = 0.5\n").unwrap();
        let cfg = p.session_config();
        assert_eq!(cfg.smoothing, 0.5);
        assert_eq!(cfg.timing, Timing::default());
        assert_eq!(cfg.pinch, PinchThresholds::default());
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(Profile::parse("[motion]\nsmoothing = 1.0\n").is_err());
        assert!(Profile::parse("[motion]\nsmoothing = -0.1\n").is_err());
        assert!(Profile::parse("[pinch]\ndistance_threshold = 0.0\n").is_err());
        assert!(Profile::parse("[timing]\ndrag_threshold_seconds = 0.0\n").is_err());
        assert!(Profile::parse("[timing]\nclick_cooldown_seconds = -1.0\n").is_err());
        assert!(Profile::parse("[screen]\nwidth = 0\n").is_err());
        assert!(Profile::parse("[timing]\nclick_cooldown_seconds = 0.0\n").is_ok());
    }

    #[test]
    fn installs_default_and_switches_profiles() {
        let dir = TempDir::new().unwrap();
        let mut st = DaemonConfigState::load_or_install_in(dir.path().to_path_buf()).unwrap();
        assert_eq!(st.active_name, "default");
        assert!(st.profile_path("default").exists());
        assert_eq!(st.list_profiles(), vec!["default".to_string()]);

        fs::write(
            st.profile_path("snappy"),
            "[meta]\nname = \"snappy\"\n[motion]\nsmoothing = 0.05\n",
        )
        .unwrap();
        st.set_active("snappy").unwrap();
        assert_eq!(st.profile.motion.smoothing, 0.05);
        assert_eq!(
            fs::read_to_string(&st.active_ptr).unwrap().trim(),
            "snappy"
        );
        assert_eq!(st.list_profiles(), vec!["default", "snappy"]);
        assert!(st.set_active("missing").is_err());
        assert_eq!(st.active_name, "snappy");
    }

    #[test]
    fn broken_reload_keeps_last_good() {
        let dir = TempDir::new().unwrap();
        let mut st = DaemonConfigState::load_or_install_in(dir.path().to_path_buf()).unwrap();
        fs::write(st.profile_path("default"), "[motion]\nsmoothing = 3.0\n").unwrap();
        assert!(st.reload().is_err());
        assert_eq!(st.profile.motion.smoothing, 0.2);
    }

    #[test]
    fn recognises_active_profile_path() {
        let dir = TempDir::new().unwrap();
        let st = DaemonConfigState::load_or_install_in(dir.path().to_path_buf()).unwrap();
        assert!(st.is_active_profile(&st.profile_path("default")));
        assert!(!st.is_active_profile(&st.profile_path("other")));
        assert!(!st.is_active_profile(&st.profiles_dir.join("default.toml.swp")));
    }
}
