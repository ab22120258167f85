//! Centralized path definitions for config files and directories.
//!
//! Single source of truth for leaf filenames and path-building functions.
//! No other module should hard-code these strings.

use std::path::{Path, PathBuf};

// ── Application identity ─────────────────────────────────────────

pub const APP_ID: &str = "com.ganttpilot.app";

// ── Leaf filenames ───────────────────────────────────────────────

pub const SETTINGS_FILE: &str = "settings.json";
pub const CREDENTIALS_FILE: &str = ".credentials";
pub const DEFAULT_PROJECT_FILE: &str = "project.gantt.json";

// ── Directory names ──────────────────────────────────────────────

pub const AUDIT_LOGS_DIR: &str = "audit-logs";

// ── Config-dir functions (take app_config_dir) ───────────────────

pub fn settings_path(app_config_dir: &Path) -> PathBuf {
    app_config_dir.join(SETTINGS_FILE)
}

pub fn credentials_path(app_config_dir: &Path) -> PathBuf {
    app_config_dir.join(CREDENTIALS_FILE)
}

pub fn audit_logs_dir(app_config_dir: &Path) -> PathBuf {
    app_config_dir.join(AUDIT_LOGS_DIR)
}

/// Platform config dir for the app: `<config_dir>/com.ganttpilot.app`.
pub fn app_config_dir() -> PathBuf {
    let base = if cfg!(target_os = "windows") {
        std::env::var("APPDATA").map_or_else(|_| home_dir().join("AppData/Roaming"), PathBuf::from)
    } else if cfg!(target_os = "macos") {
        home_dir().join("Library/Application Support")
    } else {
        std::env::var("XDG_CONFIG_HOME").map_or_else(|_| home_dir().join(".config"), PathBuf::from)
    };
    base.join(APP_ID)
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_or_else(|_| PathBuf::from("."), PathBuf::from)
}
