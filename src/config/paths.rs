//! Where `settings.toml` lives.
//!
//! `<platform config dir>/yt-liveread/settings.toml`, e.g.
//! `~/.config/yt-liveread/settings.toml` on Linux.  A missing config dir
//! (no `$HOME`) falls back to `./yt-liveread/`.

use std::path::PathBuf;

const APP_DIR: &str = "yt-liveread";
const SETTINGS_FILE: &str = "settings.toml";

/// Resolved settings location.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub settings_file: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        Self {
            settings_file: config_dir.join(SETTINGS_FILE),
            config_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
