//! Configuration loading and path resolution.
//!
//! Supports CERTGATE_HOME env var override for testing.

use anyhow::Result;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default connect timeout for opened connections.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 200;

/// Paths for the certgate data directory.
#[derive(Debug, Clone)]
pub struct TrustPaths {
    pub data_dir: PathBuf,
    pub store_file: PathBuf,
    pub settings_file: PathBuf,
}

impl TrustPaths {
    /// Build paths from base directory (e.g. ProjectDirs data dir or CERTGATE_HOME).
    pub fn from_base(base: PathBuf) -> Self {
        let store_file = base.join("trust_store.p12");
        let settings_file = base.join("settings.toml");
        Self {
            data_dir: base,
            store_file,
            settings_file,
        }
    }

    /// Paths for testing: use a temp dir as base.
    pub fn for_test(base: impl AsRef<Path>) -> Self {
        Self::from_base(base.as_ref().to_path_buf())
    }

    /// Get default paths (respects CERTGATE_HOME).
    pub fn default_paths() -> Self {
        let base = if let Ok(home) = std::env::var("CERTGATE_HOME") {
            PathBuf::from(home)
        } else if let Some(dirs) = directories::ProjectDirs::from("de", "vier_bier", "certgate") {
            dirs.data_dir().to_path_buf()
        } else {
            PathBuf::from(".certgate")
        };
        Self::from_base(base)
    }

    /// Ensure the data directory exists.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir)
    }
}

/// settings.toml structure.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Settings {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Include the bundled public web PKI roots alongside the local store.
    #[serde(default = "default_platform_anchors")]
    pub platform_anchors: bool,
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_platform_anchors() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            platform_anchors: true,
        }
    }
}

impl Settings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Load settings from paths (with shared lock when file exists).
    pub fn load(paths: &TrustPaths) -> Result<Settings> {
        if paths.settings_file.is_file() {
            let mut file = fs::OpenOptions::new().read(true).open(&paths.settings_file)?;
            fs2::FileExt::lock_shared(&file)?;
            let mut s = String::new();
            file.read_to_string(&mut s)?;
            let settings: Settings = toml::from_str(&s)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to paths (with exclusive lock). Creates parent dirs if needed.
    pub fn save(&self, paths: &TrustPaths) -> Result<()> {
        if let Some(p) = paths.settings_file.parent() {
            fs::create_dir_all(p)?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&paths.settings_file)?;
        fs2::FileExt::lock_exclusive(&file)?;
        let s = toml::to_string_pretty(self)?;
        file.write_all(s.as_bytes())?;
        Ok(())
    }
}
