//! Application configuration: TOML file loading, CLI overrides, and defaults.
//!
//! Resolution order (first found wins, values merge/override):
//! 1. CLI flags (`--url`, `--local`, `--lazy`, `--log-level`, etc.)
//! 2. Explicit `--config <file>`
//! 3. `$RTREE_CONFIG` environment variable (path to config file)
//! 4. Project-local `.rtree.toml` in the current working directory
//! 5. Global `~/.config/rtree/config.toml`
//! 6. Built-in defaults

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::remote::http::DEFAULT_TIMEOUT_MS;
use crate::remote::watcher::DEFAULT_DEBOUNCE_MS;

// ── Section configs ──────────────────────────────────────────────────────────

/// Where the tree's data lives.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of an HTTP store.
    pub url: Option<String>,
    /// Bearer token sent with every HTTP request.
    pub token: Option<String>,
    /// Directory served as a store instead of a URL.
    pub local_root: Option<String>,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

/// Tree behavior and display.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TreeConfig {
    /// Load discovered subdirectories in the background.
    pub eager_load: Option<bool>,
    /// Show dot-named entries.
    pub show_hidden: Option<bool>,
    /// Use nerd font icons (false = ASCII fallback).
    pub use_icons: Option<bool>,
}

/// Store watcher settings (local stores only).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WatcherConfig {
    pub enabled: Option<bool>,
    /// Debounce interval in milliseconds.
    pub debounce_ms: Option<u64>,
}

/// Color settings for a single theme palette.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ThemeColorsConfig {
    pub tree_bg: Option<String>,
    pub tree_fg: Option<String>,
    pub tree_selected_bg: Option<String>,
    pub tree_selected_fg: Option<String>,
    pub tree_dir_fg: Option<String>,
    pub tree_file_fg: Option<String>,
    pub tree_hidden_fg: Option<String>,
    pub tree_diff_fg: Option<String>,
    pub status_bg: Option<String>,
    pub status_fg: Option<String>,
    pub border_fg: Option<String>,
}

/// Theme configuration section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ThemeConfig {
    /// Color scheme: "dark", "light", "custom".
    pub scheme: Option<String>,
    /// Custom color overrides.
    pub custom: Option<ThemeColorsConfig>,
}

/// Diagnostics.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LogConfig {
    /// "silent", "error", "warn", "info", "debug" or "trace".
    pub level: Option<String>,
    /// Log file; the terminal belongs to the UI.
    pub file: Option<String>,
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// Top-level application configuration.
///
/// All fields are optional so that partial configs from different sources
/// can be merged together (CLI overrides file, file overrides defaults).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub remote: RemoteConfig,
    pub tree: TreeConfig,
    pub watcher: WatcherConfig,
    pub theme: ThemeConfig,
    pub log: LogConfig,
}

// ── Default constants ────────────────────────────────────────────────────────

pub const DEFAULT_LOG_LEVEL: &str = "warn";
pub const DEFAULT_LOG_FILE: &str = "rtree.log";

// ── Config file locator ──────────────────────────────────────────────────────

/// Return the list of candidate config file paths in priority order.
///
/// Does NOT include the CLI `--config` path; that is handled separately.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = std::env::var("RTREE_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".rtree.toml"));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("rtree").join("config.toml"));
    }

    paths
}

/// Try to read and parse a TOML config file. Returns `None` if the file
/// doesn't exist or can't be parsed (with a warning printed to stderr).
///
/// Runs before logging is set up, hence stderr.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            eprintln!(
                "Warning: failed to parse config file {}: {}",
                path.display(),
                e
            );
            None
        }
    }
}

// ── Merge logic ──────────────────────────────────────────────────────────────

impl AppConfig {
    /// Merge `other` on top of `self`; `other`'s `Some` values win.
    pub fn merge(self, other: &AppConfig) -> AppConfig {
        AppConfig {
            remote: RemoteConfig {
                url: other.remote.url.clone().or(self.remote.url),
                token: other.remote.token.clone().or(self.remote.token),
                local_root: other.remote.local_root.clone().or(self.remote.local_root),
                timeout_ms: other.remote.timeout_ms.or(self.remote.timeout_ms),
            },
            tree: TreeConfig {
                eager_load: other.tree.eager_load.or(self.tree.eager_load),
                show_hidden: other.tree.show_hidden.or(self.tree.show_hidden),
                use_icons: other.tree.use_icons.or(self.tree.use_icons),
            },
            watcher: WatcherConfig {
                enabled: other.watcher.enabled.or(self.watcher.enabled),
                debounce_ms: other.watcher.debounce_ms.or(self.watcher.debounce_ms),
            },
            theme: ThemeConfig {
                scheme: other.theme.scheme.clone().or(self.theme.scheme),
                custom: other.theme.custom.clone().or(self.theme.custom),
            },
            log: LogConfig {
                level: other.log.level.clone().or(self.log.level),
                file: other.log.file.clone().or(self.log.file),
            },
        }
    }

    /// Load the final merged configuration.
    ///
    /// `cli_config_path` is an explicit config file path from `--config`.
    /// `cli_overrides` are partial overrides derived from CLI flags.
    pub fn load(cli_config_path: Option<&Path>, cli_overrides: Option<&AppConfig>) -> AppConfig {
        let mut config = AppConfig::default();

        // Lowest priority first so higher ones overwrite.
        for path in candidate_paths().iter().rev() {
            if let Some(file_cfg) = load_file(path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(cli_path) = cli_config_path {
            if let Some(file_cfg) = load_file(cli_path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        config
    }

    // ── Convenience getters with built-in defaults ──────────────────────────

    pub fn timeout_ms(&self) -> u64 {
        self.remote.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    pub fn eager_load(&self) -> bool {
        self.tree.eager_load.unwrap_or(true)
    }

    pub fn show_hidden(&self) -> bool {
        self.tree.show_hidden.unwrap_or(false)
    }

    pub fn use_icons(&self) -> bool {
        self.tree.use_icons.unwrap_or(true)
    }

    pub fn watcher_enabled(&self) -> bool {
        self.watcher.enabled.unwrap_or(true)
    }

    pub fn debounce_ms(&self) -> u64 {
        self.watcher.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS)
    }

    /// Theme scheme: "dark", "light", or "custom".
    pub fn theme_scheme(&self) -> &str {
        self.theme.scheme.as_deref().unwrap_or("dark")
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_file(&self) -> &str {
        self.log.file.as_deref().unwrap_or(DEFAULT_LOG_FILE)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
