mod app;
mod components;
mod config;
mod error;
mod event;
mod handler;
mod logging;
mod remote;
mod theme;
mod tree;
mod tui;
mod ui;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use crate::app::{Action, App, ViewOptions};
use crate::config::{AppConfig, LogConfig, RemoteConfig, TreeConfig, WatcherConfig};
use crate::error::AppError;
use crate::event::{Event, EventHandler};
use crate::logging::LogLevel;
use crate::remote::http::HttpStore;
use crate::remote::listing::{DiffTracker, StoreListing};
use crate::remote::local::LocalStore;
use crate::remote::watcher::{self, StoreWatcher};
use crate::remote::RemoteStore;
use crate::tree::engine::{EngineOptions, TreeEngine};
use crate::tui::{install_panic_hook, Tui};

/// Browse a remote store as a collapsible tree that remembers open folders.
#[derive(Parser, Debug)]
#[command(name = "rtree", version, about)]
struct Cli {
    /// Base URL of an HTTP store
    #[arg(long, conflicts_with = "local")]
    url: Option<String>,

    /// Serve a local directory as the store
    #[arg(long, value_name = "DIR")]
    local: Option<PathBuf>,

    /// Bearer token for the HTTP store
    #[arg(long)]
    token: Option<String>,

    /// Config file, on top of the usual locations
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Disable the store watcher (auto-refresh)
    #[arg(long)]
    no_watcher: bool,

    /// Load discovered subdirectories in the background
    #[arg(long, conflicts_with = "lazy")]
    eager: bool,

    /// Load directories only when opened
    #[arg(long)]
    lazy: bool,

    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,

    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

impl Cli {
    /// Flags that were given, as a partial config.
    fn overrides(&self) -> AppConfig {
        let eager_load = match (self.eager, self.lazy) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        AppConfig {
            remote: RemoteConfig {
                url: self.url.clone(),
                token: self.token.clone(),
                local_root: self.local.as_ref().map(|p| p.display().to_string()),
                timeout_ms: None,
            },
            tree: TreeConfig {
                eager_load,
                ..Default::default()
            },
            watcher: WatcherConfig {
                enabled: self.no_watcher.then_some(false),
                debounce_ms: None,
            },
            log: LogConfig {
                level: self
                    .log_level
                    .and_then(|l| l.to_possible_value())
                    .map(|v| v.get_name().to_string()),
                file: self.log_file.as_ref().map(|p| p.display().to_string()),
            },
            ..Default::default()
        }
    }
}

/// The store to browse, plus the directory behind it when it is local.
fn build_store(config: &AppConfig) -> error::Result<(Arc<dyn RemoteStore>, Option<PathBuf>, String)> {
    // A URL from the command line beats a local root from a config file and
    // vice versa; the CLI forbids giving both.
    match (&config.remote.url, &config.remote.local_root) {
        (Some(url), _) => {
            let timeout = Duration::from_millis(config.timeout_ms());
            let store = HttpStore::new(url, config.remote.token.clone(), timeout)?;
            Ok((Arc::new(store), None, url.clone()))
        }
        (None, Some(dir)) => {
            let root = Path::new(dir).canonicalize().map_err(|_| {
                AppError::InvalidPath(format!("{} does not exist", dir))
            })?;
            let label = root.display().to_string();
            Ok((Arc::new(LocalStore::new(&root)), Some(root), label))
        }
        (None, None) => Err(AppError::Config(
            "no store configured: pass --url or --local, or set [remote] in the config".into(),
        )),
    }
}

#[tokio::main]
async fn main() -> error::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref(), Some(&cli.overrides()));
    // Whichever backend the CLI named wins over the other one from files.
    if cli.local.is_some() {
        config.remote.url = None;
    }

    let level: LogLevel = config.log_level().parse()?;
    logging::setup_tracing(level, Path::new(config.log_file()))?;

    let (store, local_root, store_label) = build_store(&config)?;
    info!(store = store_label.as_str(), "starting");

    let diffs = DiffTracker::new();
    let listing = Arc::new(StoreListing::new(Arc::clone(&store), diffs));
    let engine = TreeEngine::new(
        store,
        listing,
        EngineOptions {
            eager_load: config.eager_load(),
        },
    );
    let mut app = App::new(
        engine,
        ViewOptions {
            show_hidden: config.show_hidden(),
            use_icons: config.use_icons(),
            store_label,
        },
        theme::resolve_theme(&config),
    );

    install_panic_hook();
    let mut tui = Tui::new()?;
    let mut events = EventHandler::new(Duration::from_millis(100));
    let event_tx = events.sender();

    let store_watcher = match local_root.as_deref() {
        Some(root) if config.watcher_enabled() => {
            let ignore_patterns = watcher::DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect();
            match StoreWatcher::new(
                root,
                Duration::from_millis(config.debounce_ms()),
                ignore_patterns,
                watcher::DEFAULT_FLOOD_THRESHOLD,
                event_tx.clone(),
            ) {
                Ok(w) => {
                    app.watcher_active = true;
                    Some(w)
                }
                Err(e) => {
                    warn!(error = %e, "watcher unavailable");
                    app.set_status_message(format!("Watcher unavailable: {}", e), true);
                    None
                }
            }
        }
        _ => None,
    };

    // Initial load, then bring back what was open last time.
    app.begin(&Action::Refresh);
    tui.terminal_mut().draw(|frame| ui::render(&mut app, frame))?;
    app.perform(Action::Refresh).await;
    if let Err(e) = app.engine.restore_opened().await {
        app.set_status_message(format!("Could not restore open folders: {}", e), true);
    }
    app.refresh_view();

    loop {
        tui.terminal_mut().draw(|frame| ui::render(&mut app, frame))?;

        let action = match events.next().await? {
            Event::Key(key) => handler::handle_key_event(&mut app, key),
            Event::Tick => {
                app.clear_expired_status();
                None
            }
            Event::Resize => None,
            Event::StoreChanged(paths) => Some(Action::StoreChanged(paths)),
        };

        if let Some(action) = action {
            app.begin(&action);
            tui.terminal_mut().draw(|frame| ui::render(&mut app, frame))?;
            app.perform(action).await;
        }

        if let Some(ref w) = store_watcher {
            if app.watcher_active && !w.is_active() {
                w.resume();
            } else if !app.watcher_active && w.is_active() {
                w.pause();
            }
        }

        if app.should_quit {
            break;
        }
    }

    tui.restore()?;
    Ok(())
}
