use std::collections::HashMap;
use std::time::Instant;

use tracing::warn;

use crate::error::Result;
use crate::theme::ThemeColors;
use crate::tree::engine::{TreeEngine, TreeEvent};
use crate::tree::path;
use crate::tree::state::{FlatItem, RowKind};

/// Engine work requested by a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Open(String),
    Close(String),
    Select(String),
    Refresh,
    StoreChanged(Vec<String>),
}

/// Display options fixed at startup.
#[derive(Debug, Clone)]
pub struct ViewOptions {
    pub show_hidden: bool,
    pub use_icons: bool,
    /// Shown in the status bar: the store URL or directory.
    pub store_label: String,
}

/// Main application state: the engine plus everything the view needs.
pub struct App {
    pub engine: TreeEngine,
    pub flat_items: Vec<FlatItem>,
    /// Row index of every node row, by path.
    pub index_by_path: HashMap<String, usize>,
    pub selected_index: usize,
    pub scroll_offset: usize,
    pub show_hidden: bool,
    pub use_icons: bool,
    pub store_label: String,
    pub theme: ThemeColors,
    pub watcher_active: bool,
    pub should_quit: bool,
    /// Message, whether it is an error, and when it was set.
    pub status_message: Option<(String, bool, Instant)>,
}

impl App {
    pub fn new(engine: TreeEngine, options: ViewOptions, theme: ThemeColors) -> Self {
        let mut app = Self {
            engine,
            flat_items: Vec::new(),
            index_by_path: HashMap::new(),
            selected_index: 0,
            scroll_offset: 0,
            show_hidden: options.show_hidden,
            use_icons: options.use_icons,
            store_label: options.store_label,
            theme,
            watcher_active: false,
            should_quit: false,
            status_message: None,
        };
        app.refresh_view();
        app
    }

    pub fn selected_item(&self) -> Option<&FlatItem> {
        self.flat_items.get(self.selected_index)
    }

    /// Drain engine events and rebuild the rows, keeping the cursor on the
    /// same path when it is still visible.
    pub fn refresh_view(&mut self) {
        let mut jump_to = None;
        for event in self.engine.take_events() {
            match event {
                TreeEvent::LoadFailed { path, message } => {
                    self.set_status_message(format!("Could not load {}: {}", path, message), true);
                }
                TreeEvent::Selected(path) => jump_to = Some(path),
                TreeEvent::Loading(_) | TreeEvent::NodeChanged(_) => {}
            }
        }

        let keep = jump_to.or_else(|| {
            self.selected_item()
                .filter(|item| item.kind != RowKind::Loading)
                .map(|item| item.path.clone())
        });
        self.flat_items = self.engine.state().flatten(self.show_hidden);
        self.index_by_path = self
            .flat_items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.kind != RowKind::Loading)
            .map(|(idx, item)| (item.path.clone(), idx))
            .collect();

        let found = keep.and_then(|target| self.index_by_path.get(&target).copied());
        self.selected_index = match found {
            Some(idx) => idx,
            None => self
                .selected_index
                .min(self.flat_items.len().saturating_sub(1)),
        };
    }

    /// Show the loading marker before a slow action runs.
    pub fn begin(&mut self, action: &Action) {
        match action {
            Action::Open(dir) => self.engine.set_loading(dir),
            Action::Refresh => self.engine.set_loading(path::ROOT),
            _ => return,
        }
        self.refresh_view();
    }

    /// Run an action against the engine and report failures in the status bar.
    pub async fn perform(&mut self, action: Action) {
        let result = self.dispatch(&action).await;
        if let Err(err) = result {
            warn!(?action, error = %err, "action failed");
            self.set_status_message(err.to_string(), true);
        } else if action == Action::Refresh {
            self.set_status_message("Refreshed".to_string(), false);
        }
        self.refresh_view();
    }

    async fn dispatch(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::Open(dir) => self.engine.open(dir).await,
            Action::Close(dir) => self.engine.close(dir).await,
            Action::Select(target) => self.engine.select(target).await,
            Action::Refresh => self.engine.refresh().await,
            Action::StoreChanged(paths) => self.engine.handle_store_change(paths).await,
        }
    }

    pub fn set_status_message(&mut self, msg: String, is_error: bool) {
        self.status_message = Some((msg, is_error, Instant::now()));
    }

    /// Clear the status message if it has been displayed for more than 3 seconds.
    pub fn clear_expired_status(&mut self) {
        if let Some((_, _, ref created)) = self.status_message {
            if created.elapsed().as_secs() > 3 {
                self.status_message = None;
            }
        }
    }

    /// Keep the selected row inside a viewport of `visible_height` rows.
    pub fn update_scroll(&mut self, visible_height: usize) {
        if visible_height == 0 {
            return;
        }
        if self.selected_index < self.scroll_offset {
            self.scroll_offset = self.selected_index;
        } else if self.selected_index >= self.scroll_offset + visible_height {
            self.scroll_offset = self.selected_index + 1 - visible_height;
        }
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn select_next(&mut self) {
        let len = self.flat_items.len();
        if len > 0 && self.selected_index < len - 1 {
            self.selected_index += 1;
        }
    }

    pub fn select_previous(&mut self) {
        self.selected_index = self.selected_index.saturating_sub(1);
    }

    pub fn select_first(&mut self) {
        self.selected_index = 0;
    }

    pub fn select_last(&mut self) {
        self.selected_index = self.flat_items.len().saturating_sub(1);
    }

    /// Move the cursor to the row of the selected item's parent directory.
    pub fn select_parent(&mut self) {
        let Some(item) = self.selected_item() else {
            return;
        };
        let Some(parent) = path::parent_of(&item.path) else {
            return;
        };
        if let Some(&idx) = self.index_by_path.get(parent) {
            self.selected_index = idx;
        }
    }

    pub fn toggle_hidden(&mut self) {
        self.show_hidden = !self.show_hidden;
        self.refresh_view();
    }

    pub fn toggle_watcher(&mut self) {
        self.watcher_active = !self.watcher_active;
        let state = if self.watcher_active { "on" } else { "off" };
        self.set_status_message(format!("Watcher {}", state), false);
    }
}
