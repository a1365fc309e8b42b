use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{Action, App};
use crate::tree::state::RowKind;

/// Handle a key event. Cursor movement is applied directly; anything that
/// needs the store comes back as an [`Action`] for the caller to run.
pub fn handle_key_event(app: &mut App, key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.quit(),
        KeyCode::Char('j') | KeyCode::Down => app.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.select_previous(),
        KeyCode::Char('g') | KeyCode::Home => app.select_first(),
        KeyCode::Char('G') | KeyCode::End => app.select_last(),
        KeyCode::Char('l') | KeyCode::Right | KeyCode::Enter => return open_selected(app),
        KeyCode::Char('h') | KeyCode::Left => return close_selected(app),
        KeyCode::Char(' ') => {
            return app
                .selected_item()
                .filter(|item| item.kind != RowKind::Loading)
                .map(|item| Action::Select(item.path.clone()));
        }
        KeyCode::Char('r') => return Some(Action::Refresh),
        KeyCode::Char('.') => app.toggle_hidden(),
        KeyCode::Char('w') => app.toggle_watcher(),
        _ => {}
    }
    None
}

/// Open a collapsed directory, step into an expanded one, select a leaf.
fn open_selected(app: &mut App) -> Option<Action> {
    let item = app.selected_item()?;
    match item.kind {
        RowKind::Directory if !item.is_expanded => Some(Action::Open(item.path.clone())),
        RowKind::Directory => {
            app.select_next();
            None
        }
        RowKind::Leaf => Some(Action::Select(item.path.clone())),
        RowKind::Loading => None,
    }
}

/// Close an expanded directory, otherwise jump to the parent row.
fn close_selected(app: &mut App) -> Option<Action> {
    let item = app.selected_item()?;
    if item.kind == RowKind::Directory && item.is_expanded {
        return Some(Action::Close(item.path.clone()));
    }
    app.select_parent();
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::app::ViewOptions;
    use crate::remote::listing::{DiffTracker, StoreListing};
    use crate::remote::memory::MemoryStore;
    use crate::remote::Body;
    use crate::theme;
    use crate::tree::engine::{EngineOptions, TreeEngine};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    async fn app() -> App {
        let store = Arc::new(MemoryStore::new());
        store.insert("/docs/a.txt", Body::text("x", "text/plain"));
        let listing = Arc::new(StoreListing::new(store.clone(), DiffTracker::new()));
        let engine = TreeEngine::new(store, listing, EngineOptions::default());
        let mut app = App::new(
            engine,
            ViewOptions {
                show_hidden: false,
                use_icons: false,
                store_label: String::new(),
            },
            theme::dark_theme(),
        );
        app.perform(Action::Refresh).await;
        app
    }

    #[tokio::test]
    async fn quit_keys() {
        let mut app = app().await;
        handle_key_event(&mut app, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn open_and_close_become_actions() {
        let mut app = app().await;
        handle_key_event(&mut app, key(KeyCode::Char('j')));
        assert_eq!(
            handle_key_event(&mut app, key(KeyCode::Enter)),
            Some(Action::Open("/docs/".to_string()))
        );
        app.perform(Action::Open("/docs/".to_string())).await;
        assert_eq!(
            handle_key_event(&mut app, key(KeyCode::Char('h'))),
            Some(Action::Close("/docs/".to_string()))
        );
    }

    #[tokio::test]
    async fn left_on_leaf_jumps_to_parent() {
        let mut app = app().await;
        app.perform(Action::Open("/docs/".to_string())).await;
        handle_key_event(&mut app, key(KeyCode::Char('j')));
        handle_key_event(&mut app, key(KeyCode::Char('j')));
        assert_eq!(app.selected_item().unwrap().path, "/docs/a.txt");
        assert_eq!(
            handle_key_event(&mut app, key(KeyCode::Char(' '))),
            Some(Action::Select("/docs/a.txt".to_string()))
        );
        assert_eq!(handle_key_event(&mut app, key(KeyCode::Left)), None);
        assert_eq!(app.selected_item().unwrap().path, "/docs/");
    }

    #[tokio::test]
    async fn refresh_key() {
        let mut app = app().await;
        assert_eq!(
            handle_key_event(&mut app, key(KeyCode::Char('r'))),
            Some(Action::Refresh)
        );
    }
}
