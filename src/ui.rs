use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::Style,
    widgets::{Block, Borders},
    Frame,
};

use crate::app::App;
use crate::components::status_bar::StatusBarWidget;
use crate::components::tree::TreeWidget;

/// Render the application UI: the tree above a one-line status bar.
pub fn render(app: &mut App, frame: &mut Frame) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(frame.area());

    let visible_height = chunks[0].height.saturating_sub(2) as usize;
    app.update_scroll(visible_height);

    let block = Block::default()
        .title(format!(" {} ", app.store_label))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(app.theme.border_fg))
        .style(Style::default().bg(app.theme.tree_bg));
    let tree = TreeWidget::new(
        &app.flat_items,
        app.selected_index,
        app.scroll_offset,
        &app.theme,
        app.use_icons,
    )
    .block(block);
    frame.render_widget(tree, chunks[0]);

    let path = app
        .selected_item()
        .map(|item| item.path.as_str())
        .unwrap_or("");
    let current = app.engine.state().current.as_deref().unwrap_or("");
    let info = if current.is_empty() {
        String::new()
    } else {
        format!("current: {}", current)
    };
    let mut status = StatusBarWidget::new(path, &info, &app.theme);
    if !app.watcher_active {
        status = status.watcher_status("[watch off]");
    }
    if let Some((msg, is_error, _)) = &app.status_message {
        status = status.status_message(msg, *is_error);
    }
    frame.render_widget(status, chunks[1]);
}
