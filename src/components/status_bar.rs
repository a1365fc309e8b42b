use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};

use crate::theme::ThemeColors;

const KEY_HINTS: &str = " l:open  h:close  space:select  r:refresh  q:quit ";

/// Status bar: selected path, store info, watcher state and key hints, or a
/// transient status message.
pub struct StatusBarWidget<'a> {
    path_str: &'a str,
    store_info: &'a str,
    theme: &'a ThemeColors,
    status_message: Option<&'a str>,
    is_error: bool,
    watcher_status: Option<&'a str>,
}

impl<'a> StatusBarWidget<'a> {
    pub fn new(path_str: &'a str, store_info: &'a str, theme: &'a ThemeColors) -> Self {
        Self {
            path_str,
            store_info,
            theme,
            status_message: None,
            is_error: false,
            watcher_status: None,
        }
    }

    pub fn status_message(mut self, msg: &'a str, is_error: bool) -> Self {
        self.status_message = Some(msg);
        self.is_error = is_error;
        self
    }

    pub fn watcher_status(mut self, status: &'a str) -> Self {
        self.watcher_status = Some(status);
        self
    }
}

/// Keep the tail of `s` within `budget` characters.
fn truncate_left(s: &str, budget: usize) -> String {
    let len = s.chars().count();
    if len <= budget {
        return s.to_string();
    }
    if budget <= 3 {
        return s.chars().take(budget).collect();
    }
    let tail: String = s.chars().skip(len - (budget - 3)).collect();
    format!("...{}", tail)
}

impl<'a> Widget for StatusBarWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }

        let width = area.width as usize;

        if let Some(msg) = self.status_message {
            let style = if self.is_error {
                Style::default()
                    .bg(self.theme.error_fg)
                    .fg(self.theme.status_fg)
            } else {
                Style::default().fg(self.theme.info_fg)
            };
            let display: String = msg.chars().take(width).collect();
            let display = format!("{:<width$}", display, width = width);
            buf.set_line(area.x, area.y, &Line::from(Span::styled(display, style)), area.width);
            return;
        }

        let hints_len = KEY_HINTS.len();
        let watcher_len = self.watcher_status.map_or(0, |w| w.chars().count() + 1);
        let remaining = width.saturating_sub(hints_len).saturating_sub(watcher_len);
        let info_len = self.store_info.chars().count();
        let path_budget = remaining.saturating_sub(info_len).saturating_sub(1);
        let path_display = truncate_left(self.path_str, path_budget);
        let info_display = truncate_left(
            self.store_info,
            remaining.saturating_sub(path_display.chars().count()),
        );
        let gap = remaining
            .saturating_sub(path_display.chars().count())
            .saturating_sub(info_display.chars().count());

        let mut spans = vec![
            Span::styled(path_display, Style::default().fg(self.theme.status_fg)),
            Span::raw(" ".repeat(gap)),
            Span::styled(info_display, Style::default().fg(self.theme.info_fg)),
        ];

        if let Some(watcher_str) = self.watcher_status {
            spans.push(Span::raw(" "));
            spans.push(Span::styled(
                watcher_str.to_string(),
                Style::default()
                    .fg(self.theme.warning_fg)
                    .add_modifier(Modifier::BOLD),
            ));
        }

        let used: usize = spans.iter().map(|s| s.content.chars().count()).sum();
        let pad = width.saturating_sub(used).saturating_sub(hints_len);
        if pad > 0 {
            spans.push(Span::raw(" ".repeat(pad)));
        }
        spans.push(Span::styled(
            KEY_HINTS,
            Style::default()
                .fg(self.theme.dim_fg)
                .add_modifier(Modifier::DIM),
        ));

        buf.set_line(area.x, area.y, &Line::from(spans), area.width);
    }
}
