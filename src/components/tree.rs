use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Widget},
};

use crate::tree::state::{FlatItem, RowKind};
use crate::theme::ThemeColors;

/// Renders flattened tree rows with box-drawing guides.
pub struct TreeWidget<'a> {
    items: &'a [FlatItem],
    selected: usize,
    scroll_offset: usize,
    theme: &'a ThemeColors,
    use_icons: bool,
    block: Option<Block<'a>>,
}

impl<'a> TreeWidget<'a> {
    pub fn new(
        items: &'a [FlatItem],
        selected: usize,
        scroll_offset: usize,
        theme: &'a ThemeColors,
        use_icons: bool,
    ) -> Self {
        Self {
            items,
            selected,
            scroll_offset,
            theme,
            use_icons,
            block: None,
        }
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }

    /// Indentation guides; needs the rows above to know which ancestors were
    /// last siblings.
    fn build_prefix(item: &FlatItem, items: &[FlatItem], item_index: usize) -> String {
        if item.depth == 0 {
            return String::new();
        }

        let mut prefix = String::new();
        for d in 1..item.depth {
            let mut ancestor_is_last = false;
            for above in items[..item_index].iter().rev() {
                if above.depth == d {
                    ancestor_is_last = above.is_last_sibling;
                    break;
                }
                if above.depth < d {
                    break;
                }
            }
            prefix.push_str(if ancestor_is_last { "   " } else { "│  " });
        }
        prefix.push_str(if item.is_last_sibling { "└──" } else { "├──" });
        prefix
    }

    /// Expander: only directories that may hold subdirectories get one.
    fn expander(item: &FlatItem) -> &'static str {
        match item.kind {
            RowKind::Directory if item.has_child_dirs == Some(false) => "  ",
            RowKind::Directory if item.is_expanded => "▾ ",
            RowKind::Directory => "▸ ",
            RowKind::Leaf | RowKind::Loading => "",
        }
    }

    fn indicator(&self, item: &FlatItem) -> &'static str {
        match (self.use_icons, item.kind) {
            (true, RowKind::Directory) if item.is_expanded => "\u{f07c} ",
            (true, RowKind::Directory) => "\u{f07b} ",
            (true, RowKind::Leaf) => "\u{f15b} ",
            (true, RowKind::Loading) => "\u{f110} ",
            (false, RowKind::Directory) => "[D] ",
            (false, RowKind::Leaf) => "[F] ",
            (false, RowKind::Loading) => "... ",
        }
    }

    fn row_style(&self, item: &FlatItem, is_selected: bool) -> Style {
        let theme = self.theme;
        let mut style = if is_selected {
            Style::default()
                .bg(theme.tree_selected_bg)
                .fg(theme.tree_selected_fg)
                .add_modifier(Modifier::BOLD)
        } else if item.kind == RowKind::Loading {
            Style::default()
                .fg(theme.dim_fg)
                .add_modifier(Modifier::ITALIC)
        } else if item.is_hidden {
            Style::default().fg(theme.tree_hidden_fg)
        } else if item.has_diff {
            Style::default().fg(theme.tree_diff_fg)
        } else if item.kind == RowKind::Directory {
            Style::default()
                .fg(theme.tree_dir_fg)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.tree_file_fg)
        };
        if item.is_current {
            style = style.add_modifier(Modifier::UNDERLINED);
        }
        style
    }
}

impl<'a> Widget for TreeWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner_area = match &self.block {
            Some(block) => {
                let inner = block.inner(area);
                block.clone().render(area, buf);
                inner
            }
            None => area,
        };

        let visible_height = inner_area.height as usize;
        if self.items.is_empty() || visible_height == 0 {
            return;
        }

        let visible = self
            .items
            .iter()
            .enumerate()
            .skip(self.scroll_offset)
            .take(visible_height);

        for (row, (idx, item)) in visible.enumerate() {
            let y = inner_area.y + row as u16;
            let style = self.row_style(item, idx == self.selected);
            let mut spans = vec![
                Span::styled(Self::build_prefix(item, self.items, idx), style),
                Span::styled(Self::expander(item), style),
                Span::styled(self.indicator(item), style),
                Span::styled(item.name.clone(), style),
            ];
            if item.has_diff && item.kind == RowKind::Directory {
                spans.push(Span::styled(
                    " ●",
                    Style::default().fg(self.theme.tree_diff_fg),
                ));
            }
            buf.set_line(inner_area.x, y, &Line::from(spans), inner_area.width);
        }
    }
}
