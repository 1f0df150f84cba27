use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::app::state::{AppState, BlockRow, DateOverlay, OverlayState, TitleModal};
use crate::config::SelectionMode;
use crate::schedule::BlockRange;

const HIGHLIGHT_SYMBOL: &str = "▸ ";
const LABEL_WIDTH: u16 = 5;
const SEPARATOR: &str = " │ ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppLayout {
    pub header: Rect,
    pub grid: Rect,
    pub status: Rect,
}

pub fn layout(area: Rect) -> AppLayout {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(area);
    AppLayout {
        header: vertical[0],
        grid: vertical[1],
        status: vertical[2],
    }
}

pub fn modal_area(area: Rect) -> Rect {
    centered_rect(50, 40, area)
}

/// Maps a terminal cell inside the bordered grid to a block index.
pub fn block_at(grid: Rect, offset: usize, column: u16, row: u16, block_count: usize) -> Option<usize> {
    let inner_left = grid.x.saturating_add(1);
    let inner_top = grid.y.saturating_add(1);
    let inner_right = grid.x.saturating_add(grid.width.saturating_sub(1));
    let inner_bottom = grid.y.saturating_add(grid.height.saturating_sub(1));
    if column < inner_left || column >= inner_right || row < inner_top || row >= inner_bottom {
        return None;
    }
    let index = offset + (row - inner_top) as usize;
    (index < block_count).then_some(index)
}

pub fn contains(area: Rect, column: u16, row: u16) -> bool {
    column >= area.x
        && column < area.x.saturating_add(area.width)
        && row >= area.y
        && row < area.y.saturating_add(area.height)
}

pub fn draw_app(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let areas = layout(frame.size());

    frame.render_widget(build_header(state), areas.header);

    let highlighted = highlighted_range(state);
    let title_width = areas
        .grid
        .width
        .saturating_sub(2 + HIGHLIGHT_SYMBOL.width() as u16 + LABEL_WIDTH + SEPARATOR.width() as u16)
        as usize;
    let items: Vec<ListItem> = state
        .rows
        .iter()
        .map(|row| {
            let in_range = highlighted.is_some_and(|range| range.contains(row.index));
            let item = ListItem::new(render_row(row, title_width));
            if in_range {
                item.style(Style::default().bg(Color::DarkGray))
            } else {
                item
            }
        })
        .collect();

    let grid_title = format!("Blocks ({})", state.grid.block_count());
    let list = List::new(items)
        .block(
            Block::default()
                .title(grid_title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(HIGHLIGHT_SYMBOL);
    frame.render_stateful_widget(list, areas.grid, list_state);

    let status = Paragraph::new(build_status_line(state)).style(Style::default().fg(Color::Gray));
    frame.render_widget(status, areas.status);

    render_overlay(frame, state);
}

fn highlighted_range(state: &AppState) -> Option<BlockRange> {
    if let Some(modal) = state.title_modal() {
        return Some(modal.range);
    }
    state
        .selection
        .is_anchored()
        .then(|| state.selection.target())
}

fn build_header(state: &AppState) -> Paragraph<'static> {
    let spans = vec![
        Span::styled("◀ [  ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            state.date_key(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(" {}", state.date.weekday())),
        Span::styled("  ] ▶", Style::default().fg(Color::DarkGray)),
        Span::raw("   "),
        Span::styled(
            format!(
                "{} – {}",
                state.grid.label(0).unwrap_or_default(),
                state
                    .grid
                    .end_label(state.grid.block_count().saturating_sub(1))
                    .unwrap_or_default()
            ),
            Style::default().fg(Color::Gray),
        ),
    ];
    Paragraph::new(Line::from(spans)).block(
        Block::default()
            .title("Timetable")
            .borders(Borders::ALL),
    )
}

fn render_row(row: &BlockRow, title_width: usize) -> Line<'static> {
    let mut spans = vec![
        Span::styled(row.label.clone(), Style::default().fg(Color::Gray)),
        Span::styled(SEPARATOR, Style::default().fg(Color::DarkGray)),
    ];
    match (&row.title, row.continuation) {
        (Some(title), false) => spans.push(Span::styled(
            fit_width(title, title_width),
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )),
        (Some(title), true) => spans.push(Span::styled(
            fit_width(&format!("┆ {title}"), title_width),
            Style::default().fg(Color::Green),
        )),
        (None, _) => spans.push(Span::styled("·", Style::default().fg(Color::DarkGray))),
    }
    Line::from(spans)
}

fn build_status_line(state: &AppState) -> Text<'static> {
    let mode = state.selection.mode();
    let mut spans = vec![
        Span::raw("Target: "),
        Span::styled(
            state.target_label(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | Mode: "),
        Span::styled(mode.to_string(), Style::default().fg(Color::Magenta)),
    ];
    if state.selection.is_anchored() {
        spans.push(Span::styled(
            " [range]",
            Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        ));
    }
    if let Some(clip) = &state.clipboard {
        spans.push(Span::raw(" | Clipboard: "));
        spans.push(Span::styled(clip.clone(), Style::default().fg(Color::Green)));
    }
    if let Some(message) = &state.status_message {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            message.clone(),
            Style::default().fg(Color::Cyan),
        ));
    }

    let keys = key_hints(mode);
    Text::from(vec![
        Line::from(spans),
        Line::from(vec![
            Span::styled(
                "Keys: ",
                Style::default()
                    .fg(Color::Gray)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(keys, Style::default().fg(Color::DarkGray)),
        ]),
    ])
}

fn key_hints(mode: SelectionMode) -> &'static str {
    match mode {
        SelectionMode::SingleCell => {
            "j/k move • Enter edit • y copy • p paste • d clear • [ ] day • t today • g go to • q quit"
        }
        SelectionMode::DragRange => {
            "j/k move • drag or v range • Enter edit • y copy • p paste • d clear • [ ] day • t today • g go to • q quit"
        }
    }
}

fn render_overlay(frame: &mut Frame, state: &AppState) {
    match state.overlay() {
        Some(OverlayState::Title(modal)) => render_title_modal(frame, modal),
        Some(OverlayState::GoToDate(overlay)) => render_date_overlay(frame, overlay),
        None => {}
    }
}

fn render_title_modal(frame: &mut Frame, modal: &TitleModal) {
    let area = modal_area(frame.size());
    frame.render_widget(Clear, area);
    let mut input_display = modal.input.clone();
    input_display.push('▌');
    let counter_style = if modal.at_limit() {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    let confirm_style = if modal.can_confirm() {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::CROSSED_OUT)
    };
    let paragraph = Paragraph::new(vec![
        Line::from(Span::styled(
            format!("Schedule {}", modal.range_label),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(input_display),
        Line::from(Span::styled(modal.counter_label(), counter_style)),
        Line::from(""),
        Line::from(vec![
            Span::styled("Enter save", confirm_style),
            Span::styled(
                " • Esc cancel • click outside to dismiss",
                Style::default().fg(Color::Gray),
            ),
        ]),
    ])
    .block(
        Block::default()
            .title("Title")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    )
    .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_date_overlay(frame: &mut Frame, overlay: &DateOverlay) {
    let area = modal_area(frame.size());
    frame.render_widget(Clear, area);
    let mut input_display = overlay.input.clone();
    input_display.push('▌');
    let paragraph = Paragraph::new(vec![
        Line::from(Span::styled(
            "Go to date",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(input_display),
        Line::from(""),
        Line::from(Span::styled(
            "YYYY-MM-DD • Enter go • Esc cancel",
            Style::default().fg(Color::Gray),
        )),
    ])
    .block(
        Block::default()
            .title("Date")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(paragraph, area);
}

/// Cuts `text` to `width` terminal columns, ending in an ellipsis when cut.
fn fit_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for grapheme in text.graphemes(true) {
        let glyph = grapheme.width();
        if used + glyph + 1 > width {
            break;
        }
        out.push_str(grapheme);
        used += glyph;
    }
    out.push('…');
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_width_accounts_for_wide_glyphs() {
        assert_eq!(fit_width("Gym", 10), "Gym");
        assert_eq!(fit_width("abcdef", 4), "abc…");
        // Hangul syllables take two columns each.
        assert_eq!(fit_width("운동하기", 5), "운동…");
        assert_eq!(fit_width("abc", 0), "");
    }

    #[test]
    fn block_at_skips_borders_and_applies_scroll_offset() {
        let grid = Rect::new(0, 3, 40, 12);
        assert_eq!(block_at(grid, 0, 5, 3, 36), None);
        assert_eq!(block_at(grid, 0, 5, 4, 36), Some(0));
        assert_eq!(block_at(grid, 10, 5, 6, 36), Some(12));
        assert_eq!(block_at(grid, 0, 0, 6, 36), None);
        assert_eq!(block_at(grid, 0, 5, 14, 36), None);
        assert_eq!(block_at(grid, 30, 5, 13, 36), None);
    }

    #[test]
    fn key_hints_list_the_shared_bindings_in_both_modes() {
        for mode in [SelectionMode::SingleCell, SelectionMode::DragRange] {
            let hints = key_hints(mode);
            for binding in ["Enter edit", "y copy", "p paste", "d clear", "[ ] day", "t today", "g go to"] {
                assert!(hints.contains(binding), "{mode}: {binding}");
            }
        }
        assert!(key_hints(SelectionMode::DragRange).contains("v range"));
    }

    #[test]
    fn layout_reserves_header_and_status() {
        let areas = layout(Rect::new(0, 0, 80, 30));
        assert_eq!(areas.header.height, 3);
        assert_eq!(areas.status.height, 3);
        assert_eq!(areas.grid.y, 3);
        assert_eq!(areas.grid.height, 24);
    }
}
