use std::io::Stdout;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use ratatui::Terminal;

use crate::config::AppConfig;
use crate::grid::TimeGrid;
use crate::schedule::date::{parse_date_key, today};
use crate::schedule::{BlockRange, ScheduleStore, UpsertOutcome};
use crate::ui;

mod actions;
pub mod selection;
pub mod state;

pub use actions::ActionDispatcher;
pub use selection::Selection;
pub use state::{AppState, BlockRow, DateOverlay, OverlayState, TitleModal};

const PAGE_STEP: isize = 8;

enum Action {
    Quit,
    MoveDown,
    MoveUp,
    PageDown,
    PageUp,
    ToggleRange,
    Edit,
    Copy,
    Paste,
    Clear,
    PreviousDay,
    NextDay,
    Today,
    GoToDate,
}

pub struct App {
    pub config: Arc<AppConfig>,
    store: ScheduleStore,
    state: AppState,
    list_state: ListState,
    frame_area: Rect,
    pointer_down: bool,
    should_quit: bool,
    tick_rate: Duration,
}

impl App {
    pub fn new(config: Arc<AppConfig>, store: ScheduleStore) -> Self {
        let grid = TimeGrid::for_variant(config.grid.variant);
        let date = config
            .initial_date
            .as_deref()
            .and_then(|raw| parse_date_key(raw).ok())
            .unwrap_or_else(today);
        let mut state = AppState::new(
            grid,
            config.selection_mode(),
            date,
            config.editor.title_max_chars,
        );
        state.refresh(&store);
        let mut list_state = ListState::default();
        list_state.select(Some(state.selection.cursor()));
        Self {
            config,
            store,
            state,
            list_state,
            frame_area: Rect::default(),
            pointer_down: false,
            should_quit: false,
            tick_rate: Duration::from_millis(250),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn store(&self) -> &ScheduleStore {
        &self.store
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal
                .draw(|frame| {
                    self.frame_area = frame.size();
                    self.list_state.select(Some(self.state.selection.cursor()));
                    ui::draw_app(frame, &self.state, &mut self.list_state);
                })
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            if event::poll(self.tick_rate).context("polling for terminal events")? {
                match event::read().context("reading terminal event")? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    Event::Resize(_, _) => {
                        // next draw picks up the new size
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.handle_overlay_key(key) {
            return;
        }

        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);
        let action = match key.code {
            KeyCode::Char('q') if plain => Some(Action::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Quit)
            }
            KeyCode::Char('j') | KeyCode::Down => Some(Action::MoveDown),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::MoveUp),
            KeyCode::PageDown => Some(Action::PageDown),
            KeyCode::PageUp => Some(Action::PageUp),
            KeyCode::Char('v') if plain => Some(Action::ToggleRange),
            KeyCode::Enter => Some(Action::Edit),
            KeyCode::Char('e') if plain => Some(Action::Edit),
            KeyCode::Char('y') if plain => Some(Action::Copy),
            KeyCode::Char('p') if plain => Some(Action::Paste),
            KeyCode::Char('d') | KeyCode::Delete if plain => Some(Action::Clear),
            KeyCode::Char('[') | KeyCode::Left => Some(Action::PreviousDay),
            KeyCode::Char(']') | KeyCode::Right => Some(Action::NextDay),
            KeyCode::Char('t') if plain => Some(Action::Today),
            KeyCode::Char('g') if plain => Some(Action::GoToDate),
            KeyCode::Esc => {
                self.state.selection.clear_anchor();
                None
            }
            _ => None,
        };

        if let Some(action) = action {
            self.handle_action(action);
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::MoveDown => self.state.selection.move_cursor(1),
            Action::MoveUp => self.state.selection.move_cursor(-1),
            Action::PageDown => self.state.selection.move_cursor(PAGE_STEP),
            Action::PageUp => self.state.selection.move_cursor(-PAGE_STEP),
            Action::ToggleRange => self.handle_toggle_range(),
            Action::Edit => {
                self.state.open_title_modal();
                self.state
                    .set_status_message(Some("Type a title, Enter to save"));
            }
            Action::Copy => self.handle_copy(),
            Action::Paste => self.handle_paste(),
            Action::Clear => self.handle_clear(),
            Action::PreviousDay => self.shift_date(false),
            Action::NextDay => self.shift_date(true),
            Action::Today => {
                self.state.set_date(today(), &self.store);
                self.state.set_status_message(Some("Jumped to today"));
            }
            Action::GoToDate => self.state.open_date_overlay(),
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) -> bool {
        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);
        match self.state.overlay() {
            Some(OverlayState::Title(_)) => {
                match key.code {
                    KeyCode::Esc => self.cancel_overlay(),
                    KeyCode::Enter => self.submit_title(),
                    KeyCode::Backspace => {
                        if let Some(modal) = self.state.title_modal_mut() {
                            modal.pop_char();
                        }
                    }
                    KeyCode::Char(ch) if plain => {
                        let refused = self
                            .state
                            .title_modal_mut()
                            .map(|modal| !modal.push_char(ch))
                            .unwrap_or(false);
                        if refused {
                            let max = self.state.title_max_chars;
                            self.state
                                .set_status_message(Some(format!("Titles are limited to {max} characters")));
                        }
                    }
                    _ => {}
                }
                true
            }
            Some(OverlayState::GoToDate(_)) => {
                match key.code {
                    KeyCode::Esc => self.cancel_overlay(),
                    KeyCode::Enter => self.submit_date(),
                    KeyCode::Backspace => {
                        if let Some(overlay) = self.state.date_overlay_mut() {
                            overlay.pop_char();
                        }
                    }
                    KeyCode::Char(ch) if plain => {
                        if let Some(overlay) = self.state.date_overlay_mut() {
                            overlay.push_char(ch);
                        }
                    }
                    _ => {}
                }
                true
            }
            None => false,
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let areas = ui::layout(self.frame_area);
        if self.state.overlay().is_some() {
            if let MouseEventKind::Down(MouseButton::Left) = mouse.kind {
                let modal = ui::modal_area(self.frame_area);
                if !ui::contains(modal, mouse.column, mouse.row) {
                    self.cancel_overlay();
                }
            }
            return;
        }

        let block = ui::block_at(
            areas.grid,
            self.list_state.offset(),
            mouse.column,
            mouse.row,
            self.state.grid.block_count(),
        );
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(index) = block {
                    self.state.selection.press(index);
                    self.pointer_down = true;
                }
            }
            MouseEventKind::Drag(MouseButton::Left) if self.pointer_down => {
                if let Some(index) = block {
                    self.state.selection.drag_to(index);
                }
            }
            MouseEventKind::Up(MouseButton::Left) if self.pointer_down => {
                self.pointer_down = false;
                self.state.open_title_modal();
            }
            MouseEventKind::ScrollDown => self.state.selection.move_cursor(1),
            MouseEventKind::ScrollUp => self.state.selection.move_cursor(-1),
            _ => {}
        }
    }

    fn cancel_overlay(&mut self) {
        let was_title = self.state.title_modal().is_some();
        self.state.close_overlay();
        if was_title {
            self.state.selection.clear_anchor();
            self.state.set_status_message(Some("Canceled"));
        }
    }

    fn submit_title(&mut self) {
        let Some((range, title)) = self
            .state
            .title_modal()
            .and_then(|modal| modal.confirmed_title().map(|title| (modal.range, title)))
        else {
            self.state.set_status_message(Some("Title cannot be empty"));
            return;
        };
        let date = self.state.date_key();
        let result = ActionDispatcher::new(&mut self.store).assign(&date, range, &title);
        self.state.close_overlay();
        self.report_write(result, range);
    }

    fn submit_date(&mut self) {
        let Some(parsed) = self.state.date_overlay().map(DateOverlay::parse) else {
            return;
        };
        match parsed {
            Ok(date) => {
                self.state.close_overlay();
                self.state.set_date(date, &self.store);
                self.state.set_status_message(None::<String>);
            }
            Err(err) => {
                tracing::warn!(%err, "rejected date input");
                self.state.set_status_message(Some(err.to_string()));
            }
        }
    }

    fn handle_toggle_range(&mut self) {
        let message = if self.state.selection.toggle_anchor() {
            "Range started: move to extend, Enter to title"
        } else if self.state.selection.mode() == crate::config::SelectionMode::SingleCell {
            "Range selection is off in single-cell mode"
        } else {
            "Range dropped"
        };
        self.state.set_status_message(Some(message));
    }

    fn handle_copy(&mut self) {
        match self.state.copy_under_cursor() {
            Some(title) => self
                .state
                .set_status_message(Some(format!("Copied \"{title}\""))),
            None => self.state.set_status_message(Some("Nothing to copy here")),
        }
    }

    fn handle_paste(&mut self) {
        let range = self.state.selection.target();
        let date = self.state.date_key();
        let clipboard = self.state.clipboard.clone();
        let outcome =
            ActionDispatcher::new(&mut self.store).paste(&date, range, clipboard.as_deref());
        match outcome {
            Some(result) => self.report_write(result, range),
            None => self.state.set_status_message(Some("Clipboard is empty")),
        }
    }

    fn handle_clear(&mut self) {
        let range = self.state.selection.target();
        let date = self.state.date_key();
        let result = ActionDispatcher::new(&mut self.store).clear(&date, range);
        self.report_write(result, range);
    }

    /// Repaints after a store write. The write is in memory even when the
    /// save failed, so the grid is refreshed either way.
    fn report_write(&mut self, result: Result<UpsertOutcome>, range: BlockRange) {
        self.state.selection.clear_anchor();
        self.state.refresh(&self.store);
        let label = self.state.grid.range_label(range);
        let message = match result {
            Ok(outcome) => describe_write(&outcome, &label),
            Err(err) => {
                tracing::error!(?err, range = %label, "failed to save schedule change");
                format!("Not saved to disk, kept for this session: {err}")
            }
        };
        self.state.set_status_message(Some(message));
    }

    fn shift_date(&mut self, forward: bool) {
        if !self.state.shift_date(forward, &self.store) {
            self.state
                .set_status_message(Some("No further dates in that direction"));
        } else {
            self.state.set_status_message(None::<String>);
        }
    }
}

fn describe_write(outcome: &UpsertOutcome, range_label: &str) -> String {
    let replaced = outcome.removed.len();
    match (&outcome.inserted, replaced) {
        (Some(entry), 0) => format!("Saved \"{}\" at {range_label}", entry.title),
        (Some(entry), n) => format!(
            "Saved \"{}\" at {range_label}, replaced {n} entr{}",
            entry.title,
            if n == 1 { "y" } else { "ies" }
        ),
        (None, 0) => format!("Nothing scheduled at {range_label}"),
        (None, n) => format!(
            "Cleared {n} entr{} at {range_label}",
            if n == 1 { "y" } else { "ies" }
        ),
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("restoring screen state")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GridVariant, SelectionMode};
    use crate::storage::MemoryBackend;
    use crossterm::event::KeyEventState;

    const DAY: &str = "2026-02-01";

    fn app(variant: GridVariant) -> (MemoryBackend, App) {
        let backend = MemoryBackend::default();
        let store = ScheduleStore::load(Box::new(backend.clone()));
        let mut config = AppConfig::default();
        config.set_variant(variant);
        config.initial_date = Some(DAY.into());
        let mut app = App::new(Arc::new(config), store);
        app.frame_area = Rect::new(0, 0, 80, 40);
        (backend, app)
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        });
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch));
        }
    }

    fn mouse(app: &mut App, kind: MouseEventKind, row: u16) {
        app.handle_mouse(MouseEvent {
            kind,
            column: 10,
            row,
            modifiers: KeyModifiers::NONE,
        });
    }

    fn title_at(app: &App, block: usize) -> Option<String> {
        app.store()
            .find_covering(DAY, block)
            .map(|entry| entry.title.clone())
    }

    #[test]
    fn enter_title_confirm_writes_and_repaints() {
        let (backend, mut app) = app(GridVariant::HalfDay);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "  Standup ");
        press(&mut app, KeyCode::Enter);

        assert!(app.state().overlay().is_none());
        assert_eq!(title_at(&app, 1).as_deref(), Some("Standup"));
        assert_eq!(app.state().rows[1].title.as_deref(), Some("Standup"));
        assert!(backend.contents().is_some());
    }

    #[test]
    fn cancel_never_touches_the_store() {
        let (backend, mut app) = app(GridVariant::HalfDay);
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "Draft");
        press(&mut app, KeyCode::Esc);

        assert!(app.state().overlay().is_none());
        assert!(app.store().entries().is_empty());
        assert!(backend.contents().is_none());
    }

    #[test]
    fn backdrop_click_cancels_the_modal() {
        let (backend, mut app) = app(GridVariant::HalfDay);
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "Draft");
        mouse(&mut app, MouseEventKind::Down(MouseButton::Left), 0);

        assert!(app.state().overlay().is_none());
        assert!(backend.contents().is_none());
    }

    #[test]
    fn whitespace_title_keeps_modal_open() {
        let (_backend, mut app) = app(GridVariant::HalfDay);
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "   ");
        press(&mut app, KeyCode::Enter);

        assert!(app.state().title_modal().is_some());
        assert!(app.store().entries().is_empty());
    }

    #[test]
    fn typing_past_the_cap_is_refused() {
        let (_backend, mut app) = app(GridVariant::HalfDay);
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "abcdefghijklmnopqrstuvwxyz");
        let modal = app.state().title_modal().expect("modal");
        assert_eq!(modal.input, "abcdefghijklmnopqrst");
        assert!(modal.at_limit());
    }

    #[test]
    fn mouse_drag_selects_a_range_and_opens_the_modal() {
        let (_backend, mut app) = app(GridVariant::FullDay);
        assert_eq!(app.state().selection.mode(), SelectionMode::DragRange);
        // Grid starts at row 3; its first block row is 4.
        mouse(&mut app, MouseEventKind::Down(MouseButton::Left), 6);
        mouse(&mut app, MouseEventKind::Drag(MouseButton::Left), 9);
        mouse(&mut app, MouseEventKind::Up(MouseButton::Left), 9);

        let modal = app.state().title_modal().expect("modal opened on release");
        assert_eq!(modal.range.start(), 2);
        assert_eq!(modal.range.end(), 5);

        type_text(&mut app, "Deep work");
        press(&mut app, KeyCode::Enter);
        for block in 2..=5 {
            assert_eq!(title_at(&app, block).as_deref(), Some("Deep work"));
        }
        assert!(!app.state().selection.is_anchored());
    }

    #[test]
    fn click_in_single_cell_mode_targets_one_block() {
        let (_backend, mut app) = app(GridVariant::HalfDay);
        mouse(&mut app, MouseEventKind::Down(MouseButton::Left), 7);
        mouse(&mut app, MouseEventKind::Drag(MouseButton::Left), 10);
        mouse(&mut app, MouseEventKind::Up(MouseButton::Left), 10);

        let modal = app.state().title_modal().expect("modal opened on click");
        assert_eq!(modal.range.start(), 3);
        assert!(modal.range.is_single());
    }

    #[test]
    fn copy_paste_and_clear_in_single_cell_mode() {
        let (_backend, mut app) = app(GridVariant::HalfDay);
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "Gym");
        press(&mut app, KeyCode::Enter);

        press(&mut app, KeyCode::Char('y'));
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Char('p'));
        assert_eq!(title_at(&app, 2).as_deref(), Some("Gym"));
        assert_eq!(app.store().entries().len(), 2);

        press(&mut app, KeyCode::Char('d'));
        assert_eq!(title_at(&app, 2), None);
        assert_eq!(title_at(&app, 0).as_deref(), Some("Gym"));
    }

    #[test]
    fn date_navigation_isolates_days() {
        let (_backend, mut app) = app(GridVariant::HalfDay);
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "Today");
        press(&mut app, KeyCode::Enter);

        press(&mut app, KeyCode::Char(']'));
        assert_eq!(app.state().date_key(), "2026-02-02");
        assert_eq!(app.state().rows[0].title, None);

        press(&mut app, KeyCode::Char('g'));
        for _ in 0..10 {
            press(&mut app, KeyCode::Backspace);
        }
        type_text(&mut app, "2026-02-01");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.state().date_key(), DAY);
        assert_eq!(app.state().rows[0].title.as_deref(), Some("Today"));
    }

    #[test]
    fn invalid_date_input_keeps_current_date() {
        let (_backend, mut app) = app(GridVariant::HalfDay);
        press(&mut app, KeyCode::Char('g'));
        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Backspace);
        type_text(&mut app, "39");
        assert_eq!(
            app.state().date_overlay().map(|overlay| overlay.input.as_str()),
            Some("2026-02-39")
        );
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.state().date_key(), DAY);
        assert!(app.state().date_overlay().is_some());
        let message = app.state().status_message.clone().unwrap_or_default();
        assert!(message.contains("2026-02-39"), "{message}");
    }

    #[test]
    fn failed_save_keeps_the_edit_and_says_so() {
        let (backend, mut app) = app(GridVariant::HalfDay);
        backend.fail_saves(true);
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "Offline");
        press(&mut app, KeyCode::Enter);

        assert_eq!(title_at(&app, 0).as_deref(), Some("Offline"));
        assert_eq!(app.state().rows[0].title.as_deref(), Some("Offline"));
        let message = app.state().status_message.clone().unwrap_or_default();
        assert!(message.starts_with("Not saved to disk"), "{message}");
        assert!(backend.contents().is_none());
    }

    #[test]
    fn describe_write_phrases_outcomes() {
        let outcome = UpsertOutcome::default();
        assert_eq!(describe_write(&outcome, "06:00–06:30"), "Nothing scheduled at 06:00–06:30");
    }
}
