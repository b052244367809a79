//! App: terminal init, main loop, key and mouse handling.

use crate::GameConfig;
use crate::game::{Coord, GameState, PointerInput, RandomTiles, Step};
use crate::input::{Action, Pointer, key_to_action, mouse_to_pointer};
use crate::theme::Theme;
use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyEvent, KeyEventKind, MouseEvent};
use ratatui::DefaultTerminal;
use ratatui::layout::Rect;
use std::time::{Duration, Instant};
use tachyonfx::Effect;
use tracing::{debug, info, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Playing,
    QuitMenu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitOption {
    Resume,
    Restart,
    Exit,
}

impl QuitOption {
    fn next(self) -> Self {
        match self {
            Self::Resume => Self::Restart,
            Self::Restart => Self::Exit,
            Self::Exit => Self::Resume,
        }
    }

    fn prev(self) -> Self {
        match self {
            Self::Resume => Self::Exit,
            Self::Restart => Self::Resume,
            Self::Exit => Self::Restart,
        }
    }
}

pub struct App {
    config: GameConfig,
    theme: Theme,
    state: GameState,
    screen: Screen,
    paused: bool,
    quit_selected: QuitOption,
    /// Keyboard cursor; also follows the mouse.
    cursor: Coord,
    /// A gesture started with Space/Enter is in progress.
    key_gesture: bool,
    /// Board rect from the last draw, for mouse → grid mapping.
    board_rect: Rect,
    /// The last draw showed the board (terminal large enough).
    board_visible: bool,
    frame_interval: Duration,
    last_frame: Instant,
    /// TachyonFX fade-in for fallen/refilled tiles (created per resolution).
    refill_effect: Option<Effect>,
    refill_effect_process_time: Option<Instant>,
    /// `state.resolutions` the current effect was created for.
    animated_resolutions: u32,
}

impl App {
    pub fn new(config: GameConfig, theme: Theme) -> Result<Self> {
        let source = Box::new(RandomTiles::new(config.seed));
        let state = GameState::new(&config, source).context("creating board")?;
        info!(
            rows = config.rows,
            cols = config.cols,
            coin_threshold = config.coin_threshold,
            seed = ?config.seed,
            "new game"
        );
        let frame_interval =
            Duration::try_from_secs_f64(1.0 / config.frame_rate).context("frame interval")?;
        Ok(Self {
            config,
            theme,
            state,
            screen: Screen::Playing,
            paused: false,
            quit_selected: QuitOption::Resume,
            cursor: Coord::new(0, 0),
            key_gesture: false,
            board_rect: Rect::default(),
            board_visible: false,
            frame_interval,
            last_frame: Instant::now(),
            refill_effect: None,
            refill_effect_process_time: None,
            animated_resolutions: 0,
        })
    }

    fn restart(&mut self) {
        self.state.reset();
        self.screen = Screen::Playing;
        self.paused = false;
        self.key_gesture = false;
        self.refill_effect = None;
        self.refill_effect_process_time = None;
        self.animated_resolutions = 0;
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{DisableMouseCapture, EnableMouseCapture},
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode().context("enabling raw mode")?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture).context("entering alternate screen")?;
        let mut terminal = DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        // Restore
        execute!(std::io::stdout(), DisableMouseCapture, LeaveAlternateScreen)?;
        disable_raw_mode()?;
        info!(score = self.state.score, rewards = self.state.rewards, "game closed");

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();
            let delta = now.saturating_duration_since(self.last_frame);
            self.last_frame = now;
            if !self.paused {
                self.state.tick_popups(delta.as_millis().min(u32::MAX as u128) as u32);
            }

            let mut board_rect = self.board_rect;
            let mut board_visible = self.board_visible;
            let cursor = (self.screen == Screen::Playing).then_some(self.cursor);
            terminal.draw(|f| {
                board_rect = crate::ui::board_rect(f.area(), &self.state);
                board_visible = crate::ui::fits(f.area(), &self.state);
                crate::ui::draw(
                    f,
                    self.screen,
                    &self.state,
                    &self.theme,
                    cursor,
                    self.paused,
                    self.quit_selected,
                    &mut self.refill_effect,
                    &mut self.refill_effect_process_time,
                    now,
                );
            })?;
            self.board_rect = board_rect;
            self.board_visible = board_visible;

            if self.refill_effect.as_ref().is_some_and(Effect::done) {
                self.refill_effect = None;
            }

            let timeout = self.frame_interval.saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    let quit = match event::read()? {
                        Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
                        Event::Mouse(mouse) => {
                            self.handle_mouse(mouse);
                            false
                        }
                        _ => false,
                    };
                    if quit {
                        return Ok(());
                    }
                }
            }
            self.start_refill_effect();
        }
    }

    /// New resolution since the last frame: fade the changed tiles in.
    fn start_refill_effect(&mut self) {
        if self.state.resolutions == self.animated_resolutions {
            return;
        }
        self.animated_resolutions = self.state.resolutions;
        if self.config.no_animation {
            return;
        }
        self.refill_effect = Some(crate::ui::refill_effect(self.board_rect, &self.state, &self.theme));
        self.refill_effect_process_time = None;
    }

    /// Feed one pointer step to the game and log what happened.
    fn feed(&mut self, input: PointerInput) {
        match self.state.update(input) {
            Step::Selected(outcome) if !outcome.is_accepted() => {
                trace!(?outcome, ?input, "selection rejected");
            }
            Step::Resolved(Some(res)) => debug!(
                cleared = res.cleared,
                coins = res.coins,
                rewards = res.rewards,
                score = self.state.score,
                "match resolved"
            ),
            Step::Resolved(None) => debug!("selection discarded"),
            _ => {}
        }
    }

    fn cursor_input(&self) -> PointerInput {
        PointerInput::held_at(self.cursor.row as i32, self.cursor.col as i32)
    }

    /// Returns true when the app should exit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        let action = key_to_action(key);
        match self.screen {
            Screen::QuitMenu => match action {
                Action::CursorDown | Action::CursorRight => self.quit_selected = self.quit_selected.next(),
                Action::CursorUp | Action::CursorLeft => self.quit_selected = self.quit_selected.prev(),
                Action::Select => match self.quit_selected {
                    QuitOption::Resume => self.screen = Screen::Playing,
                    QuitOption::Restart => self.restart(),
                    QuitOption::Exit => return true,
                },
                Action::Pause | Action::Quit => self.screen = Screen::Playing,
                Action::Restart | Action::None => {}
            },
            Screen::Playing if self.paused => match action {
                Action::Pause => self.paused = false,
                Action::Quit => self.open_quit_menu(),
                _ => {}
            },
            Screen::Playing => match action {
                Action::CursorLeft => self.move_cursor(0, -1),
                Action::CursorRight => self.move_cursor(0, 1),
                Action::CursorUp => self.move_cursor(-1, 0),
                Action::CursorDown => self.move_cursor(1, 0),
                Action::Select => {
                    if self.key_gesture {
                        self.key_gesture = false;
                        self.feed(PointerInput::released());
                    } else {
                        self.key_gesture = true;
                        self.feed(self.cursor_input());
                    }
                }
                Action::Restart => self.restart(),
                Action::Pause => {
                    self.paused = true;
                    self.abandon_gesture();
                }
                Action::Quit => self.open_quit_menu(),
                Action::None => {}
            },
        }
        false
    }

    fn open_quit_menu(&mut self) {
        self.abandon_gesture();
        self.screen = Screen::QuitMenu;
        self.quit_selected = QuitOption::Resume;
    }

    fn abandon_gesture(&mut self) {
        self.key_gesture = false;
        self.state.cancel_gesture();
    }

    fn move_cursor(&mut self, d_row: i32, d_col: i32) {
        let row = (self.cursor.row as i32 + d_row).clamp(0, self.state.board.rows() as i32 - 1);
        let col = (self.cursor.col as i32 + d_col).clamp(0, self.state.board.cols() as i32 - 1);
        self.cursor = Coord::new(row as usize, col as usize);
        if self.key_gesture {
            self.feed(self.cursor_input());
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if self.screen != Screen::Playing || self.paused || !self.board_visible {
            return;
        }
        let (row, col) = crate::ui::grid_cell_at(self.board_rect, mouse.column, mouse.row);
        match mouse_to_pointer(mouse.kind) {
            Pointer::Press | Pointer::Drag => {
                // Mouse takes over from a keyboard gesture.
                self.key_gesture = false;
                self.hover(row, col);
                self.feed(PointerInput::held_at(row, col));
            }
            Pointer::Release => {
                self.key_gesture = false;
                self.feed(PointerInput::released());
            }
            Pointer::Hover => self.hover(row, col),
            Pointer::Ignore => {}
        }
    }

    fn hover(&mut self, row: i32, col: i32) {
        if let Some(at) = self.state.board.coord(row, col) {
            self.cursor = at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Gesture;
    use crossterm::event::{KeyCode, KeyModifiers, MouseButton, MouseEventKind};

    fn app() -> App {
        let config = GameConfig {
            rows: 6,
            cols: 6,
            coin_threshold: 2,
            seed: Some(5),
            frame_rate: 30.0,
            no_animation: true,
        };
        let mut app = App::new(config, Theme::onedark_default()).unwrap();
        let (w, h) = crate::ui::frame_size(6, 6);
        app.board_rect = crate::ui::board_rect(Rect::new(0, 0, w, h), &app.state);
        app.board_visible = true;
        app
    }

    fn press(app: &mut App, code: KeyCode) -> bool {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    /// Mouse event over tile (row, col) of the last drawn board.
    fn mouse(app: &mut App, kind: MouseEventKind, row: u16, col: u16) {
        let event = MouseEvent {
            kind,
            column: app.board_rect.x + col * crate::ui::CELL_WIDTH,
            row: app.board_rect.y + row * crate::ui::CELL_HEIGHT,
            modifiers: KeyModifiers::NONE,
        };
        app.handle_mouse(event);
    }

    fn is_idle(app: &App) -> bool {
        app.state.gesture == Gesture::Idle && app.state.selection.is_empty()
    }

    #[test]
    fn test_space_begins_and_ends_keyboard_gesture() {
        let mut app = app();
        press(&mut app, KeyCode::Char(' '));
        assert!(app.key_gesture);
        assert_eq!(app.state.gesture, Gesture::Selecting);
        assert_eq!(app.state.selection.first(), Some(Coord::new(0, 0)));

        press(&mut app, KeyCode::Char(' '));
        assert!(!app.key_gesture);
        assert!(is_idle(&app));
    }

    #[test]
    fn test_cursor_moves_without_gesture_select_nothing() {
        let mut app = app();
        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Down);
        assert_eq!(app.cursor, Coord::new(1, 1));
        assert!(is_idle(&app));
    }

    #[test]
    fn test_mouse_release_ends_keyboard_gesture() {
        let mut app = app();
        press(&mut app, KeyCode::Char(' '));
        mouse(&mut app, MouseEventKind::Up(MouseButton::Left), 3, 3);
        assert!(!app.key_gesture);
        assert!(is_idle(&app));

        // Moving afterwards must not start a chain on its own.
        press(&mut app, KeyCode::Right);
        assert!(is_idle(&app));
        press(&mut app, KeyCode::Char(' '));
        assert_eq!(app.state.gesture, Gesture::Selecting);
        assert_eq!(app.state.selection.first(), Some(Coord::new(0, 1)));
    }

    #[test]
    fn test_mouse_press_takes_over_keyboard_gesture() {
        let mut app = app();
        press(&mut app, KeyCode::Char(' '));
        mouse(&mut app, MouseEventKind::Down(MouseButton::Left), 2, 4);
        assert!(!app.key_gesture);
        assert_eq!(app.state.gesture, Gesture::Selecting);
        assert_eq!(app.cursor, Coord::new(2, 4));

        press(&mut app, KeyCode::Left);
        assert_eq!(app.cursor, Coord::new(2, 3));
        assert!(app.state.selection.len() <= 2);
        mouse(&mut app, MouseEventKind::Up(MouseButton::Left), 2, 3);
        assert!(is_idle(&app));
    }

    #[test]
    fn test_mouse_drag_then_release_resolves() {
        let mut app = app();
        mouse(&mut app, MouseEventKind::Down(MouseButton::Left), 0, 0);
        assert_eq!(app.state.selection.first(), Some(Coord::new(0, 0)));
        mouse(&mut app, MouseEventKind::Up(MouseButton::Left), 0, 0);
        assert!(is_idle(&app));
        assert_eq!(app.state.score, 0);
    }

    #[test]
    fn test_pause_cancels_gesture_and_blocks_mouse() {
        let mut app = app();
        press(&mut app, KeyCode::Char(' '));
        press(&mut app, KeyCode::Char('p'));
        assert!(app.paused);
        assert!(!app.key_gesture);
        assert!(is_idle(&app));

        mouse(&mut app, MouseEventKind::Down(MouseButton::Left), 1, 1);
        assert!(is_idle(&app));
        press(&mut app, KeyCode::Char('p'));
        assert!(!app.paused);
    }

    #[test]
    fn test_quit_menu_cancels_gesture() {
        let mut app = app();
        mouse(&mut app, MouseEventKind::Down(MouseButton::Left), 1, 1);
        press(&mut app, KeyCode::Char('q'));
        assert_eq!(app.screen, Screen::QuitMenu);
        assert!(is_idle(&app));

        // Resume is preselected.
        assert!(!press(&mut app, KeyCode::Enter));
        assert_eq!(app.screen, Screen::Playing);
        press(&mut app, KeyCode::Char('q'));
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        assert!(press(&mut app, KeyCode::Enter));
    }

    #[test]
    fn test_mouse_ignored_while_board_hidden() {
        let mut app = app();
        app.board_visible = false;
        mouse(&mut app, MouseEventKind::Down(MouseButton::Left), 1, 1);
        assert!(is_idle(&app));
        assert_eq!(app.cursor, Coord::new(0, 0));
    }

    #[test]
    fn test_tiny_frame_rate_is_an_error() {
        let config = GameConfig {
            rows: 6,
            cols: 6,
            coin_threshold: 2,
            seed: None,
            frame_rate: 1e-30,
            no_animation: false,
        };
        assert!(App::new(config, Theme::onedark_default()).is_err());
    }
}
