//! Layout and drawing: status bars, board, selection, cursor, popups, pause, quit menu.

use crate::app::{QuitOption, Screen};
use crate::game::{Cell, Coord, GameState, PopupKind};
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::layout::{Alignment, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Terminal columns per tile; the last one is the gap to the next tile.
pub const CELL_WIDTH: u16 = 5;
/// Terminal rows per tile; the bottom one is a half-block edge.
pub const CELL_HEIGHT: u16 = 2;
/// Status line above the board (the pointer's vertical offset).
pub const STATUS_BAR_HEIGHT: u16 = 1;
/// Room for "Score: 99999    12:34:56" and the coin line.
const MIN_INNER_WIDTH: u16 = 32;

/// Duration of the fall/refill fade-in (TachyonFX) in ms.
const REFILL_FADE_MS: u32 = 280;

/// Board size in terminal cells, including one column of left padding.
fn board_size(rows: usize, cols: usize) -> (u16, u16) {
    (cols as u16 * CELL_WIDTH + 1, rows as u16 * CELL_HEIGHT)
}

/// Outer frame (border + two status bars + board) in terminal cells.
pub fn frame_size(rows: usize, cols: usize) -> (u16, u16) {
    let (bw, bh) = board_size(rows, cols);
    (bw.max(MIN_INNER_WIDTH) + 2, bh + 2 * STATUS_BAR_HEIGHT + 2)
}

/// True when the whole frame fits in `area`.
pub fn fits(area: Rect, state: &GameState) -> bool {
    let (w, h) = frame_size(state.board.rows(), state.board.cols());
    area.width >= w && area.height >= h
}

fn frame_rect(area: Rect, state: &GameState) -> Rect {
    let (w, h) = frame_size(state.board.rows(), state.board.cols());
    Rect {
        x: area.x + area.width.saturating_sub(w) / 2,
        y: area.y + area.height.saturating_sub(h) / 2,
        width: w.min(area.width),
        height: h.min(area.height),
    }
}

/// Board rect inside the frame: under the top status bar, centred horizontally.
/// Drawing and pointer mapping both go through this.
pub fn board_rect(area: Rect, state: &GameState) -> Rect {
    let outer = frame_rect(area, state);
    let (bw, bh) = board_size(state.board.rows(), state.board.cols());
    let inner_w = outer.width.saturating_sub(2);
    Rect {
        x: outer.x + 1 + inner_w.saturating_sub(bw) / 2 + 1,
        y: outer.y + 1 + STATUS_BAR_HEIGHT,
        width: (bw - 1).min(inner_w),
        height: bh.min(outer.height.saturating_sub(2 + 2 * STATUS_BAR_HEIGHT)),
    }
}

/// Terminal position → (row, col). Floored, so anything left of or above the
/// board comes out negative.
pub fn grid_cell_at(board: Rect, column: u16, row: u16) -> (i32, i32) {
    let dx = i32::from(column) - i32::from(board.x);
    let dy = i32::from(row) - i32::from(board.y);
    (
        dy.div_euclid(i32::from(CELL_HEIGHT)),
        dx.div_euclid(i32::from(CELL_WIDTH)),
    )
}

/// Top-left terminal cell of a tile.
fn tile_origin(board: Rect, at: Coord) -> (u16, u16) {
    (
        board.x + at.col as u16 * CELL_WIDTH,
        board.y + at.row as u16 * CELL_HEIGHT,
    )
}

/// Fade-in (TachyonFX) over the tiles that fell or were refilled in the last resolution.
pub fn refill_effect(board: Rect, state: &GameState, theme: &Theme) -> Effect {
    let mut positions = HashSet::new();
    for &at in &state.last_settled {
        let (x0, y0) = tile_origin(board, at);
        for x in x0..x0 + CELL_WIDTH - 1 {
            for y in y0..y0 + CELL_HEIGHT {
                positions.insert((x, y));
            }
        }
    }
    let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
        positions.contains(&(pos.x, pos.y))
    }));
    fx::fade_from(theme.bg, theme.bg, (REFILL_FADE_MS, Interpolation::QuadOut))
        .with_filter(filter)
        .with_area(board)
}

fn process_refill_effect(
    frame: &mut Frame,
    board: Rect,
    refill_effect: &mut Option<Effect>,
    refill_process_time: &mut Option<Instant>,
    now: Instant,
) {
    let Some(effect) = refill_effect else {
        *refill_process_time = None;
        return;
    };
    let delta = refill_process_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    *refill_process_time = Some(now);
    frame.render_effect(effect, board, TfxDuration::from_millis(delta_ms));
}

/// Draw the current screen. The refill effect, when present, is advanced by the
/// time since it was last processed.
pub fn draw(
    frame: &mut Frame,
    screen: Screen,
    state: &GameState,
    theme: &Theme,
    cursor: Option<Coord>,
    paused: bool,
    quit_selected: QuitOption,
    refill_effect: &mut Option<Effect>,
    refill_process_time: &mut Option<Instant>,
    now: Instant,
) {
    let area = frame.area();
    if !fits(area, state) {
        draw_too_small(frame, state, theme, area);
        return;
    }
    draw_game(frame, state, theme, area, cursor);
    let board = board_rect(area, state);
    process_refill_effect(frame, board, refill_effect, refill_process_time, now);
    draw_popups(frame, state, theme, area);
    match screen {
        Screen::Playing if paused => draw_pause_overlay(frame, theme, area),
        Screen::Playing => {}
        Screen::QuitMenu => draw_quit_menu(frame, theme, quit_selected),
    }
}

fn draw_too_small(frame: &mut Frame, state: &GameState, theme: &Theme, area: Rect) {
    let (w, h) = frame_size(state.board.rows(), state.board.cols());
    let lines = vec![
        Line::from(Span::styled(" Terminal too small ", Style::default().fg(theme.title))),
        Line::from(Span::styled(
            format!(" need {w}x{h}, have {}x{} ", area.width, area.height),
            Style::default().fg(theme.main_fg),
        )),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(area, frame.buffer_mut());
}

/// Frame with top status (score, clock), board, bottom status (coins, rewards).
fn draw_game(frame: &mut Frame, state: &GameState, theme: &Theme, area: Rect, cursor: Option<Coord>) {
    let outer = frame_rect(area, state);
    let title = if state.selection.is_empty() {
        " Tilestui ".to_string()
    } else {
        format!(" Tilestui  | Chain: {} ", state.selection.len())
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .style(Style::default().bg(theme.bg))
        .title(Span::styled(title, Style::default().fg(theme.title)));
    let inner = block.inner(outer);
    block.render(outer, frame.buffer_mut());

    let label = Style::default().fg(theme.title);
    let value = Style::default().fg(theme.main_fg);
    let dim = Style::default().fg(theme.inactive_fg);

    let top = Rect {
        height: STATUS_BAR_HEIGHT,
        ..inner
    };
    Paragraph::new(Line::from(vec![
        Span::styled(" Score: ", label),
        Span::styled(state.score.to_string(), value),
    ]))
    .render(top, frame.buffer_mut());
    let clock = chrono::Local::now().format("%H:%M:%S ").to_string();
    Paragraph::new(Line::from(Span::styled(clock, dim)))
        .alignment(Alignment::Right)
        .render(top, frame.buffer_mut());

    let bottom = Rect {
        y: inner.y + inner.height.saturating_sub(STATUS_BAR_HEIGHT),
        height: STATUS_BAR_HEIGHT,
        ..inner
    };
    Paragraph::new(Line::from(vec![
        Span::styled(" Coins: ", label),
        Span::styled(format!("{} / {}", state.coins, state.coin_threshold), value),
    ]))
    .render(bottom, frame.buffer_mut());
    Paragraph::new(Line::from(vec![
        Span::styled("Rewards: ", label),
        Span::styled(format!("{} ", state.rewards), value),
    ]))
    .alignment(Alignment::Right)
    .render(bottom, frame.buffer_mut());

    draw_board(frame, state, theme, board_rect(area, state), cursor);
}

fn draw_board(frame: &mut Frame, state: &GameState, theme: &Theme, board: Rect, cursor: Option<Coord>) {
    let buf = frame.buffer_mut();
    let face_width = (CELL_WIDTH - 1) as usize;
    for row in 0..state.board.rows() {
        for col in 0..state.board.cols() {
            let at = Coord::new(row, col);
            let Some(Cell::Tile(tile)) = state.board.get(at) else {
                continue;
            };
            let (x, y) = tile_origin(board, at);
            let color = theme.tile_color(tile);
            let selected = state.selection.contains(at);
            let face = if selected {
                Style::default()
                    .fg(color)
                    .bg(theme.selection)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(theme.bg).bg(color)
            };
            buf.set_string(x, y, format!("{:^face_width$}", tile.glyph()), face);

            let edge_color = if cursor == Some(at) {
                theme.cursor
            } else if selected {
                theme.selection
            } else {
                darken(color)
            };
            buf.set_string(
                x,
                y + 1,
                "▀".repeat(face_width),
                Style::default().fg(edge_color).bg(theme.bg),
            );
        }
    }
}

/// Shadowed edge under a tile.
fn darken(color: Color) -> Color {
    match color {
        Color::Rgb(r, g, b) => Color::Rgb(
            (r as f32 * 0.6) as u8,
            (g as f32 * 0.6) as u8,
            (b as f32 * 0.6) as u8,
        ),
        other => other,
    }
}

/// Floating "+N" / "Reward!" labels, rising from the tile they were anchored to.
fn draw_popups(frame: &mut Frame, state: &GameState, theme: &Theme, area: Rect) {
    let board = board_rect(area, state);
    for popup in &state.popups {
        let (x, y) = tile_origin(board, popup.at);
        let Some(y) = y.checked_sub(popup.lift).filter(|y| *y >= board.y) else {
            continue;
        };
        let (label, color) = match popup.kind {
            PopupKind::Score(n) => (format!("+{n}"), theme.title),
            PopupKind::Reward => ("Reward!".to_string(), theme.cursor),
        };
        let max = (board.x + board.width).saturating_sub(x) as usize;
        let style = Style::default()
            .fg(color)
            .bg(theme.bg)
            .add_modifier(Modifier::BOLD);
        frame.buffer_mut().set_stringn(x, y, label, max, style);
    }
}

fn centred(area: Rect, w: u16, h: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(w) / 2,
        y: area.y + area.height.saturating_sub(h) / 2,
        width: w.min(area.width),
        height: h.min(area.height),
    }
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let popup = centred(area, 28, 5);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(theme.title),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P Resume    Q Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
                .style(Style::default().bg(theme.bg)),
        )
        .render(popup, frame.buffer_mut());
}

pub fn draw_quit_menu(frame: &mut Frame, theme: &Theme, selected: QuitOption) {
    let quit_rect = centred(frame.area(), 24, 8);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.title))
        .style(Style::default().bg(theme.bg))
        .title(" Quit? ");
    let inner = block.inner(quit_rect);
    block.render(quit_rect, frame.buffer_mut());

    let options = [
        (QuitOption::Resume, " Resume "),
        (QuitOption::Restart, " Restart "),
        (QuitOption::Exit, " Exit "),
    ];
    for (i, (opt, label)) in options.iter().enumerate() {
        let style = if *opt == selected {
            Style::default()
                .fg(theme.bg)
                .bg(theme.title)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.title)
        };
        let rx = inner.x + (inner.width.saturating_sub(label.len() as u16)) / 2;
        let ry = inner.y + 1 + i as u16 * 2;
        if ry < inner.y + inner.height {
            frame.buffer_mut().set_string(rx, ry, label, style);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Board, RandomTiles};

    fn state(rows: usize, cols: usize) -> GameState {
        let mut src = RandomTiles::new(Some(11));
        let board = Board::filled(rows, cols, &mut src).unwrap();
        GameState::from_board(board, 2, Box::new(src))
    }

    fn screen() -> Rect {
        Rect::new(0, 0, 80, 24)
    }

    #[test]
    fn test_board_sits_under_status_bar() {
        let g = state(6, 6);
        let outer = frame_rect(screen(), &g);
        let board = board_rect(screen(), &g);
        assert_eq!(board.y, outer.y + 1 + STATUS_BAR_HEIGHT);
        assert_eq!(board.height, 6 * CELL_HEIGHT);
        assert!(board.x > outer.x && board.x + board.width < outer.x + outer.width);
    }

    #[test]
    fn test_pointer_maps_to_tiles() {
        let board = Rect::new(10, 5, 6 * CELL_WIDTH, 6 * CELL_HEIGHT);
        assert_eq!(grid_cell_at(board, 10, 5), (0, 0));
        assert_eq!(grid_cell_at(board, 10 + CELL_WIDTH - 1, 5 + CELL_HEIGHT - 1), (0, 0));
        assert_eq!(grid_cell_at(board, 10 + 2 * CELL_WIDTH + 1, 5 + 3 * CELL_HEIGHT), (3, 2));
        assert_eq!(grid_cell_at(board, 9, 5), (0, -1));
        assert_eq!(grid_cell_at(board, 10, 4), (-1, 0));
        assert_eq!(grid_cell_at(board, 0, 0), (-3, -2));
    }

    #[test]
    fn test_pointer_round_trips_through_tile_origin() {
        let g = state(5, 7);
        let board = board_rect(screen(), &g);
        for row in 0..5 {
            for col in 0..7 {
                let (x, y) = tile_origin(board, Coord::new(row, col));
                assert_eq!(grid_cell_at(board, x, y), (row as i32, col as i32));
            }
        }
    }

    #[test]
    fn test_fits_small_terminal() {
        let g = state(6, 6);
        let (w, h) = frame_size(6, 6);
        assert!(fits(Rect::new(0, 0, w, h), &g));
        assert!(!fits(Rect::new(0, 0, w - 1, h), &g));
        assert!(!fits(Rect::new(0, 0, w, h - 1), &g));
    }

    #[test]
    fn test_max_board_fits_reasonable_terminal() {
        let max = crate::MAX_BOARD_DIM as usize;
        let (w, h) = frame_size(max, max);
        assert!(w <= 120 && h <= 40, "{w}x{h}");
    }
}
