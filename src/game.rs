//! Game state: board, selection, match resolution, gravity, refill, coin rewards.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{info, warn};

/// Selections shorter than this are discarded on release.
pub const MIN_MATCH: usize = 3;

/// Popups float for this long, then disappear.
const POPUP_LIFETIME_MS: u32 = 1500;

/// A popup rises one terminal row per step.
const POPUP_RISE_STEP_MS: u32 = 150;

/// Tile symbols. `Coin` feeds the coin counter when matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tile {
    Sword,
    Shield,
    Potion,
    Coin,
    Enemy,
}

impl Tile {
    pub const ALL: [Self; 5] = [Self::Sword, Self::Shield, Self::Potion, Self::Coin, Self::Enemy];

    /// Colour index 0..5 for theme.tile_color().
    pub fn index(self) -> usize {
        match self {
            Self::Sword => 0,
            Self::Shield => 1,
            Self::Potion => 2,
            Self::Coin => 3,
            Self::Enemy => 4,
        }
    }

    /// Two-column label drawn in the middle of the tile.
    pub fn glyph(self) -> &'static str {
        match self {
            Self::Sword => "/>",
            Self::Shield => "[]",
            Self::Potion => "()",
            Self::Coin => "$$",
            Self::Enemy => "><",
        }
    }
}

/// Single cell: either empty (between clear and refill) or a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Tile(Tile),
}

impl Cell {
    #[inline]
    pub fn tile(self) -> Option<Tile> {
        match self {
            Self::Empty => None,
            Self::Tile(t) => Some(t),
        }
    }
}

/// In-bounds grid position. Row 0 is the top row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// One of the eight surrounding cells (Chebyshev distance 1).
    pub fn is_adjacent(self, other: Self) -> bool {
        self != other && self.row.abs_diff(other.row) <= 1 && self.col.abs_diff(other.col) <= 1
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("board needs at least one row and one column (got {rows}x{cols})")]
    Empty { rows: usize, cols: usize },
}

/// Where new tiles come from. Production uses [`RandomTiles`]; tests feed fixed sequences.
pub trait TileSource: std::fmt::Debug {
    fn next_tile(&mut self) -> Tile;
}

/// Uniform draw over [`Tile::ALL`].
#[derive(Debug, Clone)]
pub struct RandomTiles {
    rng: StdRng,
}

impl RandomTiles {
    /// Seeded when `seed` is given (reproducible boards), OS entropy otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }
}

impl TileSource for RandomTiles {
    fn next_tile(&mut self) -> Tile {
        Tile::ALL[self.rng.random_range(0..Tile::ALL.len())]
    }
}

/// Board: fixed rows x cols grid, row-major, never resized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
}

impl Board {
    /// Every cell drawn from `source`.
    pub fn filled(rows: usize, cols: usize, source: &mut dyn TileSource) -> Result<Self, BoardError> {
        if rows == 0 || cols == 0 {
            return Err(BoardError::Empty { rows, cols });
        }
        let mut board = Self {
            rows,
            cols,
            cells: vec![Cell::Empty; rows * cols],
        };
        board.refill(source);
        Ok(board)
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Bounds check for signed (pointer-derived) positions.
    pub fn coord(&self, row: i32, col: i32) -> Option<Coord> {
        let row = usize::try_from(row).ok()?;
        let col = usize::try_from(col).ok()?;
        (row < self.rows && col < self.cols).then_some(Coord { row, col })
    }

    #[inline]
    pub fn get(&self, at: Coord) -> Option<Cell> {
        if at.row >= self.rows || at.col >= self.cols {
            return None;
        }
        self.cells.get(at.row * self.cols + at.col).copied()
    }

    #[inline]
    pub fn tile_at(&self, at: Coord) -> Option<Tile> {
        self.get(at).and_then(Cell::tile)
    }

    #[inline]
    pub fn set(&mut self, at: Coord, cell: Cell) {
        if at.row < self.rows && at.col < self.cols {
            self.cells[at.row * self.cols + at.col] = cell;
        }
    }

    pub fn empty_count(&self) -> usize {
        self.cells.iter().filter(|c| **c == Cell::Empty).count()
    }

    /// Per column: tiles sink to the bottom keeping their order, empties collect on top.
    pub fn apply_gravity(&mut self) {
        for col in 0..self.cols {
            let stack: Vec<Tile> = (0..self.rows)
                .filter_map(|row| self.cells[row * self.cols + col].tile())
                .collect();
            let gap = self.rows - stack.len();
            for row in 0..self.rows {
                self.cells[row * self.cols + col] = if row < gap {
                    Cell::Empty
                } else {
                    Cell::Tile(stack[row - gap])
                };
            }
        }
    }

    /// Fill every empty cell (row-major) from `source`. Returns the refilled positions.
    pub fn refill(&mut self, source: &mut dyn TileSource) -> Vec<Coord> {
        let mut filled = Vec::new();
        for row in 0..self.rows {
            for col in 0..self.cols {
                let i = row * self.cols + col;
                if self.cells[i] == Cell::Empty {
                    self.cells[i] = Cell::Tile(source.next_tile());
                    filled.push(Coord { row, col });
                }
            }
        }
        filled
    }

    fn fill_all(&mut self, source: &mut dyn TileSource) {
        self.cells.fill(Cell::Empty);
        self.refill(source);
    }
}

/// Player's in-progress chain: no duplicates, each step adjacent, all one tile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    coords: Vec<Coord>,
}

impl Selection {
    #[inline]
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn first(&self) -> Option<Coord> {
        self.coords.first().copied()
    }

    pub fn last(&self) -> Option<Coord> {
        self.coords.last().copied()
    }

    pub fn contains(&self, at: Coord) -> bool {
        self.coords.contains(&at)
    }

    pub fn iter(&self) -> impl Iterator<Item = Coord> + '_ {
        self.coords.iter().copied()
    }

    fn push(&mut self, at: Coord) {
        self.coords.push(at);
    }
}

/// Result of offering one coordinate to the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    Accepted,
    OutOfBounds,
    Duplicate,
    NotAdjacent,
    Mismatched,
}

impl SelectOutcome {
    pub fn is_accepted(self) -> bool {
        self == Self::Accepted
    }
}

/// What a successful match did to the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub cleared: usize,
    pub coins: u32,
    pub rewards: u32,
}

/// Pointer state for one update step. `cell` is (row, col) and may lie outside the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerInput {
    pub held: bool,
    pub cell: Option<(i32, i32)>,
}

impl PointerInput {
    pub const fn held_at(row: i32, col: i32) -> Self {
        Self {
            held: true,
            cell: Some((row, col)),
        }
    }

    pub const fn released() -> Self {
        Self {
            held: false,
            cell: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gesture {
    #[default]
    Idle,
    Selecting,
}

/// What one update step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Idle,
    Selected(SelectOutcome),
    /// Gesture ended; `None` when the selection was too short and got discarded.
    Resolved(Option<Resolution>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupKind {
    Score(u32),
    Reward,
}

#[derive(Debug, Clone)]
pub struct Popup {
    pub at: Coord,
    pub kind: PopupKind,
    /// Rows risen above `at`.
    pub lift: u16,
    pub age_ms: u32,
}

/// Game state: board, selection, score, coins.
#[derive(Debug)]
pub struct GameState {
    pub board: Board,
    pub selection: Selection,
    pub gesture: Gesture,
    pub score: u32,
    pub coins: u32,
    pub coin_threshold: u32,
    /// Rewards fired since the last reset.
    pub rewards: u32,
    /// Successful resolutions since the last reset; bumps whenever the board changes.
    pub resolutions: u32,
    /// Cells whose contents changed in the last resolution (fallen or refilled).
    pub last_settled: Vec<Coord>,
    pub popups: Vec<Popup>,
    source: Box<dyn TileSource>,
}

impl GameState {
    pub fn new(config: &crate::GameConfig, mut source: Box<dyn TileSource>) -> Result<Self, BoardError> {
        let board = Board::filled(config.rows, config.cols, source.as_mut())?;
        Ok(Self::from_board(board, config.coin_threshold, source))
    }

    pub fn from_board(board: Board, coin_threshold: u32, source: Box<dyn TileSource>) -> Self {
        Self {
            board,
            selection: Selection::default(),
            gesture: Gesture::Idle,
            score: 0,
            coins: 0,
            coin_threshold: coin_threshold.max(1),
            rewards: 0,
            resolutions: 0,
            last_settled: Vec::new(),
            popups: Vec::new(),
            source,
        }
    }

    /// Fresh board, counters zeroed. Dimensions and threshold stay.
    pub fn reset(&mut self) {
        self.board.fill_all(self.source.as_mut());
        self.selection = Selection::default();
        self.gesture = Gesture::Idle;
        self.score = 0;
        self.coins = 0;
        self.rewards = 0;
        self.resolutions = 0;
        self.last_settled.clear();
        self.popups.clear();
        info!(rows = self.board.rows(), cols = self.board.cols(), "board reset");
    }

    /// One input step: pointer held extends the selection, the falling edge resolves it.
    pub fn update(&mut self, input: PointerInput) -> Step {
        match (input.held, input.cell) {
            (true, Some((row, col))) => {
                let outcome = self.select(row, col);
                if outcome != SelectOutcome::OutOfBounds {
                    self.gesture = Gesture::Selecting;
                }
                Step::Selected(outcome)
            }
            (true, None) => Step::Idle,
            (false, _) if self.gesture == Gesture::Selecting => {
                self.gesture = Gesture::Idle;
                Step::Resolved(self.resolve_selection())
            }
            (false, _) => Step::Idle,
        }
    }

    /// Drop the in-progress gesture without resolving it.
    pub fn cancel_gesture(&mut self) {
        self.gesture = Gesture::Idle;
        self.selection = Selection::default();
    }

    /// Offer (row, col) to the selection. Rejections leave the selection untouched.
    pub fn select(&mut self, row: i32, col: i32) -> SelectOutcome {
        let Some(at) = self.board.coord(row, col) else {
            return SelectOutcome::OutOfBounds;
        };
        let outcome = self.extension_outcome(at);
        if outcome.is_accepted() {
            self.selection.push(at);
        }
        outcome
    }

    fn extension_outcome(&self, at: Coord) -> SelectOutcome {
        let (Some(first), Some(last)) = (self.selection.first(), self.selection.last()) else {
            return SelectOutcome::Accepted;
        };
        if self.selection.contains(at) {
            SelectOutcome::Duplicate
        } else if !last.is_adjacent(at) {
            SelectOutcome::NotAdjacent
        } else if self.board.tile_at(at) != self.board.tile_at(first) {
            SelectOutcome::Mismatched
        } else {
            SelectOutcome::Accepted
        }
    }

    /// Clear a chain of MIN_MATCH or more, then gravity, refill and the coin check.
    /// The selection is always empty afterwards.
    pub fn resolve_selection(&mut self) -> Option<Resolution> {
        let selection = std::mem::take(&mut self.selection);
        if selection.len() < MIN_MATCH {
            return None;
        }
        let first = selection.first()?;
        let tile = self.board.tile_at(first)?;
        if !selection.iter().all(|at| self.board.tile_at(at) == Some(tile)) {
            warn!(len = selection.len(), "selection no longer matches; discarded");
            return None;
        }

        let cleared = selection.len();
        let coins = selection
            .iter()
            .filter(|&at| self.board.tile_at(at) == Some(Tile::Coin))
            .count() as u32;
        self.score = self.score.saturating_add(cleared as u32);
        self.coins = self.coins.saturating_add(coins);

        let settled = settled_cells(&selection);
        for at in selection.iter() {
            self.board.set(at, Cell::Empty);
        }
        self.board.apply_gravity();
        self.board.refill(self.source.as_mut());
        debug_assert_eq!(self.board.empty_count(), 0);
        self.last_settled = settled;
        self.resolutions += 1;

        self.popups.push(Popup {
            at: first,
            kind: PopupKind::Score(cleared as u32),
            lift: 0,
            age_ms: 0,
        });
        let rewards = self.check_coin_rewards(first);
        Some(Resolution {
            cleared,
            coins,
            rewards,
        })
    }

    /// Fire one reward per full threshold in the coin counter. Returns how many fired.
    fn check_coin_rewards(&mut self, anchor: Coord) -> u32 {
        let mut fired = 0u32;
        while self.coins >= self.coin_threshold {
            self.coins -= self.coin_threshold;
            self.rewards += 1;
            fired += 1;
            info!(total = self.rewards, threshold = self.coin_threshold, "coin reward");
            self.popups.push(Popup {
                at: anchor,
                kind: PopupKind::Reward,
                lift: fired as u16,
                age_ms: 0,
            });
        }
        fired
    }

    pub fn tick_popups(&mut self, delta_ms: u32) {
        self.popups.retain_mut(|p| {
            let old_steps = p.age_ms / POPUP_RISE_STEP_MS;
            p.age_ms += delta_ms;
            let new_steps = p.age_ms / POPUP_RISE_STEP_MS;
            if new_steps > old_steps {
                p.lift = p.lift.saturating_add(1);
            }
            p.age_ms < POPUP_LIFETIME_MS
        });
    }
}

/// Cells that change when `selection` is cleared: in each touched column,
/// everything from the top down to the lowest cleared row.
fn settled_cells(selection: &Selection) -> Vec<Coord> {
    let mut lowest: Vec<(usize, usize)> = Vec::new();
    for at in selection.iter() {
        match lowest.iter_mut().find(|(col, _)| *col == at.col) {
            Some((_, row)) => *row = (*row).max(at.row),
            None => lowest.push((at.col, at.row)),
        }
    }
    lowest
        .into_iter()
        .flat_map(|(col, bottom)| (0..=bottom).map(move |row| Coord { row, col }))
        .collect()
}
