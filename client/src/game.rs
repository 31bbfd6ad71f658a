//! Client-side view of the shared board.
//!
//! The view holds no game logic of its own. Every snapshot from the server
//! replaces it completely, and the only thing the client derives from it is
//! a guess at which mark to play, read back from the displayed turn text.

use shared::{GameSnapshot, Mark, BOARD_SIZE};

/// Display state of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellView {
    pub mark: Option<Mark>,
    pub class: &'static str,
}

impl CellView {
    fn from_mark(mark: Option<Mark>) -> Self {
        let class = match mark {
            Some(Mark::X) => "cell x",
            Some(Mark::O) => "cell o",
            None => "cell",
        };
        Self { mark, class }
    }

    pub fn is_empty(&self) -> bool {
        self.mark.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardView {
    cells: [CellView; BOARD_SIZE],
    turn_text: String,
}

impl BoardView {
    pub fn new() -> Self {
        let mut view = Self {
            cells: [CellView::from_mark(None); BOARD_SIZE],
            turn_text: String::new(),
        };
        view.apply_snapshot(&GameSnapshot::default());
        view
    }

    /// Recomputes every cell and the turn text from scratch.
    pub fn apply_snapshot(&mut self, snapshot: &GameSnapshot) {
        for (cell, mark) in self.cells.iter_mut().zip(snapshot.board.iter()) {
            *cell = CellView::from_mark(*mark);
        }
        self.turn_text = turn_text(snapshot.next);
    }

    pub fn cells(&self) -> &[CellView; BOARD_SIZE] {
        &self.cells
    }

    pub fn turn_text(&self) -> &str {
        &self.turn_text
    }

    /// False for taken cells and for indices off the board.
    pub fn is_cell_empty(&self, index: usize) -> bool {
        self.cells.get(index).map_or(false, CellView::is_empty)
    }

    /// The mark this client will claim when it moves. Read from the turn
    /// text, not from any role the server assigned.
    pub fn inferred_player(&self) -> Mark {
        if self.turn_text.contains('X') {
            Mark::X
        } else {
            Mark::O
        }
    }
}

impl Default for BoardView {
    fn default() -> Self {
        Self::new()
    }
}

fn turn_text(next: Mark) -> String {
    format!("Player {}'s Turn", next)
}
