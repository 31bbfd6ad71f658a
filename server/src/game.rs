use log::debug;
use shared::{Board, GameSnapshot, Mark, BOARD_SIZE};
use thiserror::Error;

/// Why a move was dropped. Never sent to the client, only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveRejection {
    #[error("cell index {0} is outside the board")]
    OutOfRange(i64),
    #[error("cell {0} is already taken")]
    Occupied(usize),
    #[error("{claimed} moved but it is {expected}'s turn")]
    WrongTurn { expected: Mark, claimed: Mark },
}

/// Authoritative board and turn flag.
#[derive(Debug, Clone)]
pub struct GameState {
    board: Board,
    next: Mark,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            board: [None; BOARD_SIZE],
            next: Mark::X,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn next_mark(&self) -> Mark {
        self.next
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot::new(self.board, self.next)
    }

    /// Validates and applies a move, returning the cell that was written.
    ///
    /// Checks run in order: the index must name an empty cell, then the
    /// claimed mark must be the one whose turn it is. The turn flips only
    /// when the move is accepted.
    pub fn apply_move(&mut self, index: i64, player: Mark) -> Result<usize, MoveRejection> {
        let cell = usize::try_from(index)
            .ok()
            .filter(|cell| *cell < BOARD_SIZE)
            .ok_or(MoveRejection::OutOfRange(index))?;

        if self.board[cell].is_some() {
            return Err(MoveRejection::Occupied(cell));
        }

        if player != self.next {
            return Err(MoveRejection::WrongTurn {
                expected: self.next,
                claimed: player,
            });
        }

        self.board[cell] = Some(player);
        self.next = self.next.opponent();
        debug!("{} took cell {}, {} to move", player, cell, self.next);

        Ok(cell)
    }

    pub fn reset(&mut self) {
        self.board = [None; BOARD_SIZE];
        self.next = Mark::X;
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}
