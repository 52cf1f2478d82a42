//! Tic-tac-toe state machine.
//!
//! Pure state, no error paths: invalid moves are no-ops, and the outcome is
//! recomputed from the cells after every mutation rather than cached.

/// Player mark
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    pub fn other(self) -> Mark {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mark::X => "X",
            Mark::O => "O",
        }
    }
}

/// Derived game status
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    InProgress,
    Win(Mark),
    Draw,
}

/// The 8 winning triples: 3 rows, 3 columns, 2 diagonals
const WINNING_TRIPLES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Evaluate the outcome for a board. Pure and deterministic.
pub fn evaluate_outcome(cells: &[Option<Mark>; 9]) -> Outcome {
    for triple in &WINNING_TRIPLES {
        if let Some(mark) = cells[triple[0]] {
            if cells[triple[1]] == Some(mark) && cells[triple[2]] == Some(mark) {
                return Outcome::Win(mark);
            }
        }
    }

    if cells.iter().all(Option::is_some) {
        Outcome::Draw
    } else {
        Outcome::InProgress
    }
}

#[derive(Clone, Debug)]
pub struct GameState {
    cells: [Option<Mark>; 9],
    next_mark: Mark,
    outcome: Outcome,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    pub fn new() -> Self {
        Self {
            cells: [None; 9],
            next_mark: Mark::X,
            outcome: Outcome::InProgress,
        }
    }

    pub fn cells(&self) -> &[Option<Mark>; 9] {
        &self.cells
    }

    pub fn next_mark(&self) -> Mark {
        self.next_mark
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Place the next mark at `index`.
    ///
    /// A move on an occupied cell, an out-of-range index, or a finished game
    /// leaves the state unchanged. Returns whether the move was applied.
    pub fn place_mark(&mut self, index: usize) -> bool {
        if index >= 9 || self.cells[index].is_some() || self.outcome != Outcome::InProgress {
            return false;
        }

        self.cells[index] = Some(self.next_mark);
        self.next_mark = self.next_mark.other();
        self.outcome = evaluate_outcome(&self.cells);
        true
    }

    /// Start over: 9 empty cells, X to move
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// The completed triple behind a win, for highlighting
    pub fn winning_triple(&self) -> Option<[usize; 3]> {
        WINNING_TRIPLES.into_iter().find(|triple| {
            self.cells[triple[0]].is_some()
                && self.cells[triple[0]] == self.cells[triple[1]]
                && self.cells[triple[1]] == self.cells[triple[2]]
        })
    }

    /// Status line for the UI
    pub fn status_text(&self) -> String {
        match self.outcome {
            Outcome::InProgress => format!("{} to move", self.next_mark.as_str()),
            Outcome::Win(mark) => format!("{} wins!", mark.as_str()),
            Outcome::Draw => "Draw".to_owned(),
        }
    }
}
