//! Ternary assignments of the bytes of a characteristic, together with the column weights the
//! search has committed to.

use std::fmt;

use crate::cipher::aes192::{self, COLUMNS, SBOX_POSITION};
use crate::linear::{Activity, Literal, Phase, Valuation};

/// A 4x4 byte grid, indexed by `[row][column]`.
pub type Grid = [[Activity; COLUMNS]; 4];

pub const UNKNOWN_GRID: Grid = [[Activity::Unknown; COLUMNS]; 4];

/// A byte of the state `X_round` or of the round key `K_round`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Cell {
    pub phase: Phase,
    pub round: usize,
    pub row: usize,
    pub column: usize,
}

impl Cell {
    pub fn state(round: usize, row: usize, column: usize) -> Cell {
        Cell { phase: Phase::State, round, row, column }
    }

    pub fn key(round: usize, row: usize, column: usize) -> Cell {
        Cell { phase: Phase::Key, round, row, column }
    }

    /// The cell of a state or key literal. Plaintext and ciphertext literals have none.
    pub fn of(literal: Literal) -> Option<Cell> {
        let (round, row, column) = (literal.round as usize, literal.row as usize, literal.column as usize);

        match literal.phase {
            Phase::State => Some(Cell::state(round, row, column)),
            Phase::Key   => Some(Cell::key(round, row, column)),
            _            => None,
        }
    }

    /// The byte itself and its S-box output.
    pub fn literals(self) -> [Literal; 2] {
        let input = Literal::new(self.phase, self.round, self.row, self.column);
        [input, input.output()]
    }
}

/**
The byte activities of an r-round characteristic.

rounds      Number of rounds.
state       Grids of X_0, ..., X_{r-1}.
key         Grids of K_0, ..., K_r.
col_x       Column weights of each state.
col_sr      Column weights of each state after ShiftRows.
col_k       Weights of the words of each round key.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrailAssignment {
    rounds: usize,
    state: Vec<Grid>,
    key: Vec<Grid>,
    pub col_x: Vec<[Option<u8>; COLUMNS]>,
    pub col_sr: Vec<[Option<u8>; COLUMNS]>,
    pub col_k: Vec<[Option<u8>; COLUMNS]>,
}

impl TrailAssignment {
    pub fn new(rounds: usize) -> TrailAssignment {
        TrailAssignment {
            rounds,
            state: vec![UNKNOWN_GRID; rounds],
            key: vec![UNKNOWN_GRID; rounds + 1],
            col_x: vec![[None; COLUMNS]; rounds],
            col_sr: vec![[None; COLUMNS]; rounds],
            col_k: vec![[None; COLUMNS]; rounds + 1],
        }
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn state_grid(&self, round: usize) -> &Grid {
        &self.state[round]
    }

    pub fn key_grid(&self, round: usize) -> &Grid {
        &self.key[round]
    }

    pub fn get(&self, cell: Cell) -> Activity {
        let grids = match cell.phase {
            Phase::State => &self.state,
            Phase::Key   => &self.key,
            _            => return Activity::Unknown,
        };

        grids.get(cell.round)
             .map(|grid| grid[cell.row][cell.column])
             .unwrap_or(Activity::Unknown)
    }

    /**
    Assigns a cell. Cells only move from unknown to known, so assigning a known cell the
    opposite value fails.

    cell        The cell to assign.
    active      The value to assign.
    */
    pub fn set(&mut self, cell: Cell, active: bool) -> bool {
        let grids = match cell.phase {
            Phase::State => &mut self.state,
            Phase::Key   => &mut self.key,
            _            => return false,
        };

        let slot = match grids.get_mut(cell.round) {
            Some(grid) => &mut grid[cell.row][cell.column],
            None => return false,
        };

        let value = Activity::from_bool(active);

        match *slot {
            Activity::Unknown => {
                *slot = value;
                true
            }
            known => known == value,
        }
    }

    /// Records the weight of key word `W_word`. Fails if a different weight was recorded.
    pub fn set_key_word_weight(&mut self, word: usize, weight: u8) -> bool {
        let (round, column) = aes192::word_location(word);

        match self.col_k.get_mut(round) {
            Some(words) => match words[column] {
                Some(existing) => existing == weight,
                None => {
                    words[column] = Some(weight);
                    true
                }
            },
            None => false,
        }
    }

    /// Number of known cells.
    pub fn determined(&self) -> usize {
        self.state.iter()
                  .chain(self.key.iter())
                  .flat_map(|grid| grid.iter().flat_map(|row| row.iter()))
                  .filter(|a| a.is_known())
                  .count()
    }

    /**
    Returns the next cell the search has to decide: key bytes of words with a known weight
    first, then state bytes.
    */
    pub fn next_undetermined(&self) -> Option<Cell> {
        for round in 0..=self.rounds {
            for column in 0..COLUMNS {
                if self.col_k[round][column].is_none() {
                    continue;
                }

                for row in 0..4 {
                    if self.key[round][row][column] == Activity::Unknown {
                        return Some(Cell::key(round, row, column));
                    }
                }
            }
        }

        for round in 0..self.rounds {
            for row in 0..4 {
                for column in 0..COLUMNS {
                    if self.state[round][row][column] == Activity::Unknown {
                        return Some(Cell::state(round, row, column));
                    }
                }
            }
        }

        None
    }

    fn count_active<'a, I: Iterator<Item = &'a Activity>>(cells: I) -> usize {
        cells.filter(|&&a| a == Activity::Active).count()
    }

    /// Number of active bytes of the state `X_round`.
    pub fn state_weight(&self, round: usize) -> usize {
        TrailAssignment::count_active(self.state[round].iter().flat_map(|row| row.iter()))
    }

    /**
    Number of active S-boxes: every active state byte, plus the active bytes of the key words
    passing through the key-schedule S-boxes in rounds 1 to r-1.
    */
    pub fn cost(&self) -> usize {
        let state: usize = (0..self.rounds).map(|r| self.state_weight(r)).sum();
        let key: usize = (1..self.rounds)
            .filter(|&r| aes192::charges_key_sbox(r))
            .map(|r| {
                let (round, column) = aes192::word_location(aes192::window_words(r)[SBOX_POSITION]);
                TrailAssignment::count_active(self.key[round].iter().map(|row| &row[column]))
            })
            .sum();

        state + key
    }
}

impl Valuation for TrailAssignment {
    fn activity(&self, literal: Literal) -> Activity {
        match Cell::of(literal) {
            Some(cell) => self.get(cell),
            None => Activity::Unknown,
        }
    }
}

fn grid_row(grid: &Grid, row: usize) -> String {
    grid[row].iter()
             .map(|a| match a {
                 Activity::Inactive => '.',
                 Activity::Active   => '#',
                 Activity::Unknown  => '?',
             })
             .collect()
}

impl fmt::Display for TrailAssignment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for round in 0..=self.rounds {
            if round < self.rounds {
                writeln!(f, "Round {:2}   X     K", round)?;
            } else {
                writeln!(f, "Final      .     K")?;
            }

            for row in 0..4 {
                let state = if round < self.rounds {
                    grid_row(self.state_grid(round), row)
                } else {
                    "    ".to_string()
                };

                writeln!(f, "         {}  {}", state, grid_row(self.key_grid(round), row))?;
            }
        }

        write!(f, "Active S-boxes: {}", self.cost())
    }
}
