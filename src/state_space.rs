//! Weight classes of the state and of the key-schedule window, and the tables indexed by them.
//!
//! A state class records the number of active bytes in each of the four columns, a key class
//! the number of active bytes in each of the six words of the key-schedule window. Both are
//! stored as base-5 numbers, and the composite index of a table entry is
//! `key_code * STATES + state_code`.

use crate::cipher::aes192::{COLUMNS, KEY_WORDS};

/// Number of state classes, 5^4.
pub const STATES: usize = 625;

/// Number of key classes, 5^6.
pub const KEYS: usize = 15_625;

/// Number of entries in a table, 5^10.
pub const TABLE_SIZE: usize = STATES * KEYS;

pub static POW5: [usize; 7] = [1, 5, 25, 125, 625, 3125, 15_625];

/// Returns the base-5 digit of `code` at `position`.
#[inline(always)]
pub fn digit(code: usize, position: usize) -> u8 {
    ((code / POW5[position]) % 5) as u8
}

/// Returns `code` with the base-5 digit at `position` replaced by `value`.
#[inline(always)]
pub fn with_digit(code: usize, position: usize, value: u8) -> usize {
    code - (digit(code, position) as usize) * POW5[position] + (value as usize) * POW5[position]
}

/// Composite index of a key class and a state class.
#[inline(always)]
pub fn index(key: usize, state: usize) -> usize {
    key * STATES + state
}

/// Splits a composite index into its key and state codes.
#[inline(always)]
pub fn split(index: usize) -> (usize, usize) {
    (index / STATES, index % STATES)
}

/// Per-column active byte counts of a state.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct StateWeightClass(pub [u8; COLUMNS]);

impl StateWeightClass {
    pub fn decode(code: usize) -> StateWeightClass {
        let mut weights = [0; COLUMNS];

        for (c, w) in weights.iter_mut().enumerate() {
            *w = digit(code, c);
        }

        StateWeightClass(weights)
    }

    pub fn encode(&self) -> usize {
        self.0.iter().rev().fold(0, |acc, &w| acc * 5 + w as usize)
    }

    pub fn total(&self) -> u8 {
        self.0.iter().sum()
    }

    /// The class with sorted column weights. All permutations share the same canonical class.
    pub fn canonical(&self) -> StateWeightClass {
        let mut weights = self.0;
        weights.sort_unstable();
        StateWeightClass(weights)
    }
}

/// Per-word active byte counts of the key-schedule window.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct KeyWeightClass(pub [u8; KEY_WORDS]);

impl KeyWeightClass {
    pub fn decode(code: usize) -> KeyWeightClass {
        let mut weights = [0; KEY_WORDS];

        for (p, w) in weights.iter_mut().enumerate() {
            *w = digit(code, p);
        }

        KeyWeightClass(weights)
    }

    pub fn encode(&self) -> usize {
        self.0.iter().rev().fold(0, |acc, &w| acc * 5 + w as usize)
    }

    pub fn total(&self) -> u8 {
        self.0.iter().sum()
    }
}

/// Total state weight of every state code.
fn state_weight(code: usize) -> u8 {
    (0..COLUMNS).map(|c| digit(code, c)).sum()
}

/**
A table of lower bounds, one per composite index. Values saturate at `bound`, which also marks
entries that cannot lead to a characteristic below the bound.

values      The lower bounds.
bound       The saturation value.
*/
#[derive(Clone, Debug)]
pub struct DpTable {
    values: Vec<u8>,
    bound: u8,
}

impl DpTable {
    /// A table with every entry at the bound.
    pub fn filled(bound: u8) -> DpTable {
        DpTable {
            values: vec![bound; TABLE_SIZE],
            bound,
        }
    }

    /**
    The table before the first round: the cost of an entry is the weight of its state. The
    all-zero entry is pinned to the bound so the trivial characteristic is never counted.
    */
    pub fn initial(bound: u8) -> DpTable {
        let mut values = Vec::with_capacity(TABLE_SIZE);

        for _ in 0..KEYS {
            values.extend((0..STATES).map(|s| std::cmp::min(state_weight(s), bound)));
        }

        values[0] = bound;
        DpTable { values, bound }
    }

    #[inline(always)]
    pub fn get(&self, index: usize) -> u8 {
        self.values[index]
    }

    /// Sets an entry, saturating at the bound.
    #[inline(always)]
    pub fn set(&mut self, index: usize, value: u8) {
        self.values[index] = std::cmp::min(value, self.bound);
    }

    /// Raises an entry by one, saturating at the bound.
    pub fn raise(&mut self, index: usize) {
        let value = self.values[index].saturating_add(1);
        self.set(index, value);
    }

    pub fn bound(&self) -> u8 {
        self.bound
    }

    pub fn values(&self) -> &[u8] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [u8] {
        &mut self.values
    }

    pub fn minimum(&self) -> u8 {
        self.values.iter().cloned().min().unwrap_or(self.bound)
    }

    /// Indices of all entries with exactly the given value.
    pub fn entries_equal(&self, value: u8) -> Vec<usize> {
        self.values.iter()
                   .enumerate()
                   .filter(|&(_, &v)| v == value)
                   .map(|(i, _)| i)
                   .collect()
    }
}
