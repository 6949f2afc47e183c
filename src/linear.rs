//! A linear consistency engine for byte-level truncated differential trails.
//!
//! The relations of the cipher are kept as a tableau over GF(2^8). Every row reads
//! `front = Σ coef_c · column_c`, where the columns are the byte differences that are still
//! treated as independent. The rows are split into three regions:
//!
//! * `[0, line1)`: fixed rows. Their front is known to be active.
//! * `[line1, line2)`: free rows. Their front is undetermined.
//! * `[line2, rows)`: eliminated rows. Their front is zero and the row is empty.
//!
//! Free rows never contain an active column. Activity is read through a `Valuation`, so the
//! engine itself stores no assignment.

use fnv::{FnvHashMap, FnvHashSet};
use smallvec::SmallVec;
use std::fmt;

use crate::cipher::Gf256;

/// The part of the cipher a byte difference belongs to.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum Phase {
    Plaintext,
    Key,
    State,
    Ciphertext,
}

/// Whether a literal denotes the byte itself or the S-box output of that byte.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum Polarity {
    Input,
    Output,
}

/// A single byte difference of the system.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Literal {
    pub round: u8,
    pub phase: Phase,
    pub row: u8,
    pub column: u8,
    pub polarity: Polarity,
}

impl Literal {
    pub fn new(phase: Phase, round: usize, row: usize, column: usize) -> Literal {
        Literal {
            round: round as u8,
            phase,
            row: row as u8,
            column: column as u8,
            polarity: Polarity::Input,
        }
    }

    /// Byte `(row, column)` of the state `X_round` entering the S-box layer.
    pub fn state(round: usize, row: usize, column: usize) -> Literal {
        Literal::new(Phase::State, round, row, column)
    }

    /// Byte `(row, column)` of the round key `K_round`.
    pub fn key(round: usize, row: usize, column: usize) -> Literal {
        Literal::new(Phase::Key, round, row, column)
    }

    pub fn plaintext(row: usize, column: usize) -> Literal {
        Literal::new(Phase::Plaintext, 0, row, column)
    }

    pub fn ciphertext(row: usize, column: usize) -> Literal {
        Literal::new(Phase::Ciphertext, 0, row, column)
    }

    /// The S-box output of this byte.
    pub fn output(self) -> Literal {
        Literal { polarity: Polarity::Output, ..self }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self.phase {
            Phase::Plaintext  => "P",
            Phase::Key        => "K",
            Phase::State      => "X",
            Phase::Ciphertext => "C",
        };

        match self.polarity {
            Polarity::Input  => write!(f, "{}{}[{},{}]", name, self.round, self.row, self.column),
            Polarity::Output => write!(f, "S({}{}[{},{}])", name, self.round, self.row, self.column),
        }
    }
}

/// Ternary activity of a byte difference.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Activity {
    Inactive,
    Active,
    Unknown,
}

impl Activity {
    pub fn from_bool(active: bool) -> Activity {
        if active {
            Activity::Active
        } else {
            Activity::Inactive
        }
    }

    pub fn is_known(self) -> bool {
        self != Activity::Unknown
    }
}

/// Anything that can report the activity of a literal.
pub trait Valuation {
    fn activity(&self, literal: Literal) -> Activity;
}

/// A homogeneous linear relation `Σ coef · literal = 0` over GF(2^8).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Relation {
    pub terms: SmallVec<[(Literal, Gf256); 6]>,
}

impl Relation {
    pub fn new() -> Relation {
        Relation::default()
    }

    /// Adds `coef · literal` to the relation, merging repeated literals.
    pub fn with(mut self, literal: Literal, coef: u8) -> Relation {
        match self.terms.iter().position(|&(l, _)| l == literal) {
            Some(i) => {
                self.terms[i].1 += Gf256(coef);
                if self.terms[i].1.is_zero() {
                    self.terms.remove(i);
                }
            }
            None => {
                if coef != 0 {
                    self.terms.push((literal, Gf256(coef)));
                }
            }
        }

        self
    }

    /// Returns false only if every literal is determined and exactly one is active.
    #[cfg(test)]
    pub fn holds_for(&self, valuation: &dyn Valuation) -> bool {
        let mut active = 0;

        for &(literal, _) in &self.terms {
            match valuation.activity(literal) {
                Activity::Unknown  => return true,
                Activity::Active   => active += 1,
                Activity::Inactive => (),
            }
        }

        active != 1
    }
}

/// The consequence a fixed row has for its columns.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RowForcing {
    Contradiction,
    Active(Literal),
    Nothing,
}

/***********************************************************************************************/

/**
A tableau of linear relations between byte differences.

columns          Literals treated as independent variables.
fronts           The literal defined by each row.
rows             Coefficients of each row, one per column.
column_index     Position of each column literal.
front_index      Position of each front literal.
line1            First row which is not fixed.
line2            First row which is eliminated.
*/
#[derive(Clone, Debug, Default)]
pub struct LinearSystem {
    columns: Vec<Literal>,
    fronts: Vec<Literal>,
    rows: Vec<Vec<Gf256>>,
    column_index: FnvHashMap<Literal, usize>,
    front_index: FnvHashMap<Literal, usize>,
    line1: usize,
    line2: usize,
}

impl LinearSystem {
    /**
    Builds a reduced system from a list of relations. Every independent relation defines one
    of its literals in terms of the others, linearly dependent relations are dropped. All rows
    start out free.

    relations       The relations to reduce.
    */
    pub fn from_relations(relations: &[Relation]) -> LinearSystem {
        let mut system = LinearSystem::default();

        for relation in relations {
            system.insert_relation(relation);
        }

        system.line1 = 0;
        system.line2 = system.rows.len();
        system
    }

    fn insert_relation(&mut self, relation: &Relation) {
        for &(literal, _) in &relation.terms {
            if !self.contains(literal) {
                self.push_column(literal);
            }
        }

        // Rewrite the relation over the current columns
        let mut combination = vec![Gf256::ZERO; self.columns.len()];

        for &(literal, coef) in &relation.terms {
            if let Some(&line) = self.front_index.get(&literal) {
                for (acc, &x) in combination.iter_mut().zip(self.rows[line].iter()) {
                    *acc += coef * x;
                }
            } else if let Some(&column) = self.column_index.get(&literal) {
                combination[column] += coef;
            }
        }

        let pivot = match combination.iter().position(|c| !c.is_zero()) {
            Some(pivot) => pivot,
            None => return,
        };

        let scale = combination[pivot].inverse();
        let mut row: Vec<Gf256> = combination.iter().map(|&c| c * scale).collect();
        row[pivot] = Gf256::ZERO;

        for existing in self.rows.iter_mut() {
            let factor = existing[pivot];

            if factor.is_zero() {
                continue;
            }

            for (x, &y) in existing.iter_mut().zip(row.iter()) {
                *x += factor * y;
            }

            existing[pivot] = Gf256::ZERO;
        }

        let literal = self.columns[pivot];
        self.rows.push(row);
        self.fronts.push(literal);
        self.front_index.insert(literal, self.rows.len() - 1);
        self.erase_column(pivot);
    }

    fn push_column(&mut self, literal: Literal) {
        self.column_index.insert(literal, self.columns.len());
        self.columns.push(literal);

        for row in self.rows.iter_mut() {
            row.push(Gf256::ZERO);
        }
    }

    /// Returns true if the literal appears anywhere in the system.
    pub fn contains(&self, literal: Literal) -> bool {
        self.front_index.contains_key(&literal) || self.column_index.contains_key(&literal)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Iterates over all literals of the system, fronts first.
    pub fn literals<'a>(&'a self) -> impl Iterator<Item = Literal> + 'a {
        self.fronts.iter().chain(self.columns.iter()).cloned()
    }

    /// Exchanges two rows.
    pub fn swap_lines(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }

        self.rows.swap(a, b);
        self.fronts.swap(a, b);
        self.front_index.insert(self.fronts[a], a);
        self.front_index.insert(self.fronts[b], b);
    }

    /// Removes a column. This is the same as fixing its literal to zero.
    pub fn erase_column(&mut self, column: usize) {
        let last = self.columns.len() - 1;
        let literal = self.columns.swap_remove(column);
        self.column_index.remove(&literal);

        for row in self.rows.iter_mut() {
            row.swap_remove(column);
        }

        if column != last {
            self.column_index.insert(self.columns[column], column);
        }
    }

    /**
    Exchanges the front of row `line` with the literal of `column`. The row is solved for the
    column literal, which is then substituted into every other row. The coefficient of the
    column in the row must be nonzero.

    line        The row to pivot on.
    column      The column entering as front.
    */
    pub fn swap_line_column(&mut self, line: usize, column: usize) {
        let pivot = self.rows[line][column];
        debug_assert!(!pivot.is_zero());
        let scale = pivot.inverse();

        for (i, x) in self.rows[line].iter_mut().enumerate() {
            *x = if i == column { scale } else { *x * scale };
        }

        let old_front = self.fronts[line];
        let new_front = self.columns[column];
        self.fronts[line] = new_front;
        self.columns[column] = old_front;
        self.front_index.remove(&old_front);
        self.front_index.insert(new_front, line);
        self.column_index.remove(&new_front);
        self.column_index.insert(old_front, column);

        let pivot_row = self.rows[line].clone();

        for (other, row) in self.rows.iter_mut().enumerate() {
            let factor = row[column];

            if other == line || factor.is_zero() {
                continue;
            }

            for (i, x) in row.iter_mut().enumerate() {
                *x = if i == column {
                    factor * pivot_row[i]
                } else {
                    *x + factor * pivot_row[i]
                };
            }
        }
    }

    /**
    Moves a literal to the fixed region. If the literal is the front of a free row, that row
    is moved. If it is a column used by a free row, the literal is first pivoted into that row.
    Returns false if neither applies.

    literal     The literal to pivot.
    */
    pub fn set_as_pivot(&mut self, literal: Literal) -> bool {
        if let Some(&line) = self.front_index.get(&literal) {
            if line < self.line1 || line >= self.line2 {
                return false;
            }

            let target = self.line1;
            self.swap_lines(line, target);
            self.line1 += 1;
            return true;
        }

        if let Some(&column) = self.column_index.get(&literal) {
            let line = (self.line1..self.line2).find(|&l| !self.rows[l][column].is_zero());

            if let Some(line) = line {
                self.swap_line_column(line, column);
                let target = self.line1;
                self.swap_lines(line, target);
                self.line1 += 1;
                return true;
            }
        }

        false
    }

    /// Pivots every literal in turn and returns the number of fixed rows.
    pub fn eliminate<I: IntoIterator<Item = Literal>>(&mut self, literals: I) -> usize {
        for literal in literals {
            self.set_as_pivot(literal);
        }

        self.line1
    }

    /**
    Returns the system made of the rows from `n` onwards, all free. Columns not used by any
    remaining row are dropped.

    n       Number of leading rows to drop.
    */
    pub fn extract(&self, n: usize) -> LinearSystem {
        let used: Vec<usize> = (0..self.columns.len())
            .filter(|&c| self.rows[n..].iter().any(|row| !row[c].is_zero()))
            .collect();

        let mut system = LinearSystem::default();

        for &c in &used {
            system.push_column(self.columns[c]);
        }

        for line in n..self.rows.len() {
            let row = used.iter().map(|&c| self.rows[line][c]).collect();
            system.front_index.insert(self.fronts[line], system.rows.len());
            system.fronts.push(self.fronts[line]);
            system.rows.push(row);
        }

        system.line2 = system.rows.len();
        system
    }

    /**
    Records that a literal is active. Returns false if the literal is known to be zero.

    literal     The active literal.
    */
    pub fn force_one(&mut self, literal: Literal) -> bool {
        if let Some(&line) = self.front_index.get(&literal) {
            if line >= self.line2 {
                return false;
            }
        }

        self.set_as_pivot(literal);
        true
    }

    /**
    Records that a literal is zero. Returns false if the literal is the front of a fixed row.

    literal     The inactive literal.
    valuation   Current activity of the remaining literals.
    */
    pub fn force_zero(&mut self, literal: Literal, valuation: &dyn Valuation) -> bool {
        if let Some(&column) = self.column_index.get(&literal) {
            self.erase_column(column);
            return true;
        }

        let line = match self.front_index.get(&literal) {
            Some(&line) => line,
            None => return true,
        };

        if line < self.line1 {
            return false;
        }

        if line >= self.line2 {
            return true;
        }

        let mut undetermined = None;
        let mut active = None;

        for (c, coef) in self.rows[line].iter().enumerate() {
            if coef.is_zero() {
                continue;
            }

            match valuation.activity(self.columns[c]) {
                Activity::Unknown  => { undetermined = Some(c); break; }
                Activity::Active   => active = active.or(Some(c)),
                Activity::Inactive => (),
            }
        }

        match (undetermined, active) {
            (Some(column), _) => {
                self.swap_line_column(line, column);
                self.erase_column(column);
            }
            (None, Some(column)) => {
                self.swap_line_column(line, column);
                self.erase_column(column);
                let target = self.line1;
                self.swap_lines(line, target);
                self.line1 += 1;
            }
            (None, None) => {
                self.line2 -= 1;
                let target = self.line2;
                self.swap_lines(line, target);
            }
        }

        true
    }

    /// Counts the active and undetermined columns of a row.
    fn row_activity(&self, line: usize, valuation: &dyn Valuation) -> (usize, usize, Option<usize>) {
        let mut active = 0;
        let mut unknown = 0;
        let mut last_unknown = None;

        for (c, coef) in self.rows[line].iter().enumerate() {
            if coef.is_zero() {
                continue;
            }

            match valuation.activity(self.columns[c]) {
                Activity::Active   => active += 1,
                Activity::Unknown  => { unknown += 1; last_unknown = Some(c); }
                Activity::Inactive => (),
            }
        }

        (active, unknown, last_unknown)
    }

    /// Returns the front of a free row whose columns are all zero, if any.
    pub fn forced_zero(&self, valuation: &dyn Valuation) -> Option<Literal> {
        (self.line1..self.line2)
            .find(|&l| {
                let (active, unknown, _) = self.row_activity(l, valuation);
                active == 0 && unknown == 0
            })
            .map(|l| self.fronts[l])
    }

    /// Inspects the fixed rows. An active front needs at least one active column.
    pub fn forced_one(&self, valuation: &dyn Valuation) -> RowForcing {
        for line in 0..self.line1 {
            match self.row_activity(line, valuation) {
                (0, 0, _) => return RowForcing::Contradiction,
                (0, 1, Some(c)) => return RowForcing::Active(self.columns[c]),
                _ => (),
            }
        }

        RowForcing::Nothing
    }

    fn signature(&self, line: usize, valuation: &dyn Valuation) -> Vec<(usize, Gf256)> {
        let mut signature: Vec<(usize, Gf256)> = self.rows[line]
            .iter()
            .enumerate()
            .filter(|&(c, coef)| {
                !coef.is_zero() && valuation.activity(self.columns[c]) != Activity::Inactive
            })
            .map(|(c, &coef)| (c, coef))
            .collect();

        if let Some(&(_, first)) = signature.first() {
            let scale = first.inverse();

            for term in signature.iter_mut() {
                term.1 = term.1 * scale;
            }
        }

        signature
    }

    /**
    Returns the undetermined fronts of free rows whose equation is a multiple of the equation
    of a fixed row. Both fronts are then multiples of the same nonzero value.
    */
    pub fn duplicate_fronts(&self, valuation: &dyn Valuation) -> Vec<Literal> {
        let fixed: FnvHashSet<Vec<(usize, Gf256)>> = (0..self.line1)
            .map(|l| self.signature(l, valuation))
            .filter(|s| !s.is_empty())
            .collect();

        if fixed.is_empty() {
            return vec![];
        }

        (self.line1..self.line2)
            .filter(|&l| valuation.activity(self.fronts[l]) == Activity::Unknown)
            .filter(|&l| {
                let signature = self.signature(l, valuation);
                !signature.is_empty() && fixed.contains(&signature)
            })
            .map(|l| self.fronts[l])
            .collect()
    }

    /**
    Checks that a fully determined assignment is realisable. Fixed rows must have an active
    front and at least one active column, all other rows must be zero. Since the columns are
    independent, nonzero values can then be chosen for all active literals.
    */
    pub fn realizes(&self, valuation: &dyn Valuation) -> bool {
        for line in 0..self.rows.len() {
            let (active, unknown, _) = self.row_activity(line, valuation);
            let front = valuation.activity(self.fronts[line]);

            if unknown > 0 {
                return false;
            }

            let consistent = if line < self.line1 {
                front == Activity::Active && active > 0
            } else {
                front == Activity::Inactive && active == 0
            };

            if !consistent {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
impl LinearSystem {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn line1(&self) -> usize {
        self.line1
    }

    pub fn line2(&self) -> usize {
        self.line2
    }

    /// The literal defined by row `line`.
    pub fn front_literal(&self, line: usize) -> Literal {
        self.fronts[line]
    }

    /// Iterates over the nonzero terms of row `line`.
    pub fn row_terms<'a>(&'a self, line: usize) -> impl Iterator<Item = (Literal, Gf256)> + 'a {
        self.rows[line].iter()
                       .enumerate()
                       .filter(|(_, c)| !c.is_zero())
                       .map(move |(i, &c)| (self.columns[i], c))
    }
}
