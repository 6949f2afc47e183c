//! Exact verification of table entries. Starting from an entry of the final table, the search
//! walks the checkpoints backwards, choosing a predecessor class at every step, and finally
//! resolves the individual bytes. A branch survives only as long as its byte assignment is
//! consistent with the linear relations of the cipher.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::trace;

use crate::cipher::aes192::{self, COLUMNS, KEY_WORDS, SBOX_POSITION};
use crate::cipher::BRANCH_NUMBER;
use crate::linear::{Activity, LinearSystem, RowForcing};
use crate::search::inverse::{inv_update_key192, inv_update_mc_ark, inv_update_sr};
use crate::search::transitions::{triangle, Checkpoint, Stage};
use crate::state_space::{split, KeyWeightClass, StateWeightClass};
use crate::trail::{Cell, TrailAssignment};

/// The result of verifying a table entry.
#[derive(Debug)]
pub enum SearchOutcome {
    /// A characteristic with exactly the requested cost.
    Found(Box<TrailAssignment>),
    /// No characteristic with the requested cost exists for the entry.
    Exhausted,
    /// The search was stopped before it could decide.
    Cancelled,
}

/// State shared by all searches of one tightening pass.
#[derive(Debug, Default)]
pub struct SearchSession {
    cancelled: AtomicBool,
    found: AtomicBool,
    nodes: AtomicUsize,
}

impl SearchSession {
    pub fn new() -> SearchSession {
        SearchSession::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn mark_found(&self) {
        self.found.store(true, Ordering::Relaxed);
    }

    pub fn found(&self) -> bool {
        self.found.load(Ordering::Relaxed)
    }

    /// Number of search nodes visited so far.
    pub fn nodes(&self) -> usize {
        self.nodes.load(Ordering::Relaxed)
    }

    fn visit(&self) {
        self.nodes.fetch_add(1, Ordering::Relaxed);
    }
}

/**
A consequence of the key schedule relating two state columns. With `u` the XOR of the two
columns after ShiftRows and `v` the XOR of the two state columns and the (rotated) key word,
`MC(u) = v` holds. If both sides are light enough, the branch number forces `u = v = 0`.

first       Round and column of the first state column.
second      Round and column of the second state column.
key         Index of the key word in `v`.
rotation    Row offset of the key word in `v`.
*/
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct MixLink {
    pub first: (usize, usize),
    pub second: (usize, usize),
    pub key: usize,
    pub rotation: usize,
}

/**
Returns the links of an r-round characteristic. For a word `W_i` not produced by an S-box,
`W_i + W_{i-1} = W_{i-6}` relates columns `i` and `i-1`. Otherwise `W_i + W_{i-6}` is the
rotated S-box output of `W_{i-1}`, relating columns `i` and `i-6`.
*/
pub fn mix_links(rounds: usize) -> Vec<MixLink> {
    let mut links = vec![];

    for word in COLUMNS..(COLUMNS * rounds) {
        let link = if word % KEY_WORDS != 0 {
            if word < KEY_WORDS {
                continue;
            }

            MixLink {
                first: aes192::word_location(word),
                second: aes192::word_location(word - 1),
                key: word - KEY_WORDS,
                rotation: 0,
            }
        } else {
            if word < 2 * KEY_WORDS {
                continue;
            }

            MixLink {
                first: aes192::word_location(word),
                second: aes192::word_location(word - KEY_WORDS),
                key: word - 1,
                rotation: 1,
            }
        };

        links.push(link);
    }

    links
}

fn state_column(round: usize, column: usize) -> [Cell; 4] {
    [
        Cell::state(round, 0, column),
        Cell::state(round, 1, column),
        Cell::state(round, 2, column),
        Cell::state(round, 3, column),
    ]
}

/// Column `column` of `SR(X_round)`.
fn shifted_column(round: usize, column: usize) -> [Cell; 4] {
    [
        Cell::state(round, 0, column),
        Cell::state(round, 1, (column + 1) % COLUMNS),
        Cell::state(round, 2, (column + 2) % COLUMNS),
        Cell::state(round, 3, (column + 3) % COLUMNS),
    ]
}

fn key_column(round: usize, column: usize) -> [Cell; 4] {
    [
        Cell::key(round, 0, column),
        Cell::key(round, 1, column),
        Cell::key(round, 2, column),
        Cell::key(round, 3, column),
    ]
}

/***********************************************************************************************/

/// A node of the search: the reduced linear system and the partial byte assignment.
#[derive(Clone, Debug)]
pub struct Branch {
    pub system: LinearSystem,
    pub trail: TrailAssignment,
}

impl Branch {
    pub fn new(system: LinearSystem, rounds: usize) -> Branch {
        Branch {
            system,
            trail: TrailAssignment::new(rounds),
        }
    }

    /// Assigns a cell and reports it to the linear system, without further propagation.
    fn fix(&mut self, cell: Cell, active: bool) -> bool {
        if !self.trail.set(cell, active) {
            return false;
        }

        let [input, output] = cell.literals();

        if active {
            self.system.force_one(input) && self.system.force_one(output)
        } else {
            self.system.force_zero(input, &self.trail) && self.system.force_zero(output, &self.trail)
        }
    }

    /// Records the word weights of the key window after the key schedule step of `round`.
    fn record_window(&mut self, round: usize, window: &KeyWeightClass) -> bool {
        aes192::window_words(round)
            .iter()
            .zip(window.0.iter())
            .all(|(&word, &weight)| self.trail.set_key_word_weight(word, weight))
    }

    /// Assigns a cell and propagates the consequences. Returns false on a contradiction.
    pub fn assign(&mut self, cell: Cell, active: bool) -> bool {
        self.fix(cell, active) && self.propagate()
    }

    /// Runs all propagation rules until no further cell is forced.
    pub fn propagate(&mut self) -> bool {
        loop {
            let before = self.trail.determined();

            if !self.settle_columns() || !self.propagate_zero() || !self.propagate_one() {
                return false;
            }

            if self.trail.determined() == before {
                return true;
            }
        }
    }

    /// Zeroes the fronts of free rows without undetermined columns.
    pub fn propagate_zero(&mut self) -> bool {
        while let Some(literal) = self.system.forced_zero(&self.trail) {
            let feasible = match Cell::of(literal) {
                Some(cell) => self.fix(cell, false),
                None => false,
            };

            if !feasible {
                return false;
            }
        }

        true
    }

    /**
    Activates the last undetermined column of a fixed row without other active columns, and the
    fronts of free rows that duplicate a fixed row.
    */
    pub fn propagate_one(&mut self) -> bool {
        loop {
            match self.system.forced_one(&self.trail) {
                RowForcing::Contradiction => return false,
                RowForcing::Active(literal) => {
                    match Cell::of(literal) {
                        Some(cell) if self.fix(cell, true) => continue,
                        _ => return false,
                    }
                }
                RowForcing::Nothing => (),
            }

            let duplicates = self.system.duplicate_fronts(&self.trail);

            if duplicates.is_empty() {
                return true;
            }

            for literal in duplicates {
                match Cell::of(literal) {
                    Some(cell) if self.fix(cell, true) => (),
                    _ => return false,
                }
            }
        }
    }

    /**
    Checks the cells of a column against its weight. Once the active (or inactive) cells are
    all accounted for, the remaining cells are fixed.
    */
    fn settle(&mut self, cells: [Cell; 4], weight: u8) -> bool {
        let mut zeros = 0;
        let mut ones = 0;

        for &cell in &cells {
            match self.trail.get(cell) {
                Activity::Inactive => zeros += 1,
                Activity::Active   => ones += 1,
                Activity::Unknown  => (),
            }
        }

        if zeros + weight > 4 || ones > weight {
            return false;
        }

        let fill = if ones == weight {
            false
        } else if zeros + weight == 4 {
            true
        } else {
            return true;
        };

        for &cell in &cells {
            if self.trail.get(cell) == Activity::Unknown && !self.fix(cell, fill) {
                return false;
            }
        }

        true
    }

    fn settle_columns(&mut self) -> bool {
        let rounds = self.trail.rounds();

        for round in 0..rounds {
            for column in 0..COLUMNS {
                if let Some(weight) = self.trail.col_x[round][column] {
                    if !self.settle(state_column(round, column), weight) {
                        return false;
                    }
                }

                if let Some(weight) = self.trail.col_sr[round][column] {
                    if !self.settle(shifted_column(round, column), weight) {
                        return false;
                    }
                }
            }
        }

        for round in 0..=rounds {
            for column in 0..COLUMNS {
                if let Some(weight) = self.trail.col_k[round][column] {
                    if !self.settle(key_column(round, column), weight) {
                        return false;
                    }
                }
            }
        }

        true
    }

    /**
    Applies a single link. Returns `None` on a contradiction and otherwise whether a cell was
    assigned.
    */
    fn apply_link(&mut self, link: &MixLink) -> Option<bool> {
        let (r1, c1) = link.first;
        let (r2, c2) = link.second;
        let (rk, ck) = aes192::word_location(link.key);

        let weights = match (self.trail.col_sr[r1 - 1][c1],
                             self.trail.col_sr[r2 - 1][c2],
                             self.trail.col_x[r1][c1],
                             self.trail.col_x[r2][c2],
                             self.trail.col_k[rk][ck]) {
            (Some(s1), Some(s2), Some(x1), Some(x2), Some(k)) => (s1, s2, x1, x2, k),
            _ => return Some(false),
        };
        let (s1, s2, x1, x2, k) = weights;

        let shifted1 = shifted_column(r1 - 1, c1);
        let shifted2 = shifted_column(r2 - 1, c2);
        let mut sides = [[Cell::state(0, 0, 0); 3]; 4];

        for (row, side) in sides.iter_mut().enumerate() {
            *side = [Cell::state(r1, row, c1),
                     Cell::state(r2, row, c2),
                     Cell::key(rk, (row + link.rotation) % 4, ck)];
        }

        // Upper bound on the weight of u
        let mut u_rows = 0;
        let mut u_both = 0;

        for row in 0..4 {
            let (a, b) = (self.trail.get(shifted1[row]), self.trail.get(shifted2[row]));

            if a != Activity::Inactive || b != Activity::Inactive {
                u_rows += 1;
            }

            if a == Activity::Active && b == Activity::Active {
                u_both += 1;
            }
        }

        let u_bound = std::cmp::min(u_rows, (s1 + s2) as i32 - u_both);

        // Upper bound on the weight of v
        let mut v_rows = 0;
        let mut v_overlap = 0;

        for side in &sides {
            let states: Vec<Activity> = side.iter().map(|&c| self.trail.get(c)).collect();
            let active = states.iter().filter(|&&a| a == Activity::Active).count() as i32;

            if states.iter().any(|&a| a != Activity::Inactive) {
                v_rows += 1;
            }

            if active > 1 {
                v_overlap += active - 1;
            }
        }

        let v_bound = std::cmp::min(v_rows, (x1 + x2 + k) as i32 - v_overlap);

        if u_bound + v_bound >= BRANCH_NUMBER as i32 {
            return Some(false);
        }

        // Both u and v vanish
        if s1 != s2 || !triangle(x1, x2, k) {
            return None;
        }

        for row in 0..4 {
            let (a, b) = (self.trail.get(shifted1[row]), self.trail.get(shifted2[row]));

            match (a, b) {
                (Activity::Unknown, Activity::Unknown) => (),
                (Activity::Unknown, known) => {
                    return self.assign(shifted1[row], known == Activity::Active).then(|| true);
                }
                (known, Activity::Unknown) => {
                    return self.assign(shifted2[row], known == Activity::Active).then(|| true);
                }
                (a, b) if a != b => return None,
                _ => (),
            }
        }

        for side in &sides {
            let states: Vec<Activity> = side.iter().map(|&c| self.trail.get(c)).collect();
            let active = states.iter().filter(|&&a| a == Activity::Active).count();
            let inactive = states.iter().filter(|&&a| a == Activity::Inactive).count();

            if active == 1 && inactive == 2 {
                return None;
            }

            // With one term zero, the other two are equal
            for i in 0..3 {
                if states[i] != Activity::Inactive {
                    continue;
                }

                let (j, l) = ((i + 1) % 3, (i + 2) % 3);

                match (states[j], states[l]) {
                    (Activity::Unknown, Activity::Unknown) => (),
                    (Activity::Unknown, known) => {
                        return self.assign(side[j], known == Activity::Active).then(|| true);
                    }
                    (known, Activity::Unknown) => {
                        return self.assign(side[l], known == Activity::Active).then(|| true);
                    }
                    (x, y) if x != y => return None,
                    _ => (),
                }
            }
        }

        Some(false)
    }

    /// Applies all links, starting over whenever a cell is assigned.
    pub fn apply_mix_links(&mut self, links: &[MixLink]) -> bool {
        'restart: loop {
            for link in links {
                match self.apply_link(link) {
                    None => return false,
                    Some(true) => continue 'restart,
                    Some(false) => (),
                }
            }

            return true;
        }
    }
}

/***********************************************************************************************/

/**
Searches for characteristics matching entries of the final table.

checkpoints     All tables, from the initial one to the final one.
system          The reduced linear system of the cipher.
links           Cross-round links of the cipher.
rounds          Number of rounds.
session         Shared cancellation and statistics.
*/
pub struct Verifier<'a> {
    checkpoints: &'a [Checkpoint],
    system: &'a LinearSystem,
    links: Vec<MixLink>,
    rounds: usize,
    session: &'a SearchSession,
}

impl<'a> Verifier<'a> {
    pub fn new(checkpoints: &'a [Checkpoint],
               system: &'a LinearSystem,
               rounds: usize,
               session: &'a SearchSession)
               -> Verifier<'a> {
        Verifier {
            checkpoints,
            system,
            links: mix_links(rounds),
            rounds,
            session,
        }
    }

    /**
    Looks for a characteristic whose class matches entry `index` of the final table and whose
    cost is exactly `bound`.

    index       Entry of the final table.
    bound       The cost to match.
    */
    pub fn certify(&self, index: usize, bound: u8) -> SearchOutcome {
        let (key, state) = split(index);
        let mut branch = Branch::new(self.system.clone(), self.rounds);
        let class = StateWeightClass::decode(state);

        for (column, &weight) in class.0.iter().enumerate() {
            branch.trail.col_x[self.rounds - 1][column] = Some(weight);
        }

        if !branch.record_window(self.rounds - 1, &KeyWeightClass::decode(key)) || !branch.propagate() {
            return SearchOutcome::Exhausted;
        }

        self.expand(branch, self.checkpoints.len() - 1, index, 0, bound as usize)
    }

    /// Remaining budget for predecessors, if any.
    fn budget(spent: usize, bound: usize) -> Option<u8> {
        bound.checked_sub(spent).map(|b| std::cmp::min(b, u8::MAX as usize) as u8)
    }

    /**
    Undoes checkpoint `stage` for entry `index`.

    branch      The current node.
    stage       Index of the checkpoint holding `index`.
    index       The entry reached so far.
    spent       Cost of the rounds after checkpoint `stage`.
    bound       The cost to match.
    */
    fn expand(&self, branch: Branch, stage: usize, index: usize, spent: usize, bound: usize) -> SearchOutcome {
        self.session.visit();

        if self.session.is_cancelled() {
            return SearchOutcome::Cancelled;
        }

        let (key, state) = split(index);

        match self.checkpoints[stage].stage {
            Stage::Initial => self.wrap_up(branch, index, spent, bound),

            Stage::MixColumnsArk(round) => {
                let spent = spent + StateWeightClass::decode(state).total() as usize;
                let budget = match Verifier::budget(spent, bound) {
                    Some(budget) => budget,
                    None => return SearchOutcome::Exhausted,
                };

                let table = &self.checkpoints[stage - 1].table;
                let offset = aes192::key_offset(round);

                for previous in inv_update_mc_ark(table, offset, budget, index) {
                    let mut child = branch.clone();
                    let shifted = StateWeightClass::decode(split(previous).1);

                    for (column, &weight) in shifted.0.iter().enumerate() {
                        child.trail.col_sr[round - 1][column] = Some(weight);
                    }

                    if !child.propagate() {
                        continue;
                    }

                    match self.expand(child, stage - 1, previous, spent, bound) {
                        SearchOutcome::Exhausted => (),
                        outcome => return outcome,
                    }
                }

                SearchOutcome::Exhausted
            }

            Stage::KeySchedule(round) => {
                let charge = if aes192::charges_key_sbox(round) {
                    KeyWeightClass::decode(key).0[SBOX_POSITION] as usize
                } else {
                    0
                };

                let spent = spent + charge;
                let budget = match Verifier::budget(spent, bound) {
                    Some(budget) => budget,
                    None => return SearchOutcome::Exhausted,
                };

                let table = &self.checkpoints[stage - 1].table;

                for previous in inv_update_key192(table, round, budget, index) {
                    let mut child = branch.clone();
                    let window = KeyWeightClass::decode(split(previous).0);

                    if !child.record_window(round - 1, &window) || !child.propagate() {
                        continue;
                    }

                    match self.expand(child, stage - 1, previous, spent, bound) {
                        SearchOutcome::Exhausted => (),
                        outcome => return outcome,
                    }
                }

                SearchOutcome::Exhausted
            }

            Stage::ShiftRows(round) => {
                let mut branch = branch;

                if !branch.apply_mix_links(&self.links) {
                    return SearchOutcome::Exhausted;
                }

                let budget = match Verifier::budget(spent, bound) {
                    Some(budget) => budget,
                    None => return SearchOutcome::Exhausted,
                };

                let table = &self.checkpoints[stage - 1].table;
                let grid = *branch.trail.state_grid(round - 1);

                for previous in inv_update_sr(table, budget, index, &grid) {
                    let mut child = branch.clone();
                    let class = StateWeightClass::decode(split(previous).1);

                    for (column, &weight) in class.0.iter().enumerate() {
                        child.trail.col_x[round - 1][column] = Some(weight);
                    }

                    if !child.propagate() {
                        continue;
                    }

                    match self.expand(child, stage - 1, previous, spent, bound) {
                        SearchOutcome::Exhausted => (),
                        outcome => return outcome,
                    }
                }

                SearchOutcome::Exhausted
            }
        }
    }

    /// Checks the cost of a complete class assignment and resolves the remaining bytes.
    fn wrap_up(&self, branch: Branch, index: usize, spent: usize, bound: usize) -> SearchOutcome {
        let (_, state) = split(index);

        // The all-zero master key and plaintext difference is not a characteristic
        if index == 0 {
            return SearchOutcome::Exhausted;
        }

        if spent + StateWeightClass::decode(state).total() as usize != bound {
            return SearchOutcome::Exhausted;
        }

        self.resolve(branch)
    }

    /// Decides the remaining cells depth first, trying inactive before active.
    fn resolve(&self, mut branch: Branch) -> SearchOutcome {
        self.session.visit();

        if self.session.is_cancelled() {
            return SearchOutcome::Cancelled;
        }

        let cell = match branch.trail.next_undetermined() {
            Some(cell) => cell,
            None => {
                return if branch.system.realizes(&branch.trail) {
                    trace!(cost = branch.trail.cost(), "characteristic found");
                    SearchOutcome::Found(Box::new(branch.trail))
                } else {
                    SearchOutcome::Exhausted
                };
            }
        };

        let mut inactive = branch.clone();

        if inactive.assign(cell, false) {
            match self.resolve(inactive) {
                SearchOutcome::Exhausted => (),
                outcome => return outcome,
            }
        }

        if branch.assign(cell, true) {
            self.resolve(branch)
        } else {
            SearchOutcome::Exhausted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::aes192::Aes192;
    use crate::search::transitions::build_tables;
    use crate::state_space::index;

    #[test]
    fn links_follow_the_key_schedule() {
        assert!(mix_links(1).is_empty());

        let links = mix_links(3);
        // Words 7 to 11, none of them produced by an S-box
        assert_eq!(links.len(), 5);
        assert_eq!(links[0], MixLink { first: (1, 3), second: (1, 2), key: 1, rotation: 0 });

        let links = mix_links(4);
        let sbox: Vec<&MixLink> = links.iter().filter(|l| l.rotation == 1).collect();
        assert_eq!(sbox, vec![&MixLink { first: (3, 0), second: (1, 2), key: 11, rotation: 1 }]);
    }

    #[test]
    fn columns_settle_from_weights() {
        let system = Aes192::new(2).linear_system();
        let mut branch = Branch::new(system, 2);

        branch.trail.col_x[1] = [Some(0), Some(4), Some(0), Some(0)];
        assert!(branch.propagate());

        for row in 0..4 {
            assert_eq!(branch.trail.get(Cell::state(1, row, 0)), Activity::Inactive);
            assert_eq!(branch.trail.get(Cell::state(1, row, 1)), Activity::Active);
        }

        // A column cannot hold more active bytes than its weight
        branch.trail.col_x[1][1] = Some(3);
        assert!(!branch.propagate());
    }

    #[test]
    fn zero_state_and_key_words_propagate() {
        let system = Aes192::new(2).linear_system();
        let mut branch = Branch::new(system, 2);

        // X_1 = MC(SR(S(X_0))) + K_1 with X_0 and K_1 inactive forces X_1 inactive
        branch.trail.col_x[0] = [Some(0); 4];
        branch.trail.col_k[1] = [Some(0); 4];
        assert!(branch.propagate());

        for row in 0..4 {
            for column in 0..COLUMNS {
                assert_eq!(branch.trail.get(Cell::state(1, row, column)), Activity::Inactive);
            }
        }
    }

    #[test]
    fn light_links_force_equal_bytes() {
        let system = Aes192::new(3).linear_system();
        let mut branch = Branch::new(system, 3);
        let links = mix_links(3);

        // W_7 + W_6 = W_1 with W_1 inactive and both SR columns inactive
        branch.trail.col_sr[0][2] = Some(0);
        branch.trail.col_sr[0][3] = Some(0);
        branch.trail.col_x[1][2] = Some(1);
        branch.trail.col_x[1][3] = Some(1);
        assert!(branch.trail.set_key_word_weight(1, 0));
        assert!(branch.propagate());

        assert!(branch.assign(Cell::state(1, 0, 3), true));
        assert!(branch.apply_mix_links(&links));
        assert_eq!(branch.trail.get(Cell::state(1, 0, 2)), Activity::Active);
        assert_eq!(branch.trail.get(Cell::state(1, 1, 2)), Activity::Inactive);
    }

    #[test]
    fn unequal_shifted_weights_break_light_links() {
        let system = Aes192::new(3).linear_system();
        let mut branch = Branch::new(system, 3);

        branch.trail.col_sr[0][2] = Some(0);
        branch.trail.col_sr[0][3] = Some(1);
        branch.trail.col_x[1][2] = Some(0);
        branch.trail.col_x[1][3] = Some(0);
        assert!(branch.trail.set_key_word_weight(1, 0));

        assert!(!branch.apply_mix_links(&mix_links(3)));
    }

    #[test]
    fn two_rounds_have_free_characteristic() {
        let checkpoints = build_tables(2, 5, None);
        let system = Aes192::new(2).linear_system();
        let session = SearchSession::new();
        let verifier = Verifier::new(&checkpoints, &system, 2, &session);

        // Only W_2 is active: it cancels out of X_0, X_1 and every S-box
        let key = KeyWeightClass([0, 0, 1, 0, 0, 0]).encode();

        match verifier.certify(index(key, 0), 0) {
            SearchOutcome::Found(trail) => {
                assert_eq!(trail.cost(), 0);

                for relation in Aes192::new(2).equations() {
                    assert!(relation.holds_for(&*trail));
                }
            }
            outcome => panic!("expected a characteristic, got {:?}", outcome),
        }
    }

    #[test]
    fn cost_must_match_exactly() {
        let checkpoints = build_tables(2, 5, None);
        let system = Aes192::new(2).linear_system();
        let session = SearchSession::new();
        let verifier = Verifier::new(&checkpoints, &system, 2, &session);
        let key = KeyWeightClass([0, 0, 1, 0, 0, 0]).encode();

        match verifier.certify(index(key, 0), 1) {
            SearchOutcome::Exhausted => (),
            outcome => panic!("expected no characteristic, got {:?}", outcome),
        }
    }

    #[test]
    fn cancelled_sessions_stop() {
        let checkpoints = build_tables(2, 5, None);
        let system = Aes192::new(2).linear_system();
        let session = SearchSession::new();
        session.cancel();
        let verifier = Verifier::new(&checkpoints, &system, 2, &session);
        let key = KeyWeightClass([0, 0, 1, 0, 0, 0]).encode();

        match verifier.certify(index(key, 0), 0) {
            SearchOutcome::Cancelled => (),
            outcome => panic!("expected cancellation, got {:?}", outcome),
        }
    }

    #[test]
    fn found_trails_satisfy_every_relation() {
        let checkpoints = build_tables(2, 5, None);
        let system = Aes192::new(2).linear_system();
        let session = SearchSession::new();
        let verifier = Verifier::new(&checkpoints, &system, 2, &session);
        let relations = Aes192::new(2).equations();
        let table = &checkpoints[checkpoints.len() - 1].table;
        let mut found = 0;

        for level in 0..4 {
            for i in table.entries_equal(level).into_iter().step_by(997).take(10) {
                if let SearchOutcome::Found(trail) = verifier.certify(i, level) {
                    found += 1;
                    assert_eq!(trail.cost(), level as usize);
                    assert!(trail.next_undetermined().is_none());

                    for relation in &relations {
                        assert!(relation.holds_for(&*trail));
                    }
                }
            }
        }

        assert!(found > 0);
    }
}
