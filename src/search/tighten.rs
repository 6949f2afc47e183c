use std::sync::mpsc;
use tracing::{debug, info};

use crate::linear::LinearSystem;
use crate::state_space::{split, KeyWeightClass, StateWeightClass};
use crate::search::transitions::Checkpoint;
use crate::search::verifier::{SearchOutcome, SearchSession, Verifier};
use crate::trail::TrailAssignment;
use crate::utility::ProgressBar;

// The number of threads used for parallel calls is fixed
lazy_static! {
    static ref THREADS: usize = num_cpus::get();
}

/**
Options of the tightening loop.

extra_levels    Number of levels refined after the first certified level.
stop_at_first   If true, the remaining entries of the first certified level are skipped once
                a characteristic is found.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TightenOptions {
    pub extra_levels: u8,
    pub stop_at_first: bool,
}

impl Default for TightenOptions {
    fn default() -> TightenOptions {
        TightenOptions {
            extra_levels: 0,
            stop_at_first: true,
        }
    }
}

impl TightenOptions {
    /// Options used for the round prefixes when tables are tightened while they are built.
    pub fn intermediate() -> TightenOptions {
        TightenOptions {
            extra_levels: 1,
            stop_at_first: false,
        }
    }
}

/**
Summary of a tightening run.

certified           The smallest level with a characteristic, if any was found below the bound.
trail               A characteristic of the certified level.
attempted           Number of entries searched.
certified_entries   Number of entries for which a characteristic was found.
raised              Number of entries raised.
nodes               Number of search nodes visited.
*/
#[derive(Clone, Debug, Default)]
pub struct TighteningReport {
    pub certified: Option<u8>,
    pub trail: Option<TrailAssignment>,
    pub attempted: usize,
    pub certified_entries: usize,
    pub raised: usize,
    pub nodes: usize,
}

/// The outcomes of the entries of one level that were searched to completion.
#[derive(Default)]
struct LevelResult {
    found: Vec<(usize, TrailAssignment)>,
    exhausted: Vec<usize>,
    attempted: usize,
    nodes: usize,
}

/**
Searches all `entries` of the final table at cost `level` in parallel.

checkpoints     All tables of the characteristic.
system          The reduced linear system.
rounds          Number of rounds.
level           The cost to certify.
entries         The entries to search.
stop_at_first   Cancel the remaining searches once a characteristic is found.
*/
fn verify_level(checkpoints: &[Checkpoint],
                system: &LinearSystem,
                rounds: usize,
                level: u8,
                entries: &[usize],
                stop_at_first: bool)
                -> LevelResult {
    let session = SearchSession::new();
    let (result_tx, result_rx) = mpsc::channel();

    // Start scoped worker threads
    crossbeam_utils::thread::scope(|scope| {
        for t in 0..*THREADS {
            let result_tx = result_tx.clone();
            let session = &session;

            scope.spawn(move |_| {
                let verifier = Verifier::new(checkpoints, system, rounds, session);
                let mut progress_bar = ProgressBar::new(entries.iter()
                                                               .skip(t)
                                                               .step_by(*THREADS)
                                                               .len());
                let mut result = LevelResult::default();

                for &entry in entries.iter().skip(t).step_by(*THREADS) {
                    if session.is_cancelled() {
                        break;
                    }

                    match verifier.certify(entry, level) {
                        SearchOutcome::Found(trail) => {
                            session.mark_found();

                            if stop_at_first {
                                session.cancel();
                            }

                            result.found.push((entry, *trail));
                        }
                        SearchOutcome::Exhausted => result.exhausted.push(entry),
                        SearchOutcome::Cancelled => break,
                    }

                    result.attempted += 1;

                    if t == 0 {
                        progress_bar.increment();
                    }
                }

                result_tx.send(result).expect("Thread could not send result");
            });
        }
    }).expect("Verification threads failed to join");

    // Collect results from all threads
    let mut result = LevelResult::default();

    for _ in 0..*THREADS {
        let mut thread_result = result_rx.recv().expect("Main could not receive result");

        result.found.append(&mut thread_result.found);
        result.exhausted.append(&mut thread_result.exhausted);
        result.attempted += thread_result.attempted;
    }

    result.found.sort_by_key(|&(entry, _)| entry);
    result.nodes = session.nodes();
    debug!(level, found = session.found(), cancelled = session.is_cancelled(), "level finished");
    result
}

/**
Tightens the final table of `checkpoints`. Starting at its minimum, every entry equal to the
current level is searched for a characteristic of exactly that cost. Entries without one are
raised and searched again at the next level. The loop stops once `extra_levels` levels past
the first certified level are refined, or at the bound of the table.

checkpoints     All tables of the characteristic. Only the last one is modified.
system          The reduced linear system of `rounds` rounds.
rounds          Number of rounds.
options         Options of the loop.
*/
pub fn tighten(checkpoints: &mut [Checkpoint],
               system: &LinearSystem,
               rounds: usize,
               options: &TightenOptions)
               -> TighteningReport {
    let mut report = TighteningReport::default();

    let last = match checkpoints.len() {
        0 => return report,
        n => n - 1,
    };

    let bound = checkpoints[last].table.bound();
    let mut level = checkpoints[last].table.minimum();

    while level < bound {
        if let Some(certified) = report.certified {
            if level as usize > certified as usize + options.extra_levels as usize {
                break;
            }
        }

        let entries = checkpoints[last].table.entries_equal(level);
        let stop_at_first = options.stop_at_first && report.certified.is_none();

        let start = time::precise_time_s();
        println!("Level {}: searching {} entries.", level, entries.len());

        let result = verify_level(checkpoints, system, rounds, level, &entries, stop_at_first);

        for &entry in &result.exhausted {
            checkpoints[last].table.raise(entry);
        }

        report.attempted += result.attempted;
        report.certified_entries += result.found.len();
        report.raised += result.exhausted.len();
        report.nodes += result.nodes;

        debug!(level, attempted = result.attempted, nodes = result.nodes, "level searched");
        println!("Level {}: {} certified, {} raised. [{} s]",
            level, result.found.len(), result.exhausted.len(), time::precise_time_s() - start);

        if report.certified.is_none() {
            if let Some((entry, trail)) = result.found.into_iter().next() {
                let (key, state) = split(entry);
                info!(level,
                      key_weight = KeyWeightClass::decode(key).total(),
                      state_weight = StateWeightClass::decode(state).total(),
                      "bound certified");
                report.certified = Some(level);
                report.trail = Some(trail);
            }
        }

        level += 1;
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::aes192::{self, Aes192};
    use crate::linear::Relation;
    use crate::search::transitions::build_tables;
    use crate::trail::Cell;

    /// Sets the bytes of key word `W_word` from the low four bits of `pattern`.
    fn set_key_word(trail: &mut TrailAssignment, word: usize, pattern: u32) {
        let (round, column) = aes192::word_location(word);

        for row in 0..4 {
            trail.set(Cell::key(round, row, column), (pattern >> row) & 1 == 1);
        }
    }

    /// A one-round assignment with `W_0, ..., W_7` taken from `key`, one nibble per word.
    fn one_round_trail(key: u32, state: Option<u32>) -> TrailAssignment {
        let mut trail = TrailAssignment::new(1);

        for word in 0..8 {
            set_key_word(&mut trail, word, key >> (4 * word));
        }

        if let Some(state) = state {
            for byte in 0..16 {
                trail.set(Cell::state(0, byte / 4, byte % 4), (state >> byte) & 1 == 1);
            }
        }

        trail
    }

    /// Key patterns satisfying the key schedule, for master keys with at most one active byte.
    fn one_round_keys(relations: &[Relation]) -> Vec<u32> {
        let mut keys = vec![];

        for master in std::iter::once(0).chain((0..24).map(|bit| 1u32 << bit)) {
            for schedule in 0..256u32 {
                let key = master | (schedule << 24);
                let trail = one_round_trail(key, None);

                if relations.iter().all(|r| r.holds_for(&trail)) {
                    keys.push(key);
                }
            }
        }

        keys
    }

    /**
    Minimum cost of a one-round characteristic, enumerating every activity pattern of `X_0`
    together with the admissible key patterns and keeping the assignments that satisfy all
    relations of the cipher.

    keyed       Only consider characteristics with (or without) a key difference.
    */
    fn one_round_brute_force(keyed: bool) -> Option<usize> {
        let relations = Aes192::new(1).equations();
        let mut best: Option<usize> = None;

        for key in one_round_keys(&relations).into_iter().filter(|&k| (k != 0) == keyed) {
            for state in 0..(1u32 << 16) {
                if state == 0 && key == 0 {
                    continue;
                }

                let trail = one_round_trail(key, Some(state));

                if relations.iter().all(|r| r.holds_for(&trail)) {
                    let cost = trail.cost();
                    best = Some(best.map_or(cost, |b| std::cmp::min(b, cost)));
                }
            }
        }

        best
    }

    #[test]
    fn one_round_matches_brute_force() {
        // Without a key difference a single active byte of X_0 is the cheapest
        assert_eq!(one_round_brute_force(false), Some(1));

        let expected = [false, true].iter().filter_map(|&keyed| one_round_brute_force(keyed)).min();

        let mut checkpoints = build_tables(1, 4, None);
        let system = Aes192::new(1).linear_system();
        let report = tighten(&mut checkpoints, &system, 1, &TightenOptions::default());

        assert_eq!(report.certified.map(|c| c as usize), expected);

        let trail = report.trail.expect("a certified level has a trail");
        assert_eq!(Some(trail.cost()), expected);
    }

    #[test]
    fn two_rounds_certify_zero() {
        let mut checkpoints = build_tables(2, 5, None);
        let system = Aes192::new(2).linear_system();
        let report = tighten(&mut checkpoints, &system, 2, &TightenOptions::default());

        assert_eq!(report.certified, Some(0));
        assert!(report.certified_entries >= 1);
        assert!(report.attempted >= report.certified_entries + report.raised);
    }

    #[test]
    fn tightening_never_lowers_entries() {
        let mut checkpoints = build_tables(2, 5, None);
        let before = checkpoints[checkpoints.len() - 1].table.clone();
        let system = Aes192::new(2).linear_system();
        let options = TightenOptions { extra_levels: 0, stop_at_first: false };
        let report = tighten(&mut checkpoints, &system, 2, &options);

        let after = &checkpoints[checkpoints.len() - 1].table;
        let mut raised = 0;

        for (b, a) in before.values().iter().zip(after.values()) {
            assert!(a >= b);
            assert!(*a <= after.bound());

            if a > b {
                raised += 1;
            }
        }

        assert_eq!(raised, report.raised);
        assert_eq!(report.attempted, report.certified_entries + report.raised);
        assert_eq!(after.minimum(), 0);
    }

    #[test]
    fn empty_checkpoints_are_left_alone() {
        let report = tighten(&mut [], &LinearSystem::default(), 1, &TightenOptions::default());

        assert_eq!(report.certified, None);
        assert_eq!(report.attempted, 0);
    }

    #[test]
    fn three_rounds_certify_one() {
        let bound = aes192::default_bound(3);
        let mut checkpoints = build_tables(3, bound, Some(&TightenOptions::intermediate()));
        let system = Aes192::new(3).linear_system();
        let report = tighten(&mut checkpoints, &system, 3, &TightenOptions::default());

        assert_eq!(report.certified, Some(1));
    }

    #[test]
    fn four_rounds_raise_entries_before_certifying() {
        let mut checkpoints = build_tables(4, aes192::default_bound(4), None);
        let coarse = checkpoints[checkpoints.len() - 1].table.minimum();
        let system = Aes192::new(4).linear_system();
        let report = tighten(&mut checkpoints, &system, 4, &TightenOptions::default());

        assert_eq!(coarse, 3);
        assert_eq!(report.certified, Some(4));
        assert!(report.raised > 0);
        assert_eq!(report.trail.map(|t| t.cost()), Some(4));

        // Every entry at the coarse minimum was refuted
        assert_eq!(checkpoints[checkpoints.len() - 1].table.minimum(), 4);
    }
}
