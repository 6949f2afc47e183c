//! Forward transitions of the weight-class tables. Each transition maps a table of lower bounds
//! before a step of the cipher to a table of lower bounds after it.

use indexmap::IndexSet;
use std::cmp::min;
use std::ops::RangeInclusive;
use tracing::debug;

use crate::cipher::aes192::{self, Aes192, COLUMNS, KEY_WORDS, SBOX_POSITION};
use crate::cipher::BRANCH_NUMBER;
use crate::linear::Activity;
use crate::search::tighten::{tighten, TightenOptions};
use crate::state_space::{digit, index, with_digit, DpTable, StateWeightClass, KEYS, STATES};
use crate::trail::Grid;

// The number of threads used for parallel calls is fixed
lazy_static! {
    static ref THREADS: usize = num_cpus::get();

    /// Canonical (sorted) code of every state code.
    static ref CANONICAL: Vec<usize> = (0..STATES)
        .map(|s| StateWeightClass::decode(s).canonical().encode())
        .collect();

    /// State codes reachable through ShiftRows for every canonical code.
    static ref SHIFT_ROWS_SOURCES: Vec<Vec<usize>> = (0..STATES)
        .map(|s| {
            if CANONICAL[s] == s {
                shift_rows_sources(StateWeightClass::decode(s), None)
            } else {
                vec![]
            }
        })
        .collect();

    /// `MC_ARK[a][k][x]` tells if input weight `a` and key weight `k` can give output weight `x`.
    static ref MC_ARK: [[[bool; 5]; 5]; 5] = {
        let mut table = [[[false; 5]; 5]; 5];

        for a in 0..5u8 {
            for z in mds_outputs(a) {
                for k in 0..5u8 {
                    for x in 0..5u8 {
                        if triangle(z, k, x) {
                            table[a as usize][k as usize][x as usize] = true;
                        }
                    }
                }
            }
        }

        table
    };
}

/// The step of the cipher a checkpoint table describes.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Stage {
    /// Before the first round, indexed by the master key and `X_0`.
    Initial,
    /// After ShiftRows of round `r - 1`, indexed by the columns of `SR(X_{r-1})`.
    ShiftRows(usize),
    /// After the key schedule step producing `K_r`.
    KeySchedule(usize),
    /// After MixColumns and the addition of `K_r`, indexed by the columns of `X_r`.
    MixColumnsArk(usize),
}

/// A table together with the step it describes.
#[derive(Clone, Debug)]
pub struct Checkpoint {
    pub stage: Stage,
    pub table: DpTable,
}

/// Output weights of a MixColumns column with `input` active bytes.
pub fn mds_outputs(input: u8) -> RangeInclusive<u8> {
    if input == 0 {
        0..=0
    } else {
        (BRANCH_NUMBER - input)..=4
    }
}

/// True if the XOR of two words of weights `a` and `b` can have weight `k`.
#[inline(always)]
pub fn triangle(a: u8, b: u8, k: u8) -> bool {
    let low = if a > b { a - b } else { b - a };
    low <= k && k <= min(4, a + b)
}

/// True if a MixColumns input of weight `a` plus a key word of weight `k` can have weight `x`.
#[inline(always)]
pub fn mc_ark_admissible(a: u8, k: u8, x: u8) -> bool {
    MC_ARK[a as usize][k as usize][x as usize]
}

/// Canonical code of a state code.
#[inline(always)]
pub fn canonical(state: usize) -> usize {
    CANONICAL[state]
}

/**
Returns the column weights of all byte patterns whose columns after ShiftRows have the given
weights. If `fixed` is given, patterns disagreeing with the known cells are skipped.

target      Column weights after ShiftRows.
fixed       Known cells of the state before ShiftRows.
*/
pub fn shift_rows_sources(target: StateWeightClass, fixed: Option<&Grid>) -> Vec<usize> {
    let mut sources = IndexSet::new();
    extend_shift_rows(0, [0; COLUMNS], &target, fixed, &mut sources);
    sources.into_iter().collect()
}

fn extend_shift_rows(column: usize,
                     weights: [u8; COLUMNS],
                     target: &StateWeightClass,
                     fixed: Option<&Grid>,
                     sources: &mut IndexSet<usize>) {
    if column == COLUMNS {
        sources.insert(StateWeightClass(weights).encode());
        return;
    }

    for pattern in 0u8..16 {
        if pattern.count_ones() as u8 != target.0[column] {
            continue;
        }

        // Row l of this column comes from column (column + l) of the state
        let agrees = fixed.map_or(true, |grid| {
            (0..4).all(|l| {
                let active = (pattern >> l) & 1 == 1;
                match grid[l][(column + l) % COLUMNS] {
                    Activity::Unknown => true,
                    known => known == Activity::from_bool(active),
                }
            })
        });

        if !agrees {
            continue;
        }

        let mut next = weights;

        for l in 0..4 {
            if (pattern >> l) & 1 == 1 {
                next[(column + l) % COLUMNS] += 1;
            }
        }

        extend_shift_rows(column + 1, next, target, fixed, sources);
    }
}

/**
Creates a new table by filling every key block in parallel. The blocks are split evenly
across the worker threads.

bound       Saturation value of the new table.
fill        Called with a key code and the block of entries for that key.
*/
fn par_fill<F>(bound: u8, fill: F) -> DpTable
    where F: Fn(usize, &mut [u8]) + Sync
{
    let mut output = DpTable::filled(bound);
    let keys_per_thread = (KEYS + *THREADS - 1) / *THREADS;

    // Start scoped worker threads
    crossbeam_utils::thread::scope(|scope| {
        for (t, chunk) in output.values_mut().chunks_mut(keys_per_thread * STATES).enumerate() {
            let fill = &fill;

            scope.spawn(move |_| {
                for (i, block) in chunk.chunks_mut(STATES).enumerate() {
                    fill(t * keys_per_thread + i, block);
                }
            });
        }
    }).expect("Transition threads failed to join");

    output
}

/// The entries of a table for a single key code.
#[inline(always)]
fn key_block(table: &DpTable, key: usize) -> &[u8] {
    &table.values()[index(key, 0)..index(key + 1, 0)]
}

/**
Applies ShiftRows. The output entry for a class is the minimum over all state classes that can
be rearranged into it. The minimum only depends on the sorted class, so it is computed once
per canonical class and copied to its permutations.

table       Table indexed by the state before ShiftRows.
*/
pub fn update_sr(table: &DpTable) -> DpTable {
    let bound = table.bound();

    par_fill(bound, |key, block| {
        let source = key_block(table, key);
        let mut folded = [bound; STATES];

        for (code, sources) in SHIFT_ROWS_SOURCES.iter().enumerate() {
            if let Some(value) = sources.iter().map(|&s| source[s]).min() {
                folded[code] = value;
            }
        }

        for (state, value) in block.iter_mut().enumerate() {
            *value = folded[canonical(state)];
        }
    })
}

/**
Applies MixColumns to one column and adds the round key word. The output column weight is
charged as the cost of the new state.

table           Table indexed by the state before MixColumns.
column          The column to update.
key_position    Window position of the round key word added to the column.
*/
pub fn update_mc_ark(table: &DpTable, column: usize, key_position: usize) -> DpTable {
    let bound = table.bound();

    par_fill(bound, |key, block| {
        let source = key_block(table, key);
        let k = digit(key, key_position);

        for (state, value) in block.iter_mut().enumerate() {
            let x = digit(state, column);
            let best = (0..5u8).filter(|&a| mc_ark_admissible(a, k, x))
                               .map(|a| source[with_digit(state, column, a)])
                               .min()
                               .unwrap_or(bound);

            *value = min(best.saturating_add(x), bound);
        }
    })
}

/**
Applies one step of the AES-192 key recurrence: the word at `position` is replaced by its XOR
with the word at the previous window position.

position    Window position of the new word.
table       Table before the step.
*/
pub fn update_key192_column(position: usize, table: &DpTable) -> DpTable {
    let bound = table.bound();
    let previous = (position + KEY_WORDS - 1) % KEY_WORDS;

    par_fill(bound, |key, block| {
        let new = digit(key, position);
        let other = digit(key, previous);

        for old in 0..5u8 {
            if !triangle(old, other, new) {
                continue;
            }

            let source = key_block(table, with_digit(key, position, old));

            for (value, &s) in block.iter_mut().zip(source.iter()) {
                *value = min(*value, s);
            }
        }
    })
}

/// Charges the active bytes of the word at window position 5, which pass through S-boxes.
pub fn add_key_sbox_cost(table: &mut DpTable) {
    let bound = table.bound();

    for (i, value) in table.values_mut().iter_mut().enumerate() {
        let weight = digit(i / STATES, SBOX_POSITION);
        *value = min(value.saturating_add(weight), bound);
    }
}

/// The key schedule step of round `round`, including the key S-box cost.
pub fn key_schedule_stage(table: &DpTable, round: usize) -> DpTable {
    let mut words = aes192::refreshed_words(round);
    let mut output = match words.next() {
        Some(word) => update_key192_column(aes192::window_position(word), table),
        None => table.clone(),
    };

    for word in words {
        output = update_key192_column(aes192::window_position(word), &output);
    }

    if aes192::charges_key_sbox(round) {
        add_key_sbox_cost(&mut output);
    }

    output
}

/// MixColumns and round key addition of round `round`, one column at a time.
pub fn mix_columns_stage(table: &DpTable, round: usize) -> DpTable {
    let offset = aes192::key_offset(round);
    let mut output = update_mc_ark(table, 0, offset);

    for column in 1..COLUMNS {
        output = update_mc_ark(&output, column, (offset + column) % KEY_WORDS);
    }

    output
}

fn last_table(checkpoints: &[Checkpoint]) -> &DpTable {
    &checkpoints[checkpoints.len() - 1].table
}

/// Appends the three checkpoints of round `round`.
pub fn extend_round(checkpoints: &mut Vec<Checkpoint>, round: usize) {
    let table = update_sr(last_table(checkpoints));
    debug!(round, minimum = table.minimum(), "ShiftRows");
    checkpoints.push(Checkpoint { stage: Stage::ShiftRows(round), table });

    let table = key_schedule_stage(last_table(checkpoints), round);
    debug!(round, minimum = table.minimum(), "key schedule");
    checkpoints.push(Checkpoint { stage: Stage::KeySchedule(round), table });

    let table = mix_columns_stage(last_table(checkpoints), round);
    debug!(round, minimum = table.minimum(), "MixColumns");
    checkpoints.push(Checkpoint { stage: Stage::MixColumnsArk(round), table });
}

/**
Builds the checkpoints of an r-round characteristic, starting from the initial table.

rounds          Number of rounds.
bound           Saturation value of the tables.
intermediate    If given, the tables of every round prefix are tightened before the next round
                is added.
*/
pub fn build_tables(rounds: usize, bound: u8, intermediate: Option<&TightenOptions>) -> Vec<Checkpoint> {
    let mut checkpoints = vec![Checkpoint { stage: Stage::Initial, table: DpTable::initial(bound) }];

    for round in 1..rounds {
        match intermediate {
            Some(options) if round >= 2 => {
                let start = time::precise_time_s();
                let system = Aes192::new(round).linear_system();
                let report = tighten(&mut checkpoints, &system, round, options);

                println!("Tightened {} rounds: minimum {} ({} raised). [{} s]",
                    round, last_table(&checkpoints).minimum(), report.raised,
                    time::precise_time_s() - start);
            }
            _ => (),
        }

        let start = time::precise_time_s();
        extend_round(&mut checkpoints, round);
        println!("Round {}: minimum {}. [{} s]",
            round + 1, last_table(&checkpoints).minimum(), time::precise_time_s() - start);
    }

    checkpoints
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_space::KeyWeightClass;

    const BOUND: u8 = 12;

    /// A table that is at the bound everywhere except for the given entries.
    fn sparse_table(entries: &[(usize, u8)]) -> DpTable {
        let mut table = DpTable::filled(BOUND);

        for &(i, value) in entries {
            table.set(i, value);
        }

        table
    }

    #[test]
    fn mds_outputs_respect_branch_number() {
        for a in 0..5u8 {
            for b in mds_outputs(a) {
                assert!((a == 0 && b == 0) || a + b >= BRANCH_NUMBER);
            }
        }
    }

    #[test]
    fn shift_rows_sources_preserve_weight() {
        for code in 0..STATES {
            let class = StateWeightClass::decode(code);

            for &source in &shift_rows_sources(class, None) {
                assert_eq!(StateWeightClass::decode(source).total(), class.total());
            }
        }

        // A single active column spreads over four columns
        let single = StateWeightClass([4, 0, 0, 0]);
        assert_eq!(shift_rows_sources(single, None), vec![StateWeightClass([1, 1, 1, 1]).encode()]);
    }

    #[test]
    fn shift_rows_sources_respect_known_cells() {
        let mut grid = crate::trail::UNKNOWN_GRID;
        grid[0][0] = Activity::Active;

        // One active byte in column 0 after ShiftRows must be X[0][0] or a byte of another column
        let sources = shift_rows_sources(StateWeightClass([1, 0, 0, 0]), Some(&grid));
        assert_eq!(sources, vec![StateWeightClass([1, 0, 0, 0]).encode()]);

        grid[0][0] = Activity::Inactive;
        let sources = shift_rows_sources(StateWeightClass([1, 0, 0, 0]), Some(&grid));
        assert_eq!(sources.len(), 3);
    }

    #[test]
    fn shift_rows_is_fixed_point_on_weight_tables() {
        let table = DpTable::initial(BOUND);
        let output = update_sr(&table);
        assert_eq!(output.values(), table.values());
    }

    #[test]
    fn shift_rows_output_is_symmetric() {
        let entries: Vec<(usize, u8)> = (0..STATES).step_by(7)
                                                    .map(|s| (index(11, s), (s % BOUND as usize) as u8))
                                                    .collect();
        let output = update_sr(&sparse_table(&entries));

        for state in 0..STATES {
            let mut class = StateWeightClass::decode(state);
            let expected = output.get(index(11, state));
            class.0.rotate_left(1);
            assert_eq!(output.get(index(11, class.encode())), expected);
            class.0.swap(0, 2);
            assert_eq!(output.get(index(11, class.encode())), expected);
        }

        // Symmetrising again changes nothing
        let mut resymmetrised = output.clone();
        for (i, value) in resymmetrised.values_mut().iter_mut().enumerate() {
            let (key, state) = (i / STATES, i % STATES);
            *value = output.get(index(key, canonical(state)));
        }
        assert_eq!(resymmetrised.values(), output.values());
    }

    #[test]
    fn mix_columns_respects_branch_number() {
        let input = StateWeightClass([1, 0, 0, 0]).encode();
        let table = sparse_table(&[(index(0, input), 0)]);
        let output = update_mc_ark(&table, 0, 0);

        for state in 0..STATES {
            let value = output.get(index(0, state));

            if value < BOUND {
                assert_eq!(StateWeightClass::decode(state), StateWeightClass([4, 0, 0, 0]));
                assert_eq!(value, 4);
            }
        }
    }

    #[test]
    fn mix_columns_with_key_obeys_triangle() {
        // Key word of weight 2 at window position 3, zero input column
        let key = KeyWeightClass([0, 0, 0, 2, 0, 0]).encode();
        let table = sparse_table(&[(index(key, 0), 1)]);
        let output = update_mc_ark(&table, 2, 3);

        for state in 0..STATES {
            let value = output.get(index(key, state));
            let expected = if state == StateWeightClass([0, 0, 2, 0]).encode() { 3 } else { BOUND };
            assert_eq!(value, expected);
        }
    }

    #[test]
    fn key_column_obeys_triangle() {
        let key = KeyWeightClass([2, 0, 0, 0, 0, 1]).encode();
        let table = sparse_table(&[(index(key, 5), 3)]);
        let output = update_key192_column(0, &table);

        for new in 0..5u8 {
            let value = output.get(index(with_digit(key, 0, new), 5));
            let expected = if (1..=3).contains(&new) { 3 } else { BOUND };
            assert_eq!(value, expected);
        }
    }

    #[test]
    fn key_sbox_cost_uses_last_window_position() {
        let key = KeyWeightClass([1, 1, 1, 1, 1, 3]).encode();
        let mut table = sparse_table(&[(index(key, 0), 2), (index(1, 0), 11)]);
        add_key_sbox_cost(&mut table);

        assert_eq!(table.get(index(key, 0)), 5);
        assert_eq!(table.get(index(1, 0)), 11);
        assert_eq!(table.get(index(key, 1)), BOUND);
    }

    #[test]
    fn transitions_never_lower_the_minimum() {
        let table = DpTable::initial(BOUND);
        let minimum = table.minimum();

        assert!(update_sr(&table).minimum() >= minimum);
        assert!(key_schedule_stage(&table, 1).minimum() >= minimum);
        assert!(mix_columns_stage(&table, 1).minimum() >= minimum);
        assert!(mix_columns_stage(&table, 1).values().iter().all(|&v| v <= BOUND));
    }

    #[test]
    fn two_round_tables() {
        let checkpoints = build_tables(2, 5, None);
        let stages: Vec<Stage> = checkpoints.iter().map(|c| c.stage).collect();

        assert_eq!(stages, vec![Stage::Initial, Stage::ShiftRows(1),
                                Stage::KeySchedule(1), Stage::MixColumnsArk(1)]);

        // A difference in W_2 alone cancels out of both rounds
        let final_table = &checkpoints[3].table;
        let key = KeyWeightClass([0, 0, 1, 0, 0, 0]).encode();
        assert_eq!(final_table.get(index(key, 0)), 0);
        assert_eq!(final_table.minimum(), 0);
        assert_eq!(final_table.get(0), 5);
    }
}
