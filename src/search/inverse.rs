//! Backward enumeration of the predecessors of a table entry. Each enumerator mirrors one of
//! the forward transitions and only returns predecessors whose lower bound fits the remaining
//! budget.

use itertools::Itertools;
use smallvec::SmallVec;

use crate::cipher::aes192::{self, COLUMNS, KEY_WORDS};
use crate::search::transitions::{mc_ark_admissible, shift_rows_sources, triangle};
use crate::state_space::{digit, index, split, DpTable, KeyWeightClass, StateWeightClass};
use crate::trail::Grid;

/**
Returns the entries before ShiftRows that lead to `target`, restricted to byte patterns that
agree with the known cells of the state.

table       Table before ShiftRows.
budget      Largest admissible value of a predecessor.
target      Entry after ShiftRows.
fixed       Known cells of the state before ShiftRows.
*/
pub fn inv_update_sr(table: &DpTable, budget: u8, target: usize, fixed: &Grid) -> Vec<usize> {
    let (key, state) = split(target);

    shift_rows_sources(StateWeightClass::decode(state), Some(fixed))
        .into_iter()
        .map(|source| index(key, source))
        .filter(|&i| table.get(i) <= budget)
        .collect()
}

/**
Returns the entries before MixColumns and the round key addition that lead to `target`.

table       Table before MixColumns.
key_offset  Window position of the key word added to column 0.
budget      Largest admissible value of a predecessor.
target      Entry after the round key addition.
*/
pub fn inv_update_mc_ark(table: &DpTable, key_offset: usize, budget: u8, target: usize) -> Vec<usize> {
    let (key, state) = split(target);

    let inputs: Vec<SmallVec<[u8; 5]>> = (0..COLUMNS)
        .map(|c| {
            let x = digit(state, c);
            let k = digit(key, (key_offset + c) % KEY_WORDS);
            (0..5u8).filter(|&a| mc_ark_admissible(a, k, x)).collect()
        })
        .collect();

    inputs.iter()
          .map(|column| column.iter().cloned())
          .multi_cartesian_product()
          .map(|weights| index(key, weights.iter().rev().fold(0, |acc, &w| acc * 5 + w as usize)))
          .filter(|&i| table.get(i) <= budget)
          .collect()
}

/**
Returns the key codes before a single key recurrence step at window `position`.

position    Window position of the updated word.
key         Key code after the step.
*/
pub fn inv_update_key192_column(position: usize, key: usize) -> SmallVec<[usize; 5]> {
    let previous = (position + KEY_WORDS - 1) % KEY_WORDS;
    let window = KeyWeightClass::decode(key);
    let (new, other) = (window.0[position], window.0[previous]);

    (0..5u8).filter(|&old| triangle(old, other, new))
            .map(|old| {
                let mut before = window;
                before.0[position] = old;
                before.encode()
            })
            .collect()
}

/**
Returns the entries before the key schedule step of round `round` that lead to `target`. The
words introduced in the step are undone from the last one backwards.

table       Table before the key schedule step.
round       The round whose key is produced.
budget      Largest admissible value of a predecessor.
target      Entry after the key schedule step.
*/
pub fn inv_update_key192(table: &DpTable, round: usize, budget: u8, target: usize) -> Vec<usize> {
    let (key, state) = split(target);
    let mut keys = vec![key];

    for word in aes192::refreshed_words(round).rev() {
        let position = aes192::window_position(word);
        keys = keys.into_iter()
                   .flat_map(|k| inv_update_key192_column(position, k))
                   .collect();
    }

    keys.sort_unstable();
    keys.dedup();

    keys.into_iter()
        .map(|k| index(k, state))
        .filter(|&i| table.get(i) <= budget)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::transitions::{key_schedule_stage, mix_columns_stage, update_sr};
    use crate::state_space::TABLE_SIZE;
    use crate::trail::UNKNOWN_GRID;

    const BOUND: u8 = 9;

    /// A table with some structure in both the key and the state.
    fn scrambled_table() -> DpTable {
        let mut table = DpTable::initial(BOUND);

        for i in (0..TABLE_SIZE).step_by(13) {
            table.raise(i);
        }

        for i in (0..TABLE_SIZE).step_by(29) {
            table.raise(i);
        }

        table
    }

    fn targets() -> impl Iterator<Item = usize> {
        (0..TABLE_SIZE).step_by(4099)
    }

    #[test]
    fn shift_rows_inverse_matches_forward() {
        let table = scrambled_table();
        let forward = update_sr(&table);

        for target in targets() {
            let best = inv_update_sr(&table, BOUND, target, &UNKNOWN_GRID)
                .into_iter()
                .map(|i| table.get(i))
                .min()
                .unwrap_or(BOUND);

            assert_eq!(forward.get(target), best);
        }
    }

    #[test]
    fn mix_columns_inverse_matches_forward() {
        let table = scrambled_table();

        for round in 1..4 {
            let forward = mix_columns_stage(&table, round);

            for target in targets() {
                let (_, state) = split(target);
                let weight = StateWeightClass::decode(state).total();
                let best = inv_update_mc_ark(&table, aes192::key_offset(round), BOUND, target)
                    .into_iter()
                    .map(|i| table.get(i).saturating_add(weight))
                    .min()
                    .unwrap_or(BOUND);

                assert_eq!(forward.get(target), std::cmp::min(best, BOUND));
            }
        }
    }

    #[test]
    fn key_schedule_inverse_matches_forward() {
        let table = scrambled_table();

        for round in 1..4 {
            let forward = key_schedule_stage(&table, round);

            for target in targets() {
                let (key, _) = split(target);
                let charge = if aes192::charges_key_sbox(round) {
                    digit(key, aes192::SBOX_POSITION)
                } else {
                    0
                };

                let best = inv_update_key192(&table, round, BOUND, target)
                    .into_iter()
                    .map(|i| table.get(i).saturating_add(charge))
                    .min()
                    .unwrap_or(BOUND);

                assert_eq!(forward.get(target), std::cmp::min(best, BOUND));
            }
        }
    }

    #[test]
    fn budget_filters_predecessors() {
        let table = DpTable::initial(BOUND);
        let target = index(KeyWeightClass([1, 0, 0, 0, 0, 0]).encode(),
                           StateWeightClass([4, 0, 0, 0]).encode());

        // SR column weights [4,0,0,0] come from one byte in each column
        assert!(inv_update_sr(&table, 3, target, &UNKNOWN_GRID).is_empty());
        assert_eq!(inv_update_sr(&table, 4, target, &UNKNOWN_GRID).len(), 1);
    }

    #[test]
    fn key_column_inverse_obeys_triangle() {
        let key = KeyWeightClass([0, 2, 3, 0, 0, 0]).encode();
        let predecessors = inv_update_key192_column(2, key);
        let olds: Vec<u8> = predecessors.iter().map(|&k| digit(k, 2)).collect();

        assert_eq!(olds, vec![1, 2, 3, 4]);
        assert!(predecessors.iter().all(|&k| digit(k, 1) == 2));
        assert!(predecessors.iter().all(|&k| digit(k, 0) == 0 && digit(k, 3) == 0));
    }
}
