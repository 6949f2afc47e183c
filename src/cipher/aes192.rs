use std::ops::Range;

use crate::cipher::MIX_COLUMNS;
use crate::linear::{LinearSystem, Literal, Phase, Relation};

/*****************************************************************
                            AES-192
******************************************************************/

/// Number of 32-bit words in the master key, which is also the period of the key schedule.
pub const KEY_WORDS: usize = 6;

/// Number of columns (and words) in the state and in a round key.
pub const COLUMNS: usize = 4;

/// Window position of the word whose S-box is charged to the round that contains it.
pub const SBOX_POSITION: usize = 5;

/// Round and column of key word `W_word`.
pub fn word_location(word: usize) -> (usize, usize) {
    (word / COLUMNS, word % COLUMNS)
}

/// Position of key word `W_word` in the key-schedule window.
pub fn window_position(word: usize) -> usize {
    word % KEY_WORDS
}

/// Window position of the first word of round key `K_round`.
pub fn key_offset(round: usize) -> usize {
    (COLUMNS * round) % KEY_WORDS
}

/// True if `W_word` is computed through `SubWord(RotWord(W_{word-1}))`.
pub fn uses_sbox(word: usize) -> bool {
    word >= KEY_WORDS && word % KEY_WORDS == 0
}

/**
Returns true if the key-schedule S-boxes of the word at window position 5 are counted in round
`round`. This is the case when `K_round` contains such a word.
*/
pub fn charges_key_sbox(round: usize) -> bool {
    round >= 1 && key_offset(round) >= 2
}

/**
Key words introduced by the key-schedule step of round `round`. The first step only adds
`W_6` and `W_7`, since `K_1` overlaps the master key.
*/
pub fn refreshed_words(round: usize) -> Range<usize> {
    if round <= 1 {
        KEY_WORDS..(KEY_WORDS + 2)
    } else {
        (COLUMNS * round)..(COLUMNS * (round + 1))
    }
}

/**
Key words held by the window after the key-schedule step of round `round`, indexed by window
position. Round 0 is the master key.
*/
pub fn window_words(round: usize) -> [usize; KEY_WORDS] {
    let last = std::cmp::max(KEY_WORDS - 1, COLUMNS * round + COLUMNS - 1);
    let mut words = [0; KEY_WORDS];

    for (p, word) in words.iter_mut().enumerate() {
        *word = last - (last - p) % KEY_WORDS;
    }

    words
}

/// Literal of byte `row` of key word `W_word`.
pub fn key_word_literal(word: usize, row: usize) -> Literal {
    let (round, column) = word_location(word);
    Literal::key(round, row, column)
}

/**
Default bound on the number of active S-boxes, used as the table sentinel. It is a loose
estimate of the growth of the optimal characteristics per round.
*/
pub fn default_bound(rounds: usize) -> u8 {
    let bound: usize = (0..rounds)
        .map(|r| match r % 4 {
            0 => 1,
            3 => 16,
            _ => 4,
        })
        .sum();

    std::cmp::min(bound, 254) as u8
}

/**
A structure describing `rounds` rounds of AES-192 at the byte level.

rounds      Number of rounds. The last round has no MixColumns.
*/
#[derive(Clone, Copy, Debug)]
pub struct Aes192 {
    pub rounds: usize,
}

impl Aes192 {
    pub fn new(rounds: usize) -> Aes192 {
        Aes192 { rounds }
    }

    /**
    Returns the byte-level linear relations of the cipher over GF(2^8), covering the plaintext
    whitening, every round function, the ciphertext and the key schedule.
    */
    pub fn equations(&self) -> Vec<Relation> {
        let rounds = self.rounds;
        let mut relations = vec![];

        // X_0 = P + K_0
        for row in 0..4 {
            for column in 0..COLUMNS {
                relations.push(Relation::new().with(Literal::plaintext(row, column), 1)
                                              .with(Literal::key(0, row, column), 1)
                                              .with(Literal::state(0, row, column), 1));
            }
        }

        // X_{r+1} = MC(SR(S(X_r))) + K_{r+1}
        for round in 0..rounds.saturating_sub(1) {
            for column in 0..COLUMNS {
                for row in 0..4 {
                    let mut relation = Relation::new().with(Literal::state(round + 1, row, column), 1)
                                                      .with(Literal::key(round + 1, row, column), 1);

                    for (j, &coef) in MIX_COLUMNS[row].iter().enumerate() {
                        let source = Literal::state(round, j, (column + j) % COLUMNS).output();
                        relation = relation.with(source, coef);
                    }

                    relations.push(relation);
                }
            }
        }

        // C = SR(S(X_{R-1})) + K_R
        if rounds > 0 {
            for row in 0..4 {
                for column in 0..COLUMNS {
                    let source = Literal::state(rounds - 1, row, (column + row) % COLUMNS).output();
                    relations.push(Relation::new().with(Literal::ciphertext(row, column), 1)
                                                  .with(Literal::key(rounds, row, column), 1)
                                                  .with(source, 1));
                }
            }
        }

        for word in KEY_WORDS..(COLUMNS * (rounds + 1)) {
            for row in 0..4 {
                let previous = if uses_sbox(word) {
                    key_word_literal(word - 1, (row + 1) % 4).output()
                } else {
                    key_word_literal(word - 1, row)
                };

                relations.push(Relation::new().with(key_word_literal(word, row), 1)
                                              .with(key_word_literal(word - KEY_WORDS, row), 1)
                                              .with(previous, 1));
            }
        }

        relations
    }

    /// True for literals that are removed before the search: plaintext, ciphertext and `K_R`.
    pub fn is_boundary(&self, literal: Literal) -> bool {
        match literal.phase {
            Phase::Plaintext | Phase::Ciphertext => true,
            Phase::Key => literal.round as usize == self.rounds,
            Phase::State => false,
        }
    }

    /**
    Builds the linear system used by the search. The boundary literals are pivoted out and the
    rows defining them are dropped, leaving only relations between the inner states and round
    keys.
    */
    pub fn linear_system(&self) -> LinearSystem {
        let relations = self.equations();
        let mut system = LinearSystem::from_relations(&relations);

        let mut boundary: Vec<Literal> = system.literals()
                                               .filter(|&l| self.is_boundary(l))
                                               .collect();
        boundary.sort();

        let n = system.eliminate(boundary);
        system.extract(n)
    }
}
