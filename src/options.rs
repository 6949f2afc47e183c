use structopt::StructOpt;

use crate::cipher::aes192;
use crate::error::BoundError;
use crate::search::tighten::TightenOptions;

#[derive(Clone, Debug, StructOpt)]
#[structopt(name = "aes192-bounds",
            about = "Lower bounds on the number of active S-boxes of related-key differential characteristics of AES-192.")]
pub struct BoundOptions {
    /**
    The number of rounds to analyse.
    */
    pub rounds: usize,

    #[structopt(short = "b", long = "bound")]
    /**
    Saturation value of the tables. Entries reaching it are treated as infeasible. Defaults to an estimate that grows with the number of rounds.
    */
    pub bound: Option<u8>,

    #[structopt(short = "e", long = "extra-levels", default_value = "0")]
    /**
    The number of levels past the certified minimum for which the final table is refined.
    */
    pub extra_levels: u8,

    #[structopt(short = "i", long = "intermediate")]
    /**
    Tighten the tables of every round prefix from two rounds on before the next round is added. Without it, only the final table is tightened and the tables of the prefixes keep their coarse bounds, which is weaker and can leave many more entries to search in the final table.
    */
    pub intermediate: bool,

    #[structopt(short = "t", long = "trail")]
    /**
    Print a characteristic reaching the certified bound.
    */
    pub trail: bool,
}

/**
A validated configuration of a run.

rounds          Number of rounds.
bound           Saturation value of the tables.
final_options   Options for tightening the final table.
intermediate    Options for tightening round prefixes, if enabled.
show_trail      Print a characteristic of the certified level.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub rounds: usize,
    pub bound: u8,
    pub final_options: TightenOptions,
    pub intermediate: Option<TightenOptions>,
    pub show_trail: bool,
}

impl BoundOptions {
    /// Checks the options and fills in defaults.
    pub fn config(&self) -> Result<Config, BoundError> {
        if self.rounds == 0 {
            return Err(BoundError::InvalidRounds);
        }

        let bound = match self.bound {
            Some(bound) if bound == 0 || bound == u8::MAX => return Err(BoundError::InvalidBound(bound)),
            Some(bound) => bound,
            None => aes192::default_bound(self.rounds),
        };

        Ok(Config {
            rounds: self.rounds,
            bound,
            final_options: TightenOptions {
                extra_levels: self.extra_levels,
                stop_at_first: true,
            },
            intermediate: if self.intermediate {
                Some(TightenOptions::intermediate())
            } else {
                None
            },
            show_trail: self.trail,
        })
    }
}
