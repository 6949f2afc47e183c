//! Building, tightening and verifying the weight-class tables of AES-192.

pub mod inverse;
pub mod tighten;
pub mod transitions;
pub mod verifier;

use tracing::info;

use crate::cipher::aes192::Aes192;
use crate::options::Config;
use crate::search::tighten::{tighten, TighteningReport};
use crate::search::transitions::build_tables;
use crate::trail::TrailAssignment;

/**
The result of a run.

rounds      Number of rounds.
bound       Saturation value of the tables.
coarse      Minimum of the final table before tightening.
certified   The certified minimum number of active S-boxes. `None` if no characteristic
            exists below the bound.
trail       A characteristic with the certified number of active S-boxes.
*/
#[derive(Clone, Debug)]
pub struct BoundReport {
    pub rounds: usize,
    pub bound: u8,
    pub coarse: u8,
    pub certified: Option<u8>,
    pub trail: Option<TrailAssignment>,
}

/// Builds the tables of `config.rounds` rounds and certifies the minimum of the final one.
pub fn certify_bound(config: &Config) -> BoundReport {
    let start = time::precise_time_s();

    println!("Building tables for {} rounds (bound {}).", config.rounds, config.bound);
    let mut checkpoints = build_tables(config.rounds, config.bound, config.intermediate.as_ref());
    let coarse = checkpoints.last().map(|c| c.table.minimum()).unwrap_or(config.bound);
    println!("Tables built, minimum {}. [{} s]", coarse, time::precise_time_s() - start);

    let start = time::precise_time_s();
    let system = Aes192::new(config.rounds).linear_system();
    info!(rows = system.len(), columns = system.num_columns(), "linear system reduced");

    println!("Tightening the final table:");
    let TighteningReport { certified, trail, attempted, raised, nodes, .. } =
        tighten(&mut checkpoints, &system, config.rounds, &config.final_options);
    println!("Searched {} entries ({} nodes), raised {}. [{} s]",
        attempted, nodes, raised, time::precise_time_s() - start);

    BoundReport {
        rounds: config.rounds,
        bound: config.bound,
        coarse,
        certified,
        trail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::tighten::TightenOptions;

    #[test]
    fn two_round_report() {
        let config = Config {
            rounds: 2,
            bound: 5,
            final_options: TightenOptions::default(),
            intermediate: None,
            show_trail: true,
        };

        let report = certify_bound(&config);

        assert_eq!(report.coarse, 0);
        assert_eq!(report.certified, Some(0));
        assert_eq!(report.trail.map(|t| t.cost()), Some(0));
    }
}
