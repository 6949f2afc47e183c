#[macro_use] extern crate lazy_static;

mod cipher;
mod error;
mod linear;
mod options;
mod search;
mod state_space;
mod trail;
mod utility;

use std::process;
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

use error::BoundError;
use options::BoundOptions;

fn run(options: BoundOptions) -> Result<(), BoundError> {
    let config = options.config()?;
    let report = search::certify_bound(&config);

    match report.certified {
        Some(bound) => {
            println!("{} rounds: at least {} active S-boxes (coarse bound {}).",
                report.rounds, bound, report.coarse);
        }
        None => {
            println!("{} rounds: at least {} active S-boxes (table bound reached).",
                report.rounds, report.bound);
        }
    }

    if config.show_trail {
        if let Some(trail) = &report.trail {
            println!("{}", trail);
        }
    }

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run(BoundOptions::from_args()) {
        eprintln!("error: {}", error);
        process::exit(1);
    }
}
