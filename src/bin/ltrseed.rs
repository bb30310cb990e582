// (c) Roel Kluin, 2023, GPL v3

extern crate clap;
extern crate ltrseed;

// target/release/ltrseed index -R genome.fa -k 12
// target/release/ltrseed -d harvest -R genome.fa --tsd 4 20 --motif tg ca --longoutput

use anyhow::Result;
use clap::{Parser, Subcommand};
use ltrseed::harvest;
use ltrseed::index;
use ltrseed::logging::init_logger;

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bucket the suffixes of a fasta file and write them next to it
    Index(index::IndexCmd),

    /// Predict LTR retrotransposons
    Harvest(harvest::HarvestCmd),
}

/// Find LTR retrotransposons from repeated seeds
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Ltrseed {
    /// Turn debugging information on
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

fn main() -> Result<()> {
    let ltrseed = Ltrseed::parse();
    init_logger(ltrseed.debug);

    match ltrseed.command {
        Some(Commands::Index(index_cmd)) => index::index(index_cmd),
        Some(Commands::Harvest(harvest_cmd)) => harvest::harvest(harvest_cmd),
        None => Ok(()),
    }
}
