// (c) Roel Kluin, 2023, GPL v3

use crate::boundaries::{BoundaryAssembler, LtrBoundary};
use crate::codehasher::{bucket_suffixes, HashedSuffixes};
use crate::config::{LtrConfig, Motif, OverlapPolicy, ScoreConfig, TsdRange};
use crate::encseq::{EncodedSequence, SequenceStore};
use crate::index::{index_paths, load_index};
use crate::report::{write_report, write_tsv};
use crate::seeds::find_seeds;
use anyhow::{Context, Result};
use clap::Args;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct HarvestCmd {
    /// The sequences, fasta, optionally gzipped. An index next to it is used.
    #[arg(short = 'R', long, value_name = "FASTA", required = true)]
    ref_file: PathBuf,

    /// Length of the k-mers that define the buckets, if there is no index
    #[arg(short, long, default_value = "12")]
    kmersize: usize,

    /// Minimum length of a seed
    #[arg(long, default_value = "30")]
    seed: u64,

    /// Minimum similarity of the two LTRs, in percent
    #[arg(long, default_value = "85")]
    similar: f64,

    /// X-drop value for the extension of seeds
    #[arg(long, default_value = "5")]
    xdrop: i64,

    /// Match score
    #[arg(long, default_value = "2", allow_hyphen_values = true)]
    mat: i64,

    /// Mismatch score
    #[arg(long, default_value = "-2", allow_hyphen_values = true)]
    mis: i64,

    /// Insertion score
    #[arg(long, default_value = "-3", allow_hyphen_values = true)]
    ins: i64,

    /// Deletion score
    #[arg(long, default_value = "-3", allow_hyphen_values = true)]
    del: i64,

    /// Minimum and maximum LTR length
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], default_values_t = [100, 1000])]
    ltrlen: Vec<u64>,

    /// Minimum and maximum distance of the LTR starts
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], default_values_t = [1000, 15000])]
    distltr: Vec<u64>,

    /// Search target site duplications of this minimum and maximum length
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"])]
    tsd: Option<Vec<u64>>,

    /// Start and end dinucleotide of each LTR, e.g. tg ca
    #[arg(long, num_args = 2, value_names = ["START", "END"])]
    motif: Option<Vec<String>>,

    /// Allowed mismatches with the motif per LTR
    #[arg(long, default_value = "0")]
    motifmis: u32,

    /// Distance around the boundaries to search TSDs and motifs
    #[arg(long, default_value = "60")]
    vic: u64,

    /// Which overlapping predictions to keep
    #[arg(long, value_enum, default_value = "best")]
    overlaps: OverlapPolicy,

    /// Print the long form of the report
    #[arg(long)]
    longoutput: bool,

    /// Write the report here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// Also write the predictions as tab separated values
    #[arg(long, value_name = "FILE")]
    tsv: Option<PathBuf>,
}

impl HarvestCmd {
    fn config(&self) -> Result<LtrConfig> {
        let motif = match &self.motif {
            Some(m) => Some(Motif::new(&m[0], &m[1], self.motifmis)?),
            None => None,
        };
        let cfg = LtrConfig {
            kmersize: self.kmersize,
            minseedlength: self.seed,
            similaritythreshold: self.similar,
            xdropbelowscore: self.xdrop,
            scores: ScoreConfig::new(self.mat, self.mis, self.ins, self.del)?,
            minltrlength: self.ltrlen[0],
            maxltrlength: self.ltrlen[1],
            mindistance: self.distltr[0],
            maxdistance: self.distltr[1],
            motif,
            tsd: self.tsd.as_ref().map(|t| TsdRange::new(t[0], t[1])),
            vicinityforcorrectboundaries: self.vic,
            overlaps: self.overlaps,
            longoutput: self.longoutput,
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Seeds, extension, checks and overlap resolution over all sequences.
pub fn run_pipeline<S: SequenceStore + ?Sized>(
    store: &S,
    hashed: &HashedSuffixes,
    cfg: &LtrConfig,
) -> Result<Vec<LtrBoundary>> {
    cfg.validate()?;
    let seeds = find_seeds(store, hashed, cfg);
    let mut assembler = BoundaryAssembler::new(cfg);
    for seed in seeds.iter() {
        assembler.add_candidate(store, seed);
    }
    Ok(assembler.finish().to_vec())
}

pub fn harvest(cmd: HarvestCmd) -> Result<()> {
    let mut cfg = cmd.config()?;
    let sc = &cfg.scores;
    log::info!(
        "Scores {}/{}/{}/{}, penalty gcd {}, xdrop {}",
        sc.mat,
        sc.mis,
        sc.ins,
        sc.del,
        sc.gcd(),
        cfg.xdropbelowscore
    );
    let (lsi, suf) = index_paths(&cmd.ref_file);
    let (encseq, hashed) = if lsi.exists() && suf.exists() {
        let (encseq, hashed) = load_index(&lsi, &suf)?;
        if hashed.kmersize != cfg.kmersize {
            log::warn!("Using the k-mer size of the index, {}", hashed.kmersize);
            cfg.kmersize = hashed.kmersize;
            cfg.validate()?;
        }
        (encseq, hashed)
    } else {
        log::info!("No index for {:?}, bucketing in memory", cmd.ref_file);
        let encseq = EncodedSequence::from_file(&cmd.ref_file)?;
        let hashed = bucket_suffixes(&encseq, cfg.kmersize)?;
        (encseq, hashed)
    };

    let boundaries = run_pipeline(&encseq, &hashed, &cfg)?;

    match &cmd.out {
        Some(path) => {
            let mut out = BufWriter::new(File::create(path).with_context(|| format!("creating {:?}", path))?);
            write_report(&mut out, &encseq, &boundaries, &cfg)?;
            out.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            write_report(&mut out, &encseq, &boundaries, &cfg)?;
        }
    }
    if let Some(path) = &cmd.tsv {
        let out = File::create(path).with_context(|| format!("creating {:?}", path))?;
        write_tsv(BufWriter::new(out), &encseq, &boundaries)?;
    }
    Ok(())
}
