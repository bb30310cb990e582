// (c) Roel Kluin, 2023, GPL v3

use crate::codehasher::{bucket_suffixes, Bucket, HashedSuffixes};
use crate::encseq::{EncodedSequence, SequenceStore};
use crate::kmercode::leading_code;
use crate::suffixsortspace::{SlotWidth, SuffixSortSpace};
use anyhow::{anyhow, ensure, Context, Result};
use bincode::{deserialize_from, serialize_into};
use clap::Args;
use flate2::read::MultiGzDecoder;
use itertools::Itertools;
use noodles_fasta as fasta;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct IndexCmd {
    /// The reference sequences, fasta, optionally gzipped
    #[arg(short = 'R', long, value_name = "FASTA", required = true)]
    ref_file: PathBuf,

    /// Length of the k-mers that define the buckets
    #[arg(short, long, default_value = "12")]
    kmersize: usize,

    /// Only print statistics, do not write the index
    #[arg(short = 'N', long)]
    stats_only: bool,
}

/// Everything of an index but the suffix table.
#[derive(Serialize, Deserialize)]
pub struct IndexHeader {
    pub kmersize: usize,
    pub numofentries: u64,
    pub maxvalue: u64,
    pub useuint: bool,
    pub distinct_first_codes: usize,
    pub sequences_hashed: usize,
    pub buckets: Vec<Bucket>,
    pub encseq: EncodedSequence,
}

pub fn parse_fasta_file<P: AsRef<Path>>(fa: P) -> Result<fasta::Reader<Box<dyn BufRead>>> {
    let fa = fa.as_ref();
    let file = File::open(fa).map_err(|e| anyhow!("Error opening {:?}: {}", fa, e))?;
    let inner: Box<dyn Read> = if fa.extension().map_or(false, |e| e == "gz") {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(fasta::Reader::new(Box::new(BufReader::new(inner))))
}

fn with_suffix(fa: &Path, suffix: &str) -> PathBuf {
    let mut s = OsString::from(fa.as_os_str());
    s.push(suffix);
    PathBuf::from(s)
}

/// Header and suffix table paths next to a fasta file.
pub fn index_paths(fa: &Path) -> (PathBuf, PathBuf) {
    (with_suffix(fa, ".lsi"), with_suffix(fa, ".suf"))
}

/// Write the suffix table and then the header with the sequences.
pub fn write_index(encseq: EncodedSequence, hashed: HashedSuffixes, lsi: &Path, suf: &Path) -> Result<()> {
    let numofentries = hashed.suffixes.len();
    let maxvalue = hashed.suffixes.maxvalue();
    let mut out = BufWriter::new(File::create(suf).with_context(|| format!("creating {:?}", suf))?);
    hashed.suffixes.to_file(&mut out, numofentries)?;
    out.flush()?;
    let has_longest = leading_code(&encseq, 0, hashed.kmersize).is_some();
    hashed.suffixes.close(has_longest)?;

    let header = IndexHeader {
        kmersize: hashed.kmersize,
        numofentries,
        maxvalue,
        useuint: true,
        distinct_first_codes: hashed.distinct_first_codes,
        sequences_hashed: hashed.sequences_hashed,
        buckets: hashed.buckets,
        encseq,
    };
    let mut out = BufWriter::new(File::create(lsi).with_context(|| format!("creating {:?}", lsi))?);
    serialize_into(&mut out, &header)?;
    out.flush()?;
    Ok(())
}

/// Read an index written by write_index; the suffix table is mapped read only,
/// so any number of harvests may share one index.
pub fn load_index(lsi: &Path, suf: &Path) -> Result<(EncodedSequence, HashedSuffixes)> {
    let input = BufReader::new(File::open(lsi).with_context(|| format!("opening {:?}", lsi))?);
    let header: IndexHeader = deserialize_from(input).with_context(|| format!("reading {:?}", lsi))?;
    header.encseq.check()?;
    ensure!(
        header.maxvalue == header.encseq.total_length(),
        "{:?} does not match its sequences",
        lsi
    );
    let file = File::open(suf).with_context(|| format!("opening {:?}", suf))?;
    let width = SlotWidth::for_maxvalue(header.maxvalue, header.useuint);
    let expect = header.numofentries * width.bytes() as u64;
    ensure!(
        file.metadata()?.len() == expect,
        "{:?} should have {} bytes",
        suf,
        expect
    );
    let suffixes =
        SuffixSortSpace::from_file_readonly(&file, header.numofentries, header.maxvalue, header.useuint)?;
    log::info!("Loaded {} suffixes of {}-mers from {:?}", header.numofentries, header.kmersize, suf);
    Ok((
        header.encseq,
        HashedSuffixes {
            kmersize: header.kmersize,
            buckets: header.buckets,
            suffixes,
            distinct_first_codes: header.distinct_first_codes,
            sequences_hashed: header.sequences_hashed,
        },
    ))
}

pub fn index(cmd: IndexCmd) -> Result<()> {
    let (lsi, suf) = index_paths(&cmd.ref_file);
    log::info!("Reading {:?}", cmd.ref_file);
    let encseq = EncodedSequence::from_file(&cmd.ref_file)?;
    if !cmd.stats_only {
        ensure!(!lsi.exists(), "{lsi:?} already exists!");
        ensure!(!suf.exists(), "{suf:?} already exists!");
    }
    let hashed = bucket_suffixes(&encseq, cmd.kmersize)?;
    make_stats(&encseq, &hashed);

    if !cmd.stats_only {
        log::info!("Writing {:?} and {:?}", lsi, suf);
        write_index(encseq, hashed, &lsi, &suf)?;
    }
    Ok(())
}

fn make_stats(encseq: &EncodedSequence, hashed: &HashedSuffixes) {
    let total = hashed.suffixes.len();
    println!(
        "{} sequences, {} with a leading {}-mer, {} distinct",
        encseq.num_of_sequences(),
        hashed.sequences_hashed,
        hashed.kmersize,
        hashed.distinct_first_codes
    );
    println!(
        "{} {}-mers of {} positions\t{:.2}%",
        total,
        hashed.kmersize,
        encseq.total_length(),
        100.0 * total as f64 / encseq.total_length().max(1) as f64
    );
    let singletons = hashed.buckets.iter().filter(|b| b.width == 1).count();
    println!(
        "{} buckets, {} with a single suffix\t{:.2}%",
        hashed.buckets.len(),
        singletons,
        100.0 * singletons as f64 / hashed.buckets.len().max(1) as f64
    );
    let counts = hashed.buckets.iter().map(|b| b.width).counts();
    let mut count_vec: Vec<(&u64, &usize)> = counts.iter().collect();
    count_vec.sort_by(|a, b| b.0.cmp(a.0));
    println!("widest buckets: width and count (top 20 at most)");
    for cv in count_vec.iter().take(20) {
        println!("{}\t{}", cv.0, cv.1);
    }
    println!("..");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encseq::tests::encseq_of;

    #[test]
    fn write_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let fa = dir.path().join("genome.fa");
        let (lsi, suf) = index_paths(&fa);
        assert_eq!(lsi, dir.path().join("genome.fa.lsi"));

        let es = encseq_of(&["ACGTACGTTGCA", "NNACGTAC", "GGGGTTTT"]);
        let hashed = bucket_suffixes(&es, 3).unwrap();
        let buckets = hashed.buckets.clone();
        let positions: Vec<Vec<u64>> = buckets.iter().map(|b| hashed.positions(b).collect()).collect();
        write_index(es, hashed, &lsi, &suf).unwrap();

        let (es, loaded) = load_index(&lsi, &suf).unwrap();
        assert_eq!(es.num_of_sequences(), 3);
        assert_eq!(es.chars(0, 4), "ACGT");
        assert_eq!(loaded.buckets, buckets);
        assert!(loaded.suffixes.is_mapped() && loaded.suffixes.is_readonly());
        let again: Vec<Vec<u64>> = buckets.iter().map(|b| loaded.positions(b).collect()).collect();
        assert_eq!(again, positions);
        assert_eq!(loaded.sequences_hashed, 2);
    }

    #[test]
    fn readonly_index_loads() {
        let dir = tempfile::tempdir().unwrap();
        let fa = dir.path().join("ro.fa");
        let (lsi, suf) = index_paths(&fa);
        let es = encseq_of(&["ACGTACGTTGCAAGT", "GGATCC"]);
        let hashed = bucket_suffixes(&es, 4).unwrap();
        let buckets = hashed.buckets.clone();
        write_index(es, hashed, &lsi, &suf).unwrap();
        for path in [&lsi, &suf] {
            let mut perms = std::fs::metadata(path).unwrap().permissions();
            perms.set_readonly(true);
            std::fs::set_permissions(path, perms).unwrap();
        }

        let (es, first) = load_index(&lsi, &suf).unwrap();
        let (_, second) = load_index(&lsi, &suf).unwrap();
        assert_eq!(es.num_of_sequences(), 2);
        assert_eq!(first.buckets, buckets);
        for b in buckets.iter() {
            assert_eq!(first.positions(b).collect::<Vec<_>>(), second.positions(b).collect::<Vec<_>>());
        }
        assert_eq!(std::fs::metadata(&suf).unwrap().len(), first.suffixes.len() * 4);
    }

    #[test]
    fn truncated_table_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let fa = dir.path().join("x.fa");
        let (lsi, suf) = index_paths(&fa);
        let es = encseq_of(&["ACGTACGTTGCA"]);
        let hashed = bucket_suffixes(&es, 3).unwrap();
        write_index(es, hashed, &lsi, &suf).unwrap();
        std::fs::OpenOptions::new().write(true).open(&suf).unwrap().set_len(4).unwrap();
        assert!(load_index(&lsi, &suf).is_err());
    }
}
