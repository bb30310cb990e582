// (c) Roel Kluin, 2023, GPL v3

use crate::index::parse_fasta_file;
use crate::new_types::twobit::{byte_pos, is_base, symbol_char, TwoBit, TwoBitx4, SEPARATOR, WILDCARD};
use anyhow::{anyhow, ensure, Context, Result};
use bitvec::prelude::*;
use noodles_fasta as fasta;
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::Path;

/// How positions are read from a store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadMode {
    Forward,
    Reverse,
    Complement,
    ReverseComplement,
}

/// A collection of sequences concatenated with one separator symbol between
/// consecutive sequences. Positions are global over the concatenation.
pub trait SequenceStore {
    fn total_length(&self) -> u64;
    fn num_of_sequences(&self) -> usize;
    /// twobit code, WILDCARD or SEPARATOR at pos (after applying the read mode)
    fn symbol(&self, pos: u64, mode: ReadMode) -> u8;
    /// ascending positions of the separators, one less than there are sequences
    fn separator_positions(&self) -> &[u64];

    fn seq_start(&self, seqnum: usize) -> u64 {
        if seqnum == 0 {
            0
        } else {
            self.separator_positions()[seqnum - 1] + 1
        }
    }
    /// exclusive
    fn seq_end(&self, seqnum: usize) -> u64 {
        self.separator_positions()
            .get(seqnum)
            .copied()
            .unwrap_or_else(|| self.total_length())
    }
    fn seq_length(&self, seqnum: usize) -> u64 {
        self.seq_end(seqnum) - self.seq_start(seqnum)
    }
    /// sequence number for a global position
    fn seqnum_of(&self, pos: u64) -> usize {
        self.separator_positions().partition_point(|&sep| sep < pos)
    }
    /// (sequence number, offset within that sequence)
    fn local_position(&self, pos: u64) -> (usize, u64) {
        let seqnum = self.seqnum_of(pos);
        (seqnum, pos - self.seq_start(seqnum))
    }
}

fn apply_mode(symbol: u8, complement: bool) -> u8 {
    if complement && is_base(symbol) {
        TwoBit::new(symbol).complement().as_u8()
    } else {
        symbol
    }
}

/// Sequence collection with 4 twobits per byte. Wildcards and separators are
/// flagged in a bit vector; their twobit slot stays 0.
#[derive(Serialize, Deserialize, Default)]
pub struct EncodedSequence {
    total_length: u64,
    b2: Vec<u8>,
    special: BitVec,
    separators: Vec<u64>,
    names: Vec<String>,
}

impl EncodedSequence {
    pub fn new() -> Self {
        EncodedSequence::default()
    }

    /// Append a sequence given as ascii; a separator is inserted before every
    /// sequence but the first.
    pub fn push_sequence(&mut self, name: &str, seq: &[u8]) {
        if !self.names.is_empty() {
            self.separators.push(self.total_length);
            self.push_symbol(None);
        }
        self.names.push(name.to_string());
        self.b2.reserve(seq.len() / 4 + 1);
        self.special.reserve(seq.len());
        for &b in seq {
            self.push_symbol(TwoBit::from_ascii(b));
        }
    }

    fn push_symbol(&mut self, b2: Option<TwoBit>) {
        let pos = self.total_length;
        if byte_pos(pos) == self.b2.len() {
            self.b2.push(0);
        }
        match b2 {
            Some(b2) => {
                self.b2[byte_pos(pos)] |= b2.pos_shift(pos).as_u8();
                self.special.push(false);
            }
            None => self.special.push(true),
        }
        self.total_length += 1;
    }

    pub fn from_fasta<T: BufRead>(mut fa: fasta::Reader<T>) -> Result<Self> {
        let mut encseq = EncodedSequence::new();
        for res in fa.records() {
            let record = res?;
            dbg_print!("Encoding record {}.", record.name());
            encseq.push_sequence(record.name(), record.sequence().as_ref());
        }
        ensure!(encseq.num_of_sequences() > 0, "no sequences in input");
        Ok(encseq)
    }

    /// Read a fasta file, gzipped if the name ends with .gz.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        EncodedSequence::from_fasta(parse_fasta_file(path)?)
            .with_context(|| format!("Error reading {:?}", path))
    }

    pub fn name(&self, seqnum: usize) -> &str {
        &self.names[seqnum]
    }

    /// Printable characters for [start, end).
    pub fn chars(&self, start: u64, end: u64) -> String {
        (start..end)
            .map(|p| symbol_char(self.symbol(p, ReadMode::Forward)))
            .collect()
    }

    fn forward_symbol(&self, pos: u64) -> u8 {
        if self.special[pos as usize] {
            if self.separators.binary_search(&pos).is_ok() {
                SEPARATOR
            } else {
                WILDCARD
            }
        } else {
            TwoBitx4::from(&self.b2[byte_pos(pos)]).to_b2(pos).as_u8()
        }
    }

    /// Checks after deserialization: sizes of the packed data must agree.
    pub fn check(&self) -> Result<()> {
        ensure!(
            self.special.len() as u64 == self.total_length,
            "special mask covers {} of {} positions",
            self.special.len(),
            self.total_length
        );
        ensure!(self.b2.len() as u64 >= (self.total_length + 3) / 4);
        ensure!(self.names.len() == self.separators.len() + 1 || self.total_length == 0);
        self.separators
            .iter()
            .find(|&&p| p >= self.total_length)
            .map_or(Ok(()), |p| Err(anyhow!("separator {} past end", p)))
    }
}

impl SequenceStore for EncodedSequence {
    fn total_length(&self) -> u64 {
        self.total_length
    }
    fn num_of_sequences(&self) -> usize {
        self.names.len()
    }
    fn symbol(&self, pos: u64, mode: ReadMode) -> u8 {
        dbg_assert!(pos < self.total_length, "{} past {}", pos, self.total_length);
        match mode {
            ReadMode::Forward => self.forward_symbol(pos),
            ReadMode::Complement => apply_mode(self.forward_symbol(pos), true),
            ReadMode::Reverse => self.forward_symbol(self.total_length - 1 - pos),
            ReadMode::ReverseComplement => {
                apply_mode(self.forward_symbol(self.total_length - 1 - pos), true)
            }
        }
    }
    fn separator_positions(&self) -> &[u64] {
        &self.separators
    }
}
