// (c) Roel Kluin, 2023, GPL v3

use crate::encseq::{ReadMode, SequenceStore};
use crate::error::LtrError;
use crate::kmercode::{leading_code, KmerCodes, MAX_KMERSIZE};
use crate::new_types::twobit::is_base;
use crate::suffixsortspace::SuffixSortSpace;
use ahash::AHashMap;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Slot range [left, left + width) of the suffixes starting with one code.
#[derive(new, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub code: u64,
    pub left: u64,
    pub width: u64,
}

struct CodeEntry {
    code: u64,
    count: u64,
    left: u64,
    filled: u64,
}

/// Groups all k-mer positions into one bucket per distinct code. Buckets are
/// laid out in the order codes are first seen; leading codes of the sequences
/// come first.
pub struct CodeHasher {
    kmersize: usize,
    table: AHashMap<u64, usize>, // code => index in entries
    entries: Vec<CodeEntry>,
    eligible: usize,
}

/// Suffix positions grouped by k-mer code.
pub struct HashedSuffixes {
    pub kmersize: usize,
    pub buckets: Vec<Bucket>,
    pub suffixes: SuffixSortSpace,
    pub distinct_first_codes: usize,
    pub sequences_hashed: usize,
}

impl HashedSuffixes {
    /// Positions of a bucket, ascending.
    pub fn positions(&self, bucket: &Bucket) -> impl Iterator<Item = u64> + '_ {
        let left = bucket.left;
        (0..bucket.width).map(move |idx| self.suffixes.get(left, idx))
    }
}

impl CodeHasher {
    pub fn new(kmersize: usize) -> Result<Self> {
        if kmersize == 0 || kmersize > MAX_KMERSIZE {
            return Err(LtrError::InvalidConfig(format!(
                "k-mer size {} not in 1..={}",
                kmersize, MAX_KMERSIZE
            ))
            .into());
        }
        Ok(CodeHasher {
            kmersize,
            table: AHashMap::new(),
            entries: Vec::new(),
            eligible: 0,
        })
    }

    fn insert(&mut self, code: u64) -> Result<()> {
        if let Some(&rank) = self.table.get(&code) {
            self.entries[rank].count += 1;
            return Ok(());
        }
        let n = self.entries.len() as u64;
        self.table
            .try_reserve(1)
            .map_err(|_| LtrError::alloc("code set", n + 1))?;
        self.entries
            .try_reserve(1)
            .map_err(|_| LtrError::alloc("code set", n + 1))?;
        self.table.insert(code, self.entries.len());
        self.entries.push(CodeEntry {
            code,
            count: 1,
            left: 0,
            filled: 0,
        });
        Ok(())
    }

    fn is_eligible<S: SequenceStore + ?Sized>(&self, store: &S, seqnum: usize) -> bool {
        let start = store.seq_start(seqnum);
        store.seq_length(seqnum) >= self.kmersize as u64
            && (start..start + self.kmersize as u64)
                .all(|p| is_base(store.symbol(p, ReadMode::Forward)))
    }

    /// Insert the code at the start of every sequence. Sequences shorter than k
    /// or with a wildcard in the leading window have none. Returns the number of
    /// distinct leading codes.
    pub fn hash_first_codes<S: SequenceStore + ?Sized>(&mut self, store: &S) -> Result<usize> {
        self.eligible = 0;
        for seqnum in 0..store.num_of_sequences() {
            if self.is_eligible(store, seqnum) {
                self.eligible += 1;
            }
            if let Some(code) = leading_code(store, seqnum, self.kmersize) {
                self.insert(code)?;
            }
        }
        let inserted: u64 = self.entries.iter().map(|e| e.count).sum();
        if inserted != self.eligible as u64 {
            return Err(LtrError::InvariantViolation(format!(
                "{} leading codes for {} sequences",
                inserted, self.eligible
            ))
            .into());
        }
        let skipped = store.num_of_sequences() - self.eligible;
        if skipped > 0 {
            log::info!("{} sequences have no leading {}-mer", skipped, self.kmersize);
        }
        Ok(self.entries.len())
    }

    /// Count every other k-mer. Returns the total number of k-mers.
    pub fn hash_remaining_codes<S: SequenceStore + ?Sized>(&mut self, store: &S) -> Result<u64> {
        for seqnum in 0..store.num_of_sequences() {
            let start = store.seq_start(seqnum);
            for (pos, code) in KmerCodes::new(store, seqnum, self.kmersize) {
                if pos != start {
                    self.insert(code)?;
                }
            }
        }
        Ok(self.entries.iter().map(|e| e.count).sum())
    }

    /// Exclusive partial sums of the counts; returns their total.
    pub fn partial_sums(&mut self) -> u64 {
        let mut sum = 0;
        for e in self.entries.iter_mut() {
            e.left = sum;
            e.filled = 0;
            sum += e.count;
        }
        dbgf!(sum, "{}")
    }

    /// Write every k-mer position in the next free slot of its bucket. Positions
    /// must come in ascending order so that they ascend within each bucket.
    pub fn insert_positions<S: SequenceStore + ?Sized>(
        &mut self,
        store: &S,
        sss: &mut SuffixSortSpace,
    ) -> Result<()> {
        let mut last = None;
        for seqnum in 0..store.num_of_sequences() {
            for (pos, code) in KmerCodes::new(store, seqnum, self.kmersize) {
                dbg_assert!(last.map_or(true, |l| l < pos), "{} after {:?}", pos, last);
                last = Some(pos);
                let rank = *self.table.get(&code).ok_or_else(|| {
                    LtrError::InvariantViolation(format!("code {:#x} at {} was not hashed", code, pos))
                })?;
                let e = &mut self.entries[rank];
                if e.filled == e.count {
                    return Err(LtrError::InvariantViolation(format!(
                        "bucket of code {:#x} overflows at {}",
                        code, pos
                    ))
                    .into());
                }
                let slot = e.left + e.filled;
                e.filled += 1;
                sss.set_direct(slot, pos)?;
                if pos == 0 {
                    sss.update_longest(slot);
                }
            }
        }
        Ok(())
    }

    pub fn buckets(&self) -> Vec<Bucket> {
        self.entries
            .iter()
            .map(|e| Bucket::new(e.code, e.left, e.count))
            .collect()
    }

    pub fn num_of_codes(&self) -> usize {
        self.entries.len()
    }
}

/// All passes, with an in-memory suffix space.
pub fn bucket_suffixes<S: SequenceStore + ?Sized>(store: &S, kmersize: usize) -> Result<HashedSuffixes> {
    bucket_suffixes_with(store, kmersize, |n, maxvalue| SuffixSortSpace::new(n, maxvalue, true))
}

/// All passes; `alloc` creates the suffix space for the number of k-mers and
/// the maximum position + 1.
pub fn bucket_suffixes_with<S, F>(store: &S, kmersize: usize, alloc: F) -> Result<HashedSuffixes>
where
    S: SequenceStore + ?Sized,
    F: FnOnce(u64, u64) -> Result<SuffixSortSpace>,
{
    let mut hasher = CodeHasher::new(kmersize)?;
    let distinct_first_codes = hasher.hash_first_codes(store)?;
    log::info!(
        "{} distinct leading {}-mers in {} sequences",
        distinct_first_codes,
        kmersize,
        hasher.eligible
    );
    hasher.hash_remaining_codes(store)?;
    let total = hasher.partial_sums();
    log::info!("{} {}-mers in {} buckets", total, kmersize, hasher.num_of_codes());

    let mut suffixes = alloc(total, store.total_length())?;
    hasher.insert_positions(store, &mut suffixes)?;
    Ok(HashedSuffixes {
        kmersize,
        buckets: hasher.buckets(),
        suffixes,
        distinct_first_codes,
        sequences_hashed: hasher.eligible,
    })
}
