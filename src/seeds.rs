// (c) Roel Kluin, 2023, GPL v3

use crate::codehasher::HashedSuffixes;
use crate::config::LtrConfig;
use crate::encseq::{ReadMode, SequenceStore};
use crate::new_types::twobit::is_base;

/// Exact repeat of len symbols at pos1 and pos2, pos1 < pos2, in one sequence.
#[derive(new, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Seed {
    pub pos1: u64,
    pub pos2: u64,
    pub len: u64,
}

fn same_base<S: SequenceStore + ?Sized>(store: &S, p: u64, q: u64) -> bool {
    let a = store.symbol(p, ReadMode::Forward);
    a == store.symbol(q, ReadMode::Forward) && is_base(a)
}

/// Maximal exact repeats of at least minseedlength symbols whose copies start
/// mindistance to maxdistance apart. Each pair is found once, from the bucket
/// of its leftmost k-mer. Sorted by position.
pub fn find_seeds<S: SequenceStore + ?Sized>(store: &S, hashed: &HashedSuffixes, cfg: &LtrConfig) -> Vec<Seed> {
    let k = hashed.kmersize as u64;
    let mut seeds = Vec::new();
    let mut positions = Vec::new();
    for bucket in hashed.buckets.iter().filter(|b| b.width > 1) {
        positions.clear();
        positions.extend(hashed.positions(bucket));
        for (n, &p) in positions.iter().enumerate() {
            let seqnum = store.seqnum_of(p);
            let end = store.seq_end(seqnum);
            for &q in positions[n + 1..].iter() {
                let dist = q - p;
                if dist > cfg.maxdistance || q >= end {
                    break;
                }
                if dist < cfg.mindistance {
                    continue;
                }
                if p > 0 && same_base(store, p - 1, q - 1) {
                    continue; // not left maximal
                }
                let mut len = k;
                while len < dist && q + len < end && same_base(store, p + len, q + len) {
                    len += 1;
                }
                if len >= cfg.minseedlength {
                    seeds.push(Seed::new(p, q, len));
                }
            }
        }
    }
    seeds.sort_unstable();
    log::info!("{} seeds of at least {} symbols", seeds.len(), cfg.minseedlength);
    seeds
}
