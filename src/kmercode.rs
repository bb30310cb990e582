// (c) Roel Kluin, 2023, GPL v3

use crate::encseq::{ReadMode, SequenceStore};
use crate::new_types::twobit::is_base;

/// Largest k for which a code fits in u64.
pub const MAX_KMERSIZE: usize = 32;

/// Codes of all k-mer windows of one sequence, in ascending position order.
/// Windows containing a wildcard yield no code.
pub struct KmerCodes<'a, S: ?Sized> {
    store: &'a S,
    kmersize: u64,
    mask: u64,
    pos: u64,
    end: u64,
    code: u64,
    valid: u64, // number of consecutive bases ending before pos
}

impl<'a, S: SequenceStore + ?Sized> KmerCodes<'a, S> {
    pub fn new(store: &'a S, seqnum: usize, kmersize: usize) -> Self {
        dbg_assert!(kmersize > 0 && kmersize <= MAX_KMERSIZE);
        let mask = if kmersize == MAX_KMERSIZE {
            u64::MAX
        } else {
            (1_u64 << (2 * kmersize)) - 1
        };
        KmerCodes {
            store,
            kmersize: kmersize as u64,
            mask,
            pos: store.seq_start(seqnum),
            end: store.seq_end(seqnum),
            code: 0,
            valid: 0,
        }
    }
}

impl<'a, S: SequenceStore + ?Sized> Iterator for KmerCodes<'a, S> {
    /// (start position of the window, code)
    type Item = (u64, u64);

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.end {
            let symbol = self.store.symbol(self.pos, ReadMode::Forward);
            self.pos += 1;
            if !is_base(symbol) {
                self.valid = 0;
                self.code = 0;
                continue;
            }
            self.code = ((self.code << 2) | u64::from(symbol)) & self.mask;
            self.valid += 1;
            if self.valid >= self.kmersize {
                return Some((self.pos - self.kmersize, self.code));
            }
        }
        None
    }
}

/// Code of the window at the start of a sequence, if there is one.
pub fn leading_code<S: SequenceStore + ?Sized>(store: &S, seqnum: usize, kmersize: usize) -> Option<u64> {
    let start = store.seq_start(seqnum);
    KmerCodes::new(store, seqnum, kmersize)
        .next()
        .filter(|&(pos, _)| pos == start)
        .map(|(_, code)| code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encseq::tests::encseq_of;

    #[test]
    fn codes() {
        // A: 0, C: 1, T: 2, G: 3
        let es = encseq_of(&["ACTGA"]);
        let codes: Vec<_> = KmerCodes::new(&es, 0, 2).collect();
        assert_eq!(codes, vec![(0, 0b0001), (1, 0b0110), (2, 0b1011), (3, 0b1100)]);
    }

    #[test]
    fn wildcard_and_sequences() {
        let es = encseq_of(&["ACNACG", "TT", "GATTACA"]);
        let pos: Vec<_> = KmerCodes::new(&es, 0, 3).map(|(p, _)| p).collect();
        assert_eq!(pos, vec![3]);
        assert_eq!(KmerCodes::new(&es, 1, 3).count(), 0);
        let start = es.seq_start(2);
        let pos: Vec<_> = KmerCodes::new(&es, 2, 3).map(|(p, _)| p).collect();
        assert_eq!(pos, (start..start + 5).collect::<Vec<_>>());

        assert_eq!(leading_code(&es, 0, 3), None);
        assert_eq!(leading_code(&es, 1, 3), None);
        assert_eq!(leading_code(&es, 2, 2), Some(0b1100));
    }

    #[test]
    fn full_width() {
        let seq = "G".repeat(40);
        let es = encseq_of(&[&seq]);
        let codes: Vec<_> = KmerCodes::new(&es, 0, MAX_KMERSIZE).collect();
        assert_eq!(codes.len(), 9);
        assert!(codes.iter().all(|&(_, c)| c == u64::MAX));
    }
}
