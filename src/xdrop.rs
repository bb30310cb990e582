// (c) Roel Kluin, 2023, GPL v3

use crate::config::ScoreConfig;
use crate::encseq::{ReadMode, SequenceStore};
use crate::new_types::traceback::Traceback;
use crate::new_types::twobit::is_base;
use num::integer::gcd;

/// Symbols read along one direction of a sequence.
pub trait Window {
    fn len(&self) -> u64;
    fn at(&self, i: u64) -> u8;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Twobit codes (or specials) in memory.
impl Window for [u8] {
    fn len(&self) -> u64 {
        <[u8]>::len(self) as u64
    }
    fn at(&self, i: u64) -> u8 {
        self[i as usize]
    }
}

/// A stretch of a store, read rightward from start or leftward from before start.
pub struct StoreWindow<'a, S: ?Sized> {
    store: &'a S,
    start: u64,
    len: u64,
    forward: bool,
}

impl<'a, S: SequenceStore + ?Sized> StoreWindow<'a, S> {
    /// [start, end) read left to right.
    pub fn rightward(store: &'a S, start: u64, end: u64) -> Self {
        dbg_assert!(start <= end, "{} > {}", start, end);
        StoreWindow {
            store,
            start,
            len: end - start,
            forward: true,
        }
    }
    /// [end, start) read right to left, beginning at start - 1.
    pub fn leftward(store: &'a S, start: u64, end: u64) -> Self {
        dbg_assert!(end <= start, "{} > {}", end, start);
        StoreWindow {
            store,
            start,
            len: start - end,
            forward: false,
        }
    }
}

impl<'a, S: SequenceStore + ?Sized> Window for StoreWindow<'a, S> {
    fn len(&self) -> u64 {
        self.len
    }
    fn at(&self, i: u64) -> u8 {
        dbg_assert!(i < self.len);
        let pos = if self.forward {
            self.start + i
        } else {
            self.start - 1 - i
        };
        self.store.symbol(pos, ReadMode::Forward)
    }
}

#[inline]
fn same(a: u8, b: u8) -> bool {
    a == b && is_base(a)
}

/// End of the best alignment: characters consumed in u and v, and its score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct XdropBest {
    pub ivalue: u64,
    pub jvalue: u64,
    pub score: i64,
}

/// Scores turned into distances, so that an alignment of i and j characters at
/// distance d scores ((i + j) * half - d) * gcd / factor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Distances {
    pub half: i64,
    pub mis: i64,
    pub ins: i64,
    pub del: i64,
    pub factor: i64,
    pub gcd: i64,
}

impl Distances {
    pub fn new(sc: &ScoreConfig) -> Self {
        let factor = if sc.mat % 2 == 1 { 2 } else { 1 };
        let half = factor * sc.mat / 2;
        let mis = factor * sc.mat - factor * sc.mis;
        let ins = half - factor * sc.ins;
        let del = half - factor * sc.del;
        let g = gcd(gcd(half, mis), gcd(ins, del));
        Distances {
            half: half / g,
            mis: mis / g,
            ins: ins / g,
            del: del / g,
            factor,
            gcd: g,
        }
    }

    /// Number of consecutive empty generations after which nothing can follow.
    fn max(&self) -> i64 {
        self.mis.max(self.ins).max(self.del)
    }
}

#[derive(Clone, Copy)]
struct FrontValue {
    row: i64, // negative: unreached or dropped
    direction: Traceback,
}

impl FrontValue {
    const UNREACHED: FrontValue = FrontValue {
        row: -1,
        direction: Traceback::empty(),
    };
}

#[derive(Clone, Copy)]
struct Generation {
    offset: usize,
    lbound: i64,
    ubound: i64, // lbound > ubound: empty
}

impl Generation {
    fn is_empty(&self) -> bool {
        self.lbound > self.ubound
    }
}

/// Scratch space of one extension: the front rows per generation and diagonal,
/// and the best score before each generation. Cleared at the start of every call.
#[derive(Default)]
pub struct XdropResources {
    fronts: Vec<FrontValue>,
    generations: Vec<Generation>,
    big_t: Vec<i64>,
}

impl XdropResources {
    pub fn new() -> Self {
        XdropResources::default()
    }

    fn clear(&mut self) {
        self.fronts.clear();
        self.generations.clear();
        self.big_t.clear();
    }

    fn front(&self, generation: i64, k: i64) -> Option<&FrontValue> {
        if generation < 0 {
            return None;
        }
        let g = self.generations.get(generation as usize)?;
        if k < g.lbound || k > g.ubound {
            return None;
        }
        Some(&self.fronts[g.offset + (k - g.lbound) as usize]).filter(|f| f.row >= 0)
    }

    fn row(&self, generation: i64, k: i64) -> Option<i64> {
        self.front(generation, k).map(|f| f.row)
    }

    /// Edges leading to diagonal k in a generation of the last extension.
    pub fn traceback_at(&self, generation: usize, k: i64) -> Option<Traceback> {
        self.front(generation as i64, k).map(|f| f.direction)
    }

    /// Generations computed in the last extension.
    pub fn generations(&self) -> usize {
        self.generations.len()
    }
}

/// Greedy X-drop extension with arbitrary scores.
pub struct XdropExtender {
    dist: Distances,
    xdropbelowscore: i64,
    resources: XdropResources,
}

impl XdropExtender {
    pub fn new(scores: &ScoreConfig, xdropbelowscore: i64) -> Self {
        XdropExtender {
            dist: Distances::new(scores),
            xdropbelowscore,
            resources: XdropResources::new(),
        }
    }

    pub fn resources(&self) -> &XdropResources {
        &self.resources
    }

    /// Extend an alignment of u and v from their first symbols on. A cell
    /// scoring more than xdropbelowscore below the best score of all previous
    /// generations is dropped. Of equally scoring cells, the first found wins.
    pub fn extend<U, V>(&mut self, u: &U, v: &V) -> XdropBest
    where
        U: Window + ?Sized,
        V: Window + ?Sized,
    {
        let dist = self.dist;
        let res = &mut self.resources;
        res.clear();
        let (ulen, vlen) = (u.len() as i64, v.len() as i64);
        let slide = |mut row: i64, k: i64| {
            let mut j = row - k;
            while row < ulen && j < vlen && same(u.at(row as u64), v.at(j as u64)) {
                row += 1;
                j += 1;
            }
            row
        };
        let xdrop = self.xdropbelowscore * dist.factor;

        let row = slide(0, 0);
        let mut best = (row, row, 2 * row * dist.half);
        res.fronts.push(FrontValue {
            row,
            direction: if row > 0 {
                Traceback::MATCH_RUN | Traceback::MATCH
            } else {
                Traceback::empty()
            },
        });
        res.generations.push(Generation {
            offset: 0,
            lbound: 0,
            ubound: 0,
        });
        res.big_t.push(best.2);

        let predecessors = [
            (dist.mis, 0, 1, Traceback::REPLACEMENT | Traceback::MISMATCH),
            (dist.del, 1, 1, Traceback::DELETION),
            (dist.ins, -1, 0, Traceback::INSERTION),
        ];
        let mut empty_run = 0;
        let mut d = 1_i64;
        while empty_run < dist.max() {
            let cutoff = res.big_t[d as usize - 1];
            let (mut lo, mut hi) = (i64::MAX, i64::MIN);
            for &(delta, shift, _, _) in predecessors.iter() {
                if d >= delta {
                    let g = res.generations[(d - delta) as usize];
                    if !g.is_empty() {
                        lo = lo.min(g.lbound + shift);
                        hi = hi.max(g.ubound + shift);
                    }
                }
            }
            let offset = res.fronts.len();
            let mut kept: Option<(i64, i64)> = None;
            if lo <= hi {
                for k in lo..=hi {
                    let mut row = -1;
                    let mut direction = Traceback::empty();
                    for &(delta, shift, step, flag) in predecessors.iter() {
                        if let Some(r) = res.row(d - delta, k - shift) {
                            let r = r + step;
                            if r > row {
                                row = r;
                                direction = flag;
                            } else if r == row {
                                direction |= flag;
                            }
                        }
                    }
                    let mut value = FrontValue::UNREACHED;
                    let j = row - k;
                    if row >= 0 && row <= ulen && j >= 0 && j <= vlen {
                        let end = slide(row, k);
                        if end > row {
                            direction |= Traceback::MATCH_RUN | Traceback::MATCH;
                        }
                        let score = (2 * end - k) * dist.half - d;
                        if (cutoff - score) * dist.gcd <= xdrop {
                            value = FrontValue { row: end, direction };
                            if score > best.2 {
                                best = (end, end - k, score);
                            }
                            kept = Some(kept.map_or((k, k), |(first, _)| (first, k)));
                        }
                    }
                    res.fronts.push(value);
                }
            }
            let generation = match kept {
                Some((first, last)) => {
                    res.fronts.truncate(offset + (last - lo + 1) as usize);
                    empty_run = 0;
                    Generation {
                        offset: offset + (first - lo) as usize,
                        lbound: first,
                        ubound: last,
                    }
                }
                None => {
                    res.fronts.truncate(offset);
                    empty_run += 1;
                    Generation {
                        offset,
                        lbound: 1,
                        ubound: 0,
                    }
                }
            };
            res.generations.push(generation);
            res.big_t.push(best.2);
            d += 1;
        }
        dbg_print!("xdrop: {} generations, best {:?}", d, best);
        XdropBest {
            ivalue: best.0 as u64,
            jvalue: best.1 as u64,
            score: best.2 * dist.gcd / dist.factor,
        }
    }
}

/// Unit cost edit distance, greedy along diagonals.
pub fn unit_edit_distance<U, V>(u: &U, v: &V) -> u64
where
    U: Window + ?Sized,
    V: Window + ?Sized,
{
    let (n, m) = (u.len() as i64, v.len() as i64);
    const NONE: i64 = i64::MIN / 2;
    // diagonal k = i - j at index k + m + 1; one pad on either side
    let width = (n + m + 3) as usize;
    let mut prev = vec![NONE; width];
    let mut front = vec![NONE; width];
    let idx = |k: i64| (k + m + 1) as usize;
    for d in 0..=n.max(m) {
        let (lo, hi) = (-d.min(m), d.min(n));
        for k in lo..=hi {
            let mut i = if d == 0 {
                0
            } else {
                (prev[idx(k)] + 1)
                    .max(prev[idx(k - 1)] + 1)
                    .max(prev[idx(k + 1)])
            };
            i = i.min(n).min(m + k);
            while i < n && i - k < m && same(u.at(i as u64), v.at((i - k) as u64)) {
                i += 1;
            }
            front[idx(k)] = i;
            if k == n - m && i == n {
                return d as u64;
            }
        }
        std::mem::swap(&mut prev, &mut front);
        front.iter_mut().for_each(|f| *f = NONE);
    }
    n.max(m) as u64
}

/// Percentage of identity: 100 * (1 - edit distance / length of the longer).
pub fn similarity<U, V>(u: &U, v: &V) -> f64
where
    U: Window + ?Sized,
    V: Window + ?Sized,
{
    let longest = u.len().max(v.len());
    if longest == 0 {
        return 100.0;
    }
    let edist = unit_edit_distance(u, v);
    100.0 * (1.0 - edist as f64 / longest as f64)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::encseq::tests::encseq_of;
    use crate::new_types::twobit::{TwoBit, WILDCARD};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    pub(crate) fn enc(s: &str) -> Vec<u8> {
        s.bytes()
            .map(|b| TwoBit::from_ascii(b).map_or(WILDCARD, |t| t.as_u8()))
            .collect()
    }

    fn extend(u: &str, v: &str, xdrop: i64) -> XdropBest {
        let mut ext = XdropExtender::new(&ScoreConfig::default(), xdrop);
        ext.extend(&enc(u)[..], &enc(v)[..])
    }

    #[test]
    fn distances() {
        let d = Distances::new(&ScoreConfig::default());
        assert_eq!((d.half, d.mis, d.ins, d.del, d.factor, d.gcd), (1, 4, 4, 4, 1, 1));
        let d = Distances::new(&ScoreConfig::new(1, -1, -1, -1).unwrap());
        assert_eq!((d.half, d.mis, d.ins, d.del, d.factor, d.gcd), (1, 4, 3, 3, 2, 1));
        let d = Distances::new(&ScoreConfig::new(4, -4, -4, -4).unwrap());
        assert_eq!((d.half, d.mis, d.ins, d.del, d.factor, d.gcd), (1, 4, 3, 3, 1, 2));
    }

    #[test]
    fn exact_match() {
        let s = "ACGTTGCAAGCTTAGC";
        assert_eq!(
            extend(s, s, 5),
            XdropBest {
                ivalue: 16,
                jvalue: 16,
                score: 32
            }
        );
        let mut ext = XdropExtender::new(&ScoreConfig::new(1, -1, -1, -1).unwrap(), 5);
        assert_eq!(ext.extend(&enc(s)[..], &enc(s)[..]).score, 16);
        let mut ext = XdropExtender::new(&ScoreConfig::new(4, -4, -4, -4).unwrap(), 5);
        assert_eq!(ext.extend(&enc(s)[..], &enc(s)[..]).score, 64);
        // stops at the shorter window
        assert_eq!(extend(s, &s[..9], 5).ivalue, 9);
    }

    #[test]
    fn wildcards_never_match() {
        assert_eq!(extend("NNNN", "NNNN", 0).score, 0);
        // a wildcard pair scores as a mismatch
        let best = extend("ACNGT", "ACNGT", 0);
        assert_eq!((best.ivalue, best.score), (5, 6));
    }

    #[test]
    fn mismatch_traceback() {
        let mut ext = XdropExtender::new(&ScoreConfig::default(), 5);
        let best = ext.extend(&enc("ACGTACGTACCTTGCAAGCT")[..], &enc("ACGTACGTACTTTGCAAGCT")[..]);
        assert_eq!(
            best,
            XdropBest {
                ivalue: 20,
                jvalue: 20,
                score: 36
            }
        );
        let res = ext.resources();
        assert_eq!(res.traceback_at(0, 0), Some(Traceback::MATCH_RUN | Traceback::MATCH));
        let tb = res.traceback_at(4, 0).unwrap();
        assert!(tb.contains(Traceback::REPLACEMENT | Traceback::MISMATCH | Traceback::MATCH_RUN));
        assert!(!tb.contains(Traceback::DELETION));
        assert_eq!(res.traceback_at(1, 0), None);
    }

    #[test]
    fn xdrop_bounds_extension() {
        let p = "ACGTTGCAAG";
        let q = "GATTCCAGTA";
        let u = format!("{}CC{}", p, q);
        let v = format!("{}TT{}", p, q);
        assert_eq!(
            extend(&u, &v, 0),
            XdropBest {
                ivalue: 10,
                jvalue: 10,
                score: 20
            }
        );
        assert_eq!(
            extend(&u, &v, 5),
            XdropBest {
                ivalue: 22,
                jvalue: 22,
                score: 36
            }
        );
    }

    #[test]
    fn monotone_in_xdrop() {
        let p = "ACGTTGCAAG";
        let q = "GATTCCAGTA";
        for (u, v) in [
            (format!("{}C{}", p, q), format!("{}T{}", p, q)),
            (format!("{}CC{}", p, q), format!("{}TT{}", p, q)),
        ] {
            let mut last = XdropBest::default();
            for x in [0, 1, 2, 5, 10, 50] {
                let best = extend(&u, &v, x);
                assert!(best.score >= last.score);
                assert!(best.ivalue >= last.ivalue);
                last = best;
            }
        }
    }

    #[test]
    fn deterministic() {
        let mut rng = StdRng::seed_from_u64(5);
        let u: Vec<u8> = (0..300).map(|_| rng.gen_range(0..4)).collect();
        let mut v = u.clone();
        for _ in 0..15 {
            let i = rng.gen_range(0..v.len());
            v[i] = rng.gen_range(0..4);
        }
        let mut ext = XdropExtender::new(&ScoreConfig::default(), 10);
        let first = ext.extend(&u[..], &v[..]);
        let generations = ext.resources().generations();
        for _ in 0..3 {
            assert_eq!(ext.extend(&u[..], &v[..]), first);
            assert_eq!(ext.resources().generations(), generations);
        }
    }

    #[test]
    fn store_windows() {
        let es = encseq_of(&["TTACGTAC", "GGACGTAC"]);
        // seq1 starts at 9
        let right = StoreWindow::rightward(&es, 2, 8);
        let other = StoreWindow::rightward(&es, 11, 17);
        let mut ext = XdropExtender::new(&ScoreConfig::default(), 5);
        assert_eq!(ext.extend(&right, &other).ivalue, 6);
        let left = StoreWindow::leftward(&es, 8, 0);
        let other = StoreWindow::leftward(&es, 17, 9);
        assert_eq!(left.at(0), es.symbol(7, ReadMode::Forward));
        let best = ext.extend(&left, &other);
        assert_eq!((best.ivalue, best.jvalue, best.score), (6, 6, 12));
    }

    #[test]
    fn edit_distance() {
        let ed = |u: &str, v: &str| unit_edit_distance(&enc(u)[..], &enc(v)[..]);
        assert_eq!(ed("ACGT", "ACGT"), 0);
        assert_eq!(ed("", "ACG"), 3);
        assert_eq!(ed("ACG", ""), 3);
        assert_eq!(ed("ACGT", "AGT"), 1);
        assert_eq!(ed("AAAA", "TTTT"), 4);
        assert_eq!(ed("ACGTACGT", "CGTACGTA"), 2);
        assert_eq!(ed("GATTACA", "GATACCA"), 2);
    }

    #[test]
    fn similarity_one_mismatch() {
        let s = similarity(&enc("ACGTACGTAC")[..], &enc("ACGTTCGTAC")[..]);
        assert_eq!(format!("{:.2}", s), "90.00");
        assert_eq!(similarity(&enc("")[..], &enc("")[..]), 100.0);
    }
}
