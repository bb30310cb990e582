// (c) Roel Kluin, 2023, GPL v3

use crate::config::{LtrConfig, Motif, OverlapPolicy};
use crate::encseq::{ReadMode, SequenceStore};
use crate::new_types::twobit::is_base;
use crate::seeds::Seed;
use crate::xdrop::{similarity, StoreWindow, XdropExtender};
use ahash::AHashSet;
use itertools::iproduct;
use serde::Serialize;
use std::cmp::Reverse;
use std::ops::RangeInclusive;

/// A predicted element. Positions are global, 0-based and inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LtrBoundary {
    pub left_ltr_5: u64,
    pub left_ltr_3: u64,
    pub right_ltr_5: u64,
    pub right_ltr_3: u64,
    pub similarity: f64,
    pub len_left_tsd: u64,
    pub len_right_tsd: u64,
    pub contignumber: usize,
    pub skipped: bool,
}

impl LtrBoundary {
    pub fn left_len(&self) -> u64 {
        self.left_ltr_3 + 1 - self.left_ltr_5
    }
    pub fn right_len(&self) -> u64 {
        self.right_ltr_3 + 1 - self.right_ltr_5
    }
    pub fn element_len(&self) -> u64 {
        self.right_ltr_3 + 1 - self.left_ltr_5
    }
    pub fn element_range(&self) -> RangeInclusive<u64> {
        self.left_ltr_5..=self.right_ltr_3
    }
    fn overlaps(&self, other: &LtrBoundary) -> bool {
        self.contignumber == other.contignumber
            && self.left_ltr_5 <= other.right_ltr_3
            && other.left_ltr_5 <= self.right_ltr_3
    }
    fn key(&self) -> (u64, u64, u64, u64) {
        (self.left_ltr_5, self.left_ltr_3, self.right_ltr_5, self.right_ltr_3)
    }
}

/// Candidates dropped per reason.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct FilterStats {
    pub candidates: u64,
    pub short_seed: u64,
    pub geometry: u64,
    pub similarity: u64,
    pub no_tsd: u64,
    pub no_motif: u64,
    pub duplicates: u64,
    pub overlaps: u64,
}

// new outer boundaries: TSD left of a and right of b
#[derive(Clone, Copy, Debug)]
struct Outer {
    a: u64,
    b: u64,
    tsdlen: u64,
}

/// Turns seeds into LTR pairs: extends them, checks them and corrects their
/// boundaries to target site duplications and motifs.
pub struct BoundaryAssembler {
    cfg: LtrConfig,
    extender: XdropExtender,
    boundaries: Vec<LtrBoundary>,
    stats: FilterStats,
}

impl BoundaryAssembler {
    pub fn new(cfg: &LtrConfig) -> Self {
        BoundaryAssembler {
            cfg: cfg.clone(),
            extender: XdropExtender::new(&cfg.scores, cfg.xdropbelowscore),
            boundaries: Vec::new(),
            stats: FilterStats::default(),
        }
    }

    pub fn boundaries(&self) -> &[LtrBoundary] {
        &self.boundaries
    }

    pub fn stats(&self) -> &FilterStats {
        &self.stats
    }

    pub fn reset(&mut self) {
        self.boundaries.clear();
        self.stats = FilterStats::default();
    }

    /// Record a boundary as is, without checks.
    pub fn add_boundary(&mut self, boundary: LtrBoundary) {
        self.boundaries.push(boundary);
    }

    fn fits_geometry(&self, b: &LtrBoundary) -> bool {
        let cfg = &self.cfg;
        let lengths = cfg.minltrlength..=cfg.maxltrlength;
        b.left_ltr_5 <= b.left_ltr_3
            && b.left_ltr_3 < b.right_ltr_5
            && b.right_ltr_5 <= b.right_ltr_3
            && lengths.contains(&b.left_len())
            && lengths.contains(&b.right_len())
            && (cfg.mindistance..=cfg.maxdistance).contains(&(b.right_ltr_5 - b.left_ltr_5))
    }

    fn ltr_similarity<S: SequenceStore + ?Sized>(store: &S, b: &LtrBoundary) -> f64 {
        similarity(
            &StoreWindow::rightward(store, b.left_ltr_5, b.left_ltr_3 + 1),
            &StoreWindow::rightward(store, b.right_ltr_5, b.right_ltr_3 + 1),
        )
    }

    /// Geometry and similarity; sets the similarity.
    fn passes<S: SequenceStore + ?Sized>(&mut self, store: &S, b: &mut LtrBoundary) -> bool {
        if !self.fits_geometry(b) {
            self.stats.geometry += 1;
            return false;
        }
        b.similarity = BoundaryAssembler::ltr_similarity(store, b);
        if b.similarity < self.cfg.similaritythreshold {
            self.stats.similarity += 1;
            return false;
        }
        true
    }

    /// Extend a seed both ways and keep the pair if it passes all filters.
    pub fn add_candidate<S: SequenceStore + ?Sized>(&mut self, store: &S, seed: &Seed) -> bool {
        self.stats.candidates += 1;
        if seed.len < self.cfg.minseedlength {
            self.stats.short_seed += 1;
            return false;
        }
        let contig = store.seqnum_of(seed.pos1);
        dbg_assert_eq!(contig, store.seqnum_of(seed.pos2));
        let (cstart, cend) = (store.seq_start(contig), store.seq_end(contig));
        let (end1, end2) = (seed.pos1 + seed.len, seed.pos2 + seed.len);

        let left = self.extender.extend(
            &StoreWindow::leftward(store, seed.pos1, cstart),
            &StoreWindow::leftward(store, seed.pos2, end1),
        );
        let right = self.extender.extend(
            &StoreWindow::rightward(store, end1, seed.pos2),
            &StoreWindow::rightward(store, end2, cend),
        );
        let mut b = LtrBoundary {
            left_ltr_5: seed.pos1 - left.ivalue,
            left_ltr_3: end1 - 1 + right.ivalue,
            right_ltr_5: seed.pos2 - left.jvalue,
            right_ltr_3: end2 - 1 + right.jvalue,
            similarity: 0.0,
            len_left_tsd: 0,
            len_right_tsd: 0,
            contignumber: contig,
            skipped: false,
        };
        dbg_print!("seed {:?} extended to {:?}", seed, b);
        if !self.passes(store, &mut b) {
            return false;
        }
        if self.cfg.tsd.is_some() || self.cfg.motif.is_some() {
            let corrected = match self.correct_boundaries(store, &b, cstart..cend) {
                Some(c) => c,
                None => return false,
            };
            b = corrected;
            if !self.passes(store, &mut b) {
                return false;
            }
        }
        self.boundaries.push(b);
        true
    }

    fn vicinity(&self, center: u64, contig: &std::ops::Range<u64>) -> RangeInclusive<u64> {
        let vic = self.cfg.vicinityforcorrectboundaries;
        center.saturating_sub(vic).max(contig.start)..=(center + vic).min(contig.end - 1)
    }

    /// Outer boundaries a (near left 5') and b (near right 3') with
    /// seq[a - l..a] == seq[b + 1..b + 1 + l], best first.
    fn tsd_candidates<S: SequenceStore + ?Sized>(
        &self,
        store: &S,
        b: &LtrBoundary,
        contig: &std::ops::Range<u64>,
    ) -> Vec<Outer> {
        let tsd = match self.cfg.tsd {
            Some(tsd) => tsd,
            None => return Vec::new(),
        };
        let mut found: Vec<Outer> = iproduct!(
            self.vicinity(b.left_ltr_5, contig),
            self.vicinity(b.right_ltr_3, contig)
        )
        .filter(|&(x, y)| x < b.left_ltr_3 && y > b.right_ltr_5)
        .filter_map(|(x, y)| {
            (tsd.min..=tsd.max)
                .rev()
                .find(|&l| {
                    x >= contig.start + l
                        && y + 1 + l <= contig.end
                        && (0..l).all(|i| {
                            let s = store.symbol(x - l + i, ReadMode::Forward);
                            is_base(s) && s == store.symbol(y + 1 + i, ReadMode::Forward)
                        })
                })
                .map(|l| Outer { a: x, b: y, tsdlen: l })
        })
        .collect();
        found.sort_by_key(|o| {
            (
                o.a.abs_diff(b.left_ltr_5) + o.b.abs_diff(b.right_ltr_3),
                Reverse(o.tsdlen),
                o.a,
                o.b,
            )
        });
        found
    }

    /// Move the boundaries to a TSD and/or the motifs within the vicinity.
    fn correct_boundaries<S: SequenceStore + ?Sized>(
        &mut self,
        store: &S,
        b: &LtrBoundary,
        contig: std::ops::Range<u64>,
    ) -> Option<LtrBoundary> {
        let outer = if self.cfg.tsd.is_some() {
            let found = self.tsd_candidates(store, b, &contig);
            if found.is_empty() {
                self.stats.no_tsd += 1;
                return None;
            }
            found
        } else {
            vec![Outer {
                a: b.left_ltr_5,
                b: b.right_ltr_3,
                tsdlen: 0,
            }]
        };
        let corrected = match self.cfg.motif {
            None => {
                let o = outer[0];
                Some(with_outer(b, &o, b.left_ltr_3, b.right_ltr_5))
            }
            Some(motif) => self.motif_boundaries(store, b, &outer, &motif, &contig),
        };
        if corrected.is_none() {
            self.stats.no_motif += 1;
        }
        corrected
    }

    fn motif_boundaries<S: SequenceStore + ?Sized>(
        &self,
        store: &S,
        b: &LtrBoundary,
        tsd: &[Outer],
        motif: &Motif,
        contig: &std::ops::Range<u64>,
    ) -> Option<LtrBoundary> {
        let allowed = motif.allowedmismatches;
        let start_mm = |p: u64| -> Option<u32> {
            (p + 1 < contig.end).then(|| mismatches(store, p, &motif.start))
        };
        let end_mm = |p: u64| -> Option<u32> {
            (p > contig.start).then(|| mismatches(store, p - 1, &motif.end))
        };
        // without TSD, any outer position near the old one with a motif half
        let searched: Vec<Outer>;
        let outer = if self.cfg.tsd.is_none() {
            searched = iproduct!(
                self.vicinity(b.left_ltr_5, contig),
                self.vicinity(b.right_ltr_3, contig)
            )
            .map(|(x, y)| Outer { a: x, b: y, tsdlen: 0 })
            .collect();
            &searched[..]
        } else {
            tsd
        };
        let closest = |center: u64, mm: &dyn Fn(u64) -> Option<u32>, budget: u32| {
            self.vicinity(center, contig)
                .filter_map(|p| mm(p).filter(|&m| m <= budget).map(|_| p))
                .min_by_key(|&p| (p.abs_diff(center), p))
        };
        outer
            .iter()
            .filter_map(|o| {
                let left_outer = start_mm(o.a).filter(|&m| m <= allowed)?;
                let right_outer = end_mm(o.b).filter(|&m| m <= allowed)?;
                let l3 = closest(b.left_ltr_3, &end_mm, allowed - left_outer)?;
                let r5 = closest(b.right_ltr_5, &start_mm, allowed - right_outer)?;
                let cost = o.a.abs_diff(b.left_ltr_5)
                    + o.b.abs_diff(b.right_ltr_3)
                    + l3.abs_diff(b.left_ltr_3)
                    + r5.abs_diff(b.right_ltr_5);
                Some(((cost, Reverse(o.tsdlen), o.a, o.b), with_outer(b, o, l3, r5)))
            })
            .min_by(|x, y| x.0.cmp(&y.0))
            .map(|(_, corrected)| corrected)
    }

    /// Drop duplicates, sort by contig and position and resolve overlaps.
    pub fn finish(&mut self) -> &[LtrBoundary] {
        let mut seen = AHashSet::new();
        for b in self.boundaries.iter_mut() {
            if !seen.insert(b.key()) && !b.skipped {
                b.skipped = true;
                self.stats.duplicates += 1;
            }
        }
        self.boundaries
            .sort_by_key(|b| (b.contignumber, b.left_ltr_5, b.right_ltr_3));
        self.resolve_overlaps();
        let kept = self.boundaries.iter().filter(|b| !b.skipped).count();
        log::info!("{} of {} candidates kept; {:?}", kept, self.stats.candidates, self.stats);
        &self.boundaries
    }

    /// Among unskipped boundaries, in order, those whose elements intersect.
    pub fn resolve_overlaps(&mut self) {
        let policy = self.cfg.overlaps;
        if policy == OverlapPolicy::All {
            return;
        }
        let n = self.boundaries.len();
        for i in 0..n {
            if self.boundaries[i].skipped {
                continue;
            }
            let mut clash = false;
            for j in i + 1..n {
                let (bi, bj) = (&self.boundaries[i], &self.boundaries[j]);
                if bj.skipped || !bi.overlaps(bj) {
                    continue;
                }
                let later_is_better = bj.similarity > bi.similarity;
                match policy {
                    OverlapPolicy::Best if later_is_better => {
                        self.boundaries[i].skipped = true;
                        self.stats.overlaps += 1;
                        break;
                    }
                    OverlapPolicy::Best => {
                        self.boundaries[j].skipped = true;
                        self.stats.overlaps += 1;
                    }
                    _ => {
                        self.boundaries[j].skipped = true;
                        self.stats.overlaps += 1;
                        clash = true;
                    }
                }
            }
            if clash {
                self.boundaries[i].skipped = true;
                self.stats.overlaps += 1;
            }
        }
    }
}

fn mismatches<S: SequenceStore + ?Sized>(store: &S, pos: u64, motif: &[u8; 2]) -> u32 {
    motif
        .iter()
        .enumerate()
        .filter(|&(i, &m)| store.symbol(pos + i as u64, ReadMode::Forward) != m)
        .count() as u32
}

fn with_outer(b: &LtrBoundary, o: &Outer, l3: u64, r5: u64) -> LtrBoundary {
    LtrBoundary {
        left_ltr_5: o.a,
        left_ltr_3: l3,
        right_ltr_5: r5,
        right_ltr_3: o.b,
        len_left_tsd: o.tsdlen,
        len_right_tsd: o.tsdlen,
        ..*b
    }
}
