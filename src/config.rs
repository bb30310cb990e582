// (c) Roel Kluin, 2023, GPL v3

use crate::error::LtrError;
use crate::kmercode::MAX_KMERSIZE;
use crate::new_types::twobit::TwoBit;
use anyhow::Result;
use clap::ValueEnum;
use num::integer::gcd;
use serde::{Deserialize, Serialize};

fn invalid(msg: String) -> anyhow::Error {
    LtrError::InvalidConfig(msg).into()
}

/// Alignment scores; the match score is positive, the others are penalties.
/// The gcd of the penalties is derived on construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoreConfig {
    pub mat: i64,
    pub mis: i64,
    pub ins: i64,
    pub del: i64,
    gcd: i64,
}

fn penalty_gcd(mis: i64, ins: i64, del: i64) -> i64 {
    gcd(gcd(mis.abs(), ins.abs()), del.abs())
}

impl ScoreConfig {
    pub fn new(mat: i64, mis: i64, ins: i64, del: i64) -> Result<Self> {
        if mat <= 0 || mis > 0 || ins > 0 || del > 0 {
            return Err(invalid(format!(
                "scores {}/{}/{}/{}: match must be positive, penalties not",
                mat, mis, ins, del
            )));
        }
        if mis == 0 && ins == 0 && del == 0 {
            return Err(invalid("at least one penalty must be negative".to_string()));
        }
        Ok(ScoreConfig {
            mat,
            mis,
            ins,
            del,
            gcd: penalty_gcd(mis, ins, del),
        })
    }

    /// gcd of the absolute penalties
    pub fn gcd(&self) -> i64 {
        self.gcd
    }
}

impl Default for ScoreConfig {
    fn default() -> Self {
        let (mis, ins, del) = (-2, -3, -3);
        ScoreConfig {
            mat: 2,
            mis,
            ins,
            del,
            gcd: penalty_gcd(mis, ins, del),
        }
    }
}

/// Dinucleotides expected at the start and end of each LTR.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Motif {
    pub start: [u8; 2],
    pub end: [u8; 2],
    pub allowedmismatches: u32,
}

fn dinucleotide(s: &str) -> Result<[u8; 2]> {
    let b = s.as_bytes();
    if b.len() != 2 {
        return Err(LtrError::InvalidMotif(format!("{:?} is not a dinucleotide", s)).into());
    }
    let mut out = [0; 2];
    for (o, &c) in out.iter_mut().zip(b) {
        *o = TwoBit::from_ascii(c)
            .ok_or_else(|| LtrError::InvalidMotif(format!("{:?} in {:?} is not a base", c as char, s)))?
            .as_u8();
    }
    Ok(out)
}

impl Motif {
    pub fn new(start: &str, end: &str, allowedmismatches: u32) -> Result<Self> {
        if allowedmismatches > 3 {
            return Err(LtrError::InvalidMotif(format!(
                "{} mismatches allowed, at most 3",
                allowedmismatches
            ))
            .into());
        }
        Ok(Motif {
            start: dinucleotide(start)?,
            end: dinucleotide(end)?,
            allowedmismatches,
        })
    }
}

/// Inclusive range of target site duplication lengths.
#[derive(new, Clone, Copy, Debug, PartialEq, Eq)]
pub struct TsdRange {
    pub min: u64,
    pub max: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum OverlapPolicy {
    /// keep the most similar of overlapping predictions
    Best,
    /// drop all overlapping predictions
    NoOverlap,
    /// keep all predictions
    All,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LtrConfig {
    pub kmersize: usize,
    pub minseedlength: u64,
    pub similaritythreshold: f64,
    pub xdropbelowscore: i64,
    pub scores: ScoreConfig,
    pub minltrlength: u64,
    pub maxltrlength: u64,
    pub mindistance: u64,
    pub maxdistance: u64,
    pub motif: Option<Motif>,
    pub tsd: Option<TsdRange>,
    pub vicinityforcorrectboundaries: u64,
    pub overlaps: OverlapPolicy,
    pub longoutput: bool,
}

impl Default for LtrConfig {
    fn default() -> Self {
        LtrConfig {
            kmersize: 12,
            minseedlength: 30,
            similaritythreshold: 85.0,
            xdropbelowscore: 5,
            scores: ScoreConfig::default(),
            minltrlength: 100,
            maxltrlength: 1000,
            mindistance: 1000,
            maxdistance: 15000,
            motif: None,
            tsd: None,
            vicinityforcorrectboundaries: 60,
            overlaps: OverlapPolicy::Best,
            longoutput: false,
        }
    }
}

impl LtrConfig {
    /// Reject contradictory settings before any sequence pass.
    pub fn validate(&self) -> Result<()> {
        if self.kmersize == 0 || self.kmersize > MAX_KMERSIZE {
            return Err(invalid(format!("k-mer size {} not in 1..={}", self.kmersize, MAX_KMERSIZE)));
        }
        if self.minseedlength < self.kmersize as u64 {
            return Err(invalid(format!(
                "minimum seed length {} below k-mer size {}",
                self.minseedlength, self.kmersize
            )));
        }
        if !(0.0..=100.0).contains(&self.similaritythreshold) {
            return Err(invalid(format!("similarity {} not in 0..=100", self.similaritythreshold)));
        }
        if self.xdropbelowscore < 0 {
            return Err(invalid(format!("negative xdrop {}", self.xdropbelowscore)));
        }
        let s = &self.scores;
        ScoreConfig::new(s.mat, s.mis, s.ins, s.del)?;
        if self.minltrlength > self.maxltrlength {
            return Err(invalid(format!(
                "LTR length range {}..{} is empty",
                self.minltrlength, self.maxltrlength
            )));
        }
        if self.mindistance > self.maxdistance {
            return Err(invalid(format!(
                "LTR distance range {}..{} is empty",
                self.mindistance, self.maxdistance
            )));
        }
        if let Some(tsd) = self.tsd {
            if tsd.min < 1 || tsd.min > tsd.max {
                return Err(invalid(format!("TSD length range {}..{} invalid", tsd.min, tsd.max)));
            }
        }
        if let Some(motif) = self.motif {
            if motif.allowedmismatches > 3 {
                return Err(LtrError::InvalidMotif(format!(
                    "{} mismatches allowed, at most 3",
                    motif.allowedmismatches
                ))
                .into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(err: anyhow::Error) -> LtrError {
        err.downcast_ref::<LtrError>().cloned().unwrap()
    }

    #[test]
    fn scores() {
        let sc = ScoreConfig::new(2, -2, -3, -3).unwrap();
        assert_eq!(sc.gcd(), 1);
        assert_eq!(sc, ScoreConfig::default());
        assert_eq!(ScoreConfig::new(1, -4, -6, -6).unwrap().gcd(), 2);
        assert_eq!(ScoreConfig::new(3, -6, -9, 0).unwrap().gcd(), 3);
        assert!(matches!(kind(ScoreConfig::new(0, -1, -1, -1).unwrap_err()), LtrError::InvalidConfig(_)));
        assert!(ScoreConfig::new(1, 1, -1, -1).is_err());
    }

    #[test]
    fn motifs() {
        let m = Motif::new("tg", "CA", 0).unwrap();
        assert_eq!(m.start, [3, 2]);
        assert_eq!(m.end, [1, 0]);
        for (s, e, n) in [("t", "ca", 0), ("tgc", "ca", 0), ("tn", "ca", 0), ("tg", "ca", 4)] {
            assert!(matches!(kind(Motif::new(s, e, n).unwrap_err()), LtrError::InvalidMotif(_)));
        }
    }

    #[test]
    fn validate() {
        LtrConfig::default().validate().unwrap();
        let bad = [
            LtrConfig { kmersize: 33, ..Default::default() },
            LtrConfig { minseedlength: 5, ..Default::default() },
            LtrConfig { similaritythreshold: 101.0, ..Default::default() },
            LtrConfig { xdropbelowscore: -1, ..Default::default() },
            LtrConfig { minltrlength: 2000, ..Default::default() },
            LtrConfig { mindistance: 20000, ..Default::default() },
            LtrConfig { tsd: Some(TsdRange::new(6, 5)), ..Default::default() },
            LtrConfig { tsd: Some(TsdRange::new(0, 5)), ..Default::default() },
        ];
        for cfg in bad {
            assert!(matches!(kind(cfg.validate().unwrap_err()), LtrError::InvalidConfig(_)));
        }
    }
}
