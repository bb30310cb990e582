// (c) Roel Kluin, 2023, GPL v3

use crate::boundaries::LtrBoundary;
use crate::config::LtrConfig;
use crate::encseq::{EncodedSequence, SequenceStore};
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;

const LEGEND_START: &str = "# where:\n# s = starting position\n# e = ending position\n# l = length\n";

/// Predictions as a table, one row per kept boundary, grouped by sequence.
/// Positions are 1-based and relative to their sequence.
pub fn write_report<W: Write>(
    out: &mut W,
    encseq: &EncodedSequence,
    boundaries: &[LtrBoundary],
    cfg: &LtrConfig,
) -> Result<()> {
    let mut kept: Vec<&LtrBoundary> = boundaries.iter().filter(|b| !b.skipped).collect();
    kept.sort_by_key(|b| (b.contignumber, b.left_ltr_5));
    let written = if cfg.longoutput {
        write_long(out, encseq, &kept, cfg)
    } else {
        write_short(out, encseq, &kept)
    };
    written.context("writing report")
}

fn write_long<W: Write>(
    out: &mut W,
    encseq: &EncodedSequence,
    kept: &[&LtrBoundary],
    cfg: &LtrConfig,
) -> std::io::Result<()> {
    if kept.is_empty() {
        return writeln!(out, "No full LTR-pair predicted.");
    }
    let tsd = cfg.tsd.is_some();
    let motif = cfg.motif.is_some();
    let ltr_columns = |side: &str| {
        let mut s = format!(" s({0}) e({0}) l({0})", side);
        if tsd {
            s.push_str(" TSD l(TSD)");
        }
        if motif {
            s.push_str(&format!(" m({})", side));
        }
        s
    };
    writeln!(out, "# predictions are reported in the following way")?;
    writeln!(
        out,
        "# s(ret) e(ret) l(ret){}{} sim(LTRs) seq-nr",
        ltr_columns("lLTR"),
        ltr_columns("rLTR")
    )?;
    write!(out, "{}", LEGEND_START)?;
    if motif {
        writeln!(out, "# m = motif")?;
    }
    writeln!(out, "# ret = LTR-retrotransposon\n# lLTR = left LTR\n# rLTR = right LTR")?;
    if tsd {
        writeln!(out, "# TSD = target site duplication")?;
    }
    writeln!(out, "# sim = similarity\n# seq-nr = sequence number")?;

    for b in kept {
        let offset = encseq.seq_start(b.contignumber);
        let local = |p: u64| p - offset + 1;
        let motif_of = |l5: u64, l3: u64| {
            format!(
                "{}..{}",
                encseq.chars(l5, l5 + 2),
                encseq.chars(l3 - 1, l3 + 1)
            )
        };
        write!(
            out,
            "{}  {}  {}  {}  {}  {}  ",
            local(b.left_ltr_5),
            local(b.right_ltr_3),
            b.element_len(),
            local(b.left_ltr_5),
            local(b.left_ltr_3),
            b.left_len()
        )?;
        if tsd {
            write!(
                out,
                "{}  {}  ",
                encseq.chars(b.left_ltr_5 - b.len_left_tsd, b.left_ltr_5),
                b.len_left_tsd
            )?;
        }
        if motif {
            write!(out, "{}  ", motif_of(b.left_ltr_5, b.left_ltr_3))?;
        }
        write!(
            out,
            "{}  {}  {}  ",
            local(b.right_ltr_5),
            local(b.right_ltr_3),
            b.right_len()
        )?;
        if tsd {
            write!(
                out,
                "{}  {}  ",
                encseq.chars(b.right_ltr_3 + 1, b.right_ltr_3 + 1 + b.len_right_tsd),
                b.len_right_tsd
            )?;
        }
        if motif {
            write!(out, "{}  ", motif_of(b.right_ltr_5, b.right_ltr_3))?;
        }
        writeln!(out, "{:.2}  {}", b.similarity, b.contignumber)?;
    }
    Ok(())
}

fn write_short<W: Write>(out: &mut W, encseq: &EncodedSequence, kept: &[&LtrBoundary]) -> std::io::Result<()> {
    if kept.is_empty() {
        return Ok(());
    }
    writeln!(out, "# predictions are reported in the following way")?;
    writeln!(
        out,
        "# s(ret) e(ret) l(ret) s(lLTR) e(lLTR) l(lLTR) s(rLTR) e(rLTR) l(rLTR) sim(LTRs) seq-nr "
    )?;
    write!(out, "{}", LEGEND_START)?;
    writeln!(
        out,
        "# ret = LTR-retrotransposon\n# lLTR = left LTR\n# rLTR = right LTR\n# sim = similarity\n# seq-nr = sequence number"
    )?;
    for b in kept {
        let offset = encseq.seq_start(b.contignumber);
        writeln!(
            out,
            "{}  {}  {}  {}  {}  {}  {}  {}  {}  {:.2}  {}",
            b.left_ltr_5 - offset + 1,
            b.right_ltr_3 - offset + 1,
            b.element_len(),
            b.left_ltr_5 - offset + 1,
            b.left_ltr_3 - offset + 1,
            b.left_len(),
            b.right_ltr_5 - offset + 1,
            b.right_ltr_3 - offset + 1,
            b.right_len(),
            b.similarity,
            b.contignumber
        )?;
    }
    Ok(())
}

#[derive(Serialize)]
struct TsvRow<'a> {
    seqname: &'a str,
    seqnr: usize,
    start: u64,
    end: u64,
    length: u64,
    lltr_start: u64,
    lltr_end: u64,
    lltr_length: u64,
    lltr_tsd_length: u64,
    rltr_start: u64,
    rltr_end: u64,
    rltr_length: u64,
    rltr_tsd_length: u64,
    similarity: String,
}

/// Kept boundaries as tab separated values with a header line.
pub fn write_tsv<W: Write>(out: W, encseq: &EncodedSequence, boundaries: &[LtrBoundary]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().delimiter(b'\t').from_writer(out);
    for b in boundaries.iter().filter(|b| !b.skipped) {
        let offset = encseq.seq_start(b.contignumber);
        wtr.serialize(TsvRow {
            seqname: encseq.name(b.contignumber),
            seqnr: b.contignumber,
            start: b.left_ltr_5 - offset + 1,
            end: b.right_ltr_3 - offset + 1,
            length: b.element_len(),
            lltr_start: b.left_ltr_5 - offset + 1,
            lltr_end: b.left_ltr_3 - offset + 1,
            lltr_length: b.left_len(),
            lltr_tsd_length: b.len_left_tsd,
            rltr_start: b.right_ltr_5 - offset + 1,
            rltr_end: b.right_ltr_3 - offset + 1,
            rltr_length: b.right_len(),
            rltr_tsd_length: b.len_right_tsd,
            similarity: format!("{:.2}", b.similarity),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Motif, TsdRange};
    use crate::encseq::tests::encseq_of;

    fn example() -> (EncodedSequence, Vec<LtrBoundary>) {
        // seq1 starts at 11
        let es = encseq_of(&["ACGTACGTAC", "GGCATGAAACATGAAACACC"]);
        let b = LtrBoundary {
            left_ltr_5: 15,
            left_ltr_3: 21,
            right_ltr_5: 22,
            right_ltr_3: 28,
            similarity: 85.714,
            len_left_tsd: 2,
            len_right_tsd: 2,
            contignumber: 1,
            skipped: false,
        };
        let skipped = LtrBoundary {
            skipped: true,
            contignumber: 0,
            ..b
        };
        (es, vec![b, skipped])
    }

    #[test]
    fn short_form() {
        let (es, bs) = example();
        let mut out = Vec::new();
        write_report(&mut out, &es, &bs, &LtrConfig::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let rows: Vec<&str> = text.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(rows, vec!["5  18  14  5  11  7  12  18  7  85.71  1"]);

        let mut out = Vec::new();
        write_report(&mut out, &es, &bs[1..], &LtrConfig::default()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn long_form() {
        let (es, bs) = example();
        let cfg = LtrConfig {
            longoutput: true,
            tsd: Some(TsdRange::new(2, 2)),
            motif: Some(Motif::new("tg", "ca", 0).unwrap()),
            ..Default::default()
        };
        let mut out = Vec::new();
        write_report(&mut out, &es, &bs, &cfg).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(
            "# s(ret) e(ret) l(ret) s(lLTR) e(lLTR) l(lLTR) TSD l(TSD) m(lLTR) \
             s(rLTR) e(rLTR) l(rLTR) TSD l(TSD) m(rLTR) sim(LTRs) seq-nr\n"
        ));
        assert!(text.contains("# TSD = target site duplication\n"));
        let row = text.lines().last().unwrap();
        assert_eq!(row, "5  18  14  5  11  7  CA  2  TG..CA  12  18  7  CC  2  TG..CA  85.71  1");

        let mut out = Vec::new();
        write_report(&mut out, &es, &[], &cfg).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No full LTR-pair predicted.\n");
    }

    #[test]
    fn tsv() {
        let (es, bs) = example();
        let mut out = Vec::new();
        write_tsv(&mut out, &es, &bs).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("seqname\tseqnr\tstart\tend"));
        assert_eq!(lines.next().unwrap(), "seq1\t1\t5\t18\t14\t5\t11\t7\t2\t12\t18\t7\t2\t85.71");
        assert_eq!(lines.next(), None);
    }
}
