use ltrseed::codehasher::bucket_suffixes;
use ltrseed::config::{Motif, OverlapPolicy, TsdRange};
use ltrseed::harvest::run_pipeline;
use ltrseed::index::{index_paths, load_index, write_index};
use ltrseed::report::write_report;
use ltrseed::{EncodedSequence, LtrConfig};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn random_of(rng: &mut StdRng, alphabet: &[u8], len: usize) -> String {
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
        .collect()
}

/// flank, TSD, LTR, interior, LTR, TSD, flank: 1000 bases. Flanks and TSD
/// only use G and T, the interior only A and C, so nothing but the LTRs repeats.
/// The predicted element runs from the first LTR base to the last, 100..=899:
/// its length of 800 leaves out the 95 + 5 bases on either side.
fn element() -> String {
    let mut rng = StdRng::seed_from_u64(2023);
    let flank5 = random_of(&mut rng, b"GT", 95);
    // no proper prefix of the TSD is also its suffix: no longer TSD appears
    let tsd = "GGTTT";
    let ltr = format!("TG{}CA", random_of(&mut rng, b"ACGT", 196));
    let interior = random_of(&mut rng, b"AC", 400);
    let flank3 = random_of(&mut rng, b"GT", 95);
    let seq = format!("{flank5}{tsd}{ltr}{interior}{ltr}{tsd}{flank3}");
    assert_eq!(seq.len(), 1000);
    seq
}

fn config() -> LtrConfig {
    LtrConfig {
        kmersize: 8,
        minseedlength: 20,
        similaritythreshold: 90.0,
        tsd: Some(TsdRange::new(5, 5)),
        motif: Some(Motif::new("tg", "ca", 0).unwrap()),
        mindistance: 500,
        maxdistance: 1000,
        minltrlength: 100,
        maxltrlength: 1000,
        overlaps: OverlapPolicy::Best,
        ..Default::default()
    }
}

fn encode(seqs: &[(&str, &str)]) -> EncodedSequence {
    let mut encseq = EncodedSequence::new();
    for (name, seq) in seqs {
        encseq.push_sequence(name, seq.as_bytes());
    }
    encseq
}

#[test]
fn synthetic_element() {
    let seq = element();
    let encseq = encode(&[("element", &seq)]);
    let hashed = bucket_suffixes(&encseq, 8).unwrap();
    let found = run_pipeline(&encseq, &hashed, &config()).unwrap();
    let kept: Vec<_> = found.iter().filter(|b| !b.skipped).collect();
    assert_eq!(kept.len(), 1, "{:?}", found);
    let b = kept[0];
    assert_eq!((b.left_ltr_5, b.left_ltr_3), (100, 299));
    assert_eq!((b.right_ltr_5, b.right_ltr_3), (700, 899));
    assert_eq!((b.left_len(), b.right_len()), (200, 200));
    assert_eq!(b.element_len(), 800);
    assert_eq!(format!("{:.2}", b.similarity), "100.00");
    assert_eq!((b.len_left_tsd, b.len_right_tsd), (5, 5));
    assert_eq!(encseq.chars(b.left_ltr_5, b.left_ltr_5 + 2), "TG");
    assert_eq!(encseq.chars(b.right_ltr_3 - 1, b.right_ltr_3 + 1), "CA");
    assert_eq!(
        encseq.chars(b.left_ltr_5 - 5, b.left_ltr_5),
        encseq.chars(b.right_ltr_3 + 1, b.right_ltr_3 + 6)
    );

    let cfg = LtrConfig {
        longoutput: true,
        ..config()
    };
    let mut out = Vec::new();
    write_report(&mut out, &encseq, &found, &cfg).unwrap();
    let text = String::from_utf8(out).unwrap();
    let row = text.lines().last().unwrap();
    assert!(row.starts_with("101  900  800  101  300  200  "), "{}", row);
    assert!(row.ends_with("  100.00  0"), "{}", row);
}

#[test]
fn element_in_second_sequence_is_local() {
    let seq = element();
    let encseq = encode(&[("short", "ACGT"), ("element", &seq)]);
    let hashed = bucket_suffixes(&encseq, 8).unwrap();
    assert_eq!(hashed.sequences_hashed, 1);
    let found = run_pipeline(&encseq, &hashed, &config()).unwrap();
    let kept: Vec<_> = found.iter().filter(|b| !b.skipped).collect();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].contignumber, 1);
    assert_eq!(kept[0].left_ltr_5, 5 + 100);

    let mut out = Vec::new();
    write_report(&mut out, &encseq, &found, &config()).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().last().unwrap(), "101  900  800  101  300  200  701  900  200  100.00  1");
}

#[test]
fn strict_filters_reject() {
    let seq = element();
    let encseq = encode(&[("element", &seq)]);
    let hashed = bucket_suffixes(&encseq, 8).unwrap();

    // LTRs are 200 long
    let cfg = LtrConfig {
        maxltrlength: 150,
        ..config()
    };
    assert!(run_pipeline(&encseq, &hashed, &cfg).unwrap().is_empty());

    // no TSD of 6 or more
    let cfg = LtrConfig {
        tsd: Some(TsdRange::new(6, 8)),
        vicinityforcorrectboundaries: 0,
        ..config()
    };
    assert!(run_pipeline(&encseq, &hashed, &cfg).unwrap().is_empty());

    // the motif is not there
    let cfg = LtrConfig {
        motif: Some(Motif::new("ac", "gt", 0).unwrap()),
        vicinityforcorrectboundaries: 0,
        ..config()
    };
    assert!(run_pipeline(&encseq, &hashed, &cfg).unwrap().is_empty());
}

#[test]
fn through_the_index() {
    let dir = tempfile::tempdir().unwrap();
    let fa = dir.path().join("element.fa");
    let (lsi, suf) = index_paths(&fa);
    let encseq = encode(&[("element", &element())]);
    let hashed = bucket_suffixes(&encseq, 8).unwrap();
    let direct = run_pipeline(&encseq, &hashed, &config()).unwrap();
    write_index(encseq, hashed, &lsi, &suf).unwrap();

    let (encseq, hashed) = load_index(&lsi, &suf).unwrap();
    let loaded = run_pipeline(&encseq, &hashed, &config()).unwrap();
    assert_eq!(loaded, direct);
}
