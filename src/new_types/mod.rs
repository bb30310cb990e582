// (c) Roel Kluin, 2023, GPL v3

// symbols: twobit, wildcard, separator
pub mod twobit;
pub mod traceback;
