// (c) Roel Kluin, 2023, GPL v3

use derive_more::{BitOr, BitOrAssign};
use std::fmt;

const REPLACEMENT: u8 = 1;
const DELETION: u8 = 1 << 1;
const INSERTION: u8 = 1 << 2;
const MATCH_RUN: u8 = 1 << 3;
const MATCH: u8 = 1 << 4;
const MISMATCH: u8 = 1 << 5;

/// Per front cell: which edges of the edit graph lead to it. Any combination
/// of flags can be set; ties between predecessors set all of theirs.
#[derive(Clone, Copy, Default, PartialEq, Eq, BitOr, BitOrAssign)]
pub struct Traceback(u8);

impl Traceback {
    pub const REPLACEMENT: Traceback = Traceback(REPLACEMENT);
    pub const DELETION: Traceback = Traceback(DELETION);
    pub const INSERTION: Traceback = Traceback(INSERTION);
    /// the cell was reached by sliding along identical symbols
    pub const MATCH_RUN: Traceback = Traceback(MATCH_RUN);
    pub const MATCH: Traceback = Traceback(MATCH);
    pub const MISMATCH: Traceback = Traceback(MISMATCH);

    pub const fn empty() -> Self {
        Traceback(0)
    }
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
    pub fn contains(&self, other: Traceback) -> bool {
        self.0 & other.0 == other.0
    }
    pub fn insert(&mut self, other: Traceback) {
        self.0 |= other.0;
    }
}

impl fmt::Debug for Traceback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (REPLACEMENT, "R"),
            (DELETION, "D"),
            (INSERTION, "I"),
            (MATCH_RUN, "L"),
            (MATCH, "M"),
            (MISMATCH, "X"),
        ];
        let s: String = names
            .iter()
            .filter(|(bit, _)| self.0 & bit != 0)
            .map(|(_, n)| *n)
            .collect();
        write!(f, "Traceback({})", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn independent_flags() {
        let mut tb = Traceback::empty();
        assert!(tb.is_empty());
        tb.insert(Traceback::DELETION);
        tb |= Traceback::MATCH_RUN | Traceback::MATCH;
        assert!(tb.contains(Traceback::DELETION));
        assert!(tb.contains(Traceback::MATCH_RUN | Traceback::MATCH));
        assert!(!tb.contains(Traceback::INSERTION));
        assert!(!tb.contains(Traceback::MISMATCH));
        assert_eq!(format!("{:?}", tb), "Traceback(DLM)");
    }
}
