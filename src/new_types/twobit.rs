// (c) Roel Kluin, 2023, GPL v3

use std::fmt;

/// Symbol stored for any character other than ACGT.
pub const WILDCARD: u8 = 0xfe;
/// Symbol between two sequences of a collection.
pub const SEPARATOR: u8 = 0xff;

const TWOBIT_CHARS: [u8; 4] = [b'A', b'C', b'T', b'G'];

/// Twobits may be unexpected: A: 0x0, C: 0x1, T: 0x2, G: 0x3.
#[derive(new, Copy, Clone, PartialEq, Eq)]
pub struct TwoBit(u8);

/// 4 packed twobits per u8.
pub struct TwoBitx4(u8);

/// A symbol as read from the store: a twobit or one of the specials.
pub fn is_base(symbol: u8) -> bool {
    symbol < 4
}

/// Printable character for a symbol; specials print as N.
pub fn symbol_char(symbol: u8) -> char {
    match symbol {
        0..=3 => TWOBIT_CHARS[symbol as usize] as char,
        _ => 'N',
    }
}

impl TwoBit {
    /// ascii to twobit: (b >> 1) & 3 maps upper and lower case ACGT on 0..4.
    pub fn from_ascii(b: u8) -> Option<TwoBit> {
        match b {
            b'A' | b'C' | b'G' | b'T' | b'a' | b'c' | b'g' | b't' => Some(TwoBit((b >> 1) & 3)),
            _ => None,
        }
    }
    pub fn as_u8(&self) -> u8 {
        self.0
    }
    pub fn complement(&self) -> TwoBit {
        TwoBit(self.0 ^ 2)
    }
    pub(crate) fn pos_shift(&self, pos: u64) -> TwoBitx4 {
        TwoBitx4(self.0 << b2_shift(pos))
    }
}

/// twobit shifts are 0, 2, 4 and 6 in a byte.
#[inline(always)]
pub(crate) fn b2_shift(pos: u64) -> u32 {
    ((pos & 3) << 1) as u32
}

#[inline(always)]
pub(crate) fn byte_pos(pos: u64) -> usize {
    (pos >> 2) as usize
}

impl TwoBitx4 {
    pub(crate) fn to_b2(&self, pos: u64) -> TwoBit {
        TwoBit((self.0 >> b2_shift(pos)) & 3)
    }
    pub(crate) fn as_u8(&self) -> u8 {
        self.0
    }
}

impl From<&u8> for TwoBitx4 {
    fn from(val: &u8) -> TwoBitx4 {
        TwoBitx4(*val)
    }
}

impl fmt::Debug for TwoBit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", symbol_char(self.0), self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii() {
        let codes: Vec<_> = b"ACTGactg"
            .iter()
            .map(|&b| TwoBit::from_ascii(b).map(|b2| b2.as_u8()))
            .collect();
        assert_eq!(codes, vec![Some(0), Some(1), Some(2), Some(3), Some(0), Some(1), Some(2), Some(3)]);
        assert_eq!(TwoBit::from_ascii(b'N'), None);
        assert_eq!(TwoBit::from_ascii(b'R'), None);
    }
    #[test]
    fn complement() {
        // A <-> T, C <-> G
        assert_eq!(TwoBit::new(0).complement(), TwoBit::new(2));
        assert_eq!(TwoBit::new(1).complement(), TwoBit::new(3));
        assert_eq!(symbol_char(TwoBit::new(3).complement().as_u8()), 'C');
    }
    #[test]
    fn packing() {
        let mut byte = 0_u8;
        for (pos, b) in b"GATC".iter().enumerate() {
            byte |= TwoBit::from_ascii(*b).unwrap().pos_shift(pos as u64).as_u8();
        }
        let x4 = TwoBitx4::from(&byte);
        let s: String = (0..4).map(|p| symbol_char(x4.to_b2(p).as_u8())).collect();
        assert_eq!(s, "GATC");
        assert_eq!(symbol_char(WILDCARD), 'N');
        assert_eq!(symbol_char(SEPARATOR), 'N');
    }
}
