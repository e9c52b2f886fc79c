const DNA_BITMASK_A: u8 = 1;
const DNA_BITMASK_C: u8 = 2;
const DNA_BITMASK_G: u8 = 4;
const DNA_BITMASK_T: u8 = 8;
const DNA_BITMASK_N: u8 = DNA_BITMASK_A | DNA_BITMASK_C | DNA_BITMASK_G | DNA_BITMASK_T;

/// A bitmasked IUPAC code for DNA bases, eg DNA_BITMASK_A|DNA_BITMASK_C
#[derive(Debug, Copy, Clone, PartialEq, Hash)]
pub struct IupacCode(u8);

impl IupacCode {
    pub fn new(bitmask: u8) -> Self {
        Self(bitmask)
    }

    #[inline(always)]
    pub fn from_letter(letter: u8) -> Self {
        match letter.to_ascii_uppercase() {
            b'A' => Self(DNA_BITMASK_A),
            b'C' => Self(DNA_BITMASK_C),
            b'G' => Self(DNA_BITMASK_G),
            b'T' => Self(DNA_BITMASK_T),
            b'U' => Self(DNA_BITMASK_T),
            b'W' => Self(DNA_BITMASK_A | DNA_BITMASK_T),
            b'S' => Self(DNA_BITMASK_C | DNA_BITMASK_G),
            b'M' => Self(DNA_BITMASK_A | DNA_BITMASK_C),
            b'K' => Self(DNA_BITMASK_G | DNA_BITMASK_T),
            b'R' => Self(DNA_BITMASK_A | DNA_BITMASK_G),
            b'Y' => Self(DNA_BITMASK_C | DNA_BITMASK_T),
            b'B' => Self(DNA_BITMASK_C | DNA_BITMASK_G | DNA_BITMASK_T),
            b'D' => Self(DNA_BITMASK_A | DNA_BITMASK_G | DNA_BITMASK_T),
            b'H' => Self(DNA_BITMASK_A | DNA_BITMASK_C | DNA_BITMASK_T),
            b'V' => Self(DNA_BITMASK_A | DNA_BITMASK_C | DNA_BITMASK_G),
            b'N' => Self(DNA_BITMASK_N),
            _ => Self(0),
        }
    }

    /// The single letter for this bitmask, or `None` for the empty code.
    #[inline(always)]
    pub fn to_letter(self) -> Option<u8> {
        match self.0 {
            DNA_BITMASK_A => Some(b'A'),
            DNA_BITMASK_C => Some(b'C'),
            DNA_BITMASK_G => Some(b'G'),
            DNA_BITMASK_T => Some(b'T'),
            0b0011 => Some(b'M'),
            0b0101 => Some(b'R'),
            0b1001 => Some(b'W'),
            0b0110 => Some(b'S'),
            0b1010 => Some(b'Y'),
            0b1100 => Some(b'K'),
            0b0111 => Some(b'V'),
            0b1011 => Some(b'H'),
            0b1101 => Some(b'D'),
            0b1110 => Some(b'B'),
            DNA_BITMASK_N => Some(b'N'),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    #[inline(always)]
    pub fn subset(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    #[inline(always)]
    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Complement code: the A and T bits swap, as do the C and G bits.
    /// R maps to Y, S and W map to themselves, N stays N.
    #[inline(always)]
    pub fn complement(self) -> Self {
        let mut mask = 0;
        if self.0 & DNA_BITMASK_A != 0 {
            mask |= DNA_BITMASK_T;
        }
        if self.0 & DNA_BITMASK_T != 0 {
            mask |= DNA_BITMASK_A;
        }
        if self.0 & DNA_BITMASK_C != 0 {
            mask |= DNA_BITMASK_G;
        }
        if self.0 & DNA_BITMASK_G != 0 {
            mask |= DNA_BITMASK_C;
        }
        Self(mask)
    }

    #[inline(always)]
    pub fn is_valid_letter(letter: u8) -> bool {
        !Self::from_letter(letter).is_empty()
    }

    /// True for the four unambiguous bases (and U, folded to T).
    #[inline(always)]
    pub fn is_unambiguous_letter(letter: u8) -> bool {
        matches!(
            letter.to_ascii_uppercase(),
            b'A' | b'C' | b'G' | b'T' | b'U'
        )
    }

    #[inline(always)]
    pub fn to_vec(&self) -> Vec<u8> {
        let mut ret = Vec::with_capacity(4);
        if self.0 & DNA_BITMASK_A != 0 {
            ret.push(b'A');
        }
        if self.0 & DNA_BITMASK_C != 0 {
            ret.push(b'C');
        }
        if self.0 & DNA_BITMASK_G != 0 {
            ret.push(b'G');
        }
        if self.0 & DNA_BITMASK_T != 0 {
            ret.push(b'T');
        }
        ret
    }

    /// Complement letter covering the full IUPAC alphabet.
    #[inline(always)]
    pub fn letter_complement(letter: u8) -> u8 {
        Self::from_letter(letter)
            .complement()
            .to_letter()
            .unwrap_or(b' ')
    }

    /// The degenerate letter covering both input letters, eg A+G => R.
    #[inline(always)]
    pub fn degenerate_letter(a: u8, b: u8) -> u8 {
        Self::from_letter(a)
            .union(Self::from_letter(b))
            .to_letter()
            .unwrap_or(b'N')
    }
}
