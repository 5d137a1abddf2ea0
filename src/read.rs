// Read representation shared by the seed instantiation and search layers.
//
// Bases are stored 2-bit encoded with an extra marker for ambiguous
// calls: A=0, C=1, G=2, T=3, N=4.  Qualities are Phred-like values,
// one per base.  The reverse complement is derived on demand rather
// than stored.

/// Encoded value of an ambiguous ('N') base.
pub const BASE_N: u8 = 4;

/// Convert an ASCII nucleotide to its 2-bit code (A=0, C=1, G=2, T=3).
/// Anything that is not an unambiguous ACGT character maps to `BASE_N`.
#[inline]
pub fn base_to_code(b: u8) -> u8 {
    match b {
        b'A' | b'a' => 0,
        b'C' | b'c' => 1,
        b'G' | b'g' => 2,
        b'T' | b't' => 3,
        _ => BASE_N,
    }
}

/// Convert a 2-bit code back to its ASCII nucleotide.
#[inline]
pub fn code_to_base(c: u8) -> u8 {
    match c {
        0 => b'A',
        1 => b'C',
        2 => b'G',
        3 => b'T',
        _ => b'N',
    }
}

/// Complement a 2-bit code.  N stays N; the XOR trick is avoided on
/// purpose because `4 ^ 3` is not a valid code.
#[inline]
pub fn complement_code(c: u8) -> u8 {
    if c < 4 { 3 - c } else { BASE_N }
}

/// Decode a slice of 2-bit codes into an ASCII string.
pub fn decode_seq(codes: &[u8]) -> String {
    codes.iter().map(|&c| code_to_base(c) as char).collect()
}

/// Decode a slice of Phred-like qualities into the usual Phred+33 string.
pub fn decode_qual(quals: &[u8]) -> String {
    quals.iter().map(|&q| (q.saturating_add(33)) as char).collect()
}

/// One sequencing read as consumed by the seed alignment core.
///
/// Only the fields the core needs are present: the forward 2-bit
/// sequence, the forward qualities and a name used for log messages
/// and sink records.
#[derive(Debug, Clone, Default)]
pub struct Read {
    pub name: String,
    /// Forward base sequence, 2-bit encoded plus `BASE_N`.
    pub seq: Vec<u8>,
    /// Phred-like base qualities, same length as `seq`.
    pub qual: Vec<u8>,
}

impl Read {
    /// Build a read from ASCII bases and Phred+33 qualities.
    pub fn from_ascii(name: &str, seq: &[u8], qual: &[u8]) -> Read {
        debug_assert_eq!(seq.len(), qual.len());
        Read {
            name: name.to_string(),
            seq: seq.iter().map(|&b| base_to_code(b)).collect(),
            qual: qual.iter().map(|&q| q.saturating_sub(33)).collect(),
        }
    }

    /// Build a read with a flat quality value for every base.
    pub fn with_flat_qual(name: &str, seq: &[u8], q: u8) -> Read {
        Read {
            name: name.to_string(),
            seq: seq.iter().map(|&b| base_to_code(b)).collect(),
            qual: vec![q; seq.len()],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// Base at offset `i` from the 5' end of the chosen orientation.
    /// For the reverse complement this walks the forward sequence from
    /// the 3' end and complements, so no reverse-complement buffer is
    /// ever materialized.
    #[inline]
    pub fn base(&self, i: usize, fw: bool) -> u8 {
        if fw {
            self.seq[i]
        } else {
            complement_code(self.seq[self.len() - 1 - i])
        }
    }

    /// Quality at offset `i` from the 5' end of the chosen orientation.
    #[inline]
    pub fn quality(&self, i: usize, fw: bool) -> u8 {
        if fw {
            self.qual[i]
        } else {
            self.qual[self.len() - 1 - i]
        }
    }

    /// Forward sequence decoded to ASCII, for sink records.
    pub fn seq_ascii(&self) -> String {
        decode_seq(&self.seq)
    }

    /// Forward qualities as a Phred+33 string, for sink records.
    pub fn qual_ascii(&self) -> String {
        decode_qual(&self.qual)
    }
}
