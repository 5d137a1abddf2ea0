// Penalty model: the numeric cost of each kind of edit the seed search
// may introduce.  All costs are non-negative and are charged against
// the `penalty` allowance of the governing constraints.

/// How mismatch-type costs respond to base quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmCost {
    /// Same cost regardless of quality.
    Flat(u32),
    /// Cost equals the Phred quality, clamped to `max`.  High-confidence
    /// bases are expensive to contradict, low-confidence ones cheap.
    Qual { max: u32 },
}

impl MmCost {
    #[inline]
    fn cost(&self, q: u8) -> u32 {
        match *self {
            MmCost::Flat(c) => c,
            MmCost::Qual { max } => (q as u32).min(max),
        }
    }
}

/// Table of edit penalties consumed by the constraint predicates.
///
/// `del`/`ins` take the 0-based extension index of the gap: 0 is the
/// gap open, 1 the first extension, and so on.
#[derive(Debug, Clone, Copy)]
pub struct Penalties {
    pub mm: MmCost,
    /// Cost of aligning an ambiguous read base against the reference.
    pub n: MmCost,
    pub del_open: u32,
    pub del_extend: u32,
    pub ins_open: u32,
    pub ins_extend: u32,
}

impl Penalties {
    /// Quality-sensitive defaults in the spirit of short-read seed
    /// alignment: mismatches scale with quality, Ns are cheap, gaps are
    /// expensive to open and cheaper to extend.
    pub fn default_table() -> Penalties {
        Penalties {
            mm: MmCost::Qual { max: 30 },
            n: MmCost::Flat(1),
            del_open: 30,
            del_extend: 15,
            ins_open: 30,
            ins_extend: 15,
        }
    }

    /// Flat-cost table, handy in tests where qualities should not matter.
    pub fn flat(mm: u32, n: u32, gap: u32) -> Penalties {
        Penalties {
            mm: MmCost::Flat(mm),
            n: MmCost::Flat(n),
            del_open: gap,
            del_extend: gap,
            ins_open: gap,
            ins_extend: gap,
        }
    }

    /// Cost of a mismatch against a base of quality `q`.
    #[inline]
    pub fn mm(&self, q: u8) -> u32 {
        self.mm.cost(q)
    }

    /// Cost of an N mismatch against a base of quality `q`.
    #[inline]
    pub fn n(&self, q: u8) -> u32 {
        self.n.cost(q)
    }

    /// Cost of a deletion at extension index `ex` (0 = open).
    #[inline]
    pub fn del(&self, ex: u32) -> u32 {
        if ex == 0 { self.del_open } else { self.del_extend }
    }

    /// Cost of an insertion at extension index `ex` (0 = open).
    #[inline]
    pub fn ins(&self, ex: u32) -> u32 {
        if ex == 0 { self.ins_open } else { self.ins_extend }
    }
}

impl Default for Penalties {
    fn default() -> Self {
        Penalties::default_table()
    }
}
