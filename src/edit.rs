// Edit records produced by the recursive seed search.  Each reported
// range carries the list of edits that was live when the terminal
// state was reached, in seed-position order of discovery.

use crate::read::code_to_base;
use std::fmt;

/// Kind of edit applied at one seed position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditKind {
    /// Read base replaced by a different reference base.
    Mm,
    /// Reference base consumed with no read base (read gap).
    Del,
    /// Read base consumed with no reference base (reference gap).
    Ins,
}

/// One edit: what happened, where in the seed, and which base was
/// involved.  For `Mm` and `Del` the base is the reference base the
/// search extended with; for `Ins` it is the skipped read base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edit {
    pub pos: u32,
    pub kind: EditKind,
    pub base: u8,
}

impl Edit {
    #[inline]
    pub fn mm(pos: usize, base: u8) -> Edit {
        Edit { pos: pos as u32, kind: EditKind::Mm, base }
    }

    #[inline]
    pub fn del(pos: usize, base: u8) -> Edit {
        Edit { pos: pos as u32, kind: EditKind::Del, base }
    }

    #[inline]
    pub fn ins(pos: usize, base: u8) -> Edit {
        Edit { pos: pos as u32, kind: EditKind::Ins, base }
    }

    #[inline]
    pub fn is_gap(&self) -> bool {
        matches!(self.kind, EditKind::Del | EditKind::Ins)
    }
}

impl fmt::Display for Edit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let k = match self.kind {
            EditKind::Mm => "MM",
            EditKind::Del => "DEL",
            EditKind::Ins => "INS",
        };
        write!(f, "{}({},{})", k, code_to_base(self.base) as char, self.pos)
    }
}

/// Apply a list of edits to a seed sequence, producing the reference
/// substring the edited seed matches.  Mismatches substitute at their
/// position, deletions add a reference base before their position
/// (`pos == seed.len()` appends), insertions drop the read base.  The
/// edit list must be in reported order: ascending position, deletions
/// at one slot in reference order.  Used by the round-trip checks in
/// the integration tests.
pub fn apply_edits(seed: &[u8], edits: &[Edit]) -> Vec<u8> {
    let mut out = Vec::with_capacity(seed.len() + edits.len());
    for (i, &b) in seed.iter().enumerate() {
        for e in edits {
            if e.pos as usize == i && e.kind == EditKind::Del {
                out.push(e.base);
            }
        }
        let mm = edits
            .iter()
            .find(|e| e.pos as usize == i && e.kind == EditKind::Mm);
        let ins = edits
            .iter()
            .any(|e| e.pos as usize == i && e.kind == EditKind::Ins);
        if ins {
            continue;
        }
        match mm {
            Some(e) => out.push(e.base),
            None => out.push(b),
        }
    }
    for e in edits {
        if e.pos as usize == seed.len() && e.kind == EditKind::Del {
            out.push(e.base);
        }
    }
    out
}
