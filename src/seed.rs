// Seed policies and their read-bound instantiations.
//
// A `Seed` is a declarative search strategy: length, search type and
// the constraints on each zone of the seed.  Instantiating it against
// a concrete read offset/orientation produces the step schedule the
// bidirectional aligner executes: which seed position to consume at
// each step, in which direction, charged to which zone.

use crate::constraint::Constraint;
use crate::penalty::Penalties;
use crate::read::{Read, BASE_N};
use std::fmt;

/// Search strategy families:
///
/// 1. Left-to-right, the left half constrained to match exactly and
///    the right half subject to a looser constraint;
/// 2. the mirror image, right-to-left;
/// 3. inside-out, the center half exact and the outer quarters loose.
///
/// `Exact` uses the left-to-right schedule with every zone exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedType {
    Exact,
    LeftToRight,
    RightToLeft,
    InsideOut,
}

/// Requested mismatch policy is outside what the preset factories
/// support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyError {
    pub mms: u32,
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no seed preset for {} mismatches (0-2 supported)", self.mms)
    }
}

impl std::error::Error for PolicyError {}

/// Zone charging record for one step of the schedule.  `norm` is the
/// zone charged for mismatches and deletions, `ins` the zone charged
/// for insertions.  `close` marks the final step of a zone: the zone's
/// leftover ceilings are checked before the search advances past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepZones {
    pub norm: u8,
    pub ins: u8,
    pub close: bool,
}

/// A mismatch-only budget: `k` substitutions, no gap headroom at all.
/// The generic edit budget stays zero so the gap predicates cannot
/// draw from it.
fn mm_only(k: i32) -> Constraint {
    let mut c = Constraint::mm_based(k);
    c.edits = 0;
    c
}

/// Declarative seed policy.  `zones[0]` is the anchor (near half, or
/// center for inside-out), `zones[1]` the extension half (or left
/// outer quarter), `zones[2]` the right outer quarter.  `overall` is
/// the whole-seed budget shared by every seed of a set and charged in
/// addition to the zone budgets.
#[derive(Debug, Clone, Copy)]
pub struct Seed {
    pub len: usize,
    pub ty: SeedType,
    pub zones: [Constraint; 3],
    pub overall: Constraint,
}

impl Seed {
    pub fn new(len: usize, ty: SeedType, zones: [Constraint; 3], overall: Constraint) -> Seed {
        Seed { len, ty, zones, overall }
    }

    /// Copy of this policy shrunk to `len` (used when the read is
    /// shorter than the configured seed).
    pub fn shrunk(&self, len: usize) -> Seed {
        let mut s = *self;
        s.len = len;
        s
    }

    /// Preset: one exact-match seed.
    pub fn zero_mm_seeds(len: usize) -> Vec<Seed> {
        let exact = Constraint::exact();
        vec![Seed::new(len, SeedType::Exact, [exact, exact, exact], exact)]
    }

    /// Preset: up to one mismatch.  Two seeds partition the hit space:
    /// the left-to-right seed finds hits whose left half is exact, and
    /// the right-to-left seed requires its extension half to have
    /// consumed the mismatch (ceiling zero) so hits the first seed
    /// already finds are not re-reported.
    pub fn one_mm_seeds(len: usize) -> Vec<Seed> {
        let overall = mm_only(1);
        let exact = Constraint::exact();
        let mut rtl_ext = mm_only(1);
        rtl_ext.mms_ceil = 0;
        vec![
            Seed::new(len, SeedType::LeftToRight, [exact, mm_only(1), exact], overall),
            Seed::new(len, SeedType::RightToLeft, [exact, rtl_ext, exact], overall),
        ]
    }

    /// Preset: up to two mismatches across three root strategies.  The
    /// right-to-left seed requires at least one mismatch in its
    /// extension half; the inside-out seed requires one in each outer
    /// quarter.  Together the roots cover every placement of one or
    /// two mismatches without overlap.
    pub fn two_mm_seeds(len: usize) -> Vec<Seed> {
        let overall = mm_only(2);
        let exact = Constraint::exact();
        let mut rtl_ext = mm_only(2);
        rtl_ext.mms_ceil = 1;
        let mut outer = mm_only(1);
        outer.mms_ceil = 0;
        vec![
            Seed::new(len, SeedType::LeftToRight, [exact, mm_only(2), exact], overall),
            Seed::new(len, SeedType::RightToLeft, [exact, rtl_ext, exact], overall),
            Seed::new(len, SeedType::InsideOut, [exact, outer, outer], overall),
        ]
    }

    /// Preset dispatcher for 0, 1 or 2 mismatches.
    pub fn mm_seeds(mms: u32, len: usize) -> Result<Vec<Seed>, PolicyError> {
        match mms {
            0 => Ok(Seed::zero_mm_seeds(len)),
            1 => Ok(Seed::one_mm_seeds(len)),
            2 => Ok(Seed::two_mm_seeds(len)),
            _ => Err(PolicyError { mms }),
        }
    }

    /// Bind this policy to one (read, offset, orientation) tuple.
    /// `seq`/`qual` are the extracted seed bases and qualities (owned
    /// by the caller's results arena), `n_ceil` the maximum number of
    /// Ns the seed may cover before it is filtered.
    #[allow(clippy::too_many_arguments)]
    pub fn instantiate(
        &self,
        read: &Read,
        seq: &[u8],
        qual: &[u8],
        pens: &Penalties,
        seedoff: usize,
        seedoffidx: usize,
        seedtypeidx: usize,
        fw: bool,
        n_ceil: usize,
    ) -> InstantiatedSeed {
        debug_assert_eq!(seq.len(), self.len);
        debug_assert_eq!(qual.len(), self.len);
        let (steps, zones) = build_steps(self.ty, self.len);

        let mut cons = self.zones;
        let mut overall = self.overall;
        for c in cons.iter_mut() {
            c.instantiate(read.len());
        }
        overall.instantiate(read.len());

        // Pre-debit the Ns the seed covers so the recursion never has
        // to re-derive their cost, and decide up front whether the
        // pattern of Ns makes the seed unalignable.
        let mut nfiltered = false;
        let mut n_count = 0usize;
        for (i, &st) in steps.iter().enumerate() {
            let pos = (st.unsigned_abs() - 1) as usize;
            if seq[pos] == BASE_N {
                n_count += 1;
                let z = zones[i].norm as usize;
                if cons[z].can_n(qual[pos], pens) {
                    cons[z].charge_n(qual[pos], pens);
                } else {
                    nfiltered = true;
                    break;
                }
            }
        }
        if n_count > n_ceil {
            nfiltered = true;
        }

        // Longest initial run of same-direction, N-free steps whose
        // zones forbid any edit: these can be resolved with one ftab
        // or fchr jump instead of stepping, because no branch point
        // can occur inside the run.
        let mut maxjump = 0;
        if !nfiltered && !steps.is_empty() {
            let ltr = steps[0] > 0;
            for (i, &st) in steps.iter().enumerate() {
                let pos = (st.unsigned_abs() - 1) as usize;
                if (st > 0) != ltr
                    || !cons[zones[i].norm as usize].must_match()
                    || !cons[zones[i].ins as usize].must_match()
                    || seq[pos] == BASE_N
                {
                    break;
                }
                maxjump = i + 1;
            }
        }

        let is = InstantiatedSeed {
            steps,
            zones,
            cons,
            overall,
            maxjump,
            seedoff: seedoff as u32,
            seedoffidx: seedoffidx as u32,
            seedtypeidx: seedtypeidx as u32,
            fw,
            nfiltered,
            seed: *self,
        };
        debug_assert!(is.rep_ok());
        is
    }
}

/// Per-variant step schedule construction.  Step values are signed
/// offsets with 1-based magnitudes: `+(p+1)` extends right consuming
/// seed position `p`, `-(p+1)` extends left consuming position `p`.
/// The 1-based magnitude keeps the sign meaningful at position 0.
fn build_steps(ty: SeedType, len: usize) -> (Vec<i32>, Vec<StepZones>) {
    let mut steps = Vec::with_capacity(len);
    let mut zones = Vec::with_capacity(len);
    match ty {
        SeedType::Exact | SeedType::LeftToRight => {
            // Anchor half is positions [0, len/2); walk left to right.
            let half = len / 2;
            for p in 0..len {
                steps.push((p + 1) as i32);
                let z = if p < half { 0 } else { 1 };
                let close = (half > 0 && p == half - 1) || p == len - 1;
                zones.push(StepZones { norm: z, ins: z, close });
            }
        }
        SeedType::RightToLeft => {
            // Anchor half is positions [len - len/2, len); walk right
            // to left.
            let half = len / 2;
            let anchor_lo = len - half;
            for (i, p) in (0..len).rev().enumerate() {
                steps.push(-((p + 1) as i32));
                let z = if p >= anchor_lo { 0 } else { 1 };
                let close = (half > 0 && i == half - 1) || p == 0;
                zones.push(StepZones { norm: z, ins: z, close });
            }
        }
        SeedType::InsideOut => {
            // Center half first (rightward), then the left quarter
            // (leftward), then the right quarter (rightward).
            let lq = len / 4;
            let center_hi = len - lq;
            for p in lq..center_hi {
                steps.push((p + 1) as i32);
                zones.push(StepZones { norm: 0, ins: 0, close: p == center_hi - 1 });
            }
            for p in (0..lq).rev() {
                steps.push(-((p + 1) as i32));
                zones.push(StepZones { norm: 1, ins: 1, close: p == 0 });
            }
            for p in center_hi..len {
                steps.push((p + 1) as i32);
                zones.push(StepZones { norm: 2, ins: 2, close: p == len - 1 });
            }
        }
    }
    (steps, zones)
}

/// A seed bound to a concrete read position: the step schedule plus
/// the read-length-instantiated, N-pre-debited constraints.
///
/// The extracted seed bases and qualities live on the per-read
/// `SeedResults` arena; this struct addresses them through
/// (`fw`, `seedoffidx`) instead of holding references, which keeps the
/// result object movable.
#[derive(Debug, Clone)]
pub struct InstantiatedSeed {
    /// Visit order over seed positions, as signed 1-based offsets.
    pub steps: Vec<i32>,
    /// Zone charged at each step.
    pub zones: Vec<StepZones>,
    /// Zone constraints after read-length binding and N pre-debit.
    pub cons: [Constraint; 3],
    /// Whole-seed constraint after read-length binding.
    pub overall: Constraint,
    /// Length of the initial schedule prefix resolvable by a prefix
    /// jump; the aligner clamps this with the index's ftab length.
    pub maxjump: usize,
    /// Offset of the seed from the 5' end.
    pub seedoff: u32,
    /// Rank of that offset among the read's seed offsets.
    pub seedoffidx: u32,
    /// Which policy of the seed set this is.
    pub seedtypeidx: u32,
    /// Extracted from the forward orientation?
    pub fw: bool,
    /// Disqualified by its N pattern; the aligner skips it.
    pub nfiltered: bool,
    /// The policy this was instantiated from (possibly shrunk).
    pub seed: Seed,
}

impl InstantiatedSeed {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Internal consistency: schedule covers every position exactly
    /// once, zones are in range, the jump prefix is exact-zone and
    /// monotonic.
    pub fn rep_ok(&self) -> bool {
        let len = self.seed.len;
        if self.steps.len() != len || self.zones.len() != len {
            return false;
        }
        let mut seen = vec![false; len];
        for &st in &self.steps {
            if st == 0 {
                return false;
            }
            let pos = (st.unsigned_abs() - 1) as usize;
            if pos >= len || seen[pos] {
                return false;
            }
            seen[pos] = true;
        }
        if !self.zones.iter().all(|z| z.norm < 3 && z.ins < 3) {
            return false;
        }
        if self.maxjump > len {
            return false;
        }
        if self.maxjump > 0 {
            let ltr = self.steps[0] > 0;
            for i in 0..self.maxjump {
                if (self.steps[i] > 0) != ltr
                    || !self.cons[self.zones[i].norm as usize].must_match()
                {
                    return false;
                }
            }
        }
        true
    }
}
