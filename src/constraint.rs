// Edit-budget constraints applied to a seed zone or to the overall
// seed alignment.
//
// A constraint caps how many edits of each kind (and how much total
// penalty) a search path may still spend, and optionally puts ceilings
// on what may be *left over* when the constrained region has been fully
// explored.  The ceilings express "at least this much dissimilarity
// must have been consumed" and are what keeps overlapping search roots
// from reporting the same alignment twice.

use crate::penalty::Penalties;

/// Sentinel for an unconstrained allowance or ceiling.
pub const UNSET: i32 = i32::MAX;
/// Sentinel for an unset penalty-function coefficient.
pub const UNSET_F: f32 = f32::MAX;

/// Budget of edits/mismatches/gaps/penalty permitted, with optional
/// leftover ceilings.  Plain data; search branches copy it by value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constraint {
    pub edits: i32,
    pub mms: i32,
    pub ins: i32,
    pub dels: i32,
    pub penalty: i32,
    pub edits_ceil: i32,
    pub mms_ceil: i32,
    pub ins_ceil: i32,
    pub dels_ceil: i32,
    pub penalty_ceil: i32,
    /// Constant coefficient of the read-length penalty function.
    pub pen_const: f32,
    /// Linear coefficient of the read-length penalty function.
    pub pen_linear: f32,
    /// Whether the constraint has been bound to a read length.
    pub instantiated: bool,
}

impl Default for Constraint {
    fn default() -> Self {
        Constraint::new()
    }
}

impl Constraint {
    /// A fully permissive constraint: every allowance and ceiling unset.
    pub fn new() -> Constraint {
        Constraint {
            edits: UNSET,
            mms: UNSET,
            ins: UNSET,
            dels: UNSET,
            penalty: UNSET,
            edits_ceil: UNSET,
            mms_ceil: UNSET,
            ins_ceil: UNSET,
            dels_ceil: UNSET,
            penalty_ceil: UNSET,
            pen_const: UNSET_F,
            pen_linear: UNSET_F,
            instantiated: false,
        }
    }

    /// No edits of any kind allowed.
    pub fn exact() -> Constraint {
        let mut c = Constraint::new();
        c.edits = 0;
        c.mms = 0;
        c.ins = 0;
        c.dels = 0;
        c.penalty = 0;
        c
    }

    /// Allow up to `mms` mismatches (or generic edits).  Gap kinds get
    /// no dedicated budget; a gap can still draw from the generic edit
    /// budget via the `can_delete`/`can_insert` predicates.
    pub fn mm_based(mms: i32) -> Constraint {
        let mut c = Constraint::new();
        c.mms = mms;
        c.edits = mms;
        c.ins = 0;
        c.dels = 0;
        c
    }

    /// Allow up to `edits` edits of any kind.  The per-kind budgets are
    /// zero, so every edit draws from the generic budget.
    pub fn edit_based(edits: i32) -> Constraint {
        let mut c = Constraint::new();
        c.edits = edits;
        c.mms = 0;
        c.ins = 0;
        c.dels = 0;
        c
    }

    /// Only a total penalty cap.
    pub fn penalty_based(pen: i32) -> Constraint {
        let mut c = Constraint::new();
        c.penalty = pen;
        c
    }

    /// Penalty cap derived from the read length at bind time:
    /// `round(pen_const + pen_linear * read_len)`.
    pub fn penalty_func_based(pen_const: f32, pen_linear: f32) -> Constraint {
        let mut c = Constraint::new();
        c.pen_const = pen_const;
        c.pen_linear = pen_linear;
        c
    }

    /// Evaluate the read-length penalty function.
    pub fn instantiate_penalty(read_len: usize, pen_const: f32, pen_linear: f32) -> i32 {
        (0.5 + pen_const + pen_linear * read_len as f32) as i32
    }

    /// Bind this constraint to a read length.  Re-instantiation is a
    /// programming error.
    pub fn instantiate(&mut self, read_len: usize) {
        debug_assert!(!self.instantiated);
        if self.pen_const != UNSET_F {
            self.penalty = Constraint::instantiate_penalty(read_len, self.pen_const, self.pen_linear);
        }
        self.instantiated = true;
    }

    /// True iff the budget forbids adding any edit at all.
    pub fn must_match(&self) -> bool {
        debug_assert!(self.instantiated);
        (self.mms == 0 && self.edits == 0)
            || self.penalty == 0
            || (self.mms == 0 && self.dels == 0 && self.ins == 0)
    }

    /// Can a mismatch against a base of quality `q` be charged?
    #[inline]
    pub fn can_mismatch(&self, q: u8, pens: &Penalties) -> bool {
        debug_assert!(self.instantiated);
        (self.mms > 0 || self.edits > 0) && self.penalty >= pens.mm(q) as i32
    }

    /// Can an N mismatch against a base of quality `q` be charged?
    #[inline]
    pub fn can_n(&self, q: u8, pens: &Penalties) -> bool {
        debug_assert!(self.instantiated);
        (self.mms > 0 || self.edits > 0) && self.penalty >= pens.n(q) as i32
    }

    /// Can a mismatch of *any* quality be charged?
    pub fn can_mismatch_any(&self) -> bool {
        debug_assert!(self.instantiated);
        (self.mms > 0 || self.edits > 0) && self.penalty > 0
    }

    /// Can an N mismatch of *any* quality be charged?
    pub fn can_n_any(&self) -> bool {
        debug_assert!(self.instantiated);
        self.mms > 0 || self.edits > 0
    }

    /// Can a deletion of *any* extension be charged?
    pub fn can_delete_any(&self) -> bool {
        debug_assert!(self.instantiated);
        (self.dels > 0 || self.edits > 0) && self.penalty > 0
    }

    /// Can an insertion of *any* extension be charged?
    pub fn can_insert_any(&self) -> bool {
        debug_assert!(self.instantiated);
        (self.ins > 0 || self.edits > 0) && self.penalty > 0
    }

    /// Can a deletion at extension index `ex` be charged?  The generic
    /// edit budget can stand in for the kind budget, so a policy like
    /// "2 edits of any kind" can express deletions.
    #[inline]
    pub fn can_delete(&self, ex: u32, pens: &Penalties) -> bool {
        debug_assert!(self.instantiated);
        (self.dels > 0 || self.edits > 0) && self.penalty >= pens.del(ex) as i32
    }

    /// Can an insertion at extension index `ex` be charged?
    #[inline]
    pub fn can_insert(&self, ex: u32, pens: &Penalties) -> bool {
        debug_assert!(self.instantiated);
        (self.ins > 0 || self.edits > 0) && self.penalty >= pens.ins(ex) as i32
    }

    /// Can a gap of any kind and extension be charged?
    pub fn can_gap(&self) -> bool {
        debug_assert!(self.instantiated);
        (self.ins > 0 || self.dels > 0 || self.edits > 0) && self.penalty > 0
    }

    /// Charge a mismatch of quality `q`: consumes a mismatch allowance
    /// if one remains, otherwise a generic edit.
    pub fn charge_mismatch(&mut self, q: u8, pens: &Penalties) {
        debug_assert!(self.instantiated);
        if self.mms == 0 {
            debug_assert!(self.edits > 0);
            self.edits -= 1;
        } else {
            self.mms -= 1;
        }
        self.penalty -= pens.mm(q) as i32;
        debug_assert!(self.rep_ok());
    }

    /// Charge an N mismatch of quality `q`.
    pub fn charge_n(&mut self, q: u8, pens: &Penalties) {
        debug_assert!(self.instantiated);
        if self.mms == 0 {
            debug_assert!(self.edits > 0);
            self.edits -= 1;
        } else {
            self.mms -= 1;
        }
        self.penalty -= pens.n(q) as i32;
        debug_assert!(self.rep_ok());
    }

    /// Charge a deletion at extension index `ex`.  Both the deletion
    /// counter and the generic edit counter are consumed while they
    /// have headroom; neither may go negative.
    pub fn charge_delete(&mut self, ex: u32, pens: &Penalties) {
        debug_assert!(self.instantiated);
        if self.dels > 0 {
            self.dels -= 1;
        }
        if self.edits > 0 {
            self.edits -= 1;
        }
        self.penalty -= pens.del(ex) as i32;
        debug_assert!(self.rep_ok());
    }

    /// Charge an insertion at extension index `ex`.
    pub fn charge_insert(&mut self, ex: u32, pens: &Penalties) {
        debug_assert!(self.instantiated);
        if self.ins > 0 {
            self.ins -= 1;
        }
        if self.edits > 0 {
            self.edits -= 1;
        }
        self.penalty -= pens.ins(ex) as i32;
        debug_assert!(self.rep_ok());
    }

    /// Leftover check once the constrained region is fully explored:
    /// true iff every remaining allowance is at or below its ceiling,
    /// i.e. at least as much dissimilarity as required was consumed.
    pub fn acceptable(&self) -> bool {
        debug_assert!(self.instantiated);
        self.edits <= self.edits_ceil
            && self.mms <= self.mms_ceil
            && self.ins <= self.ins_ceil
            && self.dels <= self.dels_ceil
            && self.penalty <= self.penalty_ceil
    }

    /// Internal consistency: no allowance below zero.
    pub fn rep_ok(&self) -> bool {
        self.edits >= 0
            && self.mms >= 0
            && self.ins >= 0
            && self.dels >= 0
            && self.penalty >= 0
    }
}
