//! Pseudo-Boolean constraints `Σ cᵢ·lᵢ ≤ rhs` over literals.
//!
//! Constraints are stored in canonical form: one term per variable, strictly positive
//! coefficients, sorted by increasing coefficient. A general linear expression is brought into
//! this form by [`compute_canonical_form`], the bounds by [`compute_canonical_rhs`] and
//! [`compute_negated_canonical_rhs`].

use crate::{
    datastructure::{bitset::SparseBitset, LitVec},
    literal::{Lit, Var},
    proof::{NodeId, UnsatProof},
    trail::Trail,
};
use constraint::UpperBoundedLinearConstraint;
use std::{
    collections::{hash_map::DefaultHasher, HashMap},
    hash::{Hash, Hasher},
};
use thiserror::Error;
use tracing::trace;

mod constraint;

pub type Coefficient = i64;

/// A term `coefficient · literal` of a linear expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LiteralWithCoeff {
    pub literal: Lit,
    pub coefficient: Coefficient,
}

impl LiteralWithCoeff {
    #[must_use]
    pub fn new(literal: Lit, coefficient: Coefficient) -> Self {
        Self { literal, coefficient }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("the coefficients of the linear expression overflow a 64-bit integer")]
pub struct CoefficientOverflow;

/// Result of [`compute_canonical_form`]: `original expression = canonical - bound_shift`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CanonicalForm {
    pub(crate) bound_shift: Coefficient,
    /// Sum of all canonical coefficients, the largest value the expression can take.
    pub(crate) max_value: Coefficient,
}

/// Rewrites `terms` into canonical form.
///
/// Terms are merged per variable (`c·x + c'·¬x = (c − c')·x + c'`), zero terms are removed and
/// negative terms are flipped (`−c·x = c·¬x − c`). The constants this introduces are returned
/// as bound shift.
///
/// # Errors
///
/// Returns [`CoefficientOverflow`] if a merged coefficient, the bound shift or the sum of the
/// coefficients does not fit into a [`Coefficient`].
pub(crate) fn compute_canonical_form(
    terms: &mut Vec<LiteralWithCoeff>,
) -> Result<CanonicalForm, CoefficientOverflow> {
    let mut bound_shift: Coefficient = 0;
    let mut max_value: Coefficient = 0;

    terms.sort_by_key(|term| term.literal);
    let mut merged: Vec<LiteralWithCoeff> = Vec::with_capacity(terms.len());
    for &term in terms.iter() {
        if term.coefficient == 0 {
            continue;
        }
        match merged.last_mut() {
            Some(representative) if representative.literal.var() == term.literal.var() => {
                if representative.literal == term.literal {
                    representative.coefficient =
                        representative.coefficient.checked_add(term.coefficient).ok_or(CoefficientOverflow)?;
                } else {
                    representative.coefficient =
                        representative.coefficient.checked_sub(term.coefficient).ok_or(CoefficientOverflow)?;
                    bound_shift = bound_shift.checked_sub(term.coefficient).ok_or(CoefficientOverflow)?;
                }
            }
            _ => {
                if merged.last().is_some_and(|last| last.coefficient == 0) {
                    merged.pop();
                }
                merged.push(term);
            }
        }
    }
    if merged.last().is_some_and(|last| last.coefficient == 0) {
        merged.pop();
    }

    for term in &mut merged {
        if term.coefficient < 0 {
            let flipped = term.coefficient.checked_neg().ok_or(CoefficientOverflow)?;
            bound_shift = bound_shift.checked_add(flipped).ok_or(CoefficientOverflow)?;
            term.coefficient = flipped;
            term.literal = term.literal.negated();
        }
        max_value = max_value.checked_add(term.coefficient).ok_or(CoefficientOverflow)?;
    }
    merged.sort_by_key(|term| (term.coefficient, term.literal));
    *terms = merged;
    Ok(CanonicalForm { bound_shift, max_value })
}

/// Checks the canonical form invariants.
pub(crate) fn is_canonical(terms: &[LiteralWithCoeff]) -> bool {
    let mut vars: Vec<Var> = terms.iter().map(|term| term.literal.var()).collect();
    vars.sort_unstable();
    vars.dedup();
    vars.len() == terms.len()
        && terms.iter().all(|term| term.coefficient > 0)
        && terms.windows(2).all(|w| w[0].coefficient <= w[1].coefficient)
}

/// The rhs of `canonical ≤ upper_bound + bound_shift`, clamped to `[-1, max_value]`.
///
/// An overflow upwards means the constraint always holds, an overflow downwards means it never
/// does.
pub(crate) fn compute_canonical_rhs(
    upper_bound: Coefficient,
    bound_shift: Coefficient,
    max_value: Coefficient,
) -> Coefficient {
    let Some(rhs) = upper_bound.checked_add(bound_shift) else {
        return if bound_shift > 0 { max_value } else { -1 };
    };
    if rhs < 0 {
        return -1;
    }
    rhs.min(max_value)
}

/// The rhs of the constraint `Σ cᵢ·¬lᵢ ≤ max_value − (lower_bound + bound_shift)`, which is
/// the lower bound rewritten over the negated literals.
pub(crate) fn compute_negated_canonical_rhs(
    lower_bound: Coefficient,
    bound_shift: Coefficient,
    max_value: Coefficient,
) -> Coefficient {
    let Some(shifted_lower_bound) = lower_bound.checked_add(bound_shift) else {
        return if bound_shift > 0 { -1 } else { max_value };
    };
    if shifted_lower_bound <= 0 {
        return max_value;
    }
    max_value - shifted_lower_bound
}

/// Caps every coefficient at `rhs + 1`; a larger coefficient cannot change which assignments
/// satisfy the constraint. Returns the new maximum value.
pub(crate) fn simplify_canonical(terms: &mut [LiteralWithCoeff], rhs: Coefficient) -> Coefficient {
    let cap = rhs.saturating_add(1);
    let mut max_value: Coefficient = 0;
    for term in terms.iter_mut() {
        term.coefficient = term.coefficient.min(cap);
        max_value = max_value.saturating_add(term.coefficient);
    }
    max_value
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct PbConstraintId(usize);

#[derive(Debug, Clone, Copy)]
struct ConstraintIndexWithCoeff {
    /// Whether the constraint has to be looked at when this literal is untrailed.
    need_untrail_inspection: bool,
    index: PbConstraintId,
    coefficient: Coefficient,
}

/// Result of a slack update that found the constraint violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PbConflict {
    pub(crate) constraint: PbConstraintId,
}

#[derive(Debug, Default)]
pub(crate) struct PbConstraints {
    constraints: Vec<UpperBoundedLinearConstraint>,
    /// Per constraint: the current slack minus the coefficient at its propagation cursor.
    /// A negative threshold means the constraint may propagate.
    thresholds: Vec<Coefficient>,
    to_update: LitVec<Vec<ConstraintIndexWithCoeff>>,
    to_untrail: SparseBitset<usize>,
    possible_duplicates: HashMap<u64, Vec<PbConstraintId>>,
    propagation_trail_index: usize,
    /// Include level-zero literals in reasons (needed for resolution proofs).
    keep_fixed_literals_in_reason: bool,
    conflict: Vec<Lit>,
    num_threshold_updates: u64,
    num_constraint_lookups: u64,
}

impl PbConstraints {
    pub(crate) fn set_var_count(&mut self, count: usize) {
        self.to_update.set_var_count(count);
    }

    pub(crate) fn set_keep_fixed_literals_in_reason(&mut self, keep: bool) {
        self.keep_fixed_literals_in_reason = keep;
    }

    #[cfg(test)]
    pub(crate) fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub(crate) fn num_threshold_updates(&self) -> u64 {
        self.num_threshold_updates
    }

    pub(crate) fn num_constraint_lookups(&self) -> u64 {
        self.num_constraint_lookups
    }

    /// Adds the canonical constraint `cst ≤ rhs` and propagates it against the part of the
    /// trail that was already processed. If an identical constraint exists, only its rhs is
    /// tightened and it takes over `node`. Nodes that are no longer referenced get unlocked.
    /// Returns false on conflict.
    pub(crate) fn add_constraint(
        &mut self,
        cst: &[LiteralWithCoeff],
        rhs: Coefficient,
        node: Option<NodeId>,
        trail: &mut Trail,
        proof: &mut UnsatProof,
    ) -> bool {
        debug_assert!(!cst.is_empty());
        debug_assert!(is_canonical(cst));

        let mut hasher = DefaultHasher::new();
        cst.hash(&mut hasher);
        let hash = hasher.finish();
        let candidates = self.possible_duplicates.entry(hash).or_default();
        if let Some(&duplicate) =
            candidates.iter().find(|&&id| self.constraints[id.0].has_identical_terms(cst))
        {
            let constraint = &mut self.constraints[duplicate.0];
            if rhs >= constraint.rhs() {
                // redundant
                if let Some(node) = node {
                    proof.unlock(node);
                }
                return true;
            }
            if let Some(old_node) = constraint.change_resolution_node(node) {
                proof.unlock(old_node);
            }
            trace!("tighten pseudo-Boolean constraint {} to rhs {rhs}", duplicate.0);
            return self.initialize_rhs(duplicate, rhs, trail);
        }

        let id = PbConstraintId(self.constraints.len());
        candidates.push(id);
        self.constraints.push(UpperBoundedLinearConstraint::new(cst, node));
        self.thresholds.push(0);
        for term in cst {
            self.to_update[term.literal].push(ConstraintIndexWithCoeff {
                need_untrail_inspection: trail.assignment().is_variable_assigned(term.literal.var()),
                index: id,
                coefficient: term.coefficient,
            });
        }
        self.initialize_rhs(id, rhs, trail)
    }

    fn initialize_rhs(&mut self, id: PbConstraintId, rhs: Coefficient, trail: &mut Trail) -> bool {
        let constraint = &mut self.constraints[id.0];
        let result = constraint.initialize_rhs(
            id,
            rhs,
            self.propagation_trail_index,
            &mut self.thresholds[id.0],
            trail,
            &mut self.conflict,
            self.keep_fixed_literals_in_reason,
        );
        if !result {
            trail.set_failing_clause(&self.conflict);
            trail.set_failing_resolution_node(constraint.resolution_node());
        }
        result
    }

    pub(crate) fn propagation_needed(&self, trail: &Trail) -> bool {
        self.propagation_trail_index < trail.index()
    }

    /// Processes the next trail literal. All thresholds of the constraints containing it are
    /// updated (so [`PbConstraints::untrail`] stays in sync) but propagation stops at the
    /// first conflict, which is recorded as the failing clause of the trail.
    pub(crate) fn propagate_next(&mut self, trail: &mut Trail) -> Result<(), PbConflict> {
        let source_trail_index = self.propagation_trail_index;
        let true_literal = trail[source_trail_index];
        self.propagation_trail_index += 1;

        let mut conflict = None;
        let updates = &mut self.to_update[true_literal];
        self.num_threshold_updates += updates.len() as u64;
        for update in updates.iter_mut() {
            let threshold = &mut self.thresholds[update.index.0];
            *threshold -= update.coefficient;
            if *threshold >= 0 || conflict.is_some() {
                continue;
            }
            update.need_untrail_inspection = true;
            self.num_constraint_lookups += 1;
            let constraint = &mut self.constraints[update.index.0];
            if !constraint.propagate(
                update.index,
                source_trail_index,
                threshold,
                trail,
                &mut self.conflict,
                self.keep_fixed_literals_in_reason,
            ) {
                trail.set_failing_clause(&self.conflict);
                trail.set_failing_resolution_node(constraint.resolution_node());
                conflict = Some(PbConflict { constraint: update.index });
            }
        }
        conflict.map_or(Ok(()), Err)
    }

    /// Restores the thresholds for all trail literals at positions `>= trail_index`.
    pub(crate) fn untrail(&mut self, trail_index: usize, trail: &Trail) {
        self.to_untrail.clear_and_resize(self.constraints.len());
        while self.propagation_trail_index > trail_index {
            self.propagation_trail_index -= 1;
            let lit = trail[self.propagation_trail_index];
            for update in &mut self.to_update[lit] {
                self.thresholds[update.index.0] += update.coefficient;
                if update.need_untrail_inspection {
                    update.need_untrail_inspection = false;
                    self.to_untrail.set(update.index.0);
                }
            }
        }
        for idx in self.to_untrail.positions_set_at_least_once() {
            self.constraints[idx].untrail(&mut self.thresholds[idx]);
        }
    }

    /// Computes the reason of `var`, which was propagated by `constraint` while processing the
    /// trail literal at `source_trail_index`.
    pub(crate) fn fill_reason(
        &self,
        trail: &Trail,
        constraint: PbConstraintId,
        source_trail_index: usize,
        var: Var,
        reason: &mut Vec<Lit>,
    ) {
        self.constraints[constraint.0].fill_reason(
            trail,
            source_trail_index,
            var,
            reason,
            self.keep_fixed_literals_in_reason,
        );
    }

    pub(crate) fn resolution_node(&self, constraint: PbConstraintId) -> Option<NodeId> {
        self.constraints[constraint.0].resolution_node()
    }

    pub(crate) fn memory_bytes(&self) -> usize {
        self.constraints.iter().map(UpperBoundedLinearConstraint::memory_bytes).sum::<usize>()
            + self.to_update.nested_capacity_bytes()
            + self.thresholds.capacity() * std::mem::size_of::<Coefficient>()
    }

    /// Recomputes every slack from scratch and compares it with the incremental one.
    #[cfg(test)]
    pub(crate) fn check_slacks(&self, trail: &Trail) {
        for (idx, constraint) in self.constraints.iter().enumerate() {
            let expected = constraint.slack_from_scratch(trail, self.propagation_trail_index);
            assert_eq!(
                constraint.slack_from_threshold(self.thresholds[idx]),
                expected,
                "slack mismatch for constraint {idx}"
            );
        }
    }

    #[cfg(test)]
    pub(crate) fn thresholds(&self) -> &[Coefficient] {
        &self.thresholds
    }
}

#[cfg(test)]
mod test;
