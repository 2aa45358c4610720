use super::{Coefficient, LiteralWithCoeff, PbConstraintId};
use crate::{
    literal::{Lit, Var},
    proof::NodeId,
    trail::Trail,
};

/// A canonical constraint `Σ cᵢ·lᵢ ≤ rhs`.
///
/// Literals are grouped by coefficient: group `g` holds the literals
/// `literals[starts[g]..starts[g + 1]]`, all with coefficient `coeffs[g]`, and the groups are
/// sorted by increasing coefficient.
///
/// The slack is `rhs − Σ cᵢ` over the true literals already processed by the propagator. It is
/// not stored directly. Instead the propagator keeps a threshold, which is the slack minus
/// the coefficient of the last group below `end`. All groups from `end` on have a coefficient
/// larger than the slack, so their literals are already propagated to false. A negative
/// threshold thus signals that more groups must be propagated.
#[derive(Debug, Clone)]
pub(super) struct UpperBoundedLinearConstraint {
    literals: Vec<Lit>,
    coeffs: Vec<Coefficient>,
    starts: Vec<usize>,
    rhs: Coefficient,
    /// Number of groups whose coefficient is at most the slack.
    end: usize,
    /// Literals from here on are handled; equal to `starts[end]` outside of propagation.
    already_propagated_end: usize,
    node: Option<NodeId>,
}

impl UpperBoundedLinearConstraint {
    pub(super) fn new(cst: &[LiteralWithCoeff], node: Option<NodeId>) -> Self {
        let mut literals = Vec::with_capacity(cst.len());
        let mut coeffs = Vec::new();
        let mut starts = Vec::new();
        for term in cst {
            if coeffs.last() != Some(&term.coefficient) {
                coeffs.push(term.coefficient);
                starts.push(literals.len());
            }
            literals.push(term.literal);
        }
        // sentinel
        starts.push(literals.len());
        let end = coeffs.len();
        let already_propagated_end = literals.len();
        Self { literals, coeffs, starts, rhs: 0, end, already_propagated_end, node }
    }

    pub(super) fn rhs(&self) -> Coefficient {
        self.rhs
    }

    pub(super) fn resolution_node(&self) -> Option<NodeId> {
        self.node
    }

    pub(super) fn change_resolution_node(&mut self, node: Option<NodeId>) -> Option<NodeId> {
        std::mem::replace(&mut self.node, node)
    }

    pub(super) fn has_identical_terms(&self, cst: &[LiteralWithCoeff]) -> bool {
        cst.len() == self.literals.len()
            && self.terms().zip(cst).all(|((lit, coeff), term)| {
                lit == term.literal && coeff == term.coefficient
            })
    }

    /// Iterates over `(literal, coefficient)` in storage order.
    fn terms(&self) -> impl Iterator<Item = (Lit, Coefficient)> + '_ {
        self.coeffs.iter().enumerate().flat_map(move |(group, &coeff)| {
            self.literals[self.starts[group]..self.starts[group + 1]]
                .iter()
                .map(move |&lit| (lit, coeff))
        })
    }

    /// Sets the rhs and computes the slack from the true literals before `trail_index`,
    /// then propagates. Returns false on conflict, with the conflict in `conflict`.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn initialize_rhs(
        &mut self,
        id: PbConstraintId,
        rhs: Coefficient,
        trail_index: usize,
        threshold: &mut Coefficient,
        trail: &mut Trail,
        conflict: &mut Vec<Lit>,
        keep_fixed: bool,
    ) -> bool {
        self.rhs = rhs;
        let mut slack = rhs;
        let mut max_relevant_trail_index = 0;
        for (lit, coeff) in self.terms() {
            if trail.assignment().is_literal_true(lit)
                && trail.info(lit.var()).trail_index < trail_index
            {
                max_relevant_trail_index =
                    max_relevant_trail_index.max(trail.info(lit.var()).trail_index);
                slack -= coeff;
            }
        }
        self.end = self.coeffs.len();
        self.already_propagated_end = self.literals.len();
        self.update(slack, threshold);
        if *threshold < 0 {
            self.propagate(id, max_relevant_trail_index, threshold, trail, conflict, keep_fixed)
        } else {
            true
        }
    }

    fn update(&mut self, slack: Coefficient, threshold: &mut Coefficient) {
        *threshold = if self.end == 0 { slack } else { slack - self.coeffs[self.end - 1] };
        self.already_propagated_end = self.starts[self.end];
    }

    pub(super) fn slack_from_threshold(&self, threshold: Coefficient) -> Coefficient {
        if self.end == 0 {
            threshold
        } else {
            self.coeffs[self.end - 1] + threshold
        }
    }

    /// Forces to false every unassigned literal whose coefficient exceeds the slack. The first
    /// one gets this constraint as reason, the others share the reason of the first one
    /// because they have larger coefficients. A true literal with such a coefficient that
    /// was assigned after `source_trail_index` is a conflict.
    pub(super) fn propagate(
        &mut self,
        id: PbConstraintId,
        source_trail_index: usize,
        threshold: &mut Coefficient,
        trail: &mut Trail,
        conflict: &mut Vec<Lit>,
        keep_fixed: bool,
    ) -> bool {
        debug_assert!(*threshold < 0);
        let slack = self.slack_from_threshold(*threshold);
        if slack < 0 {
            // only possible when the rhs was tightened below the fixed part
            self.fill_violation(trail, source_trail_index, conflict);
            self.update(slack, threshold);
            return false;
        }
        while self.end > 0 && self.coeffs[self.end - 1] > slack {
            self.end -= 1;
        }

        let mut first_propagated: Option<Var> = None;
        for idx in self.starts[self.end]..self.already_propagated_end {
            let lit = self.literals[idx];
            if trail.assignment().is_literal_false(lit) {
                continue;
            }
            if trail.assignment().is_literal_true(lit) {
                if trail.info(lit.var()).trail_index > source_trail_index {
                    self.fill_reason(trail, source_trail_index, lit.var(), conflict, keep_fixed);
                    conflict.push(lit.negated());
                    self.update(slack, threshold);
                    return false;
                }
            } else if let Some(first) = first_propagated {
                trail.enqueue_with_same_reason_as(lit.negated(), first);
            } else {
                trail.enqueue_with_pb_reason(lit.negated(), source_trail_index, id);
                first_propagated = Some(lit.var());
            }
        }
        self.update(slack, threshold);
        debug_assert!(*threshold >= 0);
        true
    }

    /// All true literals up to `source_trail_index`, negated.
    fn fill_violation(&self, trail: &Trail, source_trail_index: usize, conflict: &mut Vec<Lit>) {
        conflict.clear();
        conflict.extend(self.literals.iter().filter_map(|&lit| {
            (trail.assignment().is_literal_true(lit)
                && trail.info(lit.var()).trail_index <= source_trail_index)
                .then(|| lit.negated())
        }));
    }

    /// Computes why `propagated` had to be false: the true literals assigned up to
    /// `source_trail_index`, visited from the largest coefficient down. Literals with small
    /// coefficients are dropped again as long as the remaining ones still exceed the slack.
    pub(super) fn fill_reason(
        &self,
        trail: &Trail,
        source_trail_index: usize,
        propagated: Var,
        reason: &mut Vec<Lit>,
        keep_fixed: bool,
    ) {
        reason.clear();
        let mut last_idx = 0;
        let mut last_group = 0;
        let mut slack = self.rhs;
        let mut propagated_coefficient = 0;
        let mut group = self.coeffs.len() - 1;
        for idx in (0..self.literals.len()).rev() {
            let lit = self.literals[idx];
            let coeff = self.coeffs[group];
            if lit.var() == propagated {
                propagated_coefficient = coeff;
            } else if trail.assignment().is_literal_true(lit)
                && trail.info(lit.var()).trail_index <= source_trail_index
            {
                if keep_fixed || trail.info(lit.var()).level > 0 {
                    reason.push(lit.negated());
                    last_idx = idx;
                    last_group = group;
                }
                slack -= coeff;
            }
            if idx == self.starts[group] && group > 0 {
                group -= 1;
            }
        }
        debug_assert!(propagated_coefficient > slack);

        if reason.len() <= 1 || self.coeffs.len() == 1 {
            return;
        }
        let mut limit = propagated_coefficient - slack;
        let mut group = last_group;
        if self.coeffs[group] >= limit {
            return;
        }
        for idx in last_idx..self.literals.len() {
            if idx == self.starts[group + 1] {
                group += 1;
                if self.coeffs[group] >= limit {
                    break;
                }
            }
            if reason.last() != Some(&self.literals[idx].negated()) {
                continue;
            }
            limit -= self.coeffs[group];
            reason.pop();
            if self.coeffs[group] >= limit {
                break;
            }
        }
        debug_assert!(limit >= 1);
    }

    /// Moves the propagation cursor back up after the slack increased.
    pub(super) fn untrail(&mut self, threshold: &mut Coefficient) {
        let slack = self.slack_from_threshold(*threshold);
        while self.end < self.coeffs.len() && self.coeffs[self.end] <= slack {
            self.end += 1;
        }
        self.update(slack, threshold);
    }

    pub(super) fn memory_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.literals.capacity() * std::mem::size_of::<Lit>()
            + self.coeffs.capacity() * std::mem::size_of::<Coefficient>()
            + self.starts.capacity() * std::mem::size_of::<usize>()
    }

    #[cfg(test)]
    pub(super) fn slack_from_scratch(&self, trail: &Trail, propagation_trail_index: usize) -> Coefficient {
        self.rhs
            - self
                .terms()
                .filter(|&(lit, _)| {
                    trail.assignment().is_literal_true(lit)
                        && trail.info(lit.var()).trail_index < propagation_trail_index
                })
                .map(|(_, coeff)| coeff)
                .sum::<Coefficient>()
    }
}
