//! The trail: the ordered log of assigned literals with their decision levels and reasons.

use crate::{
    clause::alloc::{ClauseAllocator, ClauseId},
    datastructure::VarVec,
    literal::{Lit, Var},
    pb::PbConstraintId,
    proof::NodeId,
};
use std::ops::Index;

/// The current value of every variable, together with the value it had the last time it was
/// assigned (used for phase saving).
#[derive(Debug, Clone, Default)]
pub(crate) struct VariablesAssignment {
    values: VarVec<Option<bool>>,
    last_values: VarVec<Option<bool>>,
}

impl VariablesAssignment {
    fn set_var_count(&mut self, count: usize) {
        self.values.set_var_count(count);
        self.last_values.set_var_count(count);
    }

    pub(crate) fn value(&self, var: Var) -> Option<bool> {
        self.values[var]
    }

    pub(crate) fn is_variable_assigned(&self, var: Var) -> bool {
        self.values[var].is_some()
    }

    pub(crate) fn is_literal_true(&self, lit: Lit) -> bool {
        self.values[lit.var()] == Some(lit.is_positive())
    }

    pub(crate) fn is_literal_false(&self, lit: Lit) -> bool {
        self.values[lit.var()] == Some(lit.is_negative())
    }

    /// Returns the literal of `var` that is true, if `var` is assigned.
    pub(crate) fn true_literal(&self, var: Var) -> Option<Lit> {
        self.values[var].map(|value| Lit::new(var, value))
    }

    /// The value `var` had when it was last assigned, if it was ever assigned.
    pub(crate) fn last_value(&self, var: Var) -> Option<bool> {
        self.last_values[var]
    }

    fn assign(&mut self, lit: Lit) {
        self.values[lit.var()] = Some(lit.is_positive());
        self.last_values[lit.var()] = Some(lit.is_positive());
    }

    fn unassign(&mut self, var: Var) {
        self.values[var] = None;
    }

    pub(crate) fn num_variables(&self) -> usize {
        self.values.len()
    }
}

/// Why a literal was put on the trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum AssignmentType {
    #[default]
    SearchDecision,
    /// Fixed at level zero, optionally with the proof node that derives it.
    UnitReason(Option<NodeId>),
    /// Propagated by a clause; the literal is the first one of that clause.
    ClausePropagation(ClauseId),
    /// Propagated by a binary implication; stores the other (false) literal of the clause.
    BinaryPropagation(Lit),
    PbPropagation { constraint: PbConstraintId, source_trail_index: usize },
    SymmetryPropagation { symmetry: usize, source_trail_index: usize },
    /// Shares the reason of another variable that was propagated by the same step.
    SameReasonAs(Var),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct AssignmentInfo {
    pub(crate) level: usize,
    pub(crate) trail_index: usize,
    pub(crate) kind: AssignmentType,
    /// Set once the reason has been computed into the reason cache.
    pub(crate) reason_is_cached: bool,
}

/// Where the literals of a reason can be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReasonRef {
    Empty,
    Clause(ClauseId),
    Binary(Var),
    Cached(Var),
}

#[derive(Debug, Default)]
pub(crate) struct Trail {
    trail: Vec<Lit>,
    current_level: usize,
    num_enqueues: u64,
    assignment: VariablesAssignment,
    info: VarVec<AssignmentInfo>,
    reason_cache: VarVec<Vec<Lit>>,
    failing_clause: Vec<Lit>,
    failing_sat_clause: Option<ClauseId>,
    failing_resolution_node: Option<NodeId>,
}

impl Trail {
    pub(crate) fn set_var_count(&mut self, count: usize) {
        assert!(count >= self.assignment.num_variables(), "variables cannot be removed");
        self.assignment.set_var_count(count);
        self.info.set_var_count(count);
        self.reason_cache.set_var_count(count);
        self.trail.reserve(count.saturating_sub(self.trail.len()));
    }

    pub(crate) fn assignment(&self) -> &VariablesAssignment {
        &self.assignment
    }

    pub(crate) fn info(&self, var: Var) -> &AssignmentInfo {
        &self.info[var]
    }

    /// Number of literals on the trail.
    pub(crate) fn index(&self) -> usize {
        self.trail.len()
    }

    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl DoubleEndedIterator<Item = Lit> + '_ {
        self.trail.iter().copied()
    }

    pub(crate) fn current_decision_level(&self) -> usize {
        self.current_level
    }

    pub(crate) fn set_decision_level(&mut self, level: usize) {
        self.current_level = level;
    }

    pub(crate) fn num_enqueues(&self) -> u64 {
        self.num_enqueues
    }

    pub(crate) fn enqueue(&mut self, lit: Lit, kind: AssignmentType) {
        debug_assert!(
            !self.assignment.is_variable_assigned(lit.var()),
            "variable {} is already assigned",
            lit.var()
        );
        self.info[lit.var()] = AssignmentInfo {
            level: self.current_level,
            trail_index: self.trail.len(),
            kind,
            reason_is_cached: false,
        };
        self.assignment.assign(lit);
        self.trail.push(lit);
        self.num_enqueues += 1;
    }

    pub(crate) fn enqueue_search_decision(&mut self, lit: Lit) {
        self.enqueue(lit, AssignmentType::SearchDecision);
    }

    pub(crate) fn enqueue_with_unit_reason(&mut self, lit: Lit, node: Option<NodeId>) {
        self.enqueue(lit, AssignmentType::UnitReason(node));
    }

    pub(crate) fn enqueue_with_clause_reason(&mut self, lit: Lit, clause: ClauseId) {
        self.enqueue(lit, AssignmentType::ClausePropagation(clause));
    }

    pub(crate) fn enqueue_with_binary_reason(&mut self, lit: Lit, reason: Lit) {
        self.enqueue(lit, AssignmentType::BinaryPropagation(reason));
    }

    pub(crate) fn enqueue_with_pb_reason(
        &mut self,
        lit: Lit,
        source_trail_index: usize,
        constraint: PbConstraintId,
    ) {
        self.enqueue(lit, AssignmentType::PbPropagation { constraint, source_trail_index });
    }

    pub(crate) fn enqueue_with_symmetric_reason(
        &mut self,
        lit: Lit,
        source_trail_index: usize,
        symmetry: usize,
    ) {
        self.enqueue(lit, AssignmentType::SymmetryPropagation { symmetry, source_trail_index });
    }

    pub(crate) fn enqueue_with_same_reason_as(&mut self, lit: Lit, reference: Var) {
        debug_assert!(self.assignment.is_variable_assigned(reference));
        self.enqueue(lit, AssignmentType::SameReasonAs(reference));
    }

    /// Removes the last literal of the trail and unassigns its variable.
    pub(crate) fn dequeue(&mut self) -> Option<Lit> {
        let lit = self.trail.pop()?;
        self.assignment.unassign(lit.var());
        self.info[lit.var()].reason_is_cached = false;
        Some(lit)
    }

    /// Turns the assignment of a level-zero variable into a unit fact derived by `node`.
    pub(crate) fn set_fixed_variable_info(&mut self, var: Var, node: NodeId) {
        debug_assert_eq!(self.info[var].level, 0);
        let info = &mut self.info[var];
        info.kind = AssignmentType::UnitReason(Some(node));
        info.reason_is_cached = false;
    }

    /// Hands out the cache buffer of `var`; it has to be given back with
    /// [`Trail::store_cached_reason`].
    pub(crate) fn take_reason_buffer(&mut self, var: Var) -> Vec<Lit> {
        let mut buffer = std::mem::take(&mut self.reason_cache[var]);
        buffer.clear();
        buffer
    }

    pub(crate) fn store_cached_reason(&mut self, var: Var, reason: Vec<Lit>) {
        self.reason_cache[var] = reason;
        self.info[var].reason_is_cached = true;
    }

    /// Resolves a [`ReasonRef`] to the false literals that implied the assignment.
    pub(crate) fn reason_slice<'a>(
        &'a self,
        reason: ReasonRef,
        clauses: &'a ClauseAllocator,
    ) -> &'a [Lit] {
        match reason {
            ReasonRef::Empty => &[],
            ReasonRef::Clause(clause) => clauses[clause].propagation_reason(),
            ReasonRef::Binary(var) => match &self.info[var].kind {
                AssignmentType::BinaryPropagation(lit) => std::slice::from_ref(lit),
                kind => unreachable!("{var} is not a binary propagation but {kind:?}"),
            },
            ReasonRef::Cached(var) => &self.reason_cache[var],
        }
    }

    pub(crate) fn set_failing_clause(&mut self, lits: &[Lit]) {
        self.failing_clause.clear();
        self.failing_clause.extend_from_slice(lits);
        self.failing_sat_clause = None;
        self.failing_resolution_node = None;
    }

    pub(crate) fn set_failing_sat_clause(
        &mut self,
        lits: &[Lit],
        clause: ClauseId,
        node: Option<NodeId>,
    ) {
        self.set_failing_clause(lits);
        self.failing_sat_clause = Some(clause);
        self.failing_resolution_node = node;
    }

    pub(crate) fn set_failing_resolution_node(&mut self, node: Option<NodeId>) {
        self.failing_resolution_node = node;
    }

    pub(crate) fn failing_clause(&self) -> &[Lit] {
        &self.failing_clause
    }

    pub(crate) fn failing_sat_clause(&self) -> Option<ClauseId> {
        self.failing_sat_clause
    }

    pub(crate) fn failing_resolution_node(&self) -> Option<NodeId> {
        self.failing_resolution_node
    }

    pub(crate) fn memory_bytes(&self) -> usize {
        self.trail.capacity() * std::mem::size_of::<Lit>()
            + self.info.capacity_bytes()
            + self.reason_cache.capacity_bytes()
    }
}

impl Index<usize> for Trail {
    type Output = Lit;

    fn index(&self, index: usize) -> &Self::Output {
        &self.trail[index]
    }
}
