use crate::{literal::Lit, proof::NodeId, trail::VariablesAssignment};

pub(crate) mod alloc;
pub(crate) mod binary;
pub(crate) mod watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClauseKind {
    Problem,
    Learned { lbd: u32 },
}

/// A clause with at least two literals.
///
/// While the clause is attached, the first two literals are the watched ones. When the clause
/// propagates, the propagated literal is moved to the first position.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SatClause {
    lits: Vec<Lit>,
    is_learned: bool,
    is_attached: bool,
    lbd: u32,
    activity: f64,
    resolution_node: Option<NodeId>,
}

impl SatClause {
    pub(crate) fn new(literals: &[Lit], kind: ClauseKind, resolution_node: Option<NodeId>) -> Self {
        debug_assert!(literals.len() >= 2, "unit and empty clauses are never materialized");
        let (is_learned, lbd) = match kind {
            ClauseKind::Problem => (false, 0),
            ClauseKind::Learned { lbd } => (true, lbd),
        };
        Self {
            lits: literals.to_vec(),
            is_learned,
            is_attached: false,
            lbd,
            activity: 0.0,
            resolution_node,
        }
    }

    pub(crate) fn lits(&self) -> &[Lit] {
        &self.lits
    }

    pub(crate) fn lits_mut(&mut self) -> &mut [Lit] {
        &mut self.lits
    }

    pub(crate) fn len(&self) -> usize {
        self.lits.len()
    }

    pub(crate) fn first_literal(&self) -> Lit {
        self.lits[0]
    }

    pub(crate) fn second_literal(&self) -> Lit {
        self.lits[1]
    }

    /// The literal this clause propagated, valid if it is the reason of an assignment.
    pub(crate) fn propagated_literal(&self) -> Lit {
        self.lits[0]
    }

    /// The false literals that implied [`SatClause::propagated_literal`].
    pub(crate) fn propagation_reason(&self) -> &[Lit] {
        &self.lits[1..]
    }

    pub(crate) fn is_learned(&self) -> bool {
        self.is_learned
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.is_attached
    }

    pub(crate) fn set_attached(&mut self, attached: bool) {
        self.is_attached = attached;
    }

    pub(crate) fn lbd(&self) -> u32 {
        self.lbd
    }

    pub(crate) fn activity(&self) -> f64 {
        self.activity
    }

    pub(crate) fn increase_activity(&mut self, increment: f64) {
        self.activity += increment;
    }

    pub(crate) fn multiply_activity(&mut self, factor: f64) {
        self.activity *= factor;
    }

    pub(crate) fn resolution_node(&self) -> Option<NodeId> {
        self.resolution_node
    }

    pub(crate) fn change_resolution_node(&mut self, node: Option<NodeId>) -> Option<NodeId> {
        std::mem::replace(&mut self.resolution_node, node)
    }

    pub(crate) fn is_satisfied(&self, assignment: &VariablesAssignment) -> bool {
        self.lits.iter().any(|&lit| assignment.is_literal_true(lit))
    }

    /// Removes the literals that are false under a level-zero assignment and pushes them to
    /// `removed`. Returns true without touching the clause if it is satisfied.
    ///
    /// The watched pair is never false at level zero unless the other watch is true, so only
    /// the tail of the clause has to be filtered.
    pub(crate) fn remove_fixed_literals_and_test_if_true(
        &mut self,
        assignment: &VariablesAssignment,
        removed: &mut Vec<Lit>,
    ) -> bool {
        debug_assert!(self.is_attached);
        removed.clear();
        if assignment.is_variable_assigned(self.lits[0].var())
            || assignment.is_variable_assigned(self.lits[1].var())
        {
            debug_assert!(self.is_satisfied(assignment));
            return true;
        }
        let mut keep = 2;
        for idx in 2..self.lits.len() {
            let lit = self.lits[idx];
            if assignment.is_literal_true(lit) {
                return true;
            }
            if assignment.is_literal_false(lit) {
                removed.push(lit);
                continue;
            }
            self.lits[keep] = lit;
            keep += 1;
        }
        self.lits.truncate(keep);
        false
    }

    pub(crate) fn memory_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.lits.capacity() * std::mem::size_of::<Lit>()
    }
}

impl std::fmt::Display for SatClause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &lit in &self.lits {
            write!(f, "{lit} ")?;
        }
        write!(f, "0")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::trail::Trail;

    fn lits(dimacs: &[i32]) -> Vec<Lit> {
        dimacs.iter().map(|&lit| Lit::from_dimacs(lit)).collect()
    }

    #[test]
    fn reason_excludes_propagated_literal() {
        let clause = SatClause::new(&lits(&[3, -1, 2]), ClauseKind::Learned { lbd: 2 }, None);
        assert_eq!(clause.propagated_literal(), Lit::from_dimacs(3));
        assert_eq!(clause.propagation_reason(), &lits(&[-1, 2])[..]);
        assert!(clause.is_learned());
        assert_eq!(clause.lbd(), 2);
        assert_eq!(format!("{clause}"), "3 -1 2 0");
    }

    #[test]
    fn remove_fixed_literals() {
        let mut trail = Trail::default();
        trail.set_var_count(5);
        trail.enqueue_with_unit_reason(Lit::from_dimacs(-3), None);
        trail.enqueue_with_unit_reason(Lit::from_dimacs(-4), None);

        let mut clause = SatClause::new(&lits(&[1, 2, 3, 4, 5]), ClauseKind::Problem, None);
        clause.set_attached(true);
        let mut removed = Vec::new();
        assert!(!clause.remove_fixed_literals_and_test_if_true(trail.assignment(), &mut removed));
        assert_eq!(clause.lits(), &lits(&[1, 2, 5])[..]);
        assert_eq!(removed, lits(&[3, 4]));

        trail.enqueue_with_unit_reason(Lit::from_dimacs(5), None);
        assert!(clause.remove_fixed_literals_and_test_if_true(trail.assignment(), &mut removed));
    }
}
