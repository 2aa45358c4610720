//! Binary clauses stored as an implication graph: the clause `(a ∨ b)` is stored as the two
//! implications `¬a ⇒ b` and `¬b ⇒ a`.

use crate::{
    datastructure::{bitset::SparseBitset, LitVec},
    literal::{Lit, Var},
    trail::{Trail, VariablesAssignment},
};

#[derive(Debug, Default)]
pub(crate) struct BinaryImplicationGraph {
    /// The literals implied by each literal.
    implications: LitVec<Vec<Lit>>,
    num_implications: usize,
    is_marked: SparseBitset<Lit>,
    is_removed: SparseBitset<Lit>,
    dfs_stack: Vec<Lit>,
    num_propagations: u64,
    num_minimizations: u64,
    num_literals_removed: u64,
}

impl BinaryImplicationGraph {
    pub(crate) fn set_var_count(&mut self, count: usize) {
        self.implications.set_var_count(count);
    }

    /// Number of stored binary clauses.
    pub(crate) fn num_implications(&self) -> usize {
        self.num_implications / 2
    }

    pub(crate) fn num_propagations(&self) -> u64 {
        self.num_propagations
    }

    pub(crate) fn num_minimizations(&self) -> u64 {
        self.num_minimizations
    }

    pub(crate) fn num_literals_removed(&self) -> u64 {
        self.num_literals_removed
    }

    #[cfg(test)]
    pub(crate) fn implied(&self, lit: Lit) -> &[Lit] {
        &self.implications[lit]
    }

    pub(crate) fn add_binary_clause(&mut self, a: Lit, b: Lit) {
        self.implications[a.negated()].push(b);
        self.implications[b.negated()].push(a);
        self.num_implications += 2;
    }

    /// Adds a binary clause that may already be unit under the current assignment (e.g. a
    /// learned clause right after backjumping) and propagates it.
    pub(crate) fn add_binary_conflict(&mut self, a: Lit, b: Lit, trail: &mut Trail) {
        self.add_binary_clause(a, b);
        if trail.assignment().is_literal_false(a) {
            trail.enqueue_with_binary_reason(b, a);
        } else if trail.assignment().is_literal_false(b) {
            trail.enqueue_with_binary_reason(a, b);
        }
    }

    /// Enqueues every literal implied by `true_literal`. On the first implied literal that is
    /// already false, the binary clause becomes the failing clause and false is returned.
    pub(crate) fn propagate_on_true(&mut self, true_literal: Lit, trail: &mut Trail) -> bool {
        let reason = true_literal.negated();
        for idx in 0..self.implications[true_literal].len() {
            let implied = self.implications[true_literal][idx];
            if trail.assignment().is_literal_true(implied) {
                continue;
            }
            self.num_propagations += 1;
            if trail.assignment().is_literal_false(implied) {
                trail.set_failing_clause(&[reason, implied]);
                return false;
            }
            trail.enqueue_with_binary_reason(implied, reason);
        }
        true
    }

    /// Removes every literal `l` (except the first) from `conflict` such that `¬l` is
    /// reachable from `¬conflict[0]` in the implication graph.
    pub(crate) fn minimize_conflict_with_reachability(&mut self, conflict: &mut Vec<Lit>) {
        let root = conflict[0].negated();
        self.is_marked.clear_and_resize(self.implications.len());
        self.is_marked.set(root);
        self.dfs_stack.clear();
        for &direct in &self.implications[root] {
            if self.is_marked.get(direct) {
                continue;
            }
            self.dfs_stack.push(direct);
            while let Some(lit) = self.dfs_stack.pop() {
                if self.is_marked.get(lit) {
                    continue;
                }
                self.is_marked.set(lit);
                self.dfs_stack.extend(
                    self.implications[lit].iter().copied().filter(|&l| !self.is_marked.get(l)),
                );
            }
        }
        self.remove_redundant_literals(conflict);
    }

    /// Like [`Self::minimize_conflict_with_reachability`] but only explores literals that are
    /// true and not fixed at level zero. The variables reached are added to `marked`, so the
    /// following minimization can treat them as part of the conflict.
    pub(crate) fn minimize_conflict_first(
        &mut self,
        trail: &Trail,
        conflict: &mut Vec<Lit>,
        marked: &mut SparseBitset<Var>,
    ) {
        let root = conflict[0].negated();
        self.is_marked.clear_and_resize(self.implications.len());
        self.is_marked.set(root);
        self.dfs_stack.clear();
        self.dfs_stack.push(root);
        while let Some(lit) = self.dfs_stack.pop() {
            for &implied in &self.implications[lit] {
                if self.is_marked.get(implied) {
                    continue;
                }
                if trail.assignment().is_literal_true(implied)
                    && trail.info(implied.var()).level > 0
                {
                    self.is_marked.set(implied);
                    marked.set(implied.var());
                    self.dfs_stack.push(implied);
                }
            }
        }
        self.remove_redundant_literals(conflict);
    }

    /// Removes a literal `a` when `a ⇒ b` for another literal `b` of the conflict. Inside one
    /// decision level implications may form cycles, so a literal is not removed because of an
    /// already removed literal of the same level.
    pub(crate) fn minimize_conflict_experimental(&mut self, trail: &Trail, conflict: &mut Vec<Lit>) {
        self.is_marked.clear_and_resize(self.implications.len());
        self.is_removed.clear_and_resize(self.implications.len());
        for &lit in conflict.iter() {
            self.is_marked.set(lit);
        }

        let mut kept = 1;
        for idx in 1..conflict.len() {
            let lit = conflict[idx];
            let level = trail.info(lit.var()).level;
            let redundant = self.implications[lit].iter().any(|&implied| {
                if !self.is_marked.get(implied) {
                    return false;
                }
                debug_assert!(level <= trail.info(implied.var()).level);
                !(level == trail.info(implied.var()).level && self.is_removed.get(implied))
            });
            if redundant {
                self.is_removed.set(lit);
            } else {
                conflict[kept] = lit;
                kept += 1;
            }
        }
        self.record_removal(conflict, kept);
    }

    /// Drops implication lists of fixed literals and fixed literals from implication lists.
    /// Must be called at level zero.
    pub(crate) fn remove_fixed_variables(&mut self, assignment: &VariablesAssignment) {
        self.is_marked.clear_and_resize(self.implications.len());
        for idx in 0..self.implications.len() {
            let lit = Lit::from_index(idx);
            if !assignment.is_literal_true(lit) {
                continue;
            }
            // every list containing `lit` is the list of some `¬l` with `l` in the list of
            // `¬lit`
            for &other in &self.implications[lit.negated()] {
                self.is_marked.set(other.negated());
            }
            self.num_implications -= self.implications[lit].len();
            self.num_implications -= self.implications[lit.negated()].len();
            self.implications[lit] = Vec::new();
            self.implications[lit.negated()] = Vec::new();
        }
        let marked: Vec<Lit> = self.is_marked.positions_set_at_least_once().collect();
        for lit in marked {
            let list = &mut self.implications[lit];
            let before = list.len();
            list.retain(|&implied| !assignment.is_literal_true(implied));
            self.num_implications -= before - list.len();
        }
    }

    pub(crate) fn memory_bytes(&self) -> usize {
        self.implications.nested_capacity_bytes()
    }

    fn remove_redundant_literals(&mut self, conflict: &mut Vec<Lit>) {
        let mut kept = 1;
        for idx in 1..conflict.len() {
            if !self.is_marked.get(conflict[idx].negated()) {
                conflict[kept] = conflict[idx];
                kept += 1;
            }
        }
        self.record_removal(conflict, kept);
    }

    fn record_removal(&mut self, conflict: &mut Vec<Lit>, kept: usize) {
        if kept < conflict.len() {
            self.num_minimizations += 1;
            self.num_literals_removed += (conflict.len() - kept) as u64;
            conflict.truncate(kept);
        }
    }

    /// Number of directed implications per variable.
    #[cfg(test)]
    pub(crate) fn degrees(&self) -> crate::datastructure::VarVec<usize> {
        let mut degrees = crate::datastructure::VarVec::default();
        degrees.set_var_count(self.implications.len() / 2);
        for (lit, list) in self.implications.iter() {
            degrees[lit.var()] += list.len();
        }
        degrees
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn lit(dimacs: i32) -> Lit {
        Lit::from_dimacs(dimacs)
    }

    fn graph(vars: usize, clauses: &[[i32; 2]]) -> BinaryImplicationGraph {
        let mut graph = BinaryImplicationGraph::default();
        graph.set_var_count(vars);
        for &[a, b] in clauses {
            graph.add_binary_clause(lit(a), lit(b));
        }
        graph
    }

    #[test]
    fn implications_are_symmetric() {
        let graph = graph(2, &[[-1, 2]]);
        assert_eq!(graph.implied(lit(1)), &[lit(2)]);
        assert_eq!(graph.implied(lit(-2)), &[lit(-1)]);
        assert_eq!(graph.num_implications(), 1);
    }

    #[test]
    fn propagation_chain_and_conflict() {
        let mut graph = graph(3, &[[-1, 2], [-2, 3]]);
        let mut trail = Trail::default();
        trail.set_var_count(3);
        trail.enqueue_search_decision(lit(1));
        trail.enqueue_search_decision(lit(-3));
        assert!(graph.propagate_on_true(lit(1), &mut trail));
        assert!(trail.assignment().is_literal_true(lit(2)));
        assert!(!graph.propagate_on_true(lit(2), &mut trail));
        assert_eq!(trail.failing_clause(), &[lit(-2), lit(3)]);
    }

    #[test]
    fn reachability_removes_implied_literals() {
        // the root 4 implies 1, so -1 is redundant
        let mut graph = graph(4, &[[-4, 1]]);
        let mut conflict = vec![lit(-4), lit(-1), lit(-2)];
        graph.minimize_conflict_with_reachability(&mut conflict);
        assert_eq!(conflict, vec![lit(-4), lit(-2)]);
        assert_eq!(graph.num_literals_removed(), 1);
    }

    #[test]
    fn first_marks_reached_variables() {
        let mut graph = graph(4, &[[-4, 1], [-1, 3]]);
        let mut trail = Trail::default();
        trail.set_var_count(4);
        trail.set_decision_level(1);
        trail.enqueue_search_decision(lit(2));
        trail.set_decision_level(2);
        trail.enqueue_search_decision(lit(4));
        trail.enqueue_with_binary_reason(lit(1), lit(-4));
        trail.enqueue_with_binary_reason(lit(3), lit(-1));
        let mut marked = SparseBitset::default();
        marked.clear_and_resize(4);
        let mut conflict = vec![lit(-4), lit(-3), lit(-2)];
        graph.minimize_conflict_first(&trail, &mut conflict, &mut marked);
        assert_eq!(conflict, vec![lit(-4), lit(-2)]);
        assert!(marked.get(lit(1).var()));
        assert!(marked.get(lit(3).var()));
    }

    #[test]
    fn experimental_keeps_one_literal_of_a_cycle() {
        // -1 and -2 imply each other (via 1 ∨ -2 and -1 ∨ 2, i.e. -1 ⇒ -2 and -2 ⇒ -1)
        let mut graph = graph(3, &[[1, -2], [-1, 2]]);
        let mut trail = Trail::default();
        trail.set_var_count(3);
        trail.set_decision_level(1);
        trail.enqueue_search_decision(lit(1));
        trail.enqueue_with_binary_reason(lit(2), lit(-1));
        trail.set_decision_level(2);
        trail.enqueue_search_decision(lit(3));
        let mut conflict = vec![lit(-3), lit(-1), lit(-2)];
        graph.minimize_conflict_experimental(&trail, &mut conflict);
        assert_eq!(conflict.len(), 2);
        assert_eq!(conflict[0], lit(-3));
    }

    #[test]
    fn remove_fixed() {
        let mut graph = graph(3, &[[1, 2], [-1, 3], [2, 3]]);
        let mut trail = Trail::default();
        trail.set_var_count(3);
        trail.enqueue_with_unit_reason(lit(1), None);
        trail.enqueue_with_binary_reason(lit(3), lit(-1));
        graph.remove_fixed_variables(trail.assignment());
        assert!(graph.implied(lit(-1)).is_empty());
        assert!(graph.implied(lit(-2)).is_empty());
        let degrees = graph.degrees();
        assert_eq!(degrees[lit(1).var()], 0);
        assert_eq!(degrees[lit(3).var()], 0);
    }
}
