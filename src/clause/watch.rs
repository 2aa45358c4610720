//! Two-watched-literal propagation for clauses of size three or more (and binary clauses when
//! they are not special-cased).

use super::{
    alloc::{ClauseAllocator, ClauseId},
    SatClause,
};
use crate::{
    datastructure::{bitset::SparseBitset, LitVec, VarVec},
    literal::Lit,
    trail::Trail,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Watcher {
    clause: ClauseId,
    /// A literal of the clause; if it is true the clause need not be inspected.
    blocking_literal: Lit,
}

/// Occurrence counts of a variable in the attached clauses.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct VariableInfo {
    pub(crate) num_positive_clauses: u32,
    pub(crate) num_negative_clauses: u32,
    pub(crate) num_appearances: u32,
    pub(crate) weighted_num_appearances: f64,
}

#[derive(Debug, Default)]
pub(crate) struct LiteralWatchers {
    /// Clauses to inspect when the literal becomes false.
    watchers_on_false: LitVec<Vec<Watcher>>,
    needs_cleaning: SparseBitset<Lit>,
    is_clean: bool,
    statistics: VarVec<VariableInfo>,
    num_watched_clauses: usize,
    num_inspected_clauses: u64,
}

impl LiteralWatchers {
    pub(crate) fn set_var_count(&mut self, count: usize) {
        self.watchers_on_false.set_var_count(count);
        self.needs_cleaning.clear_and_resize(2 * count);
        self.statistics.set_var_count(count);
        self.is_clean = true;
    }

    /// Picks two non-false literals as watches and attaches the clause. If only one literal is
    /// not false it gets propagated. Returns false (without attaching) if all literals are
    /// false.
    pub(crate) fn attach_and_propagate(
        &mut self,
        id: ClauseId,
        clauses: &mut ClauseAllocator,
        trail: &mut Trail,
    ) -> bool {
        let clause = &mut clauses[id];
        debug_assert!(!clause.is_attached());
        let assignment = trail.assignment();
        let lits = clause.lits_mut();

        let mut num_not_false = 0;
        for idx in 0..lits.len() {
            if !assignment.is_literal_false(lits[idx]) {
                lits.swap(idx, num_not_false);
                num_not_false += 1;
                if num_not_false == 2 {
                    break;
                }
            }
        }
        if num_not_false == 0 {
            return false;
        }
        if num_not_false == 1 {
            // watch the false literal with the highest level so the watches stay valid on
            // backtrack
            let mut max_level = trail.info(lits[1].var()).level;
            for idx in 2..lits.len() {
                let level = trail.info(lits[idx].var()).level;
                if level > max_level {
                    max_level = level;
                    lits.swap(1, idx);
                }
            }
            if !assignment.is_variable_assigned(lits[0].var()) {
                let lit = lits[0];
                trail.enqueue_with_clause_reason(lit, id);
            }
        }
        let clause = &mut clauses[id];
        let (first, second) = (clause.first_literal(), clause.second_literal());
        self.attach_on_false(first, second, id);
        self.attach_on_false(second, first, id);
        clause.set_attached(true);
        self.num_watched_clauses += 1;
        self.update_statistics(clause, true);
        true
    }

    /// Registers `clause` to be inspected once `lit` becomes false.
    pub(crate) fn attach_on_false(&mut self, lit: Lit, blocking_literal: Lit, clause: ClauseId) {
        self.watchers_on_false[lit].push(Watcher { clause, blocking_literal });
    }

    /// Inspects all clauses watching `false_literal`. Moves watches, propagates or, if a
    /// clause has all literals false, records it as the failing clause and returns false.
    pub(crate) fn propagate_on_false(
        &mut self,
        false_literal: Lit,
        clauses: &mut ClauseAllocator,
        trail: &mut Trail,
    ) -> bool {
        debug_assert!(self.is_clean, "watchers must be cleaned before propagation");
        let mut watchers = std::mem::take(&mut self.watchers_on_false[false_literal]);
        let mut kept = 0;
        let mut result = true;

        let mut idx = 0;
        while idx < watchers.len() {
            let watcher = watchers[idx];
            idx += 1;
            if trail.assignment().is_literal_true(watcher.blocking_literal) {
                watchers[kept] = watcher;
                kept += 1;
                continue;
            }
            self.num_inspected_clauses += 1;

            let clause = &mut clauses[watcher.clause];
            let lits = clause.lits_mut();
            let other_watched = if lits[0] == false_literal { lits[1] } else { lits[0] };
            if trail.assignment().is_literal_true(other_watched) {
                watchers[kept] = Watcher { clause: watcher.clause, blocking_literal: other_watched };
                kept += 1;
                continue;
            }

            // look for a new literal to watch
            if let Some(pos) =
                (2..lits.len()).find(|&pos| !trail.assignment().is_literal_false(lits[pos]))
            {
                let new_watch = lits[pos];
                lits[0] = other_watched;
                lits[1] = new_watch;
                lits[pos] = false_literal;
                self.watchers_on_false[new_watch]
                    .push(Watcher { clause: watcher.clause, blocking_literal: other_watched });
                continue;
            }

            // every literal but `other_watched` is false
            watchers[kept] = watcher;
            kept += 1;
            if trail.assignment().is_literal_false(other_watched) {
                let node = clause.resolution_node();
                trail.set_failing_sat_clause(clause.lits(), watcher.clause, node);
                result = false;
                break;
            }
            lits[0] = other_watched;
            lits[1] = false_literal;
            trail.enqueue_with_clause_reason(other_watched, watcher.clause);
        }

        // keep the watchers that were not inspected because of a conflict
        while idx < watchers.len() {
            watchers[kept] = watchers[idx];
            kept += 1;
            idx += 1;
        }
        watchers.truncate(kept);
        debug_assert!(self.watchers_on_false[false_literal].is_empty());
        self.watchers_on_false[false_literal] = watchers;
        result
    }

    /// Detaches the clause; its watchers are removed on the next
    /// [`LiteralWatchers::clean_up_watchers`].
    pub(crate) fn lazy_detach(&mut self, id: ClauseId, clauses: &mut ClauseAllocator) {
        let clause = &mut clauses[id];
        debug_assert!(clause.is_attached());
        clause.set_attached(false);
        self.num_watched_clauses -= 1;
        self.needs_cleaning.set(clause.first_literal());
        self.needs_cleaning.set(clause.second_literal());
        self.is_clean = false;
        self.update_statistics(clause, false);
    }

    /// Removes all watchers of detached clauses.
    pub(crate) fn clean_up_watchers(&mut self, clauses: &ClauseAllocator) {
        for lit in self.needs_cleaning.positions_set_at_least_once() {
            self.watchers_on_false[lit].retain(|watcher| clauses[watcher.clause].is_attached());
        }
        self.needs_cleaning.clear_all();
        self.is_clean = true;
    }

    pub(crate) fn statistics(&self) -> &VarVec<VariableInfo> {
        &self.statistics
    }

    pub(crate) fn num_watched_clauses(&self) -> usize {
        self.num_watched_clauses
    }

    pub(crate) fn num_inspected_clauses(&self) -> u64 {
        self.num_inspected_clauses
    }

    pub(crate) fn memory_bytes(&self) -> usize {
        self.watchers_on_false.nested_capacity_bytes() + self.statistics.capacity_bytes()
    }

    fn update_statistics(&mut self, clause: &SatClause, added: bool) {
        let size = clause.len() as f64;
        for &lit in clause.lits() {
            let info = &mut self.statistics[lit.var()];
            if added {
                info.num_appearances += 1;
                info.weighted_num_appearances += 1.0 / size;
                if lit.is_positive() {
                    info.num_positive_clauses += 1;
                } else {
                    info.num_negative_clauses += 1;
                }
            } else {
                info.num_appearances -= 1;
                info.weighted_num_appearances -= 1.0 / size;
                if lit.is_positive() {
                    info.num_positive_clauses -= 1;
                } else {
                    info.num_negative_clauses -= 1;
                }
            }
        }
    }

    /// Checks that every attached clause is watched by its first two literals and that those
    /// are not false unless the clause is satisfied or conflicting.
    #[cfg(test)]
    pub(crate) fn check_watch_invariant(&self, clauses: &ClauseAllocator, ids: &[ClauseId], trail: &Trail) {
        for &id in ids {
            let clause = &clauses[id];
            if !clause.is_attached() {
                continue;
            }
            for lit in [clause.first_literal(), clause.second_literal()] {
                assert!(
                    self.watchers_on_false[lit].iter().any(|w| w.clause == id),
                    "clause {clause} is not watched by {lit}"
                );
            }
            let assignment = trail.assignment();
            let watches_ok = [clause.first_literal(), clause.second_literal()]
                .iter()
                .all(|&lit| !assignment.is_literal_false(lit));
            let all_false = clause.lits().iter().all(|&lit| assignment.is_literal_false(lit));
            assert!(
                watches_ok || clause.is_satisfied(assignment) || all_false,
                "watch invariant violated for {clause}"
            );
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clause::ClauseKind;

    fn lit(dimacs: i32) -> Lit {
        Lit::from_dimacs(dimacs)
    }

    fn setup(clause: &[i32]) -> (LiteralWatchers, ClauseAllocator, Trail, ClauseId) {
        let mut watchers = LiteralWatchers::default();
        watchers.set_var_count(4);
        let mut trail = Trail::default();
        trail.set_var_count(4);
        let mut clauses = ClauseAllocator::default();
        let lits: Vec<_> = clause.iter().map(|&l| lit(l)).collect();
        let id = clauses.add(SatClause::new(&lits, ClauseKind::Problem, None));
        (watchers, clauses, trail, id)
    }

    /// Propagates every trail literal from `from` on, like the solver does.
    fn propagate(
        watchers: &mut LiteralWatchers,
        clauses: &mut ClauseAllocator,
        trail: &mut Trail,
        from: usize,
    ) -> bool {
        let mut idx = from;
        while idx < trail.index() {
            let lit = trail[idx];
            if !watchers.propagate_on_false(lit.negated(), clauses, trail) {
                return false;
            }
            idx += 1;
        }
        true
    }

    #[test]
    fn unit_propagation() {
        let (mut watchers, mut clauses, mut trail, id) = setup(&[1, 2, 3]);
        assert!(watchers.attach_and_propagate(id, &mut clauses, &mut trail));
        assert_eq!(watchers.statistics()[lit(1).var()].num_positive_clauses, 1);

        trail.set_decision_level(1);
        trail.enqueue_search_decision(lit(-1));
        trail.set_decision_level(2);
        trail.enqueue_search_decision(lit(-3));
        assert!(propagate(&mut watchers, &mut clauses, &mut trail, 0));
        assert!(trail.assignment().is_literal_true(lit(2)));
        assert_eq!(clauses[id].propagated_literal(), lit(2));
        watchers.check_watch_invariant(&clauses, &[id], &trail);
    }

    #[test]
    fn conflict_sets_failing_clause() {
        let (mut watchers, mut clauses, mut trail, id) = setup(&[1, 2]);
        assert!(watchers.attach_and_propagate(id, &mut clauses, &mut trail));
        trail.set_decision_level(1);
        trail.enqueue_search_decision(lit(-1));
        trail.enqueue_search_decision(lit(-2));
        assert!(!propagate(&mut watchers, &mut clauses, &mut trail, 0));
        assert_eq!(trail.failing_sat_clause(), Some(id));
        let mut failing = trail.failing_clause().to_vec();
        failing.sort();
        assert_eq!(failing, vec![lit(1), lit(2)]);
    }

    #[test]
    fn attach_on_assigned_clause_propagates() {
        let (mut watchers, mut clauses, mut trail, id) = setup(&[1, 2, 3]);
        trail.set_decision_level(1);
        trail.enqueue_search_decision(lit(-2));
        trail.set_decision_level(2);
        trail.enqueue_search_decision(lit(-3));
        assert!(watchers.attach_and_propagate(id, &mut clauses, &mut trail));
        assert!(trail.assignment().is_literal_true(lit(1)));
        // the false watch is the one with the highest level
        assert_eq!(clauses[id].second_literal(), lit(3));
    }

    #[test]
    fn lazy_detach_and_clean() {
        let (mut watchers, mut clauses, mut trail, id) = setup(&[1, 2, 3]);
        assert!(watchers.attach_and_propagate(id, &mut clauses, &mut trail));
        watchers.lazy_detach(id, &mut clauses);
        watchers.clean_up_watchers(&clauses);
        assert_eq!(watchers.num_watched_clauses(), 0);
        assert_eq!(watchers.statistics()[lit(1).var()].num_appearances, 0);

        trail.set_decision_level(1);
        trail.enqueue_search_decision(lit(-1));
        trail.enqueue_search_decision(lit(-2));
        trail.enqueue_search_decision(lit(-3));
        // the detached clause does not conflict anymore
        assert!(propagate(&mut watchers, &mut clauses, &mut trail, 0));
    }
}
