//! Clause database maintenance: deletion of learned clauses and simplification with the
//! variables fixed at level zero.

use super::SatSolver;
use crate::{clause::alloc::ClauseId, literal::Lit, trail::AssignmentType};
use std::cmp::Ordering;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Simplification {
    Unchanged,
    Detached,
    ToBinary,
    Shrunk,
}

impl SatSolver {
    /// Whether the clause currently propagates its first literal.
    pub(crate) fn is_clause_used_as_reason(&self, id: ClauseId) -> bool {
        let var = self.clauses[id].propagated_literal().var();
        self.trail.assignment().is_variable_assigned(var)
            && self.trail.info(var).kind == AssignmentType::ClausePropagation(id)
    }

    /// Clauses that are never deleted: reasons, clauses of small LBD and short clauses.
    fn clause_should_be_kept(&self, id: ClauseId) -> bool {
        let clause = &self.clauses[id];
        clause.lbd() <= self.parameters.clause_cleanup_protected_lbd
            || clause.len() <= 2
            || self.is_clause_used_as_reason(id)
    }

    /// Sets the number of learned clauses at which the next cleanup happens.
    fn init_learned_clause_limit(&mut self) {
        let num_learned = self.learned_clauses.len();
        self.target_number_of_learned_clauses = num_learned + self.parameters.clause_cleanup_period;
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_possible_wrap)]
        let before_cleanup = (self.target_number_of_learned_clauses as f64
            / self.parameters.clause_cleanup_ratio) as i64
            - num_learned as i64;
        self.num_learned_clause_before_cleanup = before_cleanup;
    }

    /// Deletes the learned clauses of highest LBD and lowest activity once enough conflicts have
    /// been learned since the last cleanup.
    pub(super) fn compress_learned_clauses_if_needed(&mut self) {
        if self.num_learned_clause_before_cleanup > 0 {
            return;
        }
        if self.learned_clauses.is_empty() {
            self.init_learned_clause_limit();
            return;
        }

        let num_learned = self.learned_clauses.len();
        let (mut learned, mut candidates): (Vec<_>, Vec<_>) = self
            .learned_clauses
            .iter()
            .copied()
            .partition(|&id| self.clause_should_be_kept(id));
        candidates.sort_by(|&a, &b| {
            let (a, b) = (&self.clauses[a], &self.clauses[b]);
            a.lbd()
                .cmp(&b.lbd())
                .then(b.activity().partial_cmp(&a.activity()).unwrap_or(Ordering::Equal))
        });
        let first_deleted = learned.len().max(num_learned.min(self.target_number_of_learned_clauses));
        learned.append(&mut candidates);
        let deleted = learned.split_off(first_deleted);
        self.learned_clauses = learned;

        for &id in &deleted {
            if self.clauses[id].is_attached() {
                self.watchers.lazy_detach(id, &mut self.clauses);
            }
            if let Some(node) = self.clauses[id].resolution_node() {
                self.proof.unlock(node);
            }
        }
        self.watchers.clean_up_watchers(&self.clauses);
        for id in deleted {
            let clause = self.clauses.release(id);
            self.stats.learning.deleted_clauses += 1;
            self.stats.learning.forgotten_literals += clause.len() as u64;
        }
        debug!(
            "learned clause cleanup kept {} of {num_learned} clauses",
            self.learned_clauses.len()
        );
        self.init_learned_clause_limit();
    }

    /// Removes the literals fixed at level zero from all clauses, detaches satisfied clauses
    /// and moves clauses that became binary to the implication graph.
    pub(super) fn process_newly_fixed_variables(&mut self) {
        debug_assert_eq!(self.trail.current_decision_level(), 0);
        let mut removed = Vec::new();
        let mut num_detached = 0;
        let mut num_binary = 0;
        for learned in [false, true] {
            let len = if learned { self.learned_clauses.len() } else { self.problem_clauses.len() };
            for idx in 0..len {
                let id = if learned { self.learned_clauses[idx] } else { self.problem_clauses[idx] };
                match self.simplify_with_fixed_variables(id, &mut removed) {
                    Simplification::Detached => num_detached += 1,
                    Simplification::ToBinary => num_binary += 1,
                    Simplification::Unchanged | Simplification::Shrunk => {}
                }
            }
        }
        self.watchers.clean_up_watchers(&self.clauses);

        if num_detached + num_binary > 0 {
            let problem_clauses = std::mem::take(&mut self.problem_clauses);
            self.problem_clauses = self.release_detached_clauses(problem_clauses);
            let learned_clauses = std::mem::take(&mut self.learned_clauses);
            self.learned_clauses = self.release_detached_clauses(learned_clauses);
        }

        self.binary.remove_fixed_variables(self.trail.assignment());
        debug!(
            "{} fixed variables: {num_detached} clauses satisfied, {num_binary} became binary",
            self.trail.index()
        );
        self.num_processed_fixed_variables = self.trail.index();
    }

    /// Releases the detached clauses of `clauses` that are not a reason, returns the others.
    fn release_detached_clauses(&mut self, clauses: Vec<ClauseId>) -> Vec<ClauseId> {
        let (kept, released): (Vec<_>, Vec<_>) = clauses
            .into_iter()
            .partition(|&id| self.clauses[id].is_attached() || self.is_clause_used_as_reason(id));
        for id in released {
            let clause = self.clauses.release(id);
            if let Some(node) = clause.resolution_node() {
                self.proof.unlock(node);
            }
        }
        kept
    }

    fn simplify_with_fixed_variables(&mut self, id: ClauseId, removed: &mut Vec<Lit>) -> Simplification {
        let clause = &mut self.clauses[id];
        if !clause.is_attached() {
            return Simplification::Unchanged;
        }
        if clause.remove_fixed_literals_and_test_if_true(self.trail.assignment(), removed) {
            self.watchers.lazy_detach(id, &mut self.clauses);
            return Simplification::Detached;
        }
        if removed.is_empty() {
            return Simplification::Unchanged;
        }
        if clause.len() == 2 && self.parameters.treat_binary_clauses_separately {
            let (first, second) = (clause.first_literal(), clause.second_literal());
            self.binary.add_binary_clause(first, second);
            self.watchers.lazy_detach(id, &mut self.clauses);
            return Simplification::ToBinary;
        }
        if self.parameters.unsat_proof {
            let old_node = self.clauses[id].resolution_node();
            let parents = self.resolution_parents(old_node, removed);
            let node = self.create_resolution_node(&parents);
            if let Some(old_node) = self.clauses[id].change_resolution_node(node) {
                self.proof.unlock(old_node);
            }
        }
        Simplification::Shrunk
    }
}
