//! Removal of redundant literals from a learned clause.
//!
//! A literal is redundant if it is implied by the other literals of the clause through the
//! reasons on the trail. All algorithms rely on `is_marked` containing the variables that were
//! seen by the first-UIP analysis.

use super::SatSolver;
use crate::{literal::Var, params::ConflictMinimization};

impl SatSolver {
    /// Minimizes the learned clause with the configured algorithm. With proofs enabled, the
    /// literals the removals depend on are recorded as used reasons.
    pub(super) fn minimize_conflict(&mut self) {
        let old_size = self.analysis.learned_conflict.len();
        match self.parameters.minimization_algorithm {
            ConflictMinimization::None => return,
            ConflictMinimization::Simple => self.minimize_conflict_simple(),
            ConflictMinimization::Recursive => self.minimize_conflict_recursively(),
            ConflictMinimization::Experimental => self.minimize_conflict_experimental(),
        }
        let new_size = self.analysis.learned_conflict.len();
        if new_size < old_size {
            self.stats.learning.minimizations += 1;
            self.stats.learning.minimized_literals += (old_size - new_size) as u64;
        }

        if self.parameters.unsat_proof {
            let current_level = self.trail.current_decision_level();
            for var in self.analysis.is_marked.positions_set_at_least_once() {
                if self.trail.info(var).level == current_level {
                    continue;
                }
                if !self.analysis.is_independent.get(var) {
                    self.analysis.reason_used.push(var.positive());
                }
            }
        }
    }

    /// Removes the literals whose reason only contains marked or level-zero literals.
    fn minimize_conflict_simple(&mut self) {
        let current_level = self.trail.current_decision_level();
        let mut kept = 1;
        for idx in 1..self.analysis.learned_conflict.len() {
            let lit = self.analysis.learned_conflict[idx];
            let var = lit.var();
            let mut can_be_removed = false;
            if self.trail.info(var).level != current_level {
                let reason = self.reason(var);
                let reason = self.trail.reason_slice(reason, &self.clauses);
                can_be_removed = !reason.is_empty()
                    && reason.iter().all(|reason_lit| {
                        let reason_var = reason_lit.var();
                        self.trail.info(reason_var).level == 0 || self.analysis.is_marked.get(reason_var)
                    });
            }
            if !can_be_removed {
                self.analysis.learned_conflict[kept] = lit;
                kept += 1;
            }
        }
        self.analysis.learned_conflict.truncate(kept);
    }

    /// Removes the literals that can be inferred from the marked variables by any chain of
    /// reasons.
    ///
    /// A variable can only be inferred from marked variables at its own level if one of them
    /// appears earlier on the trail, so the smallest trail index of a marked variable per level
    /// prunes most of the search.
    fn minimize_conflict_recursively(&mut self) {
        self.analysis.is_independent.clear_and_resize(self.num_variables);

        let current_level = self.trail.current_decision_level();
        if self.analysis.min_trail_index_per_level.len() <= current_level {
            self.analysis.min_trail_index_per_level.resize(current_level + 1, usize::MAX);
        }
        for var in self.analysis.is_marked.positions_set_at_least_once() {
            let info = self.trail.info(var);
            let min_index = &mut self.analysis.min_trail_index_per_level[info.level];
            *min_index = (*min_index).min(info.trail_index);
        }

        let mut kept = 1;
        for idx in 1..self.analysis.learned_conflict.len() {
            let lit = self.analysis.learned_conflict[idx];
            let var = lit.var();
            let info = *self.trail.info(var);
            if info.trail_index <= self.analysis.min_trail_index_per_level[info.level]
                || !self.can_be_inferred_from_conflict_variables(var)
            {
                self.analysis.is_independent.set(var);
                self.analysis.learned_conflict[kept] = lit;
                kept += 1;
            }
        }
        self.analysis.learned_conflict.truncate(kept);

        let num_marked = self.analysis.is_marked.positions_set_at_least_once().count();
        if num_marked < self.analysis.min_trail_index_per_level.len() / 2 {
            for var in self.analysis.is_marked.positions_set_at_least_once() {
                let level = self.trail.info(var).level;
                self.analysis.min_trail_index_per_level[level] = usize::MAX;
            }
        } else {
            self.analysis.min_trail_index_per_level.clear();
        }
    }

    /// Depth-first search through the reasons of `var`. Variables that turn out to be implied
    /// are marked, the ones on the stack when the search fails are independent.
    fn can_be_inferred_from_conflict_variables(&mut self, var: Var) -> bool {
        debug_assert!(self.analysis.is_marked.get(var));
        let first = self.analysis.same_reason.first_variable_with_same_reason(&self.trail, var);
        if first != var {
            return !self.analysis.is_independent.get(first);
        }

        self.analysis.dfs_stack.clear();
        self.analysis.dfs_stack.push(var);
        self.analysis.variable_to_process.clear();
        self.analysis.variable_to_process.push(var);

        let reason = self.reason(var);
        for lit in self.trail.reason_slice(reason, &self.clauses) {
            let reason_var = lit.var();
            if self.analysis.is_marked.get(reason_var) {
                continue;
            }
            let info = self.trail.info(reason_var);
            if info.level == 0 {
                self.analysis.is_marked.set(reason_var);
                continue;
            }
            if info.trail_index <= self.analysis.min_trail_index_per_level[info.level]
                || self.analysis.is_independent.get(reason_var)
            {
                return false;
            }
            self.analysis.variable_to_process.push(reason_var);
        }

        while let Some(&current) = self.analysis.variable_to_process.last() {
            if self.analysis.dfs_stack.last() == Some(&current) {
                // all reasons of `current` are implied
                if self.analysis.dfs_stack.len() > 1 {
                    self.analysis.is_marked.set(current);
                }
                self.analysis.variable_to_process.pop();
                self.analysis.dfs_stack.pop();
                continue;
            }
            if self.analysis.is_marked.get(current) {
                self.analysis.variable_to_process.pop();
                continue;
            }
            debug_assert!(!self.analysis.is_independent.get(current));

            let first = self.analysis.same_reason.first_variable_with_same_reason(&self.trail, current);
            if first != current {
                if self.analysis.is_independent.get(first) {
                    break;
                }
                self.analysis.variable_to_process.pop();
                continue;
            }

            self.analysis.dfs_stack.push(current);
            let reason = self.reason(current);
            let mut abort = false;
            for lit in self.trail.reason_slice(reason, &self.clauses) {
                let reason_var = lit.var();
                let info = self.trail.info(reason_var);
                if info.level == 0 || self.analysis.is_marked.get(reason_var) {
                    continue;
                }
                if info.trail_index <= self.analysis.min_trail_index_per_level[info.level]
                    || self.analysis.is_independent.get(reason_var)
                {
                    abort = true;
                    break;
                }
                self.analysis.variable_to_process.push(reason_var);
            }
            if abort {
                break;
            }
        }

        for &var in &self.analysis.dfs_stack {
            self.analysis.is_independent.set(var);
        }
        self.analysis.dfs_stack.is_empty()
    }

    /// Processes the conflict from the highest level down. A literal whose reason contains no
    /// unmarked literal is removed; if it contains exactly one, that literal replaces it.
    fn minimize_conflict_experimental(&mut self) {
        let current_level = self.trail.current_decision_level();
        self.analysis.is_marked.clear_and_resize(self.num_variables);
        let mut by_level: Vec<(usize, Var)> = Vec::new();
        for (idx, lit) in self.analysis.learned_conflict.iter().enumerate() {
            let var = lit.var();
            self.analysis.is_marked.set(var);
            let level = self.trail.info(var).level;
            // the asserting literal has to stay
            if idx > 0 && level < current_level {
                by_level.push((level, var));
            }
        }
        by_level.sort_unstable_by(|(level_a, var_a), (level_b, var_b)| {
            level_b.cmp(level_a).then(var_a.cmp(var_b))
        });

        let mut removed = Vec::new();
        for (_, var) in by_level {
            let reason = self.reason(var);
            let reason = self.trail.reason_slice(reason, &self.clauses);
            if reason.is_empty() {
                continue;
            }
            let mut not_contained = reason
                .iter()
                .filter(|lit| {
                    self.trail.info(lit.var()).level != 0 && !self.analysis.is_marked.get(lit.var())
                })
                .take(2);
            match (not_contained.next(), not_contained.next()) {
                (None, _) => removed.push(var),
                (Some(&replacement), None) => {
                    removed.push(var);
                    self.analysis.is_marked.set(replacement.var());
                    self.analysis.learned_conflict.push(replacement);
                }
                (Some(_), Some(_)) => {}
            }
        }

        for var in removed {
            self.analysis.is_marked.clear(var);
        }
        let is_marked = &self.analysis.is_marked;
        self.analysis.learned_conflict.retain(|lit| is_marked.get(lit.var()));
    }
}
