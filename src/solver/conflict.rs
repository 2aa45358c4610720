//! First-UIP conflict analysis and the bookkeeping of learned clauses.

use super::SatSolver;
use crate::{
    clause::{alloc::ClauseId, ClauseKind, SatClause},
    datastructure::{bitset::SparseBitset, VarVec},
    literal::{Lit, LitSlice, Var},
    params::BinaryMinimization,
    proof::NodeId,
    trail::{AssignmentType, ReasonRef, Trail},
};
use tracing::{debug, trace};

/// Scratch space of the conflict analysis, reused between conflicts.
#[derive(Debug, Default)]
pub(crate) struct ConflictAnalysis {
    pub(crate) learned_conflict: Vec<Lit>,
    /// Literals whose reasons were expanded, and level-zero literals that were dropped.
    pub(crate) reason_used: Vec<Lit>,
    pub(crate) is_marked: SparseBitset<Var>,
    pub(crate) is_independent: SparseBitset<Var>,
    is_level_marked: SparseBitset<usize>,
    pub(crate) min_trail_index_per_level: Vec<usize>,
    pub(crate) dfs_stack: Vec<Var>,
    pub(crate) variable_to_process: Vec<Var>,
    pub(crate) same_reason: SameReasonIdentifier,
}

/// Groups variables that were propagated by the same step, e.g. all literals a pseudo-Boolean
/// constraint fixed at once. Only the first variable of a group that is queried is expanded
/// during analysis.
#[derive(Debug, Default)]
pub(crate) struct SameReasonIdentifier {
    first_variable: VarVec<Option<Var>>,
    touched: Vec<Var>,
}

impl SameReasonIdentifier {
    pub(crate) fn clear(&mut self) {
        for &key in &self.touched {
            self.first_variable[key] = None;
        }
        self.touched.clear();
    }

    /// Returns the first variable with the same reason as `var` that was queried since the last
    /// [`SameReasonIdentifier::clear`], `var` itself if there is none.
    pub(crate) fn first_variable_with_same_reason(&mut self, trail: &Trail, var: Var) -> Var {
        let key = match trail.info(var).kind {
            AssignmentType::SameReasonAs(reference) => reference,
            _ => var,
        };
        if self.first_variable.len() <= key.as_index() {
            self.first_variable.set_var_count(trail.assignment().num_variables());
        }
        match self.first_variable[key] {
            Some(first) => first,
            None => {
                self.first_variable[key] = Some(var);
                self.touched.push(key);
                var
            }
        }
    }
}

/// Number of distinct non-zero decision levels of `literals`.
pub(crate) fn compute_lbd(trail: &Trail, marks: &mut SparseBitset<usize>, literals: &[Lit]) -> u32 {
    // levels of learned clause literals can be above the current level after a backjump
    marks.clear_and_resize(trail.assignment().num_variables() + 1);
    let mut lbd = 0;
    for lit in literals {
        let level = trail.info(lit.var()).level;
        if level > 0 && !marks.get(level) {
            marks.set(level);
            lbd += 1;
        }
    }
    lbd
}

enum Expansion {
    FailingClause,
    Reason(ReasonRef),
}

impl SatSolver {
    /// Learns from the conflict the last propagation ran into and backjumps so that the learned
    /// clause propagates. Returns the trail index the backjump went back to, `None` if the
    /// conflict does not depend on any decision.
    pub(super) fn resolve_conflict(&mut self) -> Option<usize> {
        self.analysis.same_reason.clear();
        self.compute_first_uip_conflict();
        if self.analysis.learned_conflict.is_empty() {
            debug!("conflict at level 0, the problem is unsat");
            self.is_model_unsat = true;
            return None;
        }
        debug_assert!(self.is_conflict_valid(&self.analysis.learned_conflict));

        let lbd_limit = if self.parameters.use_lbd && self.parameters.use_glucose_bump_again_strategy {
            compute_lbd(&self.trail, &mut self.analysis.is_level_marked, &self.analysis.learned_conflict)
        } else {
            0
        };
        let max_activity = self.parameters.max_variable_activity_value;
        self.vsids.bump_variable_activities(
            &self.analysis.learned_conflict,
            &self.trail,
            &self.clauses,
            lbd_limit,
            max_activity,
        );
        self.vsids.bump_variable_activities(
            &self.analysis.reason_used,
            &self.trail,
            &self.clauses,
            lbd_limit,
            max_activity,
        );
        if let Some(id) = self.trail.failing_sat_clause() {
            self.bump_clause_activity(id);
        }
        self.bump_reason_activities();

        let has_binary_clauses = self.binary.num_implications() != 0;
        if has_binary_clauses && self.parameters.binary_minimization_algorithm == BinaryMinimization::First {
            self.binary.minimize_conflict_first(
                &self.trail,
                &mut self.analysis.learned_conflict,
                &mut self.analysis.is_marked,
            );
        }
        self.minimize_conflict();
        if has_binary_clauses {
            match self.parameters.binary_minimization_algorithm {
                BinaryMinimization::WithReachability => {
                    self.binary.minimize_conflict_with_reachability(&mut self.analysis.learned_conflict);
                }
                BinaryMinimization::Experimental => {
                    self.binary.minimize_conflict_experimental(&self.trail, &mut self.analysis.learned_conflict);
                }
                BinaryMinimization::None | BinaryMinimization::First => {}
            }
        }
        debug_assert!(self.is_conflict_valid(&self.analysis.learned_conflict));

        let node = if self.parameters.unsat_proof {
            let parents = self.resolution_parents(self.trail.failing_resolution_node(), &self.analysis.reason_used);
            self.create_resolution_node(&parents)
        } else {
            None
        };

        self.stats.learning.learned_literals += self.analysis.learned_conflict.len() as u64;
        let backtrack_level = self.compute_backtrack_level(&self.analysis.learned_conflict);
        trace!(
            "learned {} at level {}, backjump to level {backtrack_level}",
            LitSlice::from(self.analysis.learned_conflict.as_slice()),
            self.trail.current_decision_level(),
        );
        self.backtrack(backtrack_level);
        let first_propagation_index = self.trail.index();
        self.add_learned_clause_and_enqueue_unit_propagation(node);

        self.vsids.decay_variable_activities();
        self.vsids.decay_clause_activities(self.parameters.clause_activity_decay);
        self.restart.on_conflict();

        let period = self.parameters.glucose_decay_increment_period;
        if period > 0
            && self.stats.search.failures % period == 0
            && self.vsids.decay() < self.parameters.glucose_max_decay
        {
            let decay = self.vsids.decay() + self.parameters.glucose_decay_increment;
            self.vsids.set_decay(decay.min(self.parameters.glucose_max_decay));
        }
        Some(first_propagation_index)
    }

    /// Computes the first-UIP learned clause of the current failing clause into
    /// `analysis.learned_conflict`. The first literal of the result is the negation of the UIP,
    /// all others are false at lower levels. Level-zero literals are dropped and recorded in
    /// `analysis.reason_used` together with every literal whose reason was expanded.
    ///
    /// The result is empty if the conflict only involves level-zero literals.
    pub(crate) fn compute_first_uip_conflict(&mut self) {
        self.analysis.is_marked.clear_and_resize(self.num_variables);
        self.analysis.learned_conflict.clear();
        self.analysis.reason_used.clear();

        let Some(mut trail_index) = self
            .trail
            .failing_clause()
            .iter()
            .map(|lit| self.trail.info(lit.var()).trail_index)
            .max()
        else {
            return;
        };
        let highest_level = self.trail.info(self.trail[trail_index].var()).level;
        if highest_level == 0 {
            return;
        }

        // Number of marked literals at the highest level that still have to be expanded.
        let mut num_literals_at_highest_level = 0;
        let mut to_expand = Expansion::FailingClause;
        loop {
            let literals = match to_expand {
                Expansion::FailingClause => self.trail.failing_clause(),
                Expansion::Reason(reason) => self.trail.reason_slice(reason, &self.clauses),
            };
            for &lit in literals {
                let var = lit.var();
                if self.analysis.is_marked.get(var) {
                    continue;
                }
                self.analysis.is_marked.set(var);
                let level = self.trail.info(var).level;
                if level == highest_level {
                    num_literals_at_highest_level += 1;
                } else if level > 0 {
                    debug_assert!(self.trail.assignment().is_literal_false(lit));
                    self.analysis.learned_conflict.push(lit);
                } else {
                    self.analysis.reason_used.push(lit);
                }
            }

            while !self.analysis.is_marked.get(self.trail[trail_index].var()) {
                trail_index -= 1;
            }

            if num_literals_at_highest_level == 1 {
                let uip = self.trail[trail_index].negated();
                self.analysis.learned_conflict.push(uip);
                let last = self.analysis.learned_conflict.len() - 1;
                self.analysis.learned_conflict.swap(0, last);
                break;
            }

            let lit = self.trail[trail_index];
            self.analysis.reason_used.push(lit);
            let var = lit.var();
            to_expand = if self.analysis.same_reason.first_variable_with_same_reason(&self.trail, var) == var {
                Expansion::Reason(self.reason(var))
            } else {
                Expansion::Reason(ReasonRef::Empty)
            };
            num_literals_at_highest_level -= 1;
            trail_index -= 1;
        }
    }

    /// The level to backjump to so that the learned clause propagates its first literal.
    pub(crate) fn compute_backtrack_level(&self, literals: &[Lit]) -> usize {
        literals[1..].iter().map(|lit| self.trail.info(lit.var()).level).max().unwrap_or(0)
    }

    /// Checks the shape of a learned clause: all literals are false, the first one is the only
    /// one at the highest level and no literal is fixed at level zero.
    pub(crate) fn is_conflict_valid(&self, literals: &[Lit]) -> bool {
        let Some(first) = literals.first() else {
            return false;
        };
        let highest_level = self.trail.info(first.var()).level;
        literals.iter().all(|&lit| self.trail.assignment().is_literal_false(lit))
            && literals[1..].iter().all(|lit| {
                let level = self.trail.info(lit.var()).level;
                level > 0 && level < highest_level
            })
    }

    /// Adds the current learned clause and enqueues its first literal. The solver must already
    /// be at the backjump level.
    fn add_learned_clause_and_enqueue_unit_propagation(&mut self, node: Option<NodeId>) {
        let literals = std::mem::take(&mut self.analysis.learned_conflict);
        match literals.as_slice() {
            &[unit] => {
                debug_assert_eq!(self.trail.current_decision_level(), 0);
                self.trail.enqueue_with_unit_reason(unit, node);
            }
            &[first, second] if self.parameters.treat_binary_clauses_separately => {
                self.binary.add_binary_conflict(first, second, &mut self.trail);
            }
            _ => {
                let lbd = if self.parameters.use_lbd {
                    compute_lbd(&self.trail, &mut self.analysis.is_level_marked, &literals)
                } else {
                    0
                };
                let id = self.clauses.add(SatClause::new(&literals, ClauseKind::Learned { lbd }, node));
                self.compress_learned_clauses_if_needed();
                self.num_learned_clause_before_cleanup -= 1;
                self.learned_clauses.push(id);
                self.bump_clause_activity(id);
                let propagated = self.watchers.attach_and_propagate(id, &mut self.clauses, &mut self.trail);
                debug_assert!(propagated, "a learned clause is unit after the backjump");
            }
        }
        self.analysis.learned_conflict = literals;
    }

    /// Bumps the learned clauses that were used as reasons during the last analysis.
    fn bump_reason_activities(&mut self) {
        for idx in 0..self.analysis.reason_used.len() {
            let var = self.analysis.reason_used[idx].var();
            let info = self.trail.info(var);
            if info.level == 0 {
                continue;
            }
            if let AssignmentType::ClausePropagation(id) = info.kind {
                self.bump_clause_activity(id);
            }
        }
    }

    pub(crate) fn bump_clause_activity(&mut self, id: ClauseId) {
        let max_activity = self.parameters.max_clause_activity_value;
        if self.vsids.bump_clause(&mut self.clauses, id, max_activity) {
            self.vsids.rescale_clauses(&mut self.clauses, &self.learned_clauses, max_activity.recip());
        }
    }

    /// The proof node that derived the current assignment of `var`.
    fn resolution_node_for_assignment(&self, var: Var) -> Option<NodeId> {
        match self.trail.info(var).kind {
            AssignmentType::UnitReason(node) => node,
            AssignmentType::ClausePropagation(id) => self.clauses[id].resolution_node(),
            AssignmentType::PbPropagation { constraint, .. } => self.pb.resolution_node(constraint),
            AssignmentType::SameReasonAs(reference) => self.resolution_node_for_assignment(reference),
            kind => unreachable!("{var} has no resolution node, it is a {kind:?}"),
        }
    }

    /// The parents of a resolution step: `failing` and the nodes that derived `reason`.
    pub(crate) fn resolution_parents(&self, failing: Option<NodeId>, reason: &[Lit]) -> Vec<NodeId> {
        failing
            .into_iter()
            .chain(reason.iter().filter_map(|lit| self.resolution_node_for_assignment(lit.var())))
            .collect()
    }

    /// Creates a locked node for a resolution step, `None` if it has no parents.
    pub(crate) fn create_resolution_node(&mut self, parents: &[NodeId]) -> Option<NodeId> {
        (!parents.is_empty()).then(|| self.proof.create_node(parents))
    }

    /// Replaces the reasons of the variables fixed at level zero since the last simplification
    /// by proof nodes, so that they stay valid once the clauses are simplified or deleted.
    pub(crate) fn process_newly_fixed_variable_resolution_nodes(&mut self) {
        if !self.parameters.unsat_proof {
            return;
        }
        for trail_index in self.num_processed_fixed_variables..self.trail.index() {
            let var = self.trail[trail_index].var();
            let info = *self.trail.info(var);
            if info.level > 0 {
                break;
            }
            let failing = match info.kind {
                AssignmentType::UnitReason(_) => continue,
                AssignmentType::ClausePropagation(_)
                | AssignmentType::PbPropagation { .. }
                | AssignmentType::SameReasonAs(_) => self.resolution_node_for_assignment(var),
                kind => unreachable!("{var} is fixed by a {kind:?}"),
            };
            let reason = self.reason(var);
            let parents = self.resolution_parents(failing, self.trail.reason_slice(reason, &self.clauses));
            if let Some(node) = self.create_resolution_node(&parents) {
                self.trail.set_fixed_variable_info(var, node);
            }
        }
    }
}
