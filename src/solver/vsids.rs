//! VSIDS branching heuristic
//!
//! Variables are ordered by activity, ties are broken by a per-variable weight. The heap is
//! lazy: assigned variables are only removed when they show up at the top.

use crate::{
    clause::alloc::{ClauseAllocator, ClauseId},
    datastructure::{heap::VarHeap, DenseIndex, LitVec, VarVec},
    literal::{Lit, Var},
    trail::{AssignmentType, Trail, VariablesAssignment},
};
use ordered_float::NotNan;

const BUMP_INITIAL: f64 = 1.0;

type QueueKey = (NotNan<f64>, NotNan<f64>);

fn queue_key(activity: f64, tie_breaker: f64) -> QueueKey {
    (NotNan::new(activity).unwrap_or_default(), NotNan::new(tie_breaker).unwrap_or_default())
}

#[derive(Debug, Clone)]
pub(crate) struct Vsids {
    heap: VarHeap<QueueKey>,
    activities: VarVec<f64>,
    tie_breakers: VarVec<f64>,
    /// A non-zero weight means the literal should preferably be false.
    objective_weights: LitVec<f64>,
    /// the value used for bumping variable activity values
    bump: f64,
    /// The decay factor, grows over time with the glucose strategy
    decay: f64,
    clause_bump: f64,
}

impl Vsids {
    pub(crate) fn new(decay: f64) -> Self {
        Self {
            heap: VarHeap::default(),
            activities: VarVec::default(),
            tie_breakers: VarVec::default(),
            objective_weights: LitVec::default(),
            bump: BUMP_INITIAL,
            decay,
            clause_bump: BUMP_INITIAL,
        }
    }

    pub(crate) fn set_var_count(&mut self, count: usize) {
        self.heap.set_var_count(count);
        self.activities.set_var_count(count);
        self.tie_breakers.set_var_count(count);
        self.objective_weights.set_var_count(count);
    }

    #[cfg(test)]
    pub(crate) fn activity(&self, var: Var) -> f64 {
        self.activities[var]
    }

    pub(crate) fn decay(&self) -> f64 {
        self.decay
    }

    pub(crate) fn set_decay(&mut self, decay: f64) {
        self.decay = decay;
    }

    /// Prefers `lit` to be true with the given weight in `[0, 1]`.
    pub(crate) fn set_assignment_preference(&mut self, lit: Lit, weight: f64) {
        self.tie_breakers[lit.var()] = weight;
        self.objective_weights[lit] = 0.0;
        self.objective_weights[lit.negated()] = weight;
    }

    /// Whether branching on `lit` goes against the assignment preference.
    pub(crate) fn is_against_preference(&self, lit: Lit) -> bool {
        self.objective_weights[lit] != 0.0
    }

    /// Forgets all activities and preferences.
    pub(crate) fn reset(&mut self, decay: f64) {
        self.activities.values_mut().for_each(|activity| *activity = 0.0);
        self.tie_breakers.values_mut().for_each(|weight| *weight = 0.0);
        self.objective_weights.iter_mut().for_each(|weight| *weight = 0.0);
        self.bump = BUMP_INITIAL;
        self.decay = decay;
    }

    /// Rebuilds the queue from the unassigned variables, with `weight` as the new tie breaker.
    pub(crate) fn rebuild<F>(&mut self, assignment: &VariablesAssignment, mut weight: F)
    where
        F: FnMut(Var, f64) -> f64,
    {
        self.heap.clear();
        for idx in 0..self.activities.len() {
            let var = Var::from_dense(idx);
            self.tie_breakers[var] = weight(var, self.tie_breakers[var]);
            if !assignment.is_variable_assigned(var) {
                self.push(var);
            }
        }
    }

    /// Puts a variable that just got unassigned back into the queue.
    pub(crate) fn push(&mut self, var: Var) {
        let key = queue_key(self.activities[var], self.tie_breakers[var]);
        self.heap.update_value(var, |_| key);
        self.heap.add(var);
    }

    /// Returns the variable with the highest activity score.
    pub(crate) fn peek(&self) -> Option<Var> {
        self.heap.peek()
    }

    pub(crate) fn pop(&mut self) -> Option<Var> {
        self.heap.pop()
    }

    /// Removes and returns the variable at a uniformly chosen queue position, selected by
    /// `pick` from the queue length.
    pub(crate) fn remove_at<F>(&mut self, pick: F) -> Option<Var>
    where
        F: FnOnce(usize) -> usize,
    {
        if self.heap.is_empty() {
            return None;
        }
        let var = self.heap.var_at(pick(self.heap.len()));
        self.heap.remove(var);
        Some(var)
    }

    /// Increase activity scores of the variables of `literals`. Variables at the current
    /// level that were propagated by a learned clause with an LBD below `bump_again_lbd_limit`
    /// are bumped twice.
    pub(crate) fn bump_variable_activities(
        &mut self,
        literals: &[Lit],
        trail: &Trail,
        clauses: &ClauseAllocator,
        bump_again_lbd_limit: u32,
        max_activity: f64,
    ) {
        let current_level = trail.current_decision_level();
        for &lit in literals {
            let var = lit.var();
            let info = trail.info(var);
            if info.level == 0 {
                continue;
            }
            if info.level == current_level {
                if let AssignmentType::ClausePropagation(id) = info.kind {
                    let clause = &clauses[id];
                    if clause.is_learned() && clause.lbd() < bump_again_lbd_limit {
                        self.activities[var] += self.bump;
                    }
                }
            }
            self.activities[var] += self.bump;
            if self.activities[var] > max_activity {
                self.rescale(max_activity.recip(), trail.assignment());
            }
        }
    }

    /// Decay all variable activities.
    pub(crate) fn decay_variable_activities(&mut self) {
        self.bump *= self.decay.recip();
    }

    /// Rescale activities to prevent overflow. The queue is rebuilt because ties may change
    /// once small activities reach zero.
    fn rescale(&mut self, factor: f64, assignment: &VariablesAssignment) {
        self.bump *= factor;
        self.activities.values_mut().for_each(|activity| *activity *= factor);
        self.rebuild(assignment, |_, weight| weight);
    }

    /// Bumps a learned clause. Returns true if the clause activities have to be rescaled.
    pub(crate) fn bump_clause(&self, clauses: &mut ClauseAllocator, id: ClauseId, max_activity: f64) -> bool {
        let clause = &mut clauses[id];
        if !clause.is_learned() {
            return false;
        }
        clause.increase_activity(self.clause_bump);
        clause.activity() > max_activity
    }

    pub(crate) fn rescale_clauses(&mut self, clauses: &mut ClauseAllocator, learned: &[ClauseId], factor: f64) {
        self.clause_bump *= factor;
        for &id in learned {
            clauses[id].multiply_activity(factor);
        }
    }

    pub(crate) fn decay_clause_activities(&mut self, decay: f64) {
        self.clause_bump *= decay.recip();
    }

    pub(crate) fn memory_bytes(&self) -> usize {
        self.activities.capacity_bytes() * 2 + self.objective_weights.len() * std::mem::size_of::<f64>()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn vsids(count: usize) -> (Vsids, Trail, Vec<Var>) {
        let mut vsids = Vsids::new(0.5);
        vsids.set_var_count(count);
        let mut trail = Trail::default();
        trail.set_var_count(count);
        let vars: Vec<_> = (0..count).map(|idx| Var::from_index(idx.try_into().unwrap())).collect();
        vsids.rebuild(trail.assignment(), |_, weight| weight);
        (vsids, trail, vars)
    }

    #[test]
    fn heap() {
        let (mut vsids, mut trail, vars) = vsids(4);
        let clauses = ClauseAllocator::default();
        trail.set_decision_level(1);
        for &var in &vars {
            trail.enqueue_search_decision(var.positive());
        }
        vsids.bump_variable_activities(&[vars[2].positive()], &trail, &clauses, 0, 1e100);
        vsids.bump_variable_activities(&[vars[1].positive(), vars[1].negative()], &trail, &clauses, 0, 1e100);
        while let Some(lit) = trail.dequeue() {
            vsids.push(lit.var());
        }

        assert_eq!(vsids.pop(), Some(vars[1]));
        assert_eq!(vsids.peek(), Some(vars[2]));
        vsids.push(vars[1]);
        assert_eq!(vsids.peek(), Some(vars[1]));
    }

    #[test]
    fn decay_favors_recent_bumps() {
        let (mut vsids, mut trail, vars) = vsids(4);
        let clauses = ClauseAllocator::default();
        trail.set_decision_level(1);
        for &var in &vars {
            trail.enqueue_search_decision(var.positive());
        }
        for &var in &vars {
            vsids.bump_variable_activities(&[var.positive()], &trail, &clauses, 0, 1e100);
            vsids.decay_variable_activities();
        }
        for (&left, &right) in vars.iter().zip(vars.iter().skip(1)) {
            assert!(vsids.activity(left) < vsids.activity(right));
        }
    }

    #[test]
    fn rescale_keeps_order() {
        let (mut vsids, mut trail, vars) = vsids(3);
        let clauses = ClauseAllocator::default();
        trail.set_decision_level(1);
        trail.enqueue_search_decision(vars[0].positive());
        trail.enqueue_search_decision(vars[1].positive());
        vsids.bump_variable_activities(&[vars[1].positive()], &trail, &clauses, 0, 100.0);
        for _ in 0..10 {
            vsids.bump_variable_activities(&[vars[0].positive()], &trail, &clauses, 0, 100.0);
            vsids.decay_variable_activities();
        }
        assert!(vsids.activity(vars[0]) <= 100.0);
        assert!(vsids.activity(vars[1]) < vsids.activity(vars[0]));
        while let Some(lit) = trail.dequeue() {
            vsids.push(lit.var());
        }
        assert_eq!(vsids.pop(), Some(vars[0]));
        assert_eq!(vsids.pop(), Some(vars[1]));
        assert_eq!(vsids.pop(), Some(vars[2]));
    }

    #[test]
    fn tie_breaker_and_preference() {
        let (mut vsids, trail, vars) = vsids(3);
        vsids.set_assignment_preference(vars[2].negative(), 0.5);
        vsids.rebuild(trail.assignment(), |_, weight| weight);
        assert_eq!(vsids.peek(), Some(vars[2]));
        assert!(vsids.is_against_preference(vars[2].positive()));
        assert!(!vsids.is_against_preference(vars[2].negative()));
        vsids.reset(0.8);
        assert!(!vsids.is_against_preference(vars[2].positive()));
        assert!((vsids.decay() - 0.8).abs() < f64::EPSILON);
    }
}
