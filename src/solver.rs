//! A conflict-driven clause learning search over clauses, pseudo-Boolean constraints and
//! symmetries.
//!
//! Constraints are added at decision level zero and propagated right away. [`SatSolver::solve`]
//! then alternates decisions and propagation. Every conflict is analyzed into a first-UIP
//! clause that is minimized, learned, and propagated after backjumping. The search restarts
//! following the Luby sequence and periodically deletes learned clauses of low quality.

use crate::{
    clause::{
        alloc::{ClauseAllocator, ClauseId},
        binary::BinaryImplicationGraph,
        watch::LiteralWatchers,
        ClauseKind, SatClause,
    },
    limit::TimeLimit,
    literal::{Lit, Var},
    params::{ParameterError, SatParameters, VariableBranching, VariableWeight},
    pb::{
        compute_canonical_form, compute_canonical_rhs, compute_negated_canonical_rhs,
        simplify_canonical, Coefficient, CoefficientOverflow, LiteralWithCoeff, PbConstraints,
    },
    proof::{NodeId, UnsatProof},
    symmetry::{SparsePermutation, SymmetryPropagator},
    trail::{AssignmentType, ReasonRef, Trail},
    SolverStatus,
};
use conflict::ConflictAnalysis;
use derivative::Derivative;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use restart::Restart;
use tracing::{debug, info, trace};
use vsids::Vsids;

mod cleanup;
mod conflict;
mod minimize;
mod restart;
pub mod stats;
mod vsids;


pub use stats::Statistics;

/// Number of conflicts between two memory checks or progress messages.
const CHECK_FREQUENCY: u64 = 10_000;

#[derive(Debug, Clone, Copy, Default)]
struct Decision {
    /// Trail index of the decision literal.
    trail_index: usize,
    literal: Lit,
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct SatSolver {
    parameters: SatParameters,
    num_variables: usize,
    /// Number of problem constraints added so far, the index of the next one in an unsat core.
    num_constraints: usize,
    is_model_unsat: bool,

    trail: Trail,
    #[derivative(Debug = "ignore")]
    clauses: ClauseAllocator,
    problem_clauses: Vec<ClauseId>,
    learned_clauses: Vec<ClauseId>,
    #[derivative(Debug = "ignore")]
    watchers: LiteralWatchers,
    #[derivative(Debug = "ignore")]
    binary: BinaryImplicationGraph,
    #[derivative(Debug = "ignore")]
    pb: PbConstraints,
    #[derivative(Debug = "ignore")]
    symmetry: SymmetryPropagator,
    #[derivative(Debug = "ignore")]
    proof: UnsatProof,

    /// Indexed by decision level.
    decisions: Vec<Decision>,
    /// Decisions up to this level are assumptions and are kept on restarts.
    assumption_level: usize,
    propagation_trail_index: usize,
    binary_propagation_trail_index: usize,
    /// Length of the level-zero trail at the last clause database simplification.
    num_processed_fixed_variables: usize,

    #[derivative(Debug = "ignore")]
    vsids: Vsids,
    #[derivative(Debug = "ignore")]
    rng: SmallRng,
    restart: Restart,
    #[derivative(Debug = "ignore")]
    analysis: ConflictAnalysis,
    num_learned_clause_before_cleanup: i64,
    target_number_of_learned_clauses: usize,

    stats: Statistics,
}

impl Default for SatSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SatSolver {
    #[must_use]
    pub fn new() -> Self {
        let parameters = SatParameters::default();
        Self {
            num_variables: 0,
            num_constraints: 0,
            is_model_unsat: false,
            trail: Trail::default(),
            clauses: ClauseAllocator::default(),
            problem_clauses: Vec::new(),
            learned_clauses: Vec::new(),
            watchers: LiteralWatchers::default(),
            binary: BinaryImplicationGraph::default(),
            pb: PbConstraints::default(),
            symmetry: SymmetryPropagator::default(),
            proof: UnsatProof::default(),
            decisions: Vec::new(),
            assumption_level: 0,
            propagation_trail_index: 0,
            binary_propagation_trail_index: 0,
            num_processed_fixed_variables: 0,
            vsids: Vsids::new(parameters.variable_activity_decay),
            rng: SmallRng::seed_from_u64(parameters.random_seed),
            restart: Restart::new(parameters.restart_period),
            analysis: ConflictAnalysis::default(),
            num_learned_clause_before_cleanup: 0,
            target_number_of_learned_clauses: 0,
            stats: Statistics::default(),
            parameters,
        }
    }

    /// Replaces the search parameters. Proof logging has to be configured before the first
    /// constraint is added.
    ///
    /// # Errors
    ///
    /// Returns the [`ParameterError`] of [`SatParameters::validate`], the solver keeps its old
    /// parameters in that case.
    pub fn set_parameters(&mut self, parameters: SatParameters) -> Result<(), ParameterError> {
        parameters.validate()?;
        assert!(
            !parameters.unsat_proof || self.symmetry.num_permutations() == 0,
            "unsat proofs cannot be combined with symmetries"
        );
        self.pb.set_keep_fixed_literals_in_reason(parameters.unsat_proof);
        self.rng = SmallRng::seed_from_u64(parameters.random_seed);
        self.restart = Restart::new(parameters.restart_period);
        self.vsids.set_decay(parameters.variable_activity_decay);
        self.parameters = parameters;
        Ok(())
    }

    #[must_use]
    pub fn parameters(&self) -> &SatParameters {
        &self.parameters
    }

    /// Increases the number of variables, new variables are unassigned.
    pub fn set_num_variables(&mut self, num_variables: usize) {
        assert!(num_variables >= self.num_variables, "variables cannot be removed");
        self.num_variables = num_variables;
        self.trail.set_var_count(num_variables);
        self.watchers.set_var_count(num_variables);
        self.binary.set_var_count(num_variables);
        self.pb.set_var_count(num_variables);
        self.symmetry.set_var_count(num_variables);
        self.vsids.set_var_count(num_variables);
        self.decisions.resize(num_variables, Decision::default());
    }

    #[must_use]
    pub fn num_variables(&self) -> usize {
        self.num_variables
    }

    /// Number of constraints added so far; constraints are numbered in this order in
    /// [`SatSolver::compute_unsat_core`].
    #[must_use]
    pub fn num_constraints(&self) -> usize {
        self.num_constraints
    }

    #[must_use]
    pub fn is_model_unsat(&self) -> bool {
        self.is_model_unsat
    }

    #[must_use]
    pub fn current_decision_level(&self) -> usize {
        self.trail.current_decision_level()
    }

    #[must_use]
    pub fn assumption_level(&self) -> usize {
        self.assumption_level
    }

    /// Number of variables fixed at level zero.
    #[must_use]
    pub fn num_fixed_variables(&self) -> usize {
        if self.trail.current_decision_level() == 0 {
            self.trail.index()
        } else {
            self.decisions[0].trail_index
        }
    }

    fn model_unsat(&mut self) -> bool {
        if !self.is_model_unsat {
            debug!("the problem is unsat after adding constraint {}", self.num_constraints);
        }
        self.is_model_unsat = true;
        false
    }

    fn create_root_resolution_node(&mut self) -> Option<NodeId> {
        self.parameters.unsat_proof.then(|| self.proof.create_root_node(self.num_constraints))
    }

    /// Fixes `true_literal`. Returns false if the problem became unsat.
    pub fn add_unit_clause(&mut self, true_literal: Lit) -> bool {
        assert_eq!(self.trail.current_decision_level(), 0, "constraints are added at level 0");
        if self.is_model_unsat {
            return false;
        }
        if self.trail.assignment().is_literal_true(true_literal) {
            self.num_constraints += 1;
            return true;
        }
        let node = self.create_root_resolution_node();
        self.num_constraints += 1;
        if self.trail.assignment().is_literal_false(true_literal) {
            self.trail.set_failing_clause(&[true_literal]);
            self.trail.set_failing_resolution_node(node);
            return self.model_unsat();
        }
        self.trail.enqueue_with_unit_reason(true_literal, node);
        if !self.propagate() {
            return self.model_unsat();
        }
        true
    }

    pub fn add_binary_clause(&mut self, a: Lit, b: Lit) -> bool {
        self.add_problem_clause(&[a, b])
    }

    pub fn add_ternary_clause(&mut self, a: Lit, b: Lit, c: Lit) -> bool {
        self.add_problem_clause(&[a, b, c])
    }

    /// Adds the clause `literals`, an empty clause makes the problem unsat. Returns false if the
    /// problem became unsat.
    pub fn add_problem_clause(&mut self, literals: &[Lit]) -> bool {
        let terms: Vec<_> = literals.iter().map(|&lit| LiteralWithCoeff::new(lit, 1)).collect();
        // coefficients of a clause cannot overflow for fewer than 2^63 literals
        self.add_linear_constraint(Some(1), None, &terms).unwrap_or(false)
    }

    /// Adds `lower_bound ≤ Σ terms ≤ upper_bound`, a missing bound is not enforced. Returns
    /// `Ok(false)` if the problem became unsat.
    ///
    /// # Errors
    ///
    /// Returns [`CoefficientOverflow`] if the terms cannot be brought into canonical form
    /// without overflowing a [`Coefficient`]. Nothing is added in that case.
    pub fn add_linear_constraint(
        &mut self,
        lower_bound: Option<Coefficient>,
        upper_bound: Option<Coefficient>,
        terms: &[LiteralWithCoeff],
    ) -> Result<bool, CoefficientOverflow> {
        assert_eq!(self.trail.current_decision_level(), 0, "constraints are added at level 0");
        if self.is_model_unsat {
            return Ok(false);
        }

        // Without proofs, fixed literals are removed and accounted for in the bounds.
        let mut fixed_shift: Coefficient = 0;
        let mut cst: Vec<LiteralWithCoeff> = Vec::with_capacity(terms.len());
        for &term in terms {
            let assignment = self.trail.assignment();
            if self.parameters.unsat_proof || !assignment.is_variable_assigned(term.literal.var()) {
                cst.push(term);
            } else if assignment.is_literal_true(term.literal) {
                fixed_shift = fixed_shift.checked_sub(term.coefficient).ok_or(CoefficientOverflow)?;
            }
        }
        let form = compute_canonical_form(&mut cst)?;
        let bound_shift = form.bound_shift.checked_add(fixed_shift).ok_or(CoefficientOverflow)?;

        if let Some(upper_bound) = upper_bound {
            let rhs = compute_canonical_rhs(upper_bound, bound_shift, form.max_value);
            if !self.add_linear_constraint_internal(&cst, rhs, form.max_value) {
                self.num_constraints += 1;
                return Ok(self.model_unsat());
            }
        }
        if let Some(lower_bound) = lower_bound {
            for term in &mut cst {
                term.literal = term.literal.negated();
            }
            let rhs = compute_negated_canonical_rhs(lower_bound, bound_shift, form.max_value);
            if !self.add_linear_constraint_internal(&cst, rhs, form.max_value) {
                self.num_constraints += 1;
                return Ok(self.model_unsat());
            }
        }
        self.num_constraints += 1;
        if !self.propagate() {
            return Ok(self.model_unsat());
        }
        Ok(true)
    }

    /// Adds the canonical constraint `cst ≤ rhs`. Constraints that are equivalent to a clause
    /// go to the clause store.
    fn add_linear_constraint_internal(
        &mut self,
        cst: &[LiteralWithCoeff],
        rhs: Coefficient,
        max_value: Coefficient,
    ) -> bool {
        if rhs < 0 {
            let node = self.create_root_resolution_node();
            self.trail.set_failing_clause(&[]);
            self.trail.set_failing_resolution_node(node);
            return false;
        }
        if rhs >= max_value {
            return true;
        }
        let mut cst = cst.to_vec();
        let max_value = simplify_canonical(&mut cst, rhs);
        let node = self.create_root_resolution_node();

        // Only the assignment with every literal true is a violation, so it is the clause of the
        // negated literals.
        if max_value - cst[0].coefficient <= rhs {
            let literals: Vec<Lit> = cst.iter().map(|term| term.literal.negated()).collect();
            return self.add_problem_clause_internal(&literals, node);
        }
        self.pb.add_constraint(&cst, rhs, node, &mut self.trail, &mut self.proof)
    }

    fn add_problem_clause_internal(&mut self, literals: &[Lit], node: Option<NodeId>) -> bool {
        debug_assert_eq!(self.trail.current_decision_level(), 0);
        match *literals {
            [] => unreachable!("empty clauses are rejected by the rhs check"),
            [unit] => {
                let assignment = self.trail.assignment();
                if assignment.is_literal_false(unit) {
                    self.trail.set_failing_clause(literals);
                    self.trail.set_failing_resolution_node(node);
                    return false;
                }
                if assignment.is_literal_true(unit) {
                    if let Some(node) = node {
                        self.proof.unlock(node);
                    }
                    return true;
                }
                self.trail.enqueue_with_unit_reason(unit, node);
                true
            }
            [a, b] if self.parameters.treat_binary_clauses_separately => {
                let assignment = self.trail.assignment();
                let (a_false, b_false) = (assignment.is_literal_false(a), assignment.is_literal_false(b));
                let satisfied = assignment.is_literal_true(a) || assignment.is_literal_true(b);
                if a_false && b_false {
                    self.trail.set_failing_clause(literals);
                    return false;
                }
                self.binary.add_binary_clause(a, b);
                if !satisfied && a_false {
                    self.trail.enqueue_with_binary_reason(b, a);
                } else if !satisfied && b_false {
                    self.trail.enqueue_with_binary_reason(a, b);
                }
                true
            }
            _ => {
                let id = self.clauses.add(SatClause::new(literals, ClauseKind::Problem, node));
                if !self.watchers.attach_and_propagate(id, &mut self.clauses, &mut self.trail) {
                    let clause = self.clauses.release(id);
                    self.trail.set_failing_clause(clause.lits());
                    self.trail.set_failing_resolution_node(node);
                    return false;
                }
                self.problem_clauses.push(id);
                true
            }
        }
    }

    /// Registers a symmetry of the problem. All symmetries have to be added before the first
    /// constraint.
    pub fn add_symmetry(&mut self, permutation: SparsePermutation) {
        assert!(!self.parameters.unsat_proof, "unsat proofs cannot be combined with symmetries");
        assert!(
            permutation.max_var().map_or(true, |var| var.as_index() < self.num_variables),
            "the permutation refers to unknown variables"
        );
        self.symmetry.add_symmetry(permutation);
    }

    /// Propagates until a fixpoint or a conflict, in which case the failing clause of the
    /// trail is set and false is returned. Cheaper propagators run to their fixpoint first.
    fn propagate(&mut self) -> bool {
        loop {
            if self.binary.num_implications() != 0 {
                while self.binary_propagation_trail_index < self.trail.index() {
                    let lit = self.trail[self.binary_propagation_trail_index];
                    self.binary_propagation_trail_index += 1;
                    if !self.binary.propagate_on_true(lit, &mut self.trail) {
                        return false;
                    }
                }
            }

            let old_index = self.trail.index();
            while self.trail.index() == old_index && self.propagation_trail_index < old_index {
                let lit = self.trail[self.propagation_trail_index];
                self.propagation_trail_index += 1;
                if !self.watchers.propagate_on_false(lit.negated(), &mut self.clauses, &mut self.trail) {
                    return false;
                }
            }
            if self.trail.index() > old_index {
                continue;
            }

            while self.trail.index() == old_index && self.symmetry.propagation_needed(&self.trail) {
                if !self.symmetry.propagate_next(&mut self.trail) {
                    self.set_symmetric_failing_clause();
                    return false;
                }
            }
            if self.trail.index() > old_index {
                continue;
            }

            while self.trail.index() == old_index && self.pb.propagation_needed(&self.trail) {
                if let Err(conflict) = self.pb.propagate_next(&mut self.trail) {
                    trace!("{conflict:?} at level {}", self.trail.current_decision_level());
                    return false;
                }
            }
            if self.trail.index() > old_index {
                continue;
            }
            return true;
        }
    }

    /// The failing clause of a symmetry conflict is the image of the reason of the source
    /// literal plus the false image of the source literal.
    fn set_symmetric_failing_clause(&mut self) {
        let Some(conflict) = self.symmetry.last_conflict() else {
            unreachable!("the symmetry propagator reported a conflict");
        };
        let reason = self.reason(conflict.source.var());
        let mut failing = Vec::new();
        self.symmetry.permute(
            conflict.permutation,
            self.trail.reason_slice(reason, &self.clauses),
            &mut failing,
        );
        failing.push(conflict.image);
        self.trail.set_failing_clause(&failing);
    }

    /// The false literals that implied the assignment of `var`. Reasons of pseudo-Boolean and
    /// symmetric propagations are computed on first use and cached until `var` is unassigned.
    pub(crate) fn reason(&mut self, var: Var) -> ReasonRef {
        let info = *self.trail.info(var);
        match info.kind {
            AssignmentType::SearchDecision | AssignmentType::UnitReason(_) => ReasonRef::Empty,
            AssignmentType::ClausePropagation(id) => ReasonRef::Clause(id),
            AssignmentType::BinaryPropagation(_) => ReasonRef::Binary(var),
            AssignmentType::SameReasonAs(reference) => self.reason(reference),
            _ if info.reason_is_cached => ReasonRef::Cached(var),
            AssignmentType::PbPropagation { constraint, source_trail_index } => {
                let mut reason = self.trail.take_reason_buffer(var);
                self.pb.fill_reason(&self.trail, constraint, source_trail_index, var, &mut reason);
                self.trail.store_cached_reason(var, reason);
                ReasonRef::Cached(var)
            }
            AssignmentType::SymmetryPropagation { symmetry, source_trail_index } => {
                let source = self.trail[source_trail_index];
                let source_reason = self.reason(source.var());
                let mut reason = self.trail.take_reason_buffer(var);
                self.symmetry.permute(
                    symmetry,
                    self.trail.reason_slice(source_reason, &self.clauses),
                    &mut reason,
                );
                self.trail.store_cached_reason(var, reason);
                ReasonRef::Cached(var)
            }
        }
    }

    fn new_decision(&mut self, literal: Lit) {
        self.stats.search.decisions += 1;
        let level = self.trail.current_decision_level();
        self.decisions[level] = Decision { trail_index: self.trail.index(), literal };
        self.trail.set_decision_level(level + 1);
        self.trail.enqueue_search_decision(literal);
    }

    /// Takes `true_literal` as decision and propagates. Conflicts are learned from and resolved
    /// by backjumping until propagation succeeds. Returns the index of the first trail literal
    /// that changed, `None` if the problem turned out to be unsat.
    pub fn enqueue_decision_and_backjump_on_conflict(&mut self, true_literal: Lit) -> Option<usize> {
        if self.is_model_unsat {
            return None;
        }
        debug_assert_eq!(self.propagation_trail_index, self.trail.index());
        if self.trail.current_decision_level() == 0 && self.num_processed_fixed_variables < self.trail.index() {
            self.process_newly_fixed_variable_resolution_nodes();
            self.process_newly_fixed_variables();
        }

        let mut first_propagation_index = self.trail.index();
        self.new_decision(true_literal);
        while !self.propagate() {
            first_propagation_index = self.resolve_conflict()?;
        }
        Some(first_propagation_index)
    }

    /// Like [`SatSolver::enqueue_decision_and_backjump_on_conflict`], but the decisions that
    /// were undone by the backjump are taken again as long as they are not already assigned.
    pub fn enqueue_decision_and_backtrack_on_conflict(&mut self, true_literal: Lit) -> Option<usize> {
        let max_level = self.trail.current_decision_level();
        let mut first_propagation_index = self.enqueue_decision_and_backjump_on_conflict(true_literal)?;
        let level = self.trail.current_decision_level();
        if level > max_level {
            return Some(first_propagation_index);
        }

        let undone: Vec<Lit> = self.decisions[level..max_level].iter().map(|decision| decision.literal).collect();
        for lit in undone {
            let assignment = self.trail.assignment();
            if assignment.is_literal_true(lit) {
                continue;
            }
            if assignment.is_literal_false(lit) {
                break;
            }
            let level = self.trail.current_decision_level();
            let index = self.enqueue_decision_and_backjump_on_conflict(lit)?;
            first_propagation_index = first_propagation_index.min(index);
            if self.trail.current_decision_level() <= level {
                break;
            }
        }
        Some(first_propagation_index)
    }

    /// Takes `true_literal` as decision if that does not lead to a conflict. Otherwise the
    /// solver is left as before and false is returned.
    pub fn enqueue_decision_if_not_conflicting(&mut self, true_literal: Lit) -> bool {
        debug_assert_eq!(self.propagation_trail_index, self.trail.index());
        let level = self.trail.current_decision_level();
        self.new_decision(true_literal);
        if self.propagate() {
            return true;
        }
        self.backtrack(level);
        false
    }

    /// Undoes all decisions above `target_level`.
    pub fn backtrack(&mut self, target_level: usize) {
        let level = self.trail.current_decision_level();
        if level == target_level {
            return;
        }
        assert!(target_level < level, "cannot backtrack from level {level} to {target_level}");
        self.stats.search.failures += 1;
        let target_trail_index = self.decisions[target_level].trail_index;
        self.untrail(target_trail_index);
        self.trail.set_decision_level(target_level);
    }

    fn untrail(&mut self, target_trail_index: usize) {
        self.pb.untrail(target_trail_index, &self.trail);
        self.symmetry.untrail(target_trail_index, &self.trail);
        while self.trail.index() > target_trail_index {
            if let Some(lit) = self.trail.dequeue() {
                self.vsids.push(lit.var());
            }
        }
        self.propagation_trail_index = target_trail_index;
        self.binary_propagation_trail_index = target_trail_index;
    }

    /// Keeps the current decisions when restarting and makes search stop with
    /// [`SolverStatus::AssumptionsUnsat`] once one of them is refuted.
    pub fn treat_current_decisions_as_assumption(&mut self) {
        self.assumption_level = self.trail.current_decision_level();
    }

    /// Backtracks to level zero and takes `assumptions` as decisions. Returns false if the
    /// assumptions are contradictory, possibly because the problem is unsat.
    pub fn reset_with_given_assumptions(&mut self, assumptions: &[Lit]) -> bool {
        self.backtrack(0);
        self.assumption_level = 0;
        for &lit in assumptions {
            if self.trail.assignment().is_literal_true(lit) {
                continue;
            }
            if self.trail.assignment().is_literal_false(lit) {
                return false;
            }
            let level = self.trail.current_decision_level();
            if self.enqueue_decision_and_backjump_on_conflict(lit).is_none() {
                return false;
            }
            if self.trail.current_decision_level() <= level {
                return false;
            }
        }
        self.treat_current_decisions_as_assumption();
        true
    }

    /// Searches for an assignment that satisfies all constraints and the current assumptions.
    pub fn solve(&mut self) -> SolverStatus {
        if self.is_model_unsat {
            return SolverStatus::ModelUnsat;
        }
        let time_limit = TimeLimit::new(self.parameters.max_time_in_seconds);
        self.compute_initial_variable_ordering();
        self.assumption_level = self.assumption_level.min(self.trail.current_decision_level());

        let next_multiple = |failures: u64| (failures / CHECK_FREQUENCY + 1) * CHECK_FREQUENCY;
        let mut next_memory_check = next_multiple(self.stats.search.failures);
        let mut next_progress_display = next_memory_check;
        let failure_limit = u64::try_from(self.parameters.max_number_of_conflicts)
            .map_or(self.stats.search.failures, |max| self.stats.search.failures.saturating_add(max));

        let status = loop {
            if time_limit.limit_reached() {
                debug!("time limit reached");
                break SolverStatus::LimitReached;
            }
            if self.stats.search.failures >= failure_limit {
                debug!("conflict limit reached");
                break SolverStatus::LimitReached;
            }
            if self.stats.search.failures >= next_memory_check {
                next_memory_check = next_multiple(self.stats.search.failures);
                if self.is_memory_limit_reached() {
                    debug!("memory limit reached");
                    break SolverStatus::LimitReached;
                }
            }
            if self.parameters.log_search_progress && self.stats.search.failures >= next_progress_display {
                next_progress_display = next_multiple(self.stats.search.failures);
                self.log_progress();
            }

            if self.trail.index() == self.num_variables {
                break SolverStatus::ModelSat;
            }

            self.restart_if_due();

            let branch = self.next_branch();
            let decision = if self.vsids.is_against_preference(branch) { branch.negated() } else { branch };
            trace!("decide {decision} at level {}", self.trail.current_decision_level() + 1);
            if self.enqueue_decision_and_backjump_on_conflict(decision).is_none() {
                break SolverStatus::ModelUnsat;
            }
            if self.trail.current_decision_level() < self.assumption_level {
                break SolverStatus::AssumptionsUnsat;
            }
        };
        self.stats.search.solve_time += time_limit.elapsed();
        info!("{status}\n{:#?}", self.statistics());
        status
    }

    /// Backtracks to the assumption level if the restart schedule says so. A due restart is
    /// only consumed if there is a decision above the assumptions to undo.
    fn restart_if_due(&mut self) -> bool {
        if self.trail.current_decision_level() <= self.assumption_level || !self.restart.should_do_restart() {
            return false;
        }
        self.stats.search.restarts += 1;
        debug!("restart {}", self.restart.restart_count());
        self.backtrack(self.assumption_level);
        if self.parameters.log_search_progress {
            self.log_progress();
        }
        true
    }

    /// Takes `assumptions` as decisions and searches for a model extending them.
    pub fn solve_with_assumptions(&mut self, assumptions: &[Lit]) -> SolverStatus {
        if !self.reset_with_given_assumptions(assumptions) {
            return if self.is_model_unsat { SolverStatus::ModelUnsat } else { SolverStatus::AssumptionsUnsat };
        }
        self.solve()
    }

    fn log_progress(&self) {
        info!(
            "conflicts: {} decisions: {} restarts: {} fixed: {} learned: {} binary: {}",
            self.stats.search.failures,
            self.stats.search.decisions,
            self.stats.search.restarts,
            self.num_fixed_variables(),
            self.learned_clauses.len(),
            self.binary.num_implications(),
        );
    }

    /// Builds the heap of unassigned variables with the configured initial weights as tie
    /// breakers.
    fn compute_initial_variable_ordering(&mut self) {
        let variable_weight = self.parameters.variable_weight;
        #[allow(clippy::cast_precision_loss)]
        let num_watched_clauses = self.watchers.num_watched_clauses().max(1) as f64;
        let statistics = self.watchers.statistics();
        let rng = &mut self.rng;
        self.vsids.rebuild(self.trail.assignment(), |var, tie_breaker| match variable_weight {
            VariableWeight::Default => tie_breaker,
            VariableWeight::Random => rng.gen::<f64>(),
            VariableWeight::StaticScaledUsage => statistics[var].weighted_num_appearances / num_watched_clauses,
        });
    }

    /// Picks the next decision: the unassigned variable of highest activity (or a random one)
    /// with the polarity of the branching policy.
    fn next_branch(&mut self) -> Lit {
        let ratio = self.parameters.random_branches_ratio;
        let var = if ratio > 0.0 && self.rng.gen::<f64>() < ratio {
            self.stats.search.random_decisions += 1;
            loop {
                let rng = &mut self.rng;
                let var = self
                    .vsids
                    .remove_at(|len| rng.gen_range(0..len))
                    .expect("an unassigned variable is left if the trail is not full");
                if !self.trail.assignment().is_variable_assigned(var) {
                    break var;
                }
            }
        } else {
            loop {
                let var = self.vsids.peek().expect("an unassigned variable is left if the trail is not full");
                if !self.trail.assignment().is_variable_assigned(var) {
                    break var;
                }
                self.vsids.pop();
            }
        };

        let occurrences = &self.watchers.statistics()[var];
        let sign = occurrences.num_positive_clauses > occurrences.num_negative_clauses;
        let polarity = self.trail.assignment().last_value(var).unwrap_or(sign);
        let positive = match self.parameters.variable_branching {
            VariableBranching::FixedPositive => true,
            VariableBranching::FixedNegative => false,
            VariableBranching::Sign => sign,
            VariableBranching::ReverseSign => !sign,
            VariableBranching::Polarity => polarity,
            VariableBranching::ReversePolarity => !polarity,
        };
        Lit::new(var, positive)
    }

    /// Prefers `lit` to be true with a weight in `[0, 1]`: the variable is branched on earlier
    /// among equally active ones and takes the value of `lit`. Used from the next call to
    /// [`SatSolver::solve`] on, if optimization hints are enabled.
    pub fn set_assignment_preference(&mut self, lit: Lit, weight: f64) {
        if !self.parameters.use_optimization_hints {
            return;
        }
        self.vsids.set_assignment_preference(lit, weight);
    }

    /// Forgets the activities and preferences learned so far.
    pub fn reset_decision_heuristic(&mut self) {
        self.vsids.reset(self.parameters.variable_activity_decay);
        self.compute_initial_variable_ordering();
    }

    /// Estimate of the memory used by the solver data structures.
    fn memory_usage_bytes(&self) -> usize {
        self.trail.memory_bytes()
            + self.clauses.memory_bytes()
            + self.watchers.memory_bytes()
            + self.binary.memory_bytes()
            + self.pb.memory_bytes()
            + self.symmetry.memory_bytes()
            + self.proof.memory_bytes()
            + self.vsids.memory_bytes()
    }

    fn is_memory_limit_reached(&self) -> bool {
        let limit = self.parameters.max_memory_in_mb.saturating_mul(1024 * 1024);
        u64::try_from(self.memory_usage_bytes()).map_or(true, |used| used > limit)
    }

    /// The true literals of the current assignment in variable order, a model after
    /// [`SolverStatus::ModelSat`].
    #[must_use]
    pub fn assignment(&self) -> Vec<Lit> {
        (0..self.num_variables)
            .filter_map(|idx| {
                let var = Var::from_index(u32::try_from(idx).ok()?);
                self.trail.assignment().true_literal(var)
            })
            .collect()
    }

    /// The current value of `lit`, `None` if it is unassigned.
    #[must_use]
    pub fn value(&self, lit: Lit) -> Option<bool> {
        self.trail.assignment().value(lit.var()).map(|value| value == lit.is_positive())
    }

    /// Counters of the search so far.
    #[must_use]
    pub fn statistics(&self) -> Statistics {
        let mut stats = self.stats.clone();
        stats.search.propagations = self.trail.num_enqueues();
        stats.search.binary_propagations = self.binary.num_propagations();
        stats.search.symmetry_propagations = self.symmetry.num_propagations();
        stats.search.symmetry_conflicts = self.symmetry.num_conflicts();
        stats.search.inspected_clauses = self.watchers.num_inspected_clauses();
        stats.search.pb_threshold_updates = self.pb.num_threshold_updates();
        stats.search.pb_constraint_lookups = self.pb.num_constraint_lookups();
        stats.learning.learned_clauses = self.learned_clauses.len();
        stats.learning.binary_clauses = self.binary.num_implications();
        stats.learning.binary_minimizations = self.binary.num_minimizations();
        stats.learning.binary_minimized_literals = self.binary.num_literals_removed();
        stats
    }

    /// Indices (in the order of addition) of constraints that are unsat together. Only
    /// available with proofs enabled and once the problem is known to be unsat.
    pub fn compute_unsat_core(&mut self) -> Vec<usize> {
        assert!(self.parameters.unsat_proof, "unsat cores need unsat proofs to be enabled");
        assert!(self.is_model_unsat, "unsat cores are only defined for unsat problems");
        self.process_newly_fixed_variable_resolution_nodes();
        let parents = self.resolution_parents(self.trail.failing_resolution_node(), self.trail.failing_clause());
        let Some(node) = self.create_resolution_node(&parents) else {
            return Vec::new();
        };
        let core = self.proof.compute_unsat_core(node);
        self.proof.unlock(node);
        core
    }
}
