//! Search parameters of the [`crate::SatSolver`].

use thiserror::Error;

/// How the polarity of a branching variable is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum VariableBranching {
    FixedPositive,
    FixedNegative,
    /// Positive if the variable occurs in more clauses positively than negatively.
    Sign,
    ReverseSign,
    /// The value the variable had the last time it was assigned, [`VariableBranching::Sign`]
    /// if it never was.
    #[default]
    Polarity,
    ReversePolarity,
}

/// The weight that breaks ties between variables of equal activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum VariableWeight {
    /// The weight given by [`crate::SatSolver::set_assignment_preference`], zero otherwise.
    #[default]
    Default,
    Random,
    /// The number of clauses the variable occurs in, weighted by clause size and scaled by
    /// the number of clauses.
    StaticScaledUsage,
}

/// Removal of redundant literals from a learned clause using the reasons of the trail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum ConflictMinimization {
    None,
    /// Drops literals whose reason is contained in the conflict.
    Simple,
    /// Drops literals that are implied by the conflict through any chain of reasons.
    #[default]
    Recursive,
    /// Replaces literals by the single other literal of their reason, if there is one.
    Experimental,
}

/// Removal of redundant literals from a learned clause using the binary implication graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum BinaryMinimization {
    None,
    /// Before the general minimization, using the implications of the asserting literal.
    #[default]
    First,
    WithReachability,
    Experimental,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    #[error("unsat proofs need binary clauses to be stored as clauses")]
    ProofWithBinaryClauses,
    #[error("unsat proofs only support the recursive conflict minimization, not {0:?}")]
    ProofWithMinimization(ConflictMinimization),
    #[error("the restart period must not be negative, got {0}")]
    NegativeRestartPeriod(i64),
    #[error("{name} must be in (0, 1], got {value}")]
    InvalidDecay { name: &'static str, value: f64 },
    #[error("{name} must be in [0, 1], got {value}")]
    InvalidRatio { name: &'static str, value: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SatParameters {
    /// Each conflict multiplies the variable activity increment by the inverse of this value.
    pub variable_activity_decay: f64,
    pub max_variable_activity_value: f64,
    /// The variable activity decay grows up to this value over time.
    pub glucose_max_decay: f64,
    pub glucose_decay_increment: f64,
    /// Number of conflicts between two increments of the variable activity decay.
    pub glucose_decay_increment_period: u64,
    pub clause_activity_decay: f64,
    pub max_clause_activity_value: f64,
    /// Base number of conflicts between two restarts, scaled by the Luby sequence. Zero
    /// disables restarts.
    pub restart_period: i64,
    /// Number of learned clauses that are added to the target database size at each cleanup.
    pub clause_cleanup_period: usize,
    /// Fraction of the learned clauses that are kept at a cleanup.
    pub clause_cleanup_ratio: f64,
    /// Learned clauses with at most this LBD are never deleted.
    pub clause_cleanup_protected_lbd: u32,
    pub use_lbd: bool,
    /// Bump variables propagated by a learned clause of low LBD a second time.
    pub use_glucose_bump_again_strategy: bool,
    pub variable_branching: VariableBranching,
    /// Probability to branch on a random variable instead of the most active one.
    pub random_branches_ratio: f64,
    pub variable_weight: VariableWeight,
    pub minimization_algorithm: ConflictMinimization,
    pub binary_minimization_algorithm: BinaryMinimization,
    pub random_seed: u64,
    pub max_time_in_seconds: f64,
    /// Conflicts allowed per call to solve.
    pub max_number_of_conflicts: i64,
    pub max_memory_in_mb: u64,
    /// Store clauses of size two in the binary implication graph.
    pub treat_binary_clauses_separately: bool,
    /// Track resolution nodes so that an unsat core can be computed.
    pub unsat_proof: bool,
    /// Honor [`crate::SatSolver::set_assignment_preference`].
    pub use_optimization_hints: bool,
    pub log_search_progress: bool,
}

impl Default for SatParameters {
    fn default() -> Self {
        Self {
            variable_activity_decay: 0.8,
            max_variable_activity_value: 1e100,
            glucose_max_decay: 0.95,
            glucose_decay_increment: 0.01,
            glucose_decay_increment_period: 5000,
            clause_activity_decay: 0.999,
            max_clause_activity_value: 1e20,
            restart_period: 50,
            clause_cleanup_period: 10000,
            clause_cleanup_ratio: 0.5,
            clause_cleanup_protected_lbd: 2,
            use_lbd: true,
            use_glucose_bump_again_strategy: false,
            variable_branching: VariableBranching::default(),
            random_branches_ratio: 0.0,
            variable_weight: VariableWeight::default(),
            minimization_algorithm: ConflictMinimization::default(),
            binary_minimization_algorithm: BinaryMinimization::default(),
            random_seed: 1,
            max_time_in_seconds: f64::INFINITY,
            max_number_of_conflicts: i64::MAX,
            max_memory_in_mb: 4096,
            treat_binary_clauses_separately: true,
            unsat_proof: false,
            use_optimization_hints: true,
            log_search_progress: false,
        }
    }
}

impl SatParameters {
    /// Checks that the parameters are in range and fit together.
    ///
    /// # Errors
    ///
    /// Returns the first [`ParameterError`] found.
    pub fn validate(&self) -> Result<(), ParameterError> {
        if self.unsat_proof && self.treat_binary_clauses_separately {
            return Err(ParameterError::ProofWithBinaryClauses);
        }
        if self.unsat_proof
            && !matches!(
                self.minimization_algorithm,
                ConflictMinimization::None | ConflictMinimization::Recursive
            )
        {
            return Err(ParameterError::ProofWithMinimization(self.minimization_algorithm));
        }
        if self.restart_period < 0 {
            return Err(ParameterError::NegativeRestartPeriod(self.restart_period));
        }
        for (name, value) in [
            ("variable_activity_decay", self.variable_activity_decay),
            ("glucose_max_decay", self.glucose_max_decay),
            ("clause_activity_decay", self.clause_activity_decay),
            ("clause_cleanup_ratio", self.clause_cleanup_ratio),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ParameterError::InvalidDecay { name, value });
            }
        }
        if !(0.0..=1.0).contains(&self.random_branches_ratio) {
            return Err(ParameterError::InvalidRatio {
                name: "random_branches_ratio",
                value: self.random_branches_ratio,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(SatParameters::default().validate(), Ok(()));
    }

    #[test]
    fn proof_needs_clauses() {
        let params = SatParameters { unsat_proof: true, ..SatParameters::default() };
        assert_eq!(params.validate(), Err(ParameterError::ProofWithBinaryClauses));

        let params = SatParameters {
            unsat_proof: true,
            treat_binary_clauses_separately: false,
            minimization_algorithm: ConflictMinimization::Simple,
            ..SatParameters::default()
        };
        assert_eq!(
            params.validate(),
            Err(ParameterError::ProofWithMinimization(ConflictMinimization::Simple))
        );
    }

    #[test]
    fn ranges() {
        let params = SatParameters { restart_period: -1, ..SatParameters::default() };
        assert!(matches!(params.validate(), Err(ParameterError::NegativeRestartPeriod(-1))));
        let params = SatParameters { clause_activity_decay: 0.0, ..SatParameters::default() };
        assert!(matches!(
            params.validate(),
            Err(ParameterError::InvalidDecay { name: "clause_activity_decay", .. })
        ));
        let params = SatParameters { random_branches_ratio: f64::NAN, ..SatParameters::default() };
        assert!(matches!(params.validate(), Err(ParameterError::InvalidRatio { .. })));
        let params = SatParameters { restart_period: 0, ..SatParameters::default() };
        assert_eq!(params.validate(), Ok(()));
    }
}
