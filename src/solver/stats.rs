use std::time::Duration;

#[derive(Debug, Default, Clone)]
pub struct Statistics {
    pub search: SearchStats,
    pub learning: LearningStats,
}

#[derive(Debug, Default, Clone)]
pub struct SearchStats {
    /// Number of backtracks, i.e., conflicts plus restarts.
    pub failures: u64,
    pub decisions: u64,
    pub random_decisions: u64,
    pub propagations: u64,
    pub binary_propagations: u64,
    pub symmetry_propagations: u64,
    pub symmetry_conflicts: u64,
    pub inspected_clauses: u64,
    pub pb_threshold_updates: u64,
    pub pb_constraint_lookups: u64,
    pub restarts: u64,
    pub solve_time: Duration,
}

#[derive(Debug, Default, Clone)]
pub struct LearningStats {
    /// Learned clauses currently in the database, without binary ones.
    pub learned_clauses: usize,
    pub binary_clauses: usize,
    pub learned_literals: u64,
    pub forgotten_literals: u64,
    pub deleted_clauses: u64,
    pub minimizations: u64,
    pub minimized_literals: u64,
    pub binary_minimizations: u64,
    pub binary_minimized_literals: u64,
}
