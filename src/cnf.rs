//! A straight-forward representation of a propositional formula in CNF.

use crate::{dimacs::FromDimacs, literal::Lit, SatSolver};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cnf {
    pub num_variables: u32,
    pub clauses: Vec<Vec<Lit>>,
}

impl Cnf {
    #[must_use]
    pub fn new(clauses: &[&[i32]]) -> Self {
        let clauses: Vec<Vec<Lit>> = clauses
            .iter()
            .map(|&lits| lits.iter().map(|&lit| Lit::from_dimacs(lit)).collect())
            .collect();
        let num_variables = clauses
            .iter()
            .flatten()
            .map(|lit| lit.var().to_dimacs().unsigned_abs())
            .max()
            .unwrap_or_default();
        Cnf { num_variables, clauses }
    }

    #[must_use]
    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    /// Loads the formula into `solver`. Returns false if the formula is already found unsat
    /// while adding clauses.
    pub fn add_to(&self, solver: &mut SatSolver) -> bool {
        let num_variables = usize::try_from(self.num_variables).unwrap_or(usize::MAX);
        solver.set_num_variables(solver.num_variables().max(num_variables));
        let mut consistent = true;
        for clause in &self.clauses {
            consistent &= solver.add_problem_clause(clause);
        }
        consistent
    }

    /// Whether `model`, given as the list of true literals, satisfies every clause.
    #[must_use]
    pub fn is_satisfied_by(&self, model: &[Lit]) -> bool {
        self.clauses.iter().all(|clause| clause.iter().any(|lit| model.contains(lit)))
    }
}

impl FromDimacs for Cnf {
    fn set_num_variables(&mut self, variables: u32) {
        self.num_variables = variables;
    }

    fn set_num_clauses(&mut self, clauses: u32) {
        self.clauses.reserve(clauses as usize);
    }

    fn add_clause(&mut self, lits: &[Lit]) {
        self.clauses.push(lits.to_owned());
    }
}

impl std::fmt::Display for Cnf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "p cnf {} {}", self.num_variables, self.num_clauses())?;
        for clause in &self.clauses {
            for lit in clause {
                write!(f, "{lit} ")?;
            }
            writeln!(f, "0")?;
        }
        Ok(())
    }
}

#[cfg(test)]
macro_rules! cnf_core {
    ($matrix:expr,) => {
        (crate::cnf::Cnf::new(&$matrix))
    };
    ($matrix:expr, $( $x:literal )* ; $($tail:tt)* ) => {{
        $matrix.push(&[ $( $x ),* ]);
        cnf_core![$matrix, $($tail)*]
    }};
}

/// Macro that creates a [`Cnf`] instance from a DIMACS-like representation.
/// The main differences are:
/// * No support for comments
/// * No header line
/// * Clauses are seperated by `;`, whereas DIMACS uses `0`.
///
/// # Example
/// ```ignore
/// let cnf = cnf_formula![
///     1 2;
///     -1 3;
/// ];
/// ```
#[cfg(test)]
macro_rules! cnf_formula {
    ($($tail:tt)*) => {{
        let mut matrix: Vec<&[i32]> = Vec::new();
        cnf_core![matrix, $($tail)*]
    }};
}

/// Provides a strategy for randomly generating CNFs.
#[cfg(test)]
pub(crate) mod strategy {
    use super::Cnf;
    use crate::literal::strategy::lit;
    use proptest::{
        collection::{self, SizeRange},
        prelude::*,
    };

    /// A strategy to generate a CNF over `variables` variables with the provided parameters.
    pub(crate) fn cnf(
        variables: u32,
        clauses: impl Into<SizeRange>,
        clause_len: impl Into<SizeRange>,
    ) -> impl Strategy<Value = Cnf> {
        collection::vec(collection::vec(lit(0..variables), clause_len.into()), clauses.into())
            .prop_map(move |clauses| Cnf { num_variables: variables, clauses })
            .no_shrink()
    }
}

#[cfg(test)]
mod test {
    use crate::SolverStatus;

    #[test]
    fn cnf_macro() {
        let cnf = cnf_formula![
            1 2;
            -3;
        ];
        assert_eq!(cnf.num_clauses(), 2);
        assert_eq!(cnf.num_variables, 3);
        assert_eq!(format!("{cnf}"), "p cnf 3 2\n1 2 0\n-3 0\n");
    }

    #[test]
    fn solve_and_check_model() {
        let cnf = cnf_formula![
            1 2;
            -1 3;
            -2 -3;
        ];
        let mut solver = crate::SatSolver::new();
        assert!(cnf.add_to(&mut solver));
        assert_eq!(solver.solve(), SolverStatus::ModelSat);
        assert!(cnf.is_satisfied_by(&solver.assignment()));
    }
}
