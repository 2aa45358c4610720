use crate::literal::{Lit, Var};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermutationError {
    #[error("literal {0} appears more than once in the cycles")]
    DuplicateLiteral(Lit),
    #[error("cycles of length {0} do not permute anything")]
    TrivialCycle(usize),
    #[error("the image of ¬{0} is not the negation of the image of {0}")]
    NotCompatibleWithNegation(Lit),
}

/// A permutation of literals given by its non-trivial cycles.
///
/// The permutation commutes with negation: `p(¬l) = ¬p(l)` for every literal `l`. Literals
/// outside of the support are fixed points.
#[derive(Debug, Clone)]
pub struct SparsePermutation {
    cycles: Vec<Vec<Lit>>,
    images: HashMap<Lit, Lit>,
}

impl SparsePermutation {
    /// Builds the permutation that maps every literal of a cycle to its successor.
    ///
    /// # Errors
    ///
    /// Fails if a literal occurs twice, a cycle has fewer than two literals, or the cycles
    /// are not closed under negation.
    pub fn from_cycles(cycles: Vec<Vec<Lit>>) -> Result<Self, PermutationError> {
        let mut images = HashMap::new();
        for cycle in &cycles {
            if cycle.len() < 2 {
                return Err(PermutationError::TrivialCycle(cycle.len()));
            }
            for (&lit, &image) in cycle.iter().zip(cycle.iter().cycle().skip(1)) {
                if images.insert(lit, image).is_some() {
                    return Err(PermutationError::DuplicateLiteral(lit));
                }
            }
        }
        for (&lit, &image) in &images {
            if images.get(&lit.negated()) != Some(&image.negated()) {
                return Err(PermutationError::NotCompatibleWithNegation(lit));
            }
        }
        Ok(Self { cycles, images })
    }

    /// Exchanges the variables `a` and `b`, i.e., the cycles `(a b)` and `(¬a ¬b)`.
    ///
    /// # Panics
    ///
    /// If `a == b`.
    #[must_use]
    pub fn swap_variables(a: Var, b: Var) -> Self {
        assert_ne!(a, b);
        Self::from_cycles(vec![
            vec![a.positive(), b.positive()],
            vec![a.negative(), b.negative()],
        ])
        .expect("a transposition of two variables is a valid permutation")
    }

    /// The image of `lit`.
    #[must_use]
    pub fn image(&self, lit: Lit) -> Lit {
        self.images.get(&lit).copied().unwrap_or(lit)
    }

    /// The literals that are not fixed points.
    pub fn support(&self) -> impl Iterator<Item = Lit> + '_ {
        self.cycles.iter().flatten().copied()
    }

    pub(crate) fn max_var(&self) -> Option<Var> {
        self.support().map(Lit::var).max()
    }

    pub fn cycles(&self) -> &[Vec<Lit>] {
        &self.cycles
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn lit(dimacs: i32) -> Lit {
        Lit::from_dimacs(dimacs)
    }

    #[test]
    fn swap() {
        let p = SparsePermutation::swap_variables(Var::from_dimacs(1), Var::from_dimacs(3));
        assert_eq!(p.image(lit(1)), lit(3));
        assert_eq!(p.image(lit(-3)), lit(-1));
        assert_eq!(p.image(lit(2)), lit(2));
        assert_eq!(p.support().count(), 4);
        assert_eq!(p.max_var(), Some(Var::from_dimacs(3)));
    }

    #[test]
    fn phase_flip() {
        // x1 ↦ ¬x1 is compatible with negation
        let p = SparsePermutation::from_cycles(vec![vec![lit(1), lit(-1)]]).unwrap();
        assert_eq!(p.image(lit(1)), lit(-1));
        assert_eq!(p.image(lit(-1)), lit(1));
    }

    #[test]
    fn invalid_cycles() {
        assert!(matches!(
            SparsePermutation::from_cycles(vec![vec![lit(1), lit(2)]]),
            Err(PermutationError::NotCompatibleWithNegation(_))
        ));
        assert_eq!(
            SparsePermutation::from_cycles(vec![vec![lit(1), lit(2)], vec![lit(2), lit(3)]])
                .unwrap_err(),
            PermutationError::DuplicateLiteral(lit(2))
        );
        assert_eq!(
            SparsePermutation::from_cycles(vec![vec![lit(1)]]).unwrap_err(),
            PermutationError::TrivialCycle(1)
        );
    }
}
