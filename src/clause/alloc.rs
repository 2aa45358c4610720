//! Clause arena. Clauses are referenced by [`ClauseId`] handles everywhere else; a slot is
//! only reused after the clause has been released explicitly.

use super::SatClause;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct ClauseId(usize);

#[derive(Debug, Clone, Default)]
pub(crate) struct ClauseAllocator {
    clauses: Vec<Option<SatClause>>,
    free: Vec<usize>,
}

impl ClauseAllocator {
    /// Number of live clauses.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.clauses.len() - self.free.len()
    }

    pub(crate) fn add(&mut self, clause: SatClause) -> ClauseId {
        if let Some(idx) = self.free.pop() {
            self.clauses[idx] = Some(clause);
            ClauseId(idx)
        } else {
            self.clauses.push(Some(clause));
            ClauseId(self.clauses.len() - 1)
        }
    }

    /// Releases the memory of a clause. It must not be watched or used as a reason anymore.
    pub(crate) fn release(&mut self, id: ClauseId) -> SatClause {
        let clause = self.clauses[id.0].take().expect("clause was already released");
        debug_assert!(!clause.is_attached());
        self.free.push(id.0);
        clause
    }

    pub(crate) fn memory_bytes(&self) -> usize {
        self.clauses.capacity() * std::mem::size_of::<Option<SatClause>>()
            + self.clauses.iter().flatten().map(SatClause::memory_bytes).sum::<usize>()
    }
}

impl std::ops::Index<ClauseId> for ClauseAllocator {
    type Output = SatClause;

    fn index(&self, index: ClauseId) -> &Self::Output {
        self.clauses[index.0].as_ref().expect("access to a released clause")
    }
}

impl std::ops::IndexMut<ClauseId> for ClauseAllocator {
    fn index_mut(&mut self, index: ClauseId) -> &mut Self::Output {
        self.clauses[index.0].as_mut().expect("access to a released clause")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{clause::ClauseKind, literal::Lit};

    #[test]
    fn slots_are_reused() {
        let lits = [Lit::from_dimacs(1), Lit::from_dimacs(-2)];
        let mut alloc = ClauseAllocator::default();
        let a = alloc.add(SatClause::new(&lits, ClauseKind::Problem, None));
        let b = alloc.add(SatClause::new(&lits, ClauseKind::Learned { lbd: 2 }, None));
        assert_eq!(alloc.len(), 2);
        assert!(alloc[b].is_learned());

        let released = alloc.release(a);
        assert!(!released.is_learned());
        assert_eq!(alloc.len(), 1);

        let c = alloc.add(SatClause::new(&lits, ClauseKind::Problem, None));
        assert_eq!(a, c);
    }
}
