//! Propagation by symmetry.
//!
//! For each registered permutation `p` the propagator tracks the first literal `l` on the trail
//! whose image `p(l)` is not true yet (the first non-symmetric literal). If `l` was implied
//! rather than decided, its reason only contains literals whose images are true as well, so
//! `p(l)` is implied by the permuted reason. It is either propagated or, if already false, the
//! permuted reason together with `p(l)` is a conflict.
//!
//! This is only sound for permutations that map the whole constraint set onto itself.

use crate::{
    datastructure::LitVec,
    literal::Lit,
    trail::{AssignmentType, Trail},
};
use tracing::trace;

mod permutation;

pub use permutation::{PermutationError, SparsePermutation};

#[derive(Debug, Clone, Copy)]
struct ImageInfo {
    permutation: usize,
    image: Lit,
}

#[derive(Debug, Clone, Copy)]
struct AssignedLiteralInfo {
    literal: Lit,
    image: Lit,
    /// Index into the permutation trail of the first entry whose image was not true when
    /// `literal` was assigned.
    first_non_symmetric_info_index_so_far: usize,
}

/// A conflict found by the propagator: `image` is false although `source` is true and its
/// permuted reason is false.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SymmetryConflict {
    pub(crate) permutation: usize,
    pub(crate) source: Lit,
    pub(crate) image: Lit,
}

#[derive(Debug, Default)]
pub(crate) struct SymmetryPropagator {
    permutations: Vec<SparsePermutation>,
    /// Literal to the permutations it is in the support of.
    images: LitVec<Vec<ImageInfo>>,
    /// Per permutation: the processed true literals of its support, in trail order.
    permutation_trails: Vec<Vec<AssignedLiteralInfo>>,
    propagation_trail_index: usize,
    conflict: Option<SymmetryConflict>,
    num_propagations: u64,
    num_conflicts: u64,
}

impl SymmetryPropagator {
    pub(crate) fn set_var_count(&mut self, count: usize) {
        self.images.set_var_count(count);
    }

    /// Registers a permutation. Must happen before anything is propagated.
    pub(crate) fn add_symmetry(&mut self, permutation: SparsePermutation) {
        assert_eq!(self.propagation_trail_index, 0, "symmetries have to be added before search");
        let index = self.permutations.len();
        for lit in permutation.support() {
            self.images[lit].push(ImageInfo { permutation: index, image: permutation.image(lit) });
        }
        trace!("add symmetry {index} with {} cycles", permutation.cycles().len());
        self.permutations.push(permutation);
        self.permutation_trails.push(Vec::new());
    }

    pub(crate) fn num_permutations(&self) -> usize {
        self.permutations.len()
    }

    pub(crate) fn num_propagations(&self) -> u64 {
        self.num_propagations
    }

    pub(crate) fn num_conflicts(&self) -> u64 {
        self.num_conflicts
    }

    pub(crate) fn propagation_needed(&self, trail: &Trail) -> bool {
        !self.permutations.is_empty() && self.propagation_trail_index < trail.index()
    }

    /// Processes the next trail literal. Returns false on conflict, which is then available
    /// through [`SymmetryPropagator::last_conflict`].
    pub(crate) fn propagate_next(&mut self, trail: &mut Trail) -> bool {
        let true_literal = trail[self.propagation_trail_index];
        let source_trail_index = trail.info(true_literal.var()).trail_index;
        self.propagation_trail_index += 1;
        self.conflict = None;

        // every image has to be pushed so that untrail can pop them again, even after a conflict
        for info in &self.images[true_literal] {
            let p_trail = &mut self.permutation_trails[info.permutation];
            if push_and_check_symmetric(trail, true_literal, info.image, source_trail_index, p_trail)
                || self.conflict.is_some()
            {
                continue;
            }
            let last = p_trail.last().map_or(0, |entry| entry.first_non_symmetric_info_index_so_far);
            let non_symmetric = p_trail[last];

            // nothing can be derived from a decision
            let source_info = trail.info(non_symmetric.literal.var());
            if source_info.kind == AssignmentType::SearchDecision {
                continue;
            }
            let source_trail_index = source_info.trail_index;
            if trail.assignment().is_literal_false(non_symmetric.image) {
                trace!(
                    "symmetry {} conflict: {} is true but {} is false",
                    info.permutation,
                    non_symmetric.literal,
                    non_symmetric.image
                );
                self.num_conflicts += 1;
                self.conflict = Some(SymmetryConflict {
                    permutation: info.permutation,
                    source: non_symmetric.literal,
                    image: non_symmetric.image,
                });
            } else if !trail.assignment().is_literal_true(non_symmetric.image) {
                self.num_propagations += 1;
                trail.enqueue_with_symmetric_reason(
                    non_symmetric.image,
                    source_trail_index,
                    info.permutation,
                );
            }
        }
        self.conflict.is_none()
    }

    /// Forgets all trail literals at positions `>= trail_index`.
    pub(crate) fn untrail(&mut self, trail_index: usize, trail: &Trail) {
        while self.propagation_trail_index > trail_index {
            self.propagation_trail_index -= 1;
            let lit = trail[self.propagation_trail_index];
            for info in &self.images[lit] {
                let popped = self.permutation_trails[info.permutation].pop();
                debug_assert_eq!(popped.map(|entry| entry.literal), Some(lit));
            }
        }
    }

    pub(crate) fn last_conflict(&self) -> Option<SymmetryConflict> {
        self.conflict
    }

    /// Writes the images of `input` under permutation `index` into `output`.
    pub(crate) fn permute(&self, index: usize, input: &[Lit], output: &mut Vec<Lit>) {
        let permutation = &self.permutations[index];
        output.clear();
        output.extend(input.iter().map(|&lit| permutation.image(lit)));
    }

    pub(crate) fn memory_bytes(&self) -> usize {
        self.images.nested_capacity_bytes()
            + self
                .permutation_trails
                .iter()
                .map(|p_trail| p_trail.capacity() * std::mem::size_of::<AssignedLiteralInfo>())
                .sum::<usize>()
    }
}

/// Pushes `literal` onto the permutation trail and advances its first non-symmetric index.
/// Returns true if every entry is symmetric, or if an image true in the full assignment was
/// only assigned after `literal`, in which case that image is going to be processed later.
fn push_and_check_symmetric(
    trail: &Trail,
    literal: Lit,
    image: Lit,
    literal_trail_index: usize,
    p_trail: &mut Vec<AssignedLiteralInfo>,
) -> bool {
    let mut index = p_trail.last().map_or(0, |entry| entry.first_non_symmetric_info_index_so_far);
    p_trail.push(AssignedLiteralInfo { literal, image, first_non_symmetric_info_index_so_far: index });
    let mut early_exit = false;
    while index < p_trail.len() && trail.assignment().is_literal_true(p_trail[index].image) {
        if trail.info(p_trail[index].image.var()).trail_index > literal_trail_index {
            early_exit = true;
            break;
        }
        index += 1;
    }
    if let Some(last) = p_trail.last_mut() {
        last.first_non_symmetric_info_index_so_far = index;
    }
    early_exit || index == p_trail.len()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::literal::Var;

    fn lit(dimacs: i32) -> Lit {
        Lit::from_dimacs(dimacs)
    }

    fn setup(vars: usize, permutation: SparsePermutation) -> (SymmetryPropagator, Trail) {
        let mut symmetry = SymmetryPropagator::default();
        symmetry.set_var_count(vars);
        symmetry.add_symmetry(permutation);
        let mut trail = Trail::default();
        trail.set_var_count(vars);
        (symmetry, trail)
    }

    fn propagate(symmetry: &mut SymmetryPropagator, trail: &mut Trail) -> bool {
        while symmetry.propagation_needed(trail) {
            if !symmetry.propagate_next(trail) {
                return false;
            }
        }
        true
    }

    #[test]
    fn implied_literal_is_mirrored() {
        let swap = SparsePermutation::swap_variables(Var::from_dimacs(1), Var::from_dimacs(2));
        let (mut symmetry, mut trail) = setup(3, swap);
        trail.enqueue_with_unit_reason(lit(1), None);
        assert!(propagate(&mut symmetry, &mut trail));
        assert!(trail.assignment().is_literal_true(lit(2)));
        assert_eq!(
            trail.info(lit(2).var()).kind,
            AssignmentType::SymmetryPropagation { symmetry: 0, source_trail_index: 0 }
        );
        assert_eq!(symmetry.num_propagations(), 1);

        let mut permuted = Vec::new();
        symmetry.permute(0, &[lit(-1), lit(3)], &mut permuted);
        assert_eq!(permuted, vec![lit(-2), lit(3)]);
    }

    #[test]
    fn decisions_are_not_mirrored() {
        let swap = SparsePermutation::swap_variables(Var::from_dimacs(1), Var::from_dimacs(2));
        let (mut symmetry, mut trail) = setup(2, swap);
        trail.set_decision_level(1);
        trail.enqueue_search_decision(lit(1));
        assert!(propagate(&mut symmetry, &mut trail));
        assert!(!trail.assignment().is_variable_assigned(lit(2).var()));
    }

    #[test]
    fn false_image_is_a_conflict() {
        let swap = SparsePermutation::swap_variables(Var::from_dimacs(1), Var::from_dimacs(2));
        let (mut symmetry, mut trail) = setup(2, swap);
        // both fixed before the propagator sees them: ¬x2 implies ¬x1
        trail.enqueue_with_unit_reason(lit(-2), None);
        trail.enqueue_with_unit_reason(lit(1), None);
        assert!(!propagate(&mut symmetry, &mut trail));
        assert_eq!(
            symmetry.last_conflict(),
            Some(SymmetryConflict { permutation: 0, source: lit(-2), image: lit(-1) })
        );
        assert_eq!(symmetry.num_conflicts(), 1);

        // the permutation trail stays consistent with the solver trail
        symmetry.untrail(0, &trail);
        while trail.dequeue().is_some() {}
        trail.enqueue_with_unit_reason(lit(2), None);
        assert!(propagate(&mut symmetry, &mut trail));
        assert!(trail.assignment().is_literal_true(lit(1)));
    }

    #[test]
    fn symmetric_prefix_is_skipped() {
        // (x1 x2)(x3 x4): after x1, x2 (mirror) and the decision x3, nothing is derived for x3
        let permutation = SparsePermutation::from_cycles(vec![
            vec![lit(1), lit(2)],
            vec![lit(-1), lit(-2)],
            vec![lit(3), lit(4)],
            vec![lit(-3), lit(-4)],
        ])
        .unwrap();
        let (mut symmetry, mut trail) = setup(4, permutation);
        trail.enqueue_with_unit_reason(lit(1), None);
        assert!(propagate(&mut symmetry, &mut trail));
        assert!(trail.assignment().is_literal_true(lit(2)));
        trail.set_decision_level(1);
        trail.enqueue_search_decision(lit(3));
        assert!(propagate(&mut symmetry, &mut trail));
        assert!(!trail.assignment().is_variable_assigned(lit(4).var()));

        symmetry.untrail(2, &trail);
        trail.dequeue();
        assert_eq!(symmetry.permutation_trails[0].len(), 2);
    }
}
