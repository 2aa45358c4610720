use super::*;
use crate::{proof::UnsatProof, trail::AssignmentType};
use proptest::prelude::*;

fn lit(dimacs: i32) -> Lit {
    Lit::from_dimacs(dimacs)
}

fn terms(input: &[(i32, i64)]) -> Vec<LiteralWithCoeff> {
    input.iter().map(|&(l, c)| LiteralWithCoeff::new(lit(l), c)).collect()
}

fn store(vars: usize) -> (PbConstraints, Trail) {
    let mut pb = PbConstraints::default();
    pb.set_var_count(vars);
    let mut trail = Trail::default();
    trail.set_var_count(vars);
    (pb, trail)
}

/// Runs the propagator until it has seen the whole trail.
fn propagate(pb: &mut PbConstraints, trail: &mut Trail) -> Result<(), PbConflict> {
    while pb.propagation_needed(trail) {
        pb.propagate_next(trail)?;
    }
    Ok(())
}

fn backtrack(pb: &mut PbConstraints, trail: &mut Trail, trail_index: usize) {
    pb.untrail(trail_index, trail);
    while trail.index() > trail_index {
        trail.dequeue();
    }
}

#[test]
fn canonical_form_merges_and_flips() {
    // 3x1 + 4(1 - x1) - 3x2 = 4 - x1 - 3x2 = (1 - x1) + 3(1 - x2)
    let mut cst = terms(&[(1, 2), (2, -3), (1, 1), (-1, 4)]);
    let form = compute_canonical_form(&mut cst).unwrap();
    assert_eq!(cst, terms(&[(-1, 1), (-2, 3)]));
    assert_eq!(form.max_value, 4);
    assert_eq!(form.bound_shift, 0);
    assert!(is_canonical(&cst));
}

#[test]
fn canonical_form_removes_cancelling_terms() {
    let mut cst = terms(&[(1, 2), (-1, 2), (3, 0), (2, 5)]);
    let form = compute_canonical_form(&mut cst).unwrap();
    assert_eq!(cst, terms(&[(2, 5)]));
    // 2x1 + 2(1 - x1) = 2
    assert_eq!(form.bound_shift, -2);
    assert_eq!(form.max_value, 5);
}

#[test]
fn canonical_form_overflow() {
    let mut cst = terms(&[(1, i64::MAX), (2, 1)]);
    assert_eq!(compute_canonical_form(&mut cst), Err(CoefficientOverflow));
    let mut cst = terms(&[(1, i64::MAX), (1, 1)]);
    assert_eq!(compute_canonical_form(&mut cst), Err(CoefficientOverflow));
}

#[test]
fn rhs_saturation() {
    assert_eq!(compute_canonical_rhs(5, 2, 10), 7);
    assert_eq!(compute_canonical_rhs(5, 20, 10), 10);
    assert_eq!(compute_canonical_rhs(-3, 1, 10), -1);
    // overflow upwards: always true
    assert_eq!(compute_canonical_rhs(i64::MAX, 1, 10), 10);
    // overflow downwards: infeasible
    assert_eq!(compute_canonical_rhs(i64::MIN, -1, 10), -1);

    assert_eq!(compute_negated_canonical_rhs(3, 0, 10), 7);
    assert_eq!(compute_negated_canonical_rhs(-3, 0, 10), 10);
    assert_eq!(compute_negated_canonical_rhs(i64::MAX, 1, 10), -1);
    assert_eq!(compute_negated_canonical_rhs(i64::MIN, -1, 10), 10);
}

#[test]
fn simplify_caps_coefficients() {
    let mut cst = terms(&[(1, 1), (2, 3), (3, 9)]);
    assert_eq!(simplify_canonical(&mut cst, 2), 1 + 3 + 3);
    assert_eq!(cst, terms(&[(1, 1), (2, 3), (3, 3)]));
}

proptest! {
    #[test]
    fn canonicalization_is_idempotent(
        input in proptest::collection::vec((crate::literal::strategy::lit(0..6u32), -20i64..20), 0..12)
    ) {
        let mut cst: Vec<_> = input.into_iter().map(|(l, c)| LiteralWithCoeff::new(l, c)).collect();
        let first = compute_canonical_form(&mut cst).unwrap();
        prop_assert!(is_canonical(&cst));
        let canonical = cst.clone();
        let second = compute_canonical_form(&mut cst).unwrap();
        prop_assert_eq!(&cst, &canonical);
        prop_assert_eq!(second.bound_shift, 0);
        prop_assert_eq!(second.max_value, first.max_value);
    }

    #[test]
    fn canonical_form_preserves_value(
        input in proptest::collection::vec((crate::literal::strategy::lit(0..5u32), -20i64..20), 0..10),
        values in proptest::collection::vec(proptest::bool::ANY, 5),
    ) {
        let eval = |cst: &[LiteralWithCoeff]| -> i64 {
            cst.iter()
                .filter(|term| values[term.literal.var().as_index()] == term.literal.is_positive())
                .map(|term| term.coefficient)
                .sum()
        };
        let original: Vec<_> = input.into_iter().map(|(l, c)| LiteralWithCoeff::new(l, c)).collect();
        let mut cst = original.clone();
        let form = compute_canonical_form(&mut cst).unwrap();
        prop_assert_eq!(eval(&original), eval(&cst) - form.bound_shift);
    }
}

#[test]
fn at_most_one_propagates_all_others() {
    let (mut pb, mut trail) = store(3);
    assert!(pb.add_constraint(&terms(&[(1, 1), (2, 1), (3, 1)]), 1, None, &mut trail, &mut UnsatProof::default()));
    trail.set_decision_level(1);
    trail.enqueue_search_decision(lit(1));
    assert_eq!(propagate(&mut pb, &mut trail), Ok(()));

    assert!(trail.assignment().is_literal_true(lit(-2)));
    assert!(trail.assignment().is_literal_true(lit(-3)));
    let first = trail.info(lit(2).var()).kind;
    assert!(matches!(first, AssignmentType::PbPropagation { source_trail_index: 0, .. }));
    assert_eq!(trail.info(lit(3).var()).kind, AssignmentType::SameReasonAs(lit(2).var()));

    let AssignmentType::PbPropagation { constraint, source_trail_index } = first else {
        unreachable!()
    };
    let mut reason = Vec::new();
    pb.fill_reason(&trail, constraint, source_trail_index, lit(2).var(), &mut reason);
    assert_eq!(reason, vec![lit(-1)]);
    pb.check_slacks(&trail);
}

#[test]
fn conflict_on_late_true_literal() {
    let (mut pb, mut trail) = store(3);
    assert!(pb.add_constraint(&terms(&[(1, 1), (2, 1), (3, 2)]), 2, None, &mut trail, &mut UnsatProof::default()));
    trail.set_decision_level(1);
    trail.enqueue_search_decision(lit(1));
    // assigned before the propagator had a chance to look at the first literal
    trail.enqueue_search_decision(lit(3));
    let conflict = propagate(&mut pb, &mut trail).unwrap_err();
    assert_eq!(conflict.constraint, PbConstraintId(0));
    let mut failing = trail.failing_clause().to_vec();
    failing.sort();
    assert_eq!(failing, vec![lit(-1), lit(-3)]);
}

#[test]
fn reason_drops_small_coefficients() {
    // x1 + x2 + 3x3 + 3x4 ≤ 5: x3 alone already forbids x4
    let (mut pb, mut trail) = store(4);
    assert!(pb.add_constraint(&terms(&[(1, 1), (2, 1), (3, 3), (4, 3)]), 5, None, &mut trail, &mut UnsatProof::default()));
    for (level, decision) in [1, 2, 3].into_iter().enumerate() {
        trail.set_decision_level(level + 1);
        trail.enqueue_search_decision(lit(decision));
        assert_eq!(propagate(&mut pb, &mut trail), Ok(()));
    }
    assert!(trail.assignment().is_literal_true(lit(-4)));

    let AssignmentType::PbPropagation { constraint, source_trail_index } =
        trail.info(lit(4).var()).kind
    else {
        panic!("x4 should be propagated by the constraint");
    };
    assert_eq!(source_trail_index, 2);
    let mut reason = Vec::new();
    pb.fill_reason(&trail, constraint, source_trail_index, lit(4).var(), &mut reason);
    assert_eq!(reason, vec![lit(-3)]);
}

#[test]
fn untrail_restores_slack() {
    let (mut pb, mut trail) = store(4);
    assert!(pb.add_constraint(&terms(&[(1, 1), (2, 2), (3, 2), (4, 3)]), 5, None, &mut trail, &mut UnsatProof::default()));
    let initial = pb.thresholds().to_vec();

    trail.set_decision_level(1);
    trail.enqueue_search_decision(lit(1));
    assert_eq!(propagate(&mut pb, &mut trail), Ok(()));
    let after_first = pb.thresholds().to_vec();
    pb.check_slacks(&trail);

    trail.set_decision_level(2);
    trail.enqueue_search_decision(lit(2));
    assert_eq!(propagate(&mut pb, &mut trail), Ok(()));
    // slack 2 is below the coefficient of x4
    assert!(trail.assignment().is_literal_true(lit(-4)));
    pb.check_slacks(&trail);

    trail.set_decision_level(3);
    trail.enqueue_search_decision(lit(3));
    assert_eq!(propagate(&mut pb, &mut trail), Ok(()));
    pb.check_slacks(&trail);

    backtrack(&mut pb, &mut trail, 1);
    trail.set_decision_level(1);
    assert_eq!(pb.thresholds(), &after_first[..]);
    pb.check_slacks(&trail);

    backtrack(&mut pb, &mut trail, 0);
    trail.set_decision_level(0);
    assert_eq!(pb.thresholds(), &initial[..]);
}

#[test]
fn identical_terms_tighten_rhs() {
    let (mut pb, mut trail) = store(3);
    let cst = terms(&[(1, 1), (2, 1), (3, 1)]);
    assert!(pb.add_constraint(&cst, 2, None, &mut trail, &mut UnsatProof::default()));
    assert!(pb.add_constraint(&cst, 3, None, &mut trail, &mut UnsatProof::default()));
    assert_eq!(pb.num_constraints(), 1);
    assert!(pb.add_constraint(&cst, 0, None, &mut trail, &mut UnsatProof::default()));
    assert_eq!(pb.num_constraints(), 1);
    // rhs 0 forces all literals to false
    assert!((1..=3).all(|l| trail.assignment().is_literal_true(lit(-l))));
}

#[test]
fn tightened_constraint_takes_over_resolution_node() {
    let (mut pb, mut trail) = store(4);
    let mut proof = UnsatProof::default();
    let cst = terms(&[(1, 1), (2, 1), (3, 1), (4, 1)]);
    let loose = proof.create_root_node(0);
    assert!(pb.add_constraint(&cst, 2, Some(loose), &mut trail, &mut proof));
    let tight = proof.create_root_node(1);
    assert!(pb.add_constraint(&cst, 1, Some(tight), &mut trail, &mut proof));
    assert_eq!(pb.resolution_node(PbConstraintId(0)), Some(tight));
    assert_eq!(proof.num_live_nodes(), 1);

    // a weaker copy is dropped together with its node
    let redundant = proof.create_root_node(2);
    assert!(pb.add_constraint(&cst, 3, Some(redundant), &mut trail, &mut proof));
    assert_eq!(pb.resolution_node(PbConstraintId(0)), Some(tight));
    assert_eq!(proof.num_live_nodes(), 1);
    assert_eq!(proof.compute_unsat_core(tight), vec![1]);
}

proptest! {
    /// Random decisions and backjumps keep the incremental slacks in sync.
    #[test]
    fn slack_invariant(
        coeffs in proptest::collection::vec(1i64..6, 2..6),
        rhs in 1i64..12,
        decisions in proptest::collection::vec((0usize..6, proptest::bool::ANY), 1..8),
        backjumps in proptest::collection::vec(0usize..8, 1..4),
    ) {
        let vars = coeffs.len();
        let (mut pb, mut trail) = store(vars);
        let mut cst: Vec<_> = coeffs
            .iter()
            .enumerate()
            .map(|(idx, &c)| LiteralWithCoeff::new(Var::from_index(idx.try_into().unwrap()).positive(), c))
            .collect();
        cst.sort_by_key(|term| (term.coefficient, term.literal));
        prop_assume!(rhs < cst.iter().map(|t| t.coefficient).sum::<i64>());
        prop_assert!(pb.add_constraint(&cst, rhs, None, &mut trail, &mut UnsatProof::default()));

        for &jump in &backjumps {
            let mut level_starts = Vec::new();
            for &(var, polarity) in &decisions {
                let var = Var::from_index((var % vars).try_into().unwrap());
                if trail.assignment().is_variable_assigned(var) {
                    continue;
                }
                level_starts.push(trail.index());
                trail.set_decision_level(level_starts.len());
                trail.enqueue_search_decision(Lit::new(var, polarity));
                if propagate(&mut pb, &mut trail).is_err() {
                    break;
                }
                pb.check_slacks(&trail);
            }
            let target = level_starts.get(jump % (level_starts.len() + 1)).copied().unwrap_or(0);
            backtrack(&mut pb, &mut trail, target);
            pb.check_slacks(&trail);
        }
        backtrack(&mut pb, &mut trail, 0);
        pb.check_slacks(&trail);
    }
}
