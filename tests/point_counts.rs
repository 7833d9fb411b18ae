//! Point counts on curves with independently known invariants

use std::sync::Arc;

use hasse::{CpuEvaluator, Curve, FieldTable, ReductionTable};
use proptest::prelude::*;

fn tower(prime: u64, genus: usize) -> (Arc<FieldTable>, Vec<ReductionTable>) {
    let field = Arc::new(FieldTable::new(prime, 1).unwrap());
    let tables = (1..=genus)
        .map(|level| ReductionTable::new(&field, level).unwrap())
        .collect();
    (field, tables)
}

#[test]
fn genus_two_sextic_over_gf5() {
    // y^2 = 4x^6 + x^4 + x^3 + 3x^2 + 2x + 1
    let (field, tables) = tower(5, 2);
    let mut curve = Curve::from_subfield_values(field, &[1, 2, 3, 1, 1, 0, 4]).unwrap();
    assert_eq!(curve.genus(), 2);

    let counts = curve.count_tower(&tables, &CpuEvaluator).unwrap();
    assert_eq!(counts, vec![(6, 0), (40, 2)]);
    assert_eq!(curve.hasse_weil_offsets(2).unwrap(), vec![0, -16]);
    assert_eq!(curve.weil_coefficients().unwrap(), (0, 8));
}

#[test]
fn genus_two_quintic_over_gf7() {
    // y^2 = 6x^5 + 3x^3 + 3x^2 + 3x
    let (field, tables) = tower(7, 2);
    let mut curve = Curve::from_subfield_values(field, &[0, 3, 3, 3, 0, 6]).unwrap();
    assert_eq!(curve.genus(), 2);

    let counts = curve.count_tower(&tables, &CpuEvaluator).unwrap();
    assert_eq!(counts, vec![(2, 4), (36, 6)]);
    assert_eq!(curve.hasse_weil_offsets(2).unwrap(), vec![2, 8]);
}

#[test]
fn boundary_points_follow_the_coefficients() {
    let (field, tables) = tower(5, 1);
    // y^2 = x^3 + x: roots at x = 0, 2, 3, plus infinity (odd degree)
    let mut with_root_at_zero =
        Curve::from_subfield_values(Arc::clone(&field), &[0, 1, 0, 1]).unwrap();
    assert_eq!(
        with_root_at_zero.count(&tables[0], &CpuEvaluator).unwrap(),
        (0, 4)
    );

    // y^2 = x^4 + x + 1: square leading coefficient splits infinity
    let mut split_at_infinity =
        Curve::from_subfield_values(Arc::clone(&field), &[1, 1, 0, 0, 1]).unwrap();
    assert_eq!(
        split_at_infinity.count(&tables[0], &CpuEvaluator).unwrap(),
        (8, 1)
    );
    // the same polynomial scaled by a nonsquare has no points there
    let mut inert_at_infinity =
        Curve::from_subfield_values(Arc::clone(&field), &[2, 2, 0, 0, 2]).unwrap();
    assert_eq!(
        inert_at_infinity.count(&tables[0], &CpuEvaluator).unwrap(),
        (2, 1)
    );
}

#[test]
fn twisted_counts_mirror_the_original() {
    let (field, tables) = tower(7, 2);
    let mut curve =
        Curve::from_subfield_values(Arc::clone(&field), &[0, 3, 3, 3, 0, 6]).unwrap();
    curve.count_tower(&tables, &CpuEvaluator).unwrap();
    let mut twist = curve.twist();
    twist.count_tower(&tables, &CpuEvaluator).unwrap();

    let offsets = curve.hasse_weil_offsets(2).unwrap();
    let twisted_offsets = twist.hasse_weil_offsets(2).unwrap();
    assert_eq!(twisted_offsets[0], -offsets[0]);
    assert_eq!(twisted_offsets[1], offsets[1]);
}

proptest! {
    /// |a_k| <= 2g * sqrt(q^k) for every smooth member of the family.
    #[test]
    fn hasse_weil_bound_holds(values in proptest::collection::vec(0u64..5, 6..=7)) {
        let (field, tables) = tower(5, 2);
        let Ok(mut curve) = Curve::from_subfield_values(Arc::clone(&field), &values) else {
            return Ok(());
        };
        prop_assume!(curve.degree() >= 5);
        prop_assume!(curve.is_squarefree(&tables[0]).unwrap());

        curve.count_tower(&tables, &CpuEvaluator).unwrap();
        let genus = curve.genus() as i64;
        for (k, offset) in curve.hasse_weil_offsets(2).unwrap().into_iter().enumerate() {
            let order = 5i64.pow(k as u32 + 1);
            prop_assert!(
                offset * offset <= 4 * genus * genus * order,
                "offset {offset} at level {} beats the bound", k + 1
            );
        }
    }
}
