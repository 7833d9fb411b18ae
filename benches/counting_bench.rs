use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use hasse::{CpuEvaluator, Curve, FieldTable, ReductionTable};

fn bench_evaluation_kernel(c: &mut Criterion) {
    let field = Arc::new(FieldTable::new(7, 1).unwrap());
    let level3 = ReductionTable::new(&field, 3).unwrap();
    let curve = Curve::from_subfield_values(Arc::clone(&field), &[1, 2, 3, 1, 1, 0, 4]).unwrap();
    let promoted: Vec<usize> = curve
        .coeff_exponents()
        .iter()
        .map(|&e| level3.promote(e))
        .collect();

    c.bench_function("evaluate_units_gf343", |b| {
        b.iter(|| level3.evaluate_units(black_box(&promoted)))
    });
}

fn bench_full_curve_count(c: &mut Criterion) {
    let field = Arc::new(FieldTable::new(11, 1).unwrap());
    let tables: Vec<ReductionTable> = (1..=2)
        .map(|level| ReductionTable::new(&field, level).unwrap())
        .collect();

    c.bench_function("count_tower_genus2_gf11", |b| {
        b.iter(|| {
            // fresh curve per iteration, the memo must not help
            let mut curve =
                Curve::from_subfield_values(Arc::clone(&field), &[1, 2, 3, 1, 1, 0, 4]).unwrap();
            curve.count_tower(black_box(&tables), &CpuEvaluator).unwrap()
        })
    });
}

fn bench_table_construction(c: &mut Criterion) {
    let field = FieldTable::new(7, 1).unwrap();
    c.bench_function("reduction_table_gf2401", |b| {
        b.iter(|| ReductionTable::new(black_box(&field), 4).unwrap())
    });
}

criterion_group!(
    benches,
    bench_evaluation_kernel,
    bench_full_curve_count,
    bench_table_construction
);
criterion_main!(benches);
