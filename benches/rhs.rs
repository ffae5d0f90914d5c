use criterion::black_box;
use criterion::{criterion_group, criterion_main, Criterion};
use pknet::{Connection, Dosing, Elimination, Model, OutputShift};

fn chain_model(n_children: usize) -> Model {
    let mut model = Model::new();
    model
        .create_root(
            "c0",
            1.0,
            Dosing::Constant { rate: 1.0 },
            Elimination::FirstOrder { k: 1.0 },
        )
        .unwrap();
    for i in 1..=n_children {
        model
            .add_child(
                &format!("c{}", i - 1),
                &format!("c{}", i),
                0.5 + i as f64,
                Connection::FirstOrder { k: 0.5 },
                OutputShift::MoveVolumeCorrected,
            )
            .unwrap();
    }
    model
}

fn rhs_evaluation(c: &mut Criterion) {
    let model = chain_model(9);
    let rhs = model.assemble_rhs();
    let q: Vec<f64> = (0..model.len()).map(|i| i as f64 * 0.1).collect();

    c.bench_function("rhs_10_compartments", |b| {
        b.iter(|| black_box(rhs(black_box(0.5), black_box(&q))).unwrap())
    });
}

fn solve_small_model(c: &mut Criterion) {
    let model = chain_model(2);
    let t_eval: Vec<f64> = (0..21).map(|i| i as f64 * 0.5).collect();
    let q0 = vec![1.0, 0.0, 0.0];

    c.bench_function("solve_3_compartments", |b| {
        b.iter(|| black_box(model.solve(&t_eval, &q0)).unwrap())
    });
}

criterion_group!(benches, rhs_evaluation, solve_small_model);
criterion_main!(benches);
