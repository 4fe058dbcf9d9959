use criterion::{criterion_group, criterion_main, Criterion};
use wickforest::{Active, Diagram, Equation, Forest, Index, OperatorString, Space, Tensor};

fn operators() -> OperatorString {
    let mut ops = OperatorString::new();
    ops.deexcitation(Space::Active, Space::Active);
    for _ in 0..3 {
        ops.excitation(Space::Active, Space::Active);
    }
    ops
}

fn equation(active: &Active) -> Equation {
    let target = vec![
        Index::new(Space::Closed, 100, false),
        Index::new(Space::Virtual, 101, false),
    ];
    let mut eq = Equation::new("residual");
    for term in active.terms() {
        let mut amplitude = target.clone();
        amplitude.extend_from_slice(term.indices());
        let tensors = vec![
            Tensor::new("proj", target.clone()),
            Tensor::new("t2", amplitude),
            Tensor::new(format!("Gamma{}", term.rank()), term.indices().to_vec()),
        ];
        let tensors = tensors.into_iter().collect::<Result<Vec<_>, _>>().unwrap();
        eq.push(
            Diagram::new(tensors)
                .with_target_index(target.clone())
                .with_factor(term.fac()),
        );
    }
    eq
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("wick");

    group.bench_function("reduce_8_operators", |b| {
        b.iter_batched(
            operators,
            |ops| Active::new(ops).unwrap(),
            criterion::BatchSize::SmallInput,
        )
    });

    let eq = equation(&Active::new(operators()).unwrap());
    group.bench_function("forest_and_tasks", |b| {
        b.iter(|| {
            Forest::new(&eq, "residual")
                .unwrap()
                .task_graph()
                .unwrap()
        })
    });
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
