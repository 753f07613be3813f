//! Planner/runner/inverter benchmarks: compilation cost and execution cost
//! as a specification's match chain and the backing fact graph grow.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use factgraph::fact::{new_fact, Predecessors};
use factgraph::inverter;
use factgraph::model::Model;
use factgraph::planner::compile::compile;
use factgraph::source::InMemoryGraph;
use factgraph::specification::builder::*;
use factgraph::specification::runner;
use tokio::runtime::Runtime;

fn chain_model(depth: usize) -> Model {
    let mut model = Model::new();
    for i in 0..depth {
        model = model.role(format!("Level{}", i + 1), "parent", format!("Level{i}"));
    }
    model
}

fn chain_spec(depth: usize) -> factgraph::specification::Specification {
    let mut builder = SpecificationBuilder::new().given("root", "Level0");
    let root = LabelRef::new("root");
    let mut prev = root;
    for i in 0..depth {
        let label = format!("l{}", i + 1);
        let fact_type = format!("Level{}", i + 1);
        builder = builder.matching(
            label.clone(),
            fact_type,
            vec![successor(vec![role("parent", format!("Level{i}"))], &prev)],
        );
        prev = LabelRef::new(label);
    }
    builder.project_fact(format!("l{depth}"))
}

fn chain_graph(depth: usize) -> (InMemoryGraph, factgraph::fact::FactReference) {
    let mut graph = InMemoryGraph::new();
    let root = new_fact("Level0", Default::default(), Default::default());
    let root_ref = graph.insert(root);
    let mut current_ref = root_ref.clone();
    for i in 0..depth {
        let mut preds = std::collections::BTreeMap::new();
        preds.insert("parent".to_string(), Predecessors::Single(current_ref.clone()));
        let fact = new_fact(format!("Level{}", i + 1), Default::default(), preds);
        current_ref = graph.insert(fact);
    }
    (graph, root_ref)
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("planner_compile");
    for depth in [1usize, 4, 8] {
        let model = chain_model(depth);
        let spec = chain_spec(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| compile(&model, &spec).unwrap());
        });
    }
    group.finish();
}

fn bench_runner_read(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("runner_read");
    for depth in [1usize, 4, 8] {
        let model = chain_model(depth);
        let spec = chain_spec(depth);
        let (graph, root_ref) = chain_graph(depth);

        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    let _ = runner::read(&graph, &model, &spec, &[("root".to_string(), root_ref.clone())]).await;
                })
            });
        });
    }
    group.finish();
}

fn bench_invert(c: &mut Criterion) {
    let mut group = c.benchmark_group("inverter_invert");
    for depth in [1usize, 4, 8] {
        let model = chain_model(depth);
        let spec = chain_spec(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| inverter::invert(&model, &spec));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_runner_read, bench_invert);
criterion_main!(benches);
