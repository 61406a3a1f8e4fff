//! Benchmarks for the analysis pipeline.
//!
//! These benchmarks measure:
//! - Graph construction from pre-extracted facts at several repository sizes
//! - Changed-path mapping over a built graph
//! - Impact computation for a batch of changed functions
//! - Fact extraction from raw Python sources

// Benchmark code - performance of the benchmark setup is not critical
#![allow(missing_docs)]
#![allow(clippy::format_push_string)]

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use ripple::{
    DependencyGraph, FactSheet, ImpactConfig, NodeId, RepositoryId, build_graph, compute_impact,
    extract_repository, link_cross_repository, map_changed_files,
};

/// Facts for `modules` files, each calling into its neighbor.
fn generate_facts(modules: usize, functions_per_module: usize) -> Vec<FactSheet> {
    (0..modules)
        .map(|m| {
            let mut sheet = FactSheet::new(format!("pkg/module{m}.py"))
                .with_class(format!("Model{m}"))
                .with_import("logging");
            for f in 0..functions_per_module {
                let name = format!("m{m}_func{f}");
                sheet = sheet.with_function(name.clone());
                let next = (m + 1) % modules;
                sheet = sheet
                    .with_call(name.clone(), format!("m{next}_func{f}"))
                    .with_call(name, "logging.info");
            }
            sheet
        })
        .collect()
}

fn generate_python_module(index: usize, functions: usize) -> String {
    let mut code = String::from("import logging\nfrom pkg import helpers\n\n");
    code.push_str(&format!("class Model{index}:\n    id = Column(Integer)\n\n"));
    for f in 0..functions {
        code.push_str(&format!(
            "def handler{f}(request):\n    helpers.validate(request)\n    return process{f}(request)\n\n"
        ));
    }
    code
}

fn repository() -> RepositoryId {
    RepositoryId::new("svc").expect("valid repository id")
}

fn built_graph(modules: usize) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    build_graph(&mut graph, &repository(), &generate_facts(modules, 10));
    graph
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_graph");
    for modules in [10, 100, 500] {
        let facts = generate_facts(modules, 10);
        group.throughput(Throughput::Elements(modules as u64));
        group.bench_with_input(BenchmarkId::from_parameter(modules), &facts, |b, facts| {
            b.iter(|| {
                let mut graph = DependencyGraph::new();
                build_graph(&mut graph, &repository(), black_box(facts));
                link_cross_repository(&mut graph);
                graph
            });
        });
    }
    group.finish();
}

fn bench_map(c: &mut Criterion) {
    let graph = built_graph(500);
    let changed: Vec<String> = (0..50).map(|m| format!("pkg/module{m}.py")).collect();

    c.bench_function("map_changed_files/50_of_500", |b| {
        b.iter(|| map_changed_files(&graph, None, black_box(&changed)));
    });
}

fn bench_impact(c: &mut Criterion) {
    let graph = built_graph(500);
    let repository = repository();
    let changed: Vec<NodeId> = (0..50)
        .map(|m| NodeId::function(&repository, format!("pkg/module{m}.py"), format!("m{m}_func0")))
        .collect();
    let config = ImpactConfig::default();

    c.bench_function("compute_impact/50_functions", |b| {
        b.iter(|| compute_impact(&graph, black_box(&changed), &[], &config));
    });
}

fn bench_extract(c: &mut Criterion) {
    let files: Vec<(String, String)> = (0..100)
        .map(|i| (format!("pkg/module{i}.py"), generate_python_module(i, 20)))
        .collect();

    c.bench_function("extract_repository/100_python_files", |b| {
        b.iter(|| extract_repository(black_box(&files)));
    });
}

criterion_group!(benches, bench_build, bench_map, bench_impact, bench_extract);
criterion_main!(benches);
