//! Benchmarks for pattern resolution and remote path handling.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ssh_copy::planner::plan;
use ssh_copy::resolve::{normalize_remote_path, resolve_sources};
use std::fs;
use tempfile::TempDir;

/// Build a tree of `dirs` folders with `files_per_dir` files each
fn build_tree(dirs: usize, files_per_dir: usize) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for d in 0..dirs {
        let dir = temp_dir.path().join(format!("module{}/src", d));
        fs::create_dir_all(&dir).unwrap();
        for f in 0..files_per_dir {
            let ext = if f % 4 == 0 { "map" } else { "js" };
            fs::write(dir.join(format!("file{}.{}", f, ext)), b"x").unwrap();
        }
    }
    temp_dir
}

/// Benchmark resolution with different pattern sets
fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    let tree = build_tree(20, 50);

    let pattern_sets: Vec<(&str, Vec<&str>)> = vec![
        ("match_all", vec!["**"]),
        ("basename", vec!["*.js"]),
        ("with_exclude", vec!["**/*.js", "**/*.map", "!module1*/**"]),
    ];

    for (name, patterns) in pattern_sets {
        group.bench_with_input(BenchmarkId::new("resolve_sources", name), &patterns, |b, patterns| {
            b.iter(|| resolve_sources(black_box(tree.path()), black_box(patterns.as_slice()), false).unwrap());
        });
    }

    group.finish();
}

/// Benchmark remote path normalization
fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize_remote_path");

    let paths = vec![
        ("simple", "/srv/app/index.html"),
        ("relative", "releases/current/app.js"),
        ("dots", "/srv/app/./a/../b/./c/../../d.txt"),
        ("windows", r"C:\inetpub\wwwroot\site\default.aspx"),
    ];

    for (name, path) in paths {
        group.bench_with_input(BenchmarkId::new("normalize", name), path, |b, path| {
            b.iter(|| normalize_remote_path(black_box(path)));
        });
    }

    group.finish();
}

/// Benchmark directory planning for a large batch
fn bench_plan(c: &mut Criterion) {
    let targets: Vec<String> = (0..5000)
        .map(|i| format!("/srv/app/module{}/src/file{}.js", i % 40, i))
        .collect();

    c.bench_function("plan_5000_targets", |b| {
        b.iter(|| plan(black_box(targets.as_slice())));
    });
}

criterion_group!(benches, bench_resolve, bench_normalize, bench_plan);
criterion_main!(benches);
