// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::hint::black_box;

use msbuild_expander::*;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn lookup_with_items(count: usize) -> Lookup {
    let mut scope = Scope::new()
        .with_property("Configuration", "Release")
        .with_property("OutDir", "bin/$(Configuration)/")
        .with_property("Version", "1.2.3.4");
    for i in 0..count {
        scope.add_item(
            Item::new("Compile", &format!("src/file{i}.cs"))
                .with_metadata("Link", &format!("linked/file{i}.cs"))
                .with_metadata("Culture", if i % 2 == 0 { "en" } else { "fr" }),
        );
    }
    Lookup::from_scope(scope)
}

fn expand(expander: &Expander, lookup: &Lookup, text: &str) {
    let result = expander
        .expand(black_box(text), ExpanderOptions::EXPAND_ALL, lookup)
        .unwrap();
    black_box(result);
}

fn property_expansion(c: &mut Criterion) {
    let expander = Expander::new();
    let lookup = lookup_with_items(0);

    c.bench_function("literal text", |b| {
        b.iter(|| expand(&expander, &lookup, "no references in this text"))
    });

    c.bench_function("simple properties", |b| {
        b.iter(|| expand(&expander, &lookup, "$(OutDir)app-$(Configuration).dll"))
    });

    c.bench_function("property function chain", |b| {
        b.iter(|| {
            expand(
                &expander,
                &lookup,
                "$(Configuration.ToLowerInvariant().Substring(1).Replace('e', 'E').Length)",
            )
        })
    });
}

fn static_functions(c: &mut Criterion) {
    let expander = Expander::new();
    let lookup = lookup_with_items(0);

    c.bench_function("intrinsic arithmetic", |b| {
        b.iter(|| expand(&expander, &lookup, "$([MSBuild]::Add($([MSBuild]::Multiply(6, 7)), 1))"))
    });

    c.bench_function("version comparison", |b| {
        b.iter(|| expand(&expander, &lookup, "$([MSBuild]::VersionGreaterThan($(Version), '1.2.3'))"))
    });

    c.bench_function("path functions", |b| {
        b.iter(|| {
            expand(
                &expander,
                &lookup,
                "$([System.IO.Path]::Combine('a', 'b', $([System.IO.Path]::GetFileName('x/y.txt'))))",
            )
        })
    });
}

fn item_transforms(c: &mut Criterion) {
    let expander = Expander::new();

    let mut group = c.benchmark_group("item transforms");
    for size in [8, 64, 512].iter() {
        let lookup = lookup_with_items(*size);

        group.bench_with_input(BenchmarkId::new("pattern", size), size, |b, _| {
            b.iter(|| expand(&expander, &lookup, "@(Compile->'%(Filename).obj')"))
        });

        group.bench_with_input(BenchmarkId::new("functions", size), size, |b, _| {
            b.iter(|| {
                expand(
                    &expander,
                    &lookup,
                    "@(Compile->WithMetadataValue('Culture', 'fr')->Metadata('Link')->Distinct(), ' ')",
                )
            })
        });
    }
    group.finish();
}

criterion_group!(benches, property_expansion, static_functions, item_transforms);
criterion_main!(benches);
