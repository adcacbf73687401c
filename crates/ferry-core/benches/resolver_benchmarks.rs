use criterion::{criterion_group, criterion_main, Criterion};
use ferry_catalog::{Catalog, CatalogEntry};
use ferry_core::{resolve, rewrite, RewriteOptions};
use ferry_schema::parse_manifest_str;
use std::fmt::Write as _;

fn large_catalog(n: usize) -> Catalog {
    let mut entries: Vec<CatalogEntry> = (0..n)
        .map(|i| CatalogEntry::image(&format!("proj_svc{i}-1"), "offline"))
        .collect();
    entries.push(CatalogEntry::image("postgres", "offline"));
    entries.push(CatalogEntry::image("redis", "offline"));
    Catalog::from_entries("offline", entries)
}

fn compose_with_services(n: usize) -> String {
    let mut out = String::from("services:\n");
    for i in 0..n {
        let _ = write!(
            out,
            "  svc{i}:\n    image: registry.example.com/team/svc{i}:1.0\n    volumes:\n      - ./data/svc{i}:/data\n"
        );
    }
    out
}

fn bench_resolve_prefixed(c: &mut Criterion) {
    let catalog = large_catalog(200);
    c.bench_function("resolve_prefixed_200img", |b| {
        b.iter(|| resolve("svc150", "registry.example.com/team/svc150:1.0", &catalog, Some("proj")));
    });
}

fn bench_resolve_fallthrough(c: &mut Criterion) {
    let catalog = large_catalog(200);
    c.bench_function("resolve_full_cascade_200img", |b| {
        b.iter(|| resolve("db", "postgres:15-alpine", &catalog, Some("proj")));
    });
}

fn bench_rewrite(c: &mut Criterion) {
    let catalog = large_catalog(50);
    let manifest = parse_manifest_str(&compose_with_services(50)).unwrap();
    let options = RewriteOptions::new("/offline_volumes").with_prefix(Some("proj".to_owned()));
    c.bench_function("rewrite_50svc", |b| {
        b.iter(|| rewrite(&manifest, &catalog, &options).unwrap());
    });
}

criterion_group!(
    benches,
    bench_resolve_prefixed,
    bench_resolve_fallthrough,
    bench_rewrite
);
criterion_main!(benches);
