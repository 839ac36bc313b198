// Copyright (C) 2025 gitodb Contributors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Object database performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gitodb::{HashAlgorithm, ObjectDatabase, ObjectKind};
use tempfile::TempDir;

fn generate_test_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

fn setup_odb() -> (ObjectDatabase, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let odb =
        ObjectDatabase::open(temp_dir.path().join("objects"), HashAlgorithm::Sha1).unwrap();
    (odb, temp_dir)
}

fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("odb_write");

    for size in [1024usize, 100 * 1024, 1024 * 1024].iter() {
        group.bench_with_input(BenchmarkId::new("write", size), size, |b, &size| {
            let data = generate_test_data(size);
            let (odb, _temp) = setup_odb();
            let mut salt = 0u64;
            b.iter(|| {
                // Unique payloads so every iteration takes the write path.
                salt += 1;
                let mut payload = data.clone();
                payload.extend_from_slice(&salt.to_be_bytes());
                black_box(odb.write(ObjectKind::Blob, &payload).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("odb_read");

    for size in [1024usize, 100 * 1024, 1024 * 1024].iter() {
        group.bench_with_input(BenchmarkId::new("read_loose", size), size, |b, &size| {
            let data = generate_test_data(size);
            let (odb, _temp) = setup_odb();
            let oid = odb.write(ObjectKind::Blob, &data).unwrap();
            b.iter(|| black_box(odb.read_raw(&oid).unwrap()));
        });
    }

    group.finish();
}

fn bench_exists(c: &mut Criterion) {
    let mut group = c.benchmark_group("odb_exists");

    group.bench_function("exists_hit", |b| {
        let (odb, _temp) = setup_odb();
        let oid = odb.write(ObjectKind::Blob, b"present").unwrap();
        b.iter(|| black_box(odb.exists(&oid)));
    });

    group.bench_function("exists_miss", |b| {
        let (odb, _temp) = setup_odb();
        let oid = gitodb::Oid::hash(HashAlgorithm::Sha1, b"absent");
        b.iter(|| black_box(odb.exists(&oid)));
    });

    group.finish();
}

criterion_group!(benches, bench_write, bench_read, bench_exists);
criterion_main!(benches);
