#![allow(
    clippy::unwrap_used,
    clippy::default_numeric_fallback,
    reason = "benchmark"
)]

use {
    criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main},
    eph_sdk::crypto::{ChunkCipher, SessionKey},
};

fn criterion_benchmark(c: &mut Criterion) {
    let key = SessionKey::generate().unwrap();
    let cipher = ChunkCipher::new(&key);

    let mut group = c.benchmark_group("encrypt_chunk");
    for size in [1024, 1024 * 1024, 16 * 1024 * 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || (0..size).map(|_| rand::random::<u8>()).collect::<Vec<u8>>(),
                |input| cipher.encrypt_chunk(&input).unwrap(),
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();

    let ciphertext = cipher.encrypt_chunk(&vec![0; 1024 * 1024]).unwrap();
    c.bench_function("decrypt_chunk/1048576", |b| {
        b.iter(|| cipher.decrypt_chunk(&ciphertext).unwrap());
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
