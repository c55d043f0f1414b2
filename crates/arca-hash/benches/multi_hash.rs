use std::io::Cursor;

use arca_hash::{process, HashStrategy};
use arca_types::{create_byte_ranges, HashAlgorithm};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const MIB: u64 = 1024 * 1024;

fn strategies(len: u64) -> Vec<HashStrategy> {
    let mut strategies = vec![
        HashStrategy::whole(HashAlgorithm::Md5),
        HashStrategy::whole(HashAlgorithm::Sha256),
        HashStrategy::whole(HashAlgorithm::TreeSha256),
    ];
    for range in create_byte_ranges(4 * MIB, len).expect("valid part size") {
        strategies.push(HashStrategy::range(HashAlgorithm::Sha256, range));
        strategies.push(HashStrategy::range(HashAlgorithm::TreeSha256, range));
    }
    strategies
}

fn bench_single_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_pass");
    for size in [4 * MIB, 32 * MIB] {
        let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        group.throughput(Throughput::Bytes(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| process(Cursor::new(data), strategies(size)).expect("hash pass"));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_single_pass);
criterion_main!(benches);
