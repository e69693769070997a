use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use memory_scan::memory::{
    locate_first, InMemoryProcess, Memory, ProtectionFlags, ScanOptions, SigScanner, Signature,
};
use memory_scan::Address;

const HAYSTACK: usize = 4 * 1024 * 1024;

fn haystack() -> Vec<u8> {
    let mut data: Vec<u8> = (0..HAYSTACK).map(|i| (i % 251) as u8 | 1).collect();
    data[HAYSTACK - 64..HAYSTACK - 60].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
    data
}

fn benchmark_matchers(c: &mut Criterion) {
    let data = haystack();
    let exact: Signature = "DE AD BE EF".parse().unwrap();
    let masked: Signature = "DE ?? BE EF".parse().unwrap();

    let mut group = c.benchmark_group("matcher");
    group.throughput(Throughput::Bytes(HAYSTACK as u64));
    group.bench_function("locate_first", |b| {
        b.iter(|| locate_first(black_box(&data), black_box(exact.bytes())));
    });
    group.bench_function("masked_find_first", |b| {
        b.iter(|| masked.find_first(black_box(&data)));
    });
    group.finish();
}

fn benchmark_scanner(c: &mut Criterion) {
    let process = InMemoryProcess::new(1)
        .with_region(Address::new(0x10_0000), haystack(), ProtectionFlags::read_write())
        .unwrap();
    let mut memory = Memory::new();
    memory.attach(Box::new(process));
    let signature: Signature = "DE ?? BE EF".parse().unwrap();

    let mut group = c.benchmark_group("sig_scanner");
    group.throughput(Throughput::Bytes(HAYSTACK as u64));
    for chunk in [64 * 1024, 1024 * 1024, 16 * 1024 * 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &chunk, |b, &chunk| {
            let options = ScanOptions {
                max_read_size: chunk,
                ..ScanOptions::default()
            };
            let mut scanner = SigScanner::new(&memory, options).unwrap();
            b.iter(|| scanner.scan_signature(black_box(&signature)));
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_matchers, benchmark_scanner);
criterion_main!(benches);
