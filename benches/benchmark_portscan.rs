use bannerscan::input::{PortRange, ScanOrder};
use bannerscan::port_strategy::PortStrategy;
use bannerscan::scanner::{Banner, ScanTarget, Scanner};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::time::Duration;

fn closed_range_scan(range: PortRange, batch_size: usize) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let scanner = Scanner::new(
        ScanTarget::new("127.0.0.1", range),
        batch_size,
        Duration::from_millis(100),
        Duration::from_millis(100),
        ScanOrder::Serial,
    );
    let _ = runtime.block_on(scanner.run());
}

fn bench_port_strategy(c: &mut Criterion) {
    let range = PortRange::new(1, 65_535).unwrap();

    c.bench_function("serial order 65k ports", |b| {
        b.iter(|| {
            PortStrategy::pick(range, ScanOrder::Serial)
                .ordered_iter()
                .count()
        });
    });
    c.bench_function("random order 65k ports", |b| {
        b.iter(|| {
            PortStrategy::pick(range, ScanOrder::Random)
                .ordered_iter()
                .count()
        });
    });
}

fn bench_banner(c: &mut Criterion) {
    let raw = format!("  HTTP/1.0 200 OK\r\nServer: {}\r\n\r\n", "x".repeat(900));

    c.bench_function("banner decode 1k", |b| {
        b.iter(|| Banner::from_bytes(black_box(raw.as_bytes())));
    });
}

fn bench_loopback_scan(c: &mut Criterion) {
    let range = PortRange::new(1, 1_000).unwrap();

    let mut group = c.benchmark_group("loopback scan 1-1000");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(10);
    group.bench_function("batch 100", |b| {
        b.iter(|| closed_range_scan(black_box(range), 100));
    });
    group.bench_function("batch 500", |b| {
        b.iter(|| closed_range_scan(black_box(range), 500));
    });
    group.finish();
}

criterion_group!(benches, bench_port_strategy, bench_banner, bench_loopback_scan);
criterion_main!(benches);
