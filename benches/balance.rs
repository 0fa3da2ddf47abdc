//! Benchmarks for hostpool host selection.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use hostpool::balance::{LoadDistributor, RouteHint};
use hostpool::config::PatternKind;
use hostpool::hosts::{Host, HostList, HostStatus};
use std::sync::Arc;

fn active_list(num_hosts: usize) -> Arc<HostList> {
    let list = HostList::new("bench");
    for i in 0..num_hosts {
        let host = Arc::new(Host::new(format!("host-{i}"), "127.0.0.1", 9000 + i as u16));
        host.set_status(HostStatus::Active);
        list.add_host(host);
    }
    list.republish_active();
    Arc::new(list)
}

fn benchmark_round_robin(c: &mut Criterion) {
    let distributor = LoadDistributor::from_kind(PatternKind::RoundRobin, active_list(10));
    let hint = RouteHint::none();

    c.bench_function("round_robin_select", |b| {
        b.iter(|| {
            black_box(distributor.pick(&hint).ok());
        })
    });
}

fn benchmark_random(c: &mut Criterion) {
    let distributor = LoadDistributor::from_kind(PatternKind::Random, active_list(10));
    let hint = RouteHint::none();

    c.bench_function("random_select", |b| {
        b.iter(|| {
            black_box(distributor.pick(&hint).ok());
        })
    });
}

fn benchmark_hashed(c: &mut Criterion) {
    let distributor = LoadDistributor::from_kind(PatternKind::Hashed, active_list(10));
    let hint = RouteHint::keyed("session-1234");

    c.bench_function("hashed_select", |b| {
        b.iter(|| {
            black_box(distributor.pick(&hint).ok());
        })
    });
}

fn benchmark_sticky(c: &mut Criterion) {
    let distributor = LoadDistributor::from_kind(PatternKind::RoundRobin, active_list(10));
    let hint = RouteHint::to_host("host-7");

    c.bench_function("sticky_select", |b| {
        b.iter(|| {
            black_box(distributor.pick(&hint).ok());
        })
    });
}

fn benchmark_selection_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("round_robin_scaling");
    for num_hosts in [2usize, 10, 100] {
        let distributor = LoadDistributor::from_kind(PatternKind::RoundRobin, active_list(num_hosts));
        let hint = RouteHint::none();
        group.throughput(Throughput::Elements(1));
        group.bench_function(format!("{num_hosts}_hosts"), |b| {
            b.iter(|| {
                black_box(distributor.pick(&hint).ok());
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_round_robin,
    benchmark_random,
    benchmark_hashed,
    benchmark_sticky,
    benchmark_selection_scaling
);
criterion_main!(benches);
