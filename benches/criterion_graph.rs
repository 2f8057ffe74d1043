#![cfg(all(feature = "criterion-bench", feature = "memory-loader"))]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use futures::executor::block_on;
use rs_rbac::{
    AuthorizationServiceBuilder, EvaluationMode, MemoryRoleLoader, Permission, RoleGraph,
    RoleName, RoleSet, StaticIdentity, StaticIdentityProvider,
};
use std::hint::black_box;

fn role(value: &str) -> RoleName {
    RoleName::try_from(value).unwrap()
}

fn chain_set(depth: usize) -> (RoleSet, Permission) {
    let permission = Permission::try_from("invoice.read").unwrap();
    let mut set = RoleSet::new().grant(role("role_chain_0"), permission.clone());
    for i in 1..=depth {
        set = set.child_of(
            role(&format!("role_chain_{i}")),
            role(&format!("role_chain_{}", i - 1)),
        );
    }
    (set, permission)
}

fn fanout_set(role_count: usize) -> (RoleSet, Vec<String>, Permission) {
    let mut set = RoleSet::new();
    let mut names = Vec::with_capacity(role_count);
    for i in 0..role_count {
        let name = format!("role_{i}");
        let permission = Permission::try_from(format!("invoice_{i}.read").as_str()).unwrap();
        set = set.grant(role(&name), permission);
        names.push(name);
    }
    let required = Permission::try_from(format!("invoice_{}.read", role_count - 1).as_str()).unwrap();
    (set, names, required)
}

fn bench_graph_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_is_granted_depth");
    group.sample_size(30);
    group.throughput(Throughput::Elements(1));

    for depth in [1usize, 4, 16, 64] {
        let (set, permission) = chain_set(depth);
        let graph = RoleGraph::from_role_set(&set).unwrap();
        let leaf = format!("role_chain_{depth}");
        let id = BenchmarkId::from_parameter(depth);
        group.bench_with_input(id, &depth, |b, _| {
            b.iter(|| {
                let granted = graph.is_granted(&leaf, &permission).unwrap();
                black_box(granted);
            });
        });
    }

    group.finish();
}

fn bench_graph_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_apply");
    group.sample_size(30);

    for depth in [16usize, 128] {
        let (set, _) = chain_set(depth);
        let id = BenchmarkId::from_parameter(depth);
        group.bench_with_input(id, &depth, |b, _| {
            b.iter(|| {
                let graph = RoleGraph::from_role_set(&set).unwrap();
                black_box(graph.len());
            });
        });
    }

    group.finish();
}

fn bench_service(c: &mut Criterion) {
    let mut group = c.benchmark_group("service_is_granted");
    group.sample_size(30);
    group.throughput(Throughput::Elements(1));

    let (set, permission) = chain_set(8);
    let service = AuthorizationServiceBuilder::new(
        MemoryRoleLoader::with_roles(set.clone()),
        StaticIdentityProvider::signed_in(StaticIdentity::new(["role_chain_8"])),
    )
    .build();
    assert!(block_on(service.is_granted(&permission, None)).unwrap());
    group.bench_function("loaded_once", |b| {
        b.iter(|| {
            let granted = block_on(service.is_granted(&permission, None)).unwrap();
            black_box(granted);
        });
    });

    let service = AuthorizationServiceBuilder::new(
        MemoryRoleLoader::with_roles(set).partial(true),
        StaticIdentityProvider::signed_in(StaticIdentity::new(["role_chain_8"])),
    )
    .force_reload(true)
    .build();
    group.bench_function("force_reload_partial", |b| {
        b.iter(|| {
            let granted = block_on(service.is_granted(&permission, None)).unwrap();
            black_box(granted);
        });
    });

    group.finish();
}

fn bench_role_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("service_role_fanout");
    group.sample_size(30);
    group.throughput(Throughput::Elements(1));

    for role_count in [1usize, 8, 32, 128] {
        let (set, names, required) = fanout_set(role_count);
        for mode in [EvaluationMode::Lenient, EvaluationMode::Strict] {
            let service = AuthorizationServiceBuilder::new(
                MemoryRoleLoader::with_roles(set.clone()),
                StaticIdentityProvider::signed_in(StaticIdentity::new(names.clone())),
            )
            .mode(mode)
            .build();
            let id = BenchmarkId::new(format!("{mode:?}"), role_count);
            group.bench_with_input(id, &role_count, |b, _| {
                b.iter(|| {
                    let granted = block_on(service.is_granted(&required, None)).unwrap();
                    black_box(granted);
                });
            });
        }
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_graph_walk,
    bench_graph_apply,
    bench_service,
    bench_role_fanout
);
criterion_main!(benches);
