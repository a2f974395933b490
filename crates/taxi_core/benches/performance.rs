//! Performance benchmarks for taxi_core using Criterion.rs.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use taxi_core::bidding::{Bid, BidStamp};
use taxi_core::auction::resolve_round;
use taxi_core::ecs::{FareId, NodeId, TaxiId};
use taxi_core::grid::{CityGrid, GridDefinition};
use taxi_core::routing::{RouteCache, Router};
use taxi_core::runner::Simulation;
use taxi_core::scenario::SimConfig;
use taxi_core::traffic::{TrafficProfile, TrafficState};

fn bench_simulation_run(c: &mut Criterion) {
    let scenarios = vec![("small", 10, 20), ("medium", 50, 30), ("large", 200, 50)];

    let mut group = c.benchmark_group("simulation_run");
    group.sample_size(10);
    for (name, taxis, side) in scenarios {
        group.bench_with_input(BenchmarkId::from_parameter(name), &(taxis, side), |b, &(taxis, side)| {
            let grid = GridDefinition::manhattan(side, side, 1.0).expect("grid");
            b.iter(|| {
                let config = SimConfig::default()
                    .with_seed(42)
                    .with_taxi_count(taxis)
                    .with_max_ticks(240);
                let mut sim = Simulation::start(config, &grid).expect("start");
                sim.run().expect("run");
                black_box(sim.telemetry().completed_fares.len());
            });
        });
    }
    group.finish();
}

fn bench_routing(c: &mut Criterion) {
    let grid = CityGrid::from_definition(&GridDefinition::manhattan(50, 50, 1.0).expect("grid")).expect("grid");
    let traffic = TrafficState::new(&grid, SimConfig::default().traffic_settings(), TrafficProfile::flat());
    let far = NodeId(50 * 50 - 1);

    let mut group = c.benchmark_group("routing");
    group.bench_function("shortest_path_uncached", |b| {
        let router = Router::new(&grid, &traffic);
        b.iter(|| black_box(router.shortest_path(NodeId(0), far)));
    });
    group.bench_function("shortest_path_cached", |b| {
        let cache = RouteCache::new(1024);
        let router = Router::new(&grid, &traffic).with_cache(&cache);
        b.iter(|| black_box(router.shortest_path(NodeId(0), far)));
    });
    group.bench_function("shortest_path_tree", |b| {
        let router = Router::new(&grid, &traffic);
        b.iter(|| black_box(router.tree(NodeId(1275)).cost_to(far)));
    });
    group.finish();
}

fn bench_auction(c: &mut Criterion) {
    let bids: Vec<Bid> = (0..200_u32)
        .flat_map(|taxi| {
            (0..50_u64).map(move |fare| Bid {
                taxi: TaxiId(taxi),
                fare: FareId(fare),
                cost: f64::from((taxi * 7 + fare as u32 * 13) % 97),
                stamp: BidStamp {
                    tick: 1,
                    seq: taxi * 50 + fare as u32,
                },
            })
        })
        .collect();

    c.bench_function("resolve_round_200x50", |b| {
        b.iter(|| black_box(resolve_round(&bids)));
    });
}

criterion_group!(benches, bench_simulation_run, bench_routing, bench_auction);
criterion_main!(benches);
