//! Criterion benchmarks for the storage engine.
//!
//! Four benchmark groups:
//! - `trade_routing`: score and pick a destination among 400 buildings
//! - `tick`: a full step of a 400-building city with 20 traders
//! - `bulk_transfer`: city-wide add/remove across every granary
//! - `storage_buffer`: encode and decode the save-game buffer

use criterion::{Criterion, criterion_group, criterion_main};
use horreum_core::city::City;
use horreum_core::codec::decode_storages;
use horreum_core::id::{TilePoint, TraderId};
use horreum_core::resource::Resource;
use horreum_core::storage::StorageState;
use horreum_core::test_utils::*;

// ===========================================================================
// City builders
// ===========================================================================

/// A 20x20 grid of storage buildings, alternating granaries and
/// warehouses, with varied stock and a few getting policies.
fn build_city(side: i32) -> City {
    let mut city = city_with_capacity(32);
    for y in 0..side {
        for x in 0..side {
            let (px, py) = (x * 4, y * 4);
            if (x + y) % 2 == 0 {
                let id = add_granary(&mut city, px, py);
                let food = Resource::FOODS[(x as usize) % Resource::FOODS.len()];
                set_stock(&mut city, id, food, ((x * 7 + y) % 24) as u32);
                if x % 5 == 0 {
                    set_state(&mut city, id, food, StorageState::Getting);
                }
            } else {
                let id = add_warehouse(&mut city, px, py);
                set_stock(&mut city, id, Resource::Wheat, ((x + y * 3) % 20) as u32);
                set_stock(&mut city, id, Resource::Oil, ((x * y) % 12) as u32);
            }
        }
    }
    city
}

fn add_traders(city: &mut City, world: &TestWorld, count: i32) -> Vec<TraderId> {
    (0..count)
        .map(|i| add_caravan(city, world, TilePoint::new(i, 0)))
        .collect()
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_trade_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("trade_routing");
    group.sample_size(50);

    let mut city = build_city(20);
    let world = TestWorld::new();
    let trader = add_caravan(&mut city, &world, TilePoint::new(0, 0));

    group.bench_function("find_destination_400_buildings", |b| {
        b.iter(|| {
            city.find_trade_destination(trader, &world.roads, &world.routes, &world.economy)
        });
    });
    group.finish();
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    group.sample_size(30);

    let mut city = build_city(20);
    let mut world = TestWorld::new();
    add_traders(&mut city, &world, 20);
    for _ in 0..5 {
        city.step(&mut world.services());
    }

    group.bench_function("step_400_buildings_20_traders", |b| {
        b.iter(|| city.step(&mut world.services()));
    });
    group.finish();
}

fn bench_bulk_transfer(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk_transfer");
    group.sample_size(50);

    let mut city = build_city(20);
    group.bench_function("granaries_add_then_remove", |b| {
        b.iter(|| {
            let left = city.granaries_add_to_all(Resource::Fish, 500);
            city.granaries_remove_from_all(Resource::Fish, 500 - left)
        });
    });
    group.finish();
}

fn bench_storage_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("storage_buffer");
    group.sample_size(30);

    let city = build_city(20);
    let bytes = city.save_storages();

    group.bench_function("encode_400_records", |b| {
        b.iter(|| city.save_storages());
    });
    group.bench_function("decode_400_records", |b| {
        b.iter(|| decode_storages(&bytes));
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_trade_routing,
    bench_tick,
    bench_bulk_transfer,
    bench_storage_buffer,
);
criterion_main!(benches);
