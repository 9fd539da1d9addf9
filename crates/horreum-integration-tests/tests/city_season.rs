//! A city season end to end: data files, ticks, traders, gods, Rome, and a
//! save/restore in the middle.

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use horreum_core::blessing::{CURSE_LOADS, CurseOutcome};
use horreum_core::building::{BuildingSite, StorageKind};
use horreum_core::city::City;
use horreum_core::context::{Services, TradeRoutes};
use horreum_core::event::{Event, EventKind};
use horreum_core::id::{BuildingId, TilePoint, TradeRouteId};
use horreum_core::migration::SAVE_VERSION_SPLIT_STATE;
use horreum_core::resource::Resource;
use horreum_core::storage::StorageState;
use horreum_core::test_utils::{TestRoads, set_state, set_stock};
use horreum_core::trade::TraderKind;
use horreum_core::validation::validate_city;
use horreum_data::{CityData, load_city_data};

// ===========================================================================
// Fixtures
// ===========================================================================

fn data_dir(suffix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "horreum_season_{suffix}_{}",
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("prices.ron"),
        r#"[
            (resource: "wheat", import: 28, export: 22),
            (resource: "fruit", import: 38, export: 30),
            (resource: "meat", import: 44, export: 36),
            (resource: "fish", import: 30, export: 25, available: false),
            (resource: "oil", import: 60, export: 45),
            (resource: "pottery", import: 40, export: 30),
        ]"#,
    )
    .unwrap();
    fs::write(
        dir.join("routes.ron"),
        r#"(
            units_per_trip: (caravan: 12, ship: 12, native: 8),
            routes: [
                (id: 1, sells: [("oil", 24)], buys: [("pottery", 16), ("wheat", 16)]),
            ],
        )"#,
    )
    .unwrap();
    fs::write(dir.join("storage.json"), r#"{ "donor_list_capacity": 16 }"#).unwrap();
    dir
}

fn load(suffix: &str) -> CityData {
    let dir = data_dir(suffix);
    let data = load_city_data(&dir).unwrap();
    let _ = fs::remove_dir_all(&dir);
    data
}

fn roads() -> TestRoads {
    TestRoads {
        land_exit: TilePoint::new(0, 0),
        sea_exit: TilePoint::new(0, 60),
    }
}

struct Town {
    city: City,
    granaries: Vec<BuildingId>,
    warehouses: Vec<BuildingId>,
}

fn build_town(data: &CityData) -> Town {
    let mut city = City::new(data.config.clone());
    let granaries: Vec<_> = (0..3)
        .map(|i| {
            city.add_storage_building(
                StorageKind::Granary,
                BuildingSite::new(TilePoint::new(i * 8, 4)),
            )
        })
        .collect();
    let warehouses: Vec<_> = (0..3)
        .map(|i| {
            city.add_storage_building(
                StorageKind::Warehouse,
                BuildingSite::new(TilePoint::new(i * 8, 16)),
            )
        })
        .collect();

    set_stock(&mut city, granaries[0], Resource::Wheat, 20);
    set_stock(&mut city, granaries[1], Resource::Meat, 6);
    set_state(&mut city, granaries[2], Resource::Wheat, StorageState::Getting);
    set_stock(&mut city, warehouses[0], Resource::Pottery, 10);
    set_stock(&mut city, warehouses[1], Resource::Wheat, 4);
    set_state(&mut city, warehouses[2], Resource::Oil, StorageState::NotAccepting);
    Town {
        city,
        granaries,
        warehouses,
    }
}

// ===========================================================================
// Test 1: a full season stays consistent
// ===========================================================================

#[test]
fn season_keeps_every_invariant() {
    let mut data = load("invariants");
    let mut town = build_town(&data);
    let roads = roads();
    let route = TradeRouteId(1);
    let trader = town.city.add_trader(
        TraderKind::Caravan,
        Some(route),
        TilePoint::new(0, 0),
        &data.routes,
    );

    let shipped = Rc::new(RefCell::new(0u32));
    let sink = Rc::clone(&shipped);
    town.city.on_event(
        EventKind::ShipmentDispatched,
        Box::new(move |event: &Event| {
            if let Event::ShipmentDispatched { amount, .. } = event {
                *sink.borrow_mut() += amount;
            }
        }),
    );

    for tick in 0..24 {
        let mut services = Services::new(&roads, &mut data.routes, &data.prices);
        match tick {
            2 => {
                let report = town.city.trader_arrived(trader, &mut services).unwrap();
                assert!(report.total_sold() + report.total_bought() > 0);
            }
            5 => {
                let blessed = town.city.bless_granaries(&data.prices);
                // Only wheat, fruit and meat are listed as available.
                assert!(matches!(blessed, Some((_, n)) if n > 0 && n <= 18));
            }
            8 => {
                assert_eq!(town.city.granaries_send_to_rome(Resource::Wheat, 10), 0);
            }
            11 => {
                let outcome = town.city.curse_storage(false);
                assert!(matches!(outcome, CurseOutcome::Removed { amount, .. } if amount <= CURSE_LOADS));
            }
            _ => {}
        }
        town.city.step(&mut services);
        let report = validate_city(&town.city);
        assert!(report.is_empty(), "tick {tick}: {report:?}");
    }

    assert_eq!(*shipped.borrow(), 10);
    let traded: u32 = [Resource::Oil, Resource::Pottery, Resource::Wheat]
        .into_iter()
        .map(|r| data.routes.traded(route, r))
        .sum();
    assert!(traded > 0);
    let fish: u32 = town
        .granaries
        .iter()
        .map(|&g| town.city.building(g).unwrap().stored(Resource::Fish))
        .sum();
    assert_eq!(fish, 0);
    assert_eq!(town.warehouses.len(), 3);
}

// ===========================================================================
// Test 2: save in the middle, continue both copies
// ===========================================================================

#[test]
fn restored_city_tracks_the_original() {
    let data = load("restore");
    let roads = roads();

    let mut original = build_town(&data).city;
    let mut routes_a = data.routes.clone();
    for _ in 0..4 {
        original.step(&mut Services::new(&roads, &mut routes_a, &data.prices));
    }

    let bytes = original.serialize().unwrap();
    let mut copy = City::deserialize(&bytes).unwrap();
    let mut routes_b = routes_a.clone();
    assert_eq!(copy.state_hash(), original.state_hash());

    for _ in 0..6 {
        original.granaries_add_to_all(Resource::Fruit, 3);
        copy.granaries_add_to_all(Resource::Fruit, 3);
        original.step(&mut Services::new(&roads, &mut routes_a, &data.prices));
        copy.step(&mut Services::new(&roads, &mut routes_b, &data.prices));
    }
    assert_eq!(copy.state_hash(), original.state_hash());
    assert_eq!(copy.storages(), original.storages());
}

// ===========================================================================
// Test 3: storage buffer survives a reload into a rebuilt town
// ===========================================================================

#[test]
fn storage_policies_reload_into_rebuilt_town() {
    let data = load("buffer");
    let town = build_town(&data);
    let buffer = town.city.save_storages();

    let mut rebuilt = City::new(data.config.clone());
    for &id in town.granaries.iter().chain(&town.warehouses) {
        let b = town.city.building(id).unwrap();
        let new_id = rebuilt.add_storage_building(b.kind, BuildingSite::new(b.origin));
        assert_eq!(new_id, id);
    }
    rebuilt
        .load_storages(&buffer, SAVE_VERSION_SPLIT_STATE)
        .unwrap();

    let getter = rebuilt.view(town.granaries[2]).unwrap();
    assert!(getter.is_getting(Resource::Wheat));
    let refuser = rebuilt.view(town.warehouses[2]).unwrap();
    assert_eq!(refuser.maximum_receptible_amount(Resource::Oil), 0);
    assert!(validate_city(&rebuilt).is_empty());
}
