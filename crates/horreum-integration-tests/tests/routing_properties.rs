//! Property tests for trade routing against loaded price and route tables.

use horreum_core::building::{BuildingSite, StorageKind};
use horreum_core::city::City;
use horreum_core::command_queue::StorageCommand;
use horreum_core::config::StorageConfig;
use horreum_core::context::Services;
use horreum_core::id::{BuildingId, TilePoint, TradeRouteId};
use horreum_core::resource::Resource;
use horreum_core::storage::Permission;
use horreum_core::test_utils::{TestRoads, set_stock};
use horreum_core::trade::{TradeDecision, TraderKind};
use horreum_data::tables::{PriceEntry, PriceTable, RouteQuotas, RouteTable, TripCapacity};
use proptest::prelude::*;

const ROUTE: TradeRouteId = TradeRouteId(7);

#[derive(Debug, Clone)]
struct Depot {
    wheat: u32,
    oil: u32,
    denies_traders: bool,
    plagued: bool,
}

fn arb_depot() -> impl Strategy<Value = Depot> {
    (0..20u32, 0..20u32, any::<bool>(), prop::bool::weighted(0.2)).prop_map(
        |(wheat, oil, denies_traders, plagued)| Depot {
            wheat,
            oil,
            denies_traders,
            plagued,
        },
    )
}

fn arb_prices() -> impl Strategy<Value = PriceTable> {
    (1..500u32, 1..500u32, 1..500u32, 1..500u32).prop_map(|(wi, we, oi, oe)| {
        let mut prices = PriceTable::new();
        for (resource, import, export) in [(Resource::Wheat, wi, we), (Resource::Oil, oi, oe)] {
            prices.insert(
                resource,
                PriceEntry {
                    import,
                    export,
                    stockpiled: false,
                    available: true,
                },
            );
        }
        prices
    })
}

fn route_table() -> RouteTable {
    let mut quotas = RouteQuotas::default();
    quotas.sells.insert(Resource::Oil, 40);
    quotas.buys.insert(Resource::Wheat, 40);
    let mut table = RouteTable::new(TripCapacity::default());
    table.insert(ROUTE, quotas);
    table
}

fn build(
    depots: &[Depot],
    routes: &mut RouteTable,
    prices: &PriceTable,
    roads: &TestRoads,
) -> (City, Vec<BuildingId>) {
    let mut city = City::new(StorageConfig::default());
    let mut ids = Vec::new();
    for (i, depot) in depots.iter().enumerate() {
        let id = city.add_storage_building(
            StorageKind::Warehouse,
            BuildingSite::new(TilePoint::new(4 + 5 * i as i32, 3)),
        );
        set_stock(&mut city, id, Resource::Wheat, depot.wheat);
        set_stock(&mut city, id, Resource::Oil, depot.oil.min(32 - depot.wheat));
        if depot.denies_traders {
            let storage = city.building(id).unwrap().storage_id;
            city.queue_command(StorageCommand::TogglePermission {
                storage,
                permission: Permission::Traders,
            });
        }
        if depot.plagued {
            city.update_building(id, |b| b.has_plague = true).unwrap();
        }
        ids.push(id);
    }
    // Apply the permission edits before any trader exists.
    city.step(&mut Services::new(roads, routes, prices));
    (city, ids)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A trader is only ever sent to a building it may enter, and leaves
    /// when there is none.
    #[test]
    fn routing_respects_access(
        depots in proptest::collection::vec(arb_depot(), 1..6),
        prices in arb_prices(),
    ) {
        let roads = TestRoads { land_exit: TilePoint::new(0, 0), sea_exit: TilePoint::new(0, 50) };
        let mut routes = route_table();
        let (mut city, ids) = build(&depots, &mut routes, &prices, &roads);
        let trader = city.add_trader(TraderKind::Caravan, Some(ROUTE), TilePoint::new(0, 0), &routes);

        let decision = city.find_trade_destination(trader, &roads, &routes, &prices).unwrap();
        let reachable = depots.iter().any(|d| !d.denies_traders && !d.plagued);
        match decision {
            TradeDecision::Visit { building, score, .. } => {
                let index = ids.iter().position(|&id| id == building).unwrap();
                prop_assert!(!depots[index].denies_traders);
                prop_assert!(!depots[index].plagued);
                prop_assert!(score > 0);
            }
            TradeDecision::Leave { exit } => {
                prop_assert_eq!(exit, roads.land_exit);
                // Nothing to sell into or buy from at any open depot.
                if reachable {
                    for (depot, &id) in depots.iter().zip(&ids) {
                        if depot.denies_traders || depot.plagued {
                            continue;
                        }
                        let view = city.view(id).unwrap();
                        prop_assert_eq!(view.amount(Resource::Wheat), 0);
                        prop_assert_eq!(view.receptible_space(Resource::Oil), 0);
                    }
                }
            }
        }
    }
}
