//! Shared test helpers for unit tests, integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use std::collections::{HashMap, HashSet};

use crate::building::{BuildingSite, StorageKind};
use crate::city::City;
use crate::config::StorageConfig;
use crate::context::{CityEconomy, RoadNetwork, Services, TradeRoutes};
use crate::id::{BuildingId, TilePoint, TradeRouteId, TraderId};
use crate::resource::Resource;
use crate::storage::StorageState;
use crate::trade::TraderKind;

// ===========================================================================
// City builders
// ===========================================================================

pub fn site(x: i32, y: i32) -> BuildingSite {
    BuildingSite::new(TilePoint::new(x, y))
}

/// Default config with both building kinds holding `capacity` units.
pub fn city_with_capacity(capacity: u32) -> City {
    City::new(StorageConfig {
        granary_capacity: capacity,
        warehouse_capacity: capacity,
        ..StorageConfig::default()
    })
}

pub fn add_granary(city: &mut City, x: i32, y: i32) -> BuildingId {
    city.add_storage_building(StorageKind::Granary, site(x, y))
}

pub fn add_warehouse(city: &mut City, x: i32, y: i32) -> BuildingId {
    city.add_storage_building(StorageKind::Warehouse, site(x, y))
}

/// Overwrite a stock level, bypassing policy, and fix up free space.
pub fn set_stock(city: &mut City, id: BuildingId, resource: Resource, amount: u32) {
    city.update_building(id, |b| {
        b.resources.set(resource, amount);
        b.recompute_free_space();
    })
    .expect("set_stock: unknown building");
}

pub fn set_state(city: &mut City, id: BuildingId, resource: Resource, state: StorageState) {
    let sid = city.building(id).expect("set_state: unknown building").storage_id;
    let record = city.storages.get_mut(sid).expect("set_state: no record");
    record.resource_state[resource.index()].state = state;
}

/// Set the worker count to `percent` of the building's laborers.
pub fn set_staffing(city: &mut City, id: BuildingId, percent: u32) {
    city.update_building(id, |b| b.num_workers = b.laborers * percent / 100)
        .expect("set_staffing: unknown building");
}

pub const TEST_ROUTE: TradeRouteId = TradeRouteId(1);

/// A caravan on [`TEST_ROUTE`].
pub fn add_caravan(city: &mut City, world: &TestWorld, position: TilePoint) -> TraderId {
    city.add_trader(TraderKind::Caravan, Some(TEST_ROUTE), position, &world.routes)
}

// ===========================================================================
// In-memory collaborators
// ===========================================================================

/// Every tile is on a road; distance is Chebyshev.
#[derive(Debug, Clone)]
pub struct TestRoads {
    pub land_exit: TilePoint,
    pub sea_exit: TilePoint,
}

impl RoadNetwork for TestRoads {
    fn road_access_near(&self, origin: TilePoint, _size: i32) -> Option<TilePoint> {
        Some(origin)
    }

    fn exit_point(&self, kind: TraderKind) -> TilePoint {
        match kind {
            TraderKind::Ship => self.sea_exit,
            TraderKind::Caravan | TraderKind::Native => self.land_exit,
        }
    }
}

type RouteKey = (TradeRouteId, Resource);

/// [`TEST_ROUTE`] sells oil to the city and buys wheat, 20 units each.
#[derive(Debug, Clone)]
pub struct TestRoutes {
    pub sells: HashSet<RouteKey>,
    pub buys: HashSet<RouteKey>,
    pub limits: HashMap<RouteKey, u32>,
    pub traded: HashMap<RouteKey, u32>,
    pub units_per_trip: u32,
}

impl TestRoutes {
    pub fn new() -> Self {
        let mut routes = Self {
            sells: HashSet::new(),
            buys: HashSet::new(),
            limits: HashMap::new(),
            traded: HashMap::new(),
            units_per_trip: 12,
        };
        routes.sell(TEST_ROUTE, Resource::Oil, 20);
        routes.buy(TEST_ROUTE, Resource::Wheat, 20);
        routes
    }

    pub fn sell(&mut self, route: TradeRouteId, resource: Resource, limit: u32) {
        self.sells.insert((route, resource));
        self.limits.insert((route, resource), limit);
    }

    pub fn buy(&mut self, route: TradeRouteId, resource: Resource, limit: u32) {
        self.buys.insert((route, resource));
        self.limits.insert((route, resource), limit);
    }
}

impl Default for TestRoutes {
    fn default() -> Self {
        Self::new()
    }
}

impl TradeRoutes for TestRoutes {
    fn sells_to_city(&self, route: TradeRouteId, resource: Resource) -> bool {
        self.sells.contains(&(route, resource))
    }

    fn buys_from_city(&self, route: TradeRouteId, resource: Resource) -> bool {
        self.buys.contains(&(route, resource))
    }

    fn limit(&self, route: TradeRouteId, resource: Resource) -> u32 {
        self.limits.get(&(route, resource)).copied().unwrap_or(0)
    }

    fn traded(&self, route: TradeRouteId, resource: Resource) -> u32 {
        self.traded.get(&(route, resource)).copied().unwrap_or(0)
    }

    fn increase_traded(&mut self, route: TradeRouteId, resource: Resource, amount: u32) {
        *self.traded.entry((route, resource)).or_default() += amount;
    }

    fn units_per_trip(&self, _kind: TraderKind) -> u32 {
        self.units_per_trip
    }
}

/// Flat prices of 100; every food available unless listed in
/// `unavailable`.
#[derive(Debug, Clone, Default)]
pub struct TestEconomy {
    pub prices: HashMap<Resource, u32>,
    pub stockpiled: HashSet<Resource>,
    pub unavailable: HashSet<Resource>,
}

impl CityEconomy for TestEconomy {
    fn import_price(&self, resource: Resource) -> u32 {
        self.prices.get(&resource).copied().unwrap_or(100)
    }

    fn export_price(&self, resource: Resource) -> u32 {
        self.prices.get(&resource).copied().unwrap_or(100)
    }

    fn is_food_available(&self, resource: Resource) -> bool {
        resource.is_food() && !self.unavailable.contains(&resource)
    }

    fn is_stockpiled(&self, resource: Resource) -> bool {
        self.stockpiled.contains(&resource)
    }
}

/// The three collaborators a tick runs against.
#[derive(Debug, Clone)]
pub struct TestWorld {
    pub roads: TestRoads,
    pub routes: TestRoutes,
    pub economy: TestEconomy,
}

impl TestWorld {
    pub fn new() -> Self {
        Self {
            roads: TestRoads {
                land_exit: TilePoint::new(0, 0),
                sea_exit: TilePoint::new(0, 40),
            },
            routes: TestRoutes::new(),
            economy: TestEconomy::default(),
        }
    }

    pub fn services(&mut self) -> Services<'_> {
        Services::new(&self.roads, &mut self.routes, &self.economy)
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}
