//! In-memory price list and trade-route quotas.
//!
//! [`PriceTable`] answers the engine's [`CityEconomy`] queries and
//! [`RouteTable`] its [`TradeRoutes`] queries. Both are built by the loader
//! from data files, or by hand in tests.

use std::collections::BTreeMap;

use horreum_core::context::{CityEconomy, TradeRoutes};
use horreum_core::id::TradeRouteId;
use horreum_core::resource::Resource;
use horreum_core::trade::TraderKind;
use tracing::debug;

// ===========================================================================
// Prices
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceEntry {
    pub import: u32,
    pub export: u32,
    pub stockpiled: bool,
    pub available: bool,
}

/// Per-resource prices. Unlisted resources cost nothing and are
/// unavailable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceTable {
    entries: BTreeMap<Resource, PriceEntry>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, resource: Resource, entry: PriceEntry) -> Option<PriceEntry> {
        self.entries.insert(resource, entry)
    }

    pub fn get(&self, resource: Resource) -> Option<&PriceEntry> {
        self.entries.get(&resource)
    }

    /// Toggle the stockpile flag of a listed resource.
    pub fn set_stockpiled(&mut self, resource: Resource, stockpiled: bool) -> bool {
        match self.entries.get_mut(&resource) {
            Some(entry) => {
                entry.stockpiled = stockpiled;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CityEconomy for PriceTable {
    fn import_price(&self, resource: Resource) -> u32 {
        self.get(resource).map_or(0, |e| e.import)
    }

    fn export_price(&self, resource: Resource) -> u32 {
        self.get(resource).map_or(0, |e| e.export)
    }

    fn is_food_available(&self, resource: Resource) -> bool {
        resource.is_food() && self.get(resource).is_some_and(|e| e.available)
    }

    fn is_stockpiled(&self, resource: Resource) -> bool {
        self.get(resource).is_some_and(|e| e.stockpiled)
    }
}

// ===========================================================================
// Trade routes
// ===========================================================================

/// Units each kind of trader carries per trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripCapacity {
    pub caravan: u32,
    pub ship: u32,
    pub native: u32,
}

impl Default for TripCapacity {
    fn default() -> Self {
        Self {
            caravan: 8,
            ship: 12,
            native: 8,
        }
    }
}

/// Quotas and this year's traded counters of one route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteQuotas {
    pub sells: BTreeMap<Resource, u32>,
    pub buys: BTreeMap<Resource, u32>,
    pub traded: BTreeMap<Resource, u32>,
}

impl RouteQuotas {
    fn limit(&self, resource: Resource) -> u32 {
        self.sells
            .get(&resource)
            .or_else(|| self.buys.get(&resource))
            .copied()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: BTreeMap<TradeRouteId, RouteQuotas>,
    pub units_per_trip: TripCapacity,
}

impl RouteTable {
    pub fn new(units_per_trip: TripCapacity) -> Self {
        Self {
            routes: BTreeMap::new(),
            units_per_trip,
        }
    }

    pub fn insert(&mut self, id: TradeRouteId, quotas: RouteQuotas) -> Option<RouteQuotas> {
        self.routes.insert(id, quotas)
    }

    pub fn route(&self, id: TradeRouteId) -> Option<&RouteQuotas> {
        self.routes.get(&id)
    }

    pub fn route_ids(&self) -> impl Iterator<Item = TradeRouteId> + '_ {
        self.routes.keys().copied()
    }

    /// Start a new trading year: every traded counter back to zero.
    pub fn reset_year(&mut self) {
        for quotas in self.routes.values_mut() {
            quotas.traded.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl TradeRoutes for RouteTable {
    fn sells_to_city(&self, route: TradeRouteId, resource: Resource) -> bool {
        self.route(route).is_some_and(|q| q.sells.contains_key(&resource))
    }

    fn buys_from_city(&self, route: TradeRouteId, resource: Resource) -> bool {
        self.route(route).is_some_and(|q| q.buys.contains_key(&resource))
    }

    fn limit(&self, route: TradeRouteId, resource: Resource) -> u32 {
        self.route(route).map_or(0, |q| q.limit(resource))
    }

    fn traded(&self, route: TradeRouteId, resource: Resource) -> u32 {
        self.route(route)
            .and_then(|q| q.traded.get(&resource).copied())
            .unwrap_or(0)
    }

    fn increase_traded(&mut self, route: TradeRouteId, resource: Resource, amount: u32) {
        match self.routes.get_mut(&route) {
            Some(quotas) => *quotas.traded.entry(resource).or_default() += amount,
            None => debug!(route = route.0, ?resource, "trade on unknown route ignored"),
        }
    }

    fn units_per_trip(&self, kind: TraderKind) -> u32 {
        match kind {
            TraderKind::Caravan => self.units_per_trip.caravan,
            TraderKind::Ship => self.units_per_trip.ship,
            TraderKind::Native => self.units_per_trip.native,
        }
    }
}
