//! Collaborators the storage engine queries but does not own.
//!
//! Road topology, the empire's trade-route quotas and the city's price list
//! belong to other subsystems. The engine sees them only through these
//! traits, bundled per call in [`Services`].

use crate::id::{TilePoint, TradeRouteId};
use crate::resource::Resource;
use crate::trade::TraderKind;

/// Map and road-network lookups.
pub trait RoadNetwork {
    /// A road tile touching the `size`x`size` footprint at `origin`, if any.
    fn road_access_near(&self, origin: TilePoint, size: i32) -> Option<TilePoint>;

    /// Where traders of `kind` enter and leave the map.
    fn exit_point(&self, kind: TraderKind) -> TilePoint;

    /// Routing distance between two tiles.
    fn distance(&self, from: TilePoint, to: TilePoint) -> i32 {
        from.chebyshev(to)
    }
}

/// Per-route, per-resource trade quotas kept by the empire.
pub trait TradeRoutes {
    /// The route's city sells `resource` to us (our traders import it).
    fn sells_to_city(&self, route: TradeRouteId, resource: Resource) -> bool;

    /// The route's city buys `resource` from us.
    fn buys_from_city(&self, route: TradeRouteId, resource: Resource) -> bool;

    /// Units of `resource` tradeable on the route per year.
    fn limit(&self, route: TradeRouteId, resource: Resource) -> u32;

    /// Units of `resource` already traded on the route this year.
    fn traded(&self, route: TradeRouteId, resource: Resource) -> u32;

    fn increase_traded(&mut self, route: TradeRouteId, resource: Resource, amount: u32);

    /// Units a trader of `kind` carries per trip, after monument bonuses.
    fn units_per_trip(&self, kind: TraderKind) -> u32;

    fn remaining(&self, route: TradeRouteId, resource: Resource) -> u32 {
        self.limit(route, resource)
            .saturating_sub(self.traded(route, resource))
    }
}

/// City-wide economy queries.
pub trait CityEconomy {
    /// What the city pays a trader for one unit.
    fn import_price(&self, resource: Resource) -> u32;

    /// What a trader pays the city for one unit.
    fn export_price(&self, resource: Resource) -> u32;

    /// Whether the resource may be produced/obtained this scenario; blessing
    /// only hands out available foods.
    fn is_food_available(&self, resource: Resource) -> bool;

    /// Stockpiled resources are held back from trade and delivery.
    fn is_stockpiled(&self, resource: Resource) -> bool;
}

/// The collaborators one tick (or one ledger call) works against.
pub struct Services<'a> {
    pub roads: &'a dyn RoadNetwork,
    pub routes: &'a mut dyn TradeRoutes,
    pub economy: &'a dyn CityEconomy,
}

impl<'a> Services<'a> {
    pub fn new(
        roads: &'a dyn RoadNetwork,
        routes: &'a mut dyn TradeRoutes,
        economy: &'a dyn CityEconomy,
    ) -> Self {
        Self {
            roads,
            routes,
            economy,
        }
    }
}
