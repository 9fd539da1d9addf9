//! Trade routing and scoring.
//!
//! Every trader waiting for a destination is scored against every storage
//! building it may visit. A candidate's worth is what the trader could sell
//! into it plus what it could buy out of it, each weighted by a price
//! multiplier, then decayed by a logarithmic distance score:
//!
//! ```text
//! total = (sell_score + buy_score) * distance_score / 100
//! ```
//!
//! The strictly greatest positive total wins. Candidates are visited
//! granaries first, then warehouses, each in ascending id order, so an
//! equal total never displaces the first one found. With no winner the
//! trader leaves the map.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::building::StorageKind;
use crate::city::City;
use crate::config::TradeTuning;
use crate::context::{CityEconomy, RoadNetwork, Services, TradeRoutes};
use crate::event::Event;
use crate::id::{BuildingId, TilePoint, TradeRouteId, TraderId};
use crate::ledger::StorageView;
use crate::resource::{RESOURCE_COUNT, Resource};
use crate::storage::{Permission, StorageError};

// ---------------------------------------------------------------------------
// Traders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraderKind {
    /// Land trader; leaves through the land exit.
    Caravan,
    /// Sea trader; leaves through the river/sea exit.
    Ship,
    /// Native trader; always returns home after one stop.
    Native,
}

impl TraderKind {
    /// Storage permission a building must grant this trader.
    pub fn permission(self) -> Permission {
        match self {
            TraderKind::Caravan => Permission::Traders,
            TraderKind::Ship => Permission::Dock,
            TraderKind::Native => Permission::Natives,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraderState {
    #[default]
    AwaitingDestination,
    Travelling {
        destination: BuildingId,
        tile: TilePoint,
    },
    Leaving {
        exit: TilePoint,
    },
}

impl TraderState {
    pub(crate) fn tag(&self) -> u8 {
        match self {
            TraderState::AwaitingDestination => 0,
            TraderState::Travelling { .. } => 1,
            TraderState::Leaving { .. } => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trader {
    pub kind: TraderKind,
    /// Empire route the trader works; `None` only for natives.
    pub route: Option<TradeRouteId>,
    pub position: TilePoint,
    /// Units the trader can still sell to the city this trip.
    pub sell_capacity: u32,
    /// Units the trader can still buy from the city this trip.
    pub buy_capacity: u32,
    /// Most recent stops, oldest first.
    pub recently_visited: VecDeque<BuildingId>,
    pub state: TraderState,
}

impl Trader {
    pub fn new(
        kind: TraderKind,
        route: Option<TradeRouteId>,
        position: TilePoint,
        sell_capacity: u32,
        buy_capacity: u32,
    ) -> Self {
        Self {
            kind,
            route,
            position,
            sell_capacity,
            buy_capacity,
            recently_visited: VecDeque::new(),
            state: TraderState::AwaitingDestination,
        }
    }

    pub fn current_destination(&self) -> Option<BuildingId> {
        match self.state {
            TraderState::Travelling { destination, .. } => Some(destination),
            _ => None,
        }
    }

    pub fn has_visited(&self, id: BuildingId) -> bool {
        self.recently_visited.contains(&id)
    }

    pub(crate) fn record_visit(&mut self, id: BuildingId, limit: usize) {
        self.recently_visited.push_back(id);
        while self.recently_visited.len() > limit {
            self.recently_visited.pop_front();
        }
    }
}

// ---------------------------------------------------------------------------
// Route terms
// ---------------------------------------------------------------------------

/// Per-resource units a trader may still move on its route. Zero means the
/// route does not trade that resource in that direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeTerms {
    pub sell: [u32; RESOURCE_COUNT],
    pub buy: [u32; RESOURCE_COUNT],
}

impl TradeTerms {
    /// Natives without a route trade every good with no quota.
    pub fn for_trader(trader: &Trader, routes: &dyn TradeRoutes) -> Self {
        let mut terms = Self {
            sell: [0; RESOURCE_COUNT],
            buy: [0; RESOURCE_COUNT],
        };
        match trader.route {
            None if trader.kind == TraderKind::Native => {
                for r in Resource::goods() {
                    terms.sell[r.index()] = u32::MAX;
                    terms.buy[r.index()] = u32::MAX;
                }
            }
            None => {}
            Some(route) => {
                for r in Resource::goods() {
                    let remaining = routes.remaining(route, r);
                    if routes.sells_to_city(route, r) {
                        terms.sell[r.index()] = remaining;
                    }
                    if routes.buys_from_city(route, r) {
                        terms.buy[r.index()] = remaining;
                    }
                }
            }
        }
        terms
    }

    pub fn sells(&self, resource: Resource) -> u32 {
        self.sell[resource.index()]
    }

    pub fn buys(&self, resource: Resource) -> u32 {
        self.buy[resource.index()]
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// `clamp(100 + scaler * log10(value / baseline), min, max)`, truncated.
/// A non-positive `value` or `baseline` scores `min`.
pub fn log_score(value: f64, baseline: f64, scaler: f64, min: i64, max: i64) -> i64 {
    if value <= 0.0 || baseline <= 0.0 {
        return min;
    }
    let raw = 100.0 + scaler * (value / baseline).log10();
    raw.clamp(min as f64, max as f64) as i64
}

/// Distance score; shorter is better. The distance sits in the baseline
/// slot of [`log_score`] so the logarithm's sign flips.
pub fn distance_score(distance: i32, tuning: &TradeTuning) -> i64 {
    log_score(
        tuning.distance_baseline,
        f64::from(distance.max(1)),
        tuning.distance_scaler,
        tuning.distance_score_min,
        tuning.distance_score_max,
    )
}

/// Price multipliers for one routing pass, indexed by resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceMultipliers {
    /// Weight of a unit the trader sells to the city.
    pub sell: [i64; RESOURCE_COUNT],
    /// Weight of a unit the trader buys from the city.
    pub buy: [i64; RESOURCE_COUNT],
}

impl PriceMultipliers {
    pub fn new(economy: &dyn CityEconomy, tuning: &TradeTuning) -> Self {
        let mut sell = [0; RESOURCE_COUNT];
        let mut buy = [0; RESOURCE_COUNT];
        for r in Resource::goods() {
            sell[r.index()] = log_score(
                f64::from(economy.import_price(r)),
                tuning.price_baseline,
                tuning.sell_price_scaler,
                tuning.multiplier_min,
                tuning.multiplier_max,
            );
            buy[r.index()] = log_score(
                f64::from(economy.export_price(r)),
                tuning.price_baseline,
                tuning.buy_price_scaler,
                tuning.multiplier_min,
                tuning.multiplier_max,
            );
        }
        Self { sell, buy }
    }
}

/// One scored building. Lives for a single routing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeCandidate {
    pub building: BuildingId,
    pub sell_score: i64,
    pub buy_score: i64,
    pub distance_score: i64,
    pub total_score: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeDecision {
    Visit {
        building: BuildingId,
        tile: TilePoint,
        score: i64,
    },
    Leave {
        exit: TilePoint,
    },
}

/// Everything a routing pass computes once per trader.
struct RoutingPass<'a> {
    trader: &'a Trader,
    terms: TradeTerms,
    prices: PriceMultipliers,
    exit: TilePoint,
    tuning: &'a TradeTuning,
    roads: &'a dyn RoadNetwork,
    economy: &'a dyn CityEconomy,
}

impl RoutingPass<'_> {
    fn admits(&self, view: &StorageView<'_>) -> bool {
        let b = view.building;
        !b.has_plague
            && b.has_road_access
            && !self.trader.has_visited(b.id)
            && self.trader.current_destination() != Some(b.id)
            && view.record.is_permitted(self.trader.kind.permission())
    }

    fn score(&self, view: &StorageView<'_>) -> TradeCandidate {
        let trader = self.trader;
        let mut sell_score = 0i64;
        let mut buy_score = 0i64;
        for r in Resource::goods() {
            let sells = self.terms.sells(r);
            if sells > 0 {
                let can_add = sells
                    .min(view.receptible_space(r))
                    .min(trader.sell_capacity);
                sell_score += i64::from(can_add) * self.prices.sell[r.index()];
            }
            let buys = self.terms.buys(r);
            if buys > 0 && !self.economy.is_stockpiled(r) {
                let can_buy = buys.min(view.amount(r)).min(trader.buy_capacity);
                buy_score += i64::from(can_buy) * self.prices.buy[r.index()];
            }
        }

        let tile = view.building.preferred_access_tile();
        let raw = self.roads.distance(trader.position, tile);
        let distance = match trader.kind {
            TraderKind::Native => raw.saturating_mul(2),
            _ => raw.saturating_add(self.roads.distance(tile, self.exit)),
        };
        let distance_score = distance_score(distance, self.tuning);
        let total_score = (sell_score + buy_score) * distance_score / 100;
        trace!(
            building = view.id().0,
            sell_score, buy_score, distance, distance_score, total_score, "trade candidate"
        );
        TradeCandidate {
            building: view.id(),
            sell_score,
            buy_score,
            distance_score,
            total_score,
        }
    }
}

impl City {
    fn routing_pass<'a>(
        &'a self,
        trader: &'a Trader,
        roads: &'a dyn RoadNetwork,
        routes: &dyn TradeRoutes,
        economy: &'a dyn CityEconomy,
    ) -> RoutingPass<'a> {
        RoutingPass {
            trader,
            terms: TradeTerms::for_trader(trader, routes),
            prices: PriceMultipliers::new(economy, &self.config.trade),
            exit: roads.exit_point(trader.kind),
            tuning: &self.config.trade,
            roads,
            economy,
        }
    }

    /// Score every building the trader may visit, in canonical order.
    pub fn score_trade_candidates(
        &self,
        id: TraderId,
        roads: &dyn RoadNetwork,
        routes: &dyn TradeRoutes,
        economy: &dyn CityEconomy,
    ) -> Result<Vec<TradeCandidate>, StorageError> {
        let trader = self.trader(id)?;
        let pass = self.routing_pass(trader, roads, routes, economy);
        Ok(self
            .views(StorageKind::Granary)
            .chain(self.views(StorageKind::Warehouse))
            .filter(|view| pass.admits(view))
            .map(|view| pass.score(&view))
            .collect())
    }

    /// Pick where the trader goes next. Does not move it.
    pub fn find_trade_destination(
        &self,
        id: TraderId,
        roads: &dyn RoadNetwork,
        routes: &dyn TradeRoutes,
        economy: &dyn CityEconomy,
    ) -> Result<TradeDecision, StorageError> {
        let trader = self.trader(id)?;
        let candidates = self.score_trade_candidates(id, roads, routes, economy)?;

        let mut best: Option<TradeCandidate> = None;
        for candidate in candidates {
            if candidate.total_score > best.map_or(0, |b| b.total_score) {
                best = Some(candidate);
            }
        }

        let decision = match best.and_then(|c| self.building(c.building).ok().map(|b| (c, b))) {
            Some((candidate, building)) => TradeDecision::Visit {
                building: candidate.building,
                tile: self.access_tile(building, roads),
                score: candidate.total_score,
            },
            None => TradeDecision::Leave {
                exit: roads.exit_point(trader.kind),
            },
        };
        Ok(decision)
    }

    /// Route a trader and update its state.
    pub(crate) fn route_trader(
        &mut self,
        id: TraderId,
        services: &Services<'_>,
    ) -> Result<TradeDecision, StorageError> {
        let decision =
            self.find_trade_destination(id, services.roads, &*services.routes, services.economy)?;
        let tick = self.sim_state.tick;
        let trader = self
            .traders
            .get_mut(id)
            .ok_or(StorageError::TraderNotFound)?;

        let event = match decision {
            TradeDecision::Visit {
                building,
                tile,
                score,
            } => {
                debug!(?id, building = building.0, score, "trader routed");
                trader.state = TraderState::Travelling {
                    destination: building,
                    tile,
                };
                Event::TraderRouted {
                    trader: id,
                    building,
                    tile,
                    score,
                    tick,
                }
            }
            TradeDecision::Leave { exit } => {
                debug!(?id, "trader leaving");
                trader.state = TraderState::Leaving { exit };
                Event::TraderLeaving {
                    trader: id,
                    exit,
                    tick,
                }
            }
        };
        self.emit(event);
        Ok(decision)
    }
}
