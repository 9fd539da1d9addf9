//! Granary ledger operations.
//!
//! Granaries hold food only and keep their free capacity in the
//! `Resource::None` slot, so `free + sum(food) == capacity` after every
//! call here. Plagued granaries neither give nor take.

use tracing::{debug, info};

use crate::building::{STORAGE_ADDED_PER_CARTLOAD, StorageKind};
use crate::city::City;
use crate::context::{CityEconomy, RoadNetwork};
use crate::event::Event;
use crate::id::{BuildingId, TilePoint};
use crate::ledger::{BulkDirection, Destination, StorageView};
use crate::resource::Resource;
use crate::stocks::NonGettingGranaries;
use crate::storage::StorageError;
use crate::task::WorkerTask;

/// A donor holding at most this many gettable units is treated as twice as
/// far away, so getters prefer fuller granaries.
pub const SMALL_GETTABLE_AMOUNT: u32 = 4;

/// Food taken out of a donor for a getting errand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GettingLoad {
    pub resource: Resource,
    pub amount: u32,
}

impl City {
    /// Store one cartload. `Ok(false)` when the resource is not food, the
    /// granary is full, plagued, or its policy refuses more.
    pub fn granary_add_resource(
        &mut self,
        id: BuildingId,
        resource: Resource,
        is_produced: bool,
    ) -> Result<bool, StorageError> {
        let view = self.expect_kind(id, StorageKind::Granary)?;
        if !resource.is_food()
            || view.building.free_space() == 0
            || view.maximum_receptible_amount(resource) == 0
        {
            return Ok(false);
        }

        let added = match self.buildings.get_mut(&id) {
            Some(building) => building.deposit(resource, STORAGE_ADDED_PER_CARTLOAD),
            None => 0,
        };
        if added == 0 {
            return Ok(false);
        }
        let tick = self.sim_state.tick;
        self.emit(Event::ResourceStored {
            building: id,
            resource,
            amount: added,
            produced: is_produced,
            tick,
        });
        Ok(true)
    }

    /// Remove up to `amount` units. Returns the amount actually removed.
    pub fn granary_remove_resource(
        &mut self,
        id: BuildingId,
        resource: Resource,
        amount: u32,
    ) -> Result<u32, StorageError> {
        self.expect_kind(id, StorageKind::Granary)?;
        self.withdraw_from(id, resource, amount)
    }

    /// Remove up to `desired_loads` cartloads, clamped to what is on hand.
    pub fn granary_try_fullload_remove(
        &mut self,
        id: BuildingId,
        resource: Resource,
        desired_loads: u32,
    ) -> Result<u32, StorageError> {
        let on_hand = self.expect_kind(id, StorageKind::Granary)?.amount(resource);
        let wanted = desired_loads
            .saturating_mul(STORAGE_ADDED_PER_CARTLOAD)
            .min(on_hand);
        self.granary_remove_resource(id, resource, wanted)
    }

    pub fn granary_maximum_receptible_amount(
        &self,
        id: BuildingId,
        resource: Resource,
    ) -> Result<u32, StorageError> {
        Ok(self
            .expect_kind(id, StorageKind::Granary)?
            .maximum_receptible_amount(resource))
    }

    pub(crate) fn withdraw_from(
        &mut self,
        id: BuildingId,
        resource: Resource,
        amount: u32,
    ) -> Result<u32, StorageError> {
        let building = self
            .buildings
            .get_mut(&id)
            .ok_or(StorageError::BuildingNotFound(id))?;
        let removed = building.withdraw(resource, amount);
        if removed > 0 {
            let tick = self.sim_state.tick;
            self.emit(Event::ResourceRemoved {
                building: id,
                resource,
                amount: removed,
                tick,
            });
        }
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // City-wide bulk operations
    // -----------------------------------------------------------------------

    /// Spread `amount` units over all granaries. Returns what did not fit.
    pub fn granaries_add_to_all(&mut self, resource: Resource, amount: u32) -> u32 {
        let (remaining, moves) =
            self.bulk_transfer(StorageKind::Granary, resource, amount, BulkDirection::Add);
        self.emit_moves(resource, &moves, BulkDirection::Add);
        remaining
    }

    /// Pull `amount` units out of all granaries, sparing getting and
    /// maintaining ones until the others run dry. Returns what could not be
    /// found.
    pub fn granaries_remove_from_all(&mut self, resource: Resource, amount: u32) -> u32 {
        let (remaining, moves) =
            self.bulk_transfer(StorageKind::Granary, resource, amount, BulkDirection::Remove);
        self.emit_moves(resource, &moves, BulkDirection::Remove);
        remaining
    }

    /// Like [`City::granaries_remove_from_all`], but each contributing
    /// granary dispatches a cart-pusher to Rome with its share.
    pub fn granaries_send_to_rome(&mut self, resource: Resource, amount: u32) -> u32 {
        let (remaining, moves) =
            self.bulk_transfer(StorageKind::Granary, resource, amount, BulkDirection::Remove);
        self.dispatch_shipments(resource, &moves);
        remaining
    }

    pub(crate) fn dispatch_shipments(&mut self, resource: Resource, moves: &[(BuildingId, u32)]) {
        let tick = self.sim_state.tick;
        for &(building, amount) in moves {
            info!(building = building.0, resource = resource.name(), amount, "shipment to Rome");
            self.emit(Event::ShipmentDispatched {
                building,
                resource,
                amount,
                tick,
            });
        }
    }

    // -----------------------------------------------------------------------
    // Getting
    // -----------------------------------------------------------------------

    /// Units `destination` could fetch from `source`: the donatable stock of
    /// every food `destination` is getting.
    pub fn granary_amount_can_get_from(
        &self,
        destination: BuildingId,
        source: BuildingId,
    ) -> Result<u32, StorageError> {
        let dst = self.expect_kind(destination, StorageKind::Granary)?;
        let src = self.expect_kind(source, StorageKind::Granary)?;
        Ok(gettable_amount(&dst, &src))
    }

    /// Load a getting cart-pusher at `source` for `destination`.
    ///
    /// Picks the food with the largest stock at `source` among those
    /// `destination` is getting (lowest resource id on ties), capped by the
    /// getting quota and by what `destination` can still take.
    pub fn granary_remove_for_getting_deliveryman(
        &mut self,
        source: BuildingId,
        destination: BuildingId,
    ) -> Result<Option<GettingLoad>, StorageError> {
        let src = self.expect_kind(source, StorageKind::Granary)?;
        let dst = self.expect_kind(destination, StorageKind::Granary)?;

        let mut best: Option<(Resource, u32)> = None;
        for food in Resource::FOODS {
            if !dst.is_getting(food) || !src.allows_getting(food) {
                continue;
            }
            let amount = src.amount(food);
            if amount > best.map_or(0, |(_, max)| max) {
                best = Some((food, amount));
            }
        }
        let Some((resource, available)) = best else {
            return Ok(None);
        };

        let amount = available
            .min(self.config.getting_quota())
            .min(dst.receptible_space(resource));
        if amount == 0 {
            return Ok(None);
        }
        let removed = self.withdraw_from(source, resource, amount)?;
        Ok(Some(GettingLoad {
            resource,
            amount: removed,
        }))
    }

    /// Nearest donor granary a getting granary should send its worker to.
    ///
    /// Reads the donor list from `stocks`. Donors with only a little to give
    /// count double distance.
    pub fn granary_for_getting(
        &self,
        id: BuildingId,
        stocks: &NonGettingGranaries,
        roads: &dyn RoadNetwork,
    ) -> Result<Option<Destination>, StorageError> {
        let src = self.expect_kind(id, StorageKind::Granary)?;
        if src.record.empty_all || !Resource::FOODS.iter().any(|&r| src.is_getting(r)) {
            return Ok(None);
        }

        let from = src.building.preferred_access_tile();
        let mut nearest: Option<(i32, StorageView<'_>)> = None;
        for &donor_id in &stocks.donors {
            if donor_id == id {
                continue;
            }
            let Ok(donor) = self.expect_kind(donor_id, StorageKind::Granary) else {
                continue;
            };
            if !self.config.getting_granaries_go_offroad
                && donor.building.road_network_id != src.building.road_network_id
            {
                continue;
            }
            let gettable = gettable_amount(&src, &donor);
            if gettable == 0 {
                continue;
            }
            let mut dist = roads.distance(donor.building.preferred_access_tile(), from);
            if gettable <= SMALL_GETTABLE_AMOUNT {
                dist *= 2;
            }
            if nearest.as_ref().is_none_or(|(min, _)| dist < *min) {
                nearest = Some((dist, donor));
            }
        }

        Ok(nearest.map(|(_, donor)| Destination {
            building: donor.id(),
            tile: self.access_tile(donor.building, roads),
        }))
    }

    /// Nearest granary that takes a cartload of `resource` from `from`.
    ///
    /// Only granaries on `road_network_id`, reachable from the map entry and
    /// staffed enough to work are considered. Stockpiled food goes nowhere
    /// unless `force_on_stockpile` is set.
    pub fn granary_for_storing(
        &self,
        from: TilePoint,
        resource: Resource,
        road_network_id: u32,
        force_on_stockpile: bool,
        roads: &dyn RoadNetwork,
        economy: &dyn CityEconomy,
    ) -> Option<Destination> {
        if !resource.is_food() || (economy.is_stockpiled(resource) && !force_on_stockpile) {
            return None;
        }

        let mut nearest: Option<(i32, StorageView<'_>)> = None;
        for view in self.views(StorageKind::Granary) {
            let b = view.building;
            if !b.has_road_access
                || b.distance_from_entry == 0
                || b.road_network_id != road_network_id
                || !b.is_staffed_for_work()
                || !view.accepts_delivery(resource)
                || b.free_space() < STORAGE_ADDED_PER_CARTLOAD
            {
                continue;
            }
            let dist = roads.distance(b.preferred_access_tile(), from);
            if nearest.as_ref().is_none_or(|(min, _)| dist < *min) {
                nearest = Some((dist, view));
            }
        }

        nearest.map(|(_, view)| Destination {
            building: view.id(),
            tile: self.access_tile(view.building, roads),
        })
    }

    // -----------------------------------------------------------------------
    // Worker task
    // -----------------------------------------------------------------------

    /// Decide what the granary's worker does this tick.
    ///
    /// Under 50% staffing it idles. An emptying granary pushes out its first
    /// stocked food. Otherwise it fetches when it has room and some food it
    /// is getting has more than one cartload available city-wide.
    pub fn granary_determine_worker_task(
        &self,
        id: BuildingId,
        stocks: &NonGettingGranaries,
    ) -> Result<WorkerTask, StorageError> {
        let view = self.expect_kind(id, StorageKind::Granary)?;
        let building = view.building;
        if !building.is_staffed_for_work() {
            return Ok(WorkerTask::Idle);
        }

        if view.record.empty_all {
            let task = Resource::FOODS
                .into_iter()
                .find(|&r| view.amount(r) > 0)
                .map_or(WorkerTask::Idle, WorkerTask::Emptying);
            return Ok(task);
        }

        if building.free_space() == 0 {
            return Ok(WorkerTask::Idle);
        }
        let wants = Resource::FOODS
            .into_iter()
            .any(|r| view.is_getting(r) && stocks.total(r) > STORAGE_ADDED_PER_CARTLOAD);
        if wants {
            debug!(building = id.0, "granary getting");
            return Ok(WorkerTask::Getting(None));
        }
        Ok(WorkerTask::Idle)
    }

    // -----------------------------------------------------------------------
    // Save migration
    // -----------------------------------------------------------------------

    /// Recompute the free-space slot so stock plus free space equals the
    /// capacity. Only used when upgrading old saves.
    pub fn granary_maximize_capacity(&mut self, id: BuildingId) -> Result<(), StorageError> {
        self.expect_kind(id, StorageKind::Granary)?;
        if let Some(building) = self.buildings.get_mut(&id) {
            building.recompute_free_space();
        }
        Ok(())
    }
}

fn gettable_amount(destination: &StorageView<'_>, source: &StorageView<'_>) -> u32 {
    Resource::FOODS
        .into_iter()
        .filter(|&r| destination.is_getting(r) && source.allows_getting(r))
        .map(|r| source.amount(r))
        .sum()
}
