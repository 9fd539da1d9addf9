//! Warehouse ledger operations.
//!
//! Same contract as the granary ledger, over every resource, with free
//! space derived as `capacity - total`.

use tracing::debug;

use crate::building::StorageKind;
use crate::city::City;
use crate::context::{CityEconomy, RoadNetwork};
use crate::event::Event;
use crate::id::{BuildingId, TilePoint};
use crate::ledger::{BulkDirection, Destination, StorageView};
use crate::resource::Resource;
use crate::storage::StorageError;
use crate::task::WorkerTask;

impl City {
    pub fn warehouse_get_amount(
        &self,
        id: BuildingId,
        resource: Resource,
    ) -> Result<u32, StorageError> {
        Ok(self
            .expect_kind(id, StorageKind::Warehouse)?
            .amount(resource))
    }

    pub fn warehouse_maximum_receptible_amount(
        &self,
        id: BuildingId,
        resource: Resource,
    ) -> Result<u32, StorageError> {
        Ok(self
            .expect_kind(id, StorageKind::Warehouse)?
            .maximum_receptible_amount(resource))
    }

    /// Store up to `amount` units. With `respect_settings` the policy cap
    /// applies as well as free space. Returns the amount stored.
    pub fn warehouse_try_add_resource(
        &mut self,
        id: BuildingId,
        resource: Resource,
        amount: u32,
        respect_settings: bool,
    ) -> Result<u32, StorageError> {
        let view = self.expect_kind(id, StorageKind::Warehouse)?;
        let room = if respect_settings {
            view.receptible_space(resource)
        } else {
            view.building.free_space()
        };
        self.deposit_into(id, resource, amount.min(room))
    }

    pub fn warehouse_try_remove_resource(
        &mut self,
        id: BuildingId,
        resource: Resource,
        amount: u32,
    ) -> Result<u32, StorageError> {
        self.expect_kind(id, StorageKind::Warehouse)?;
        self.withdraw_from(id, resource, amount)
    }

    /// Remove `amount` units in total, lowest resource id first. Returns the
    /// units destroyed.
    pub fn warehouse_remove_resource_curse(
        &mut self,
        id: BuildingId,
        amount: u32,
    ) -> Result<u32, StorageError> {
        let stocked: Vec<Resource> = self
            .expect_kind(id, StorageKind::Warehouse)?
            .building
            .resources
            .stocked()
            .map(|(r, _)| r)
            .collect();

        let mut remaining = amount;
        for resource in stocked {
            if remaining == 0 {
                break;
            }
            remaining -= self.withdraw_from(id, resource, remaining)?;
        }
        Ok(amount - remaining)
    }

    pub(crate) fn deposit_into(
        &mut self,
        id: BuildingId,
        resource: Resource,
        amount: u32,
    ) -> Result<u32, StorageError> {
        let building = self
            .buildings
            .get_mut(&id)
            .ok_or(StorageError::BuildingNotFound(id))?;
        let added = building.deposit(resource, amount);
        if added > 0 {
            let tick = self.sim_state.tick;
            self.emit(Event::ResourceStored {
                building: id,
                resource,
                amount: added,
                produced: false,
                tick,
            });
        }
        Ok(added)
    }

    // -----------------------------------------------------------------------
    // City-wide bulk operations
    // -----------------------------------------------------------------------

    pub fn warehouses_add_to_all(&mut self, resource: Resource, amount: u32) -> u32 {
        let (remaining, moves) =
            self.bulk_transfer(StorageKind::Warehouse, resource, amount, BulkDirection::Add);
        self.emit_moves(resource, &moves, BulkDirection::Add);
        remaining
    }

    pub fn warehouses_remove_from_all(&mut self, resource: Resource, amount: u32) -> u32 {
        let (remaining, moves) =
            self.bulk_transfer(StorageKind::Warehouse, resource, amount, BulkDirection::Remove);
        self.emit_moves(resource, &moves, BulkDirection::Remove);
        remaining
    }

    pub fn warehouses_send_to_rome(&mut self, resource: Resource, amount: u32) -> u32 {
        let (remaining, moves) =
            self.bulk_transfer(StorageKind::Warehouse, resource, amount, BulkDirection::Remove);
        self.dispatch_shipments(resource, &moves);
        remaining
    }

    // -----------------------------------------------------------------------
    // Destinations
    // -----------------------------------------------------------------------

    /// Nearest staffed warehouse on `road_network_id` that takes `resource`.
    pub fn warehouse_for_storing(
        &self,
        from: TilePoint,
        resource: Resource,
        road_network_id: u32,
        roads: &dyn RoadNetwork,
        economy: &dyn CityEconomy,
    ) -> Option<Destination> {
        if economy.is_stockpiled(resource) {
            return None;
        }
        let candidates = self.views(StorageKind::Warehouse).filter(|view| {
            let b = view.building;
            b.has_road_access
                && b.road_network_id == road_network_id
                && b.is_staffed_for_work()
                && view.accepts_delivery(resource)
                && b.free_space() > 0
        });
        self.nearest(candidates, from, roads)
    }

    /// Nearest other warehouse that can give `resource` to warehouse `id`.
    pub fn warehouse_for_getting(
        &self,
        id: BuildingId,
        resource: Resource,
        roads: &dyn RoadNetwork,
    ) -> Result<Option<Destination>, StorageError> {
        let src = self.expect_kind(id, StorageKind::Warehouse)?;
        let candidates = self
            .views(StorageKind::Warehouse)
            .filter(|view| can_supply(view, &src, resource));
        Ok(self.nearest(candidates, src.building.origin, roads))
    }

    fn nearest<'a>(
        &'a self,
        candidates: impl Iterator<Item = StorageView<'a>>,
        from: TilePoint,
        roads: &dyn RoadNetwork,
    ) -> Option<Destination> {
        let mut best: Option<(i32, StorageView<'a>)> = None;
        for view in candidates {
            let dist = roads.distance(view.building.preferred_access_tile(), from);
            if best.as_ref().is_none_or(|(min, _)| dist < *min) {
                best = Some((dist, view));
            }
        }
        best.map(|(_, view)| Destination {
            building: view.id(),
            tile: self.access_tile(view.building, roads),
        })
    }

    /// Load a warehouse worker fetching `resource` from `source` for
    /// `destination`. Returns the units taken out of `source`.
    pub fn warehouse_remove_for_getting(
        &mut self,
        source: BuildingId,
        destination: BuildingId,
        resource: Resource,
    ) -> Result<u32, StorageError> {
        let src = self.expect_kind(source, StorageKind::Warehouse)?;
        let dst = self.expect_kind(destination, StorageKind::Warehouse)?;
        if !src.allows_getting(resource) {
            return Ok(0);
        }
        let amount = src
            .amount(resource)
            .min(self.config.getting_quota())
            .min(dst.receptible_space(resource));
        self.withdraw_from(source, resource, amount)
    }

    // -----------------------------------------------------------------------
    // Worker task
    // -----------------------------------------------------------------------

    /// Decide what the warehouse's worker does this tick.
    ///
    /// In order: idle under 50% staffing; empty the first stocked resource;
    /// fetch a resource it is getting that another warehouse can give;
    /// deliver food to the lowest-id granary getting it; otherwise idle.
    pub fn warehouse_determine_worker_task(&self, id: BuildingId) -> Result<WorkerTask, StorageError> {
        let view = self.expect_kind(id, StorageKind::Warehouse)?;
        if !view.building.is_staffed_for_work() {
            return Ok(WorkerTask::Idle);
        }

        if view.record.empty_all {
            let task = view
                .building
                .resources
                .stocked()
                .next()
                .map_or(WorkerTask::Idle, |(r, _)| WorkerTask::Emptying(r));
            return Ok(task);
        }

        for resource in Resource::goods() {
            if !view.is_getting(resource) || view.building.free_space() == 0 {
                continue;
            }
            if self
                .views(StorageKind::Warehouse)
                .any(|other| can_supply(&other, &view, resource))
            {
                debug!(building = id.0, resource = resource.name(), "warehouse getting");
                return Ok(WorkerTask::Getting(Some(resource)));
            }
        }

        for food in Resource::FOODS {
            if view.amount(food) == 0 || !view.allows_getting(food) {
                continue;
            }
            let granary = self.views(StorageKind::Granary).find(|g| {
                g.building.has_road_access
                    && g.building.road_network_id == view.building.road_network_id
                    && g.is_getting(food)
                    && g.building.free_space() > 0
            });
            if let Some(granary) = granary {
                return Ok(WorkerTask::Delivering {
                    resource: food,
                    destination: granary.id(),
                });
            }
        }

        Ok(WorkerTask::Idle)
    }
}

/// `supplier` is another warehouse on the same roads that holds `resource`
/// and lets it be taken.
fn can_supply(supplier: &StorageView<'_>, getter: &StorageView<'_>, resource: Resource) -> bool {
    supplier.id() != getter.id()
        && supplier.building.has_road_access
        && supplier.building.road_network_id == getter.building.road_network_id
        && supplier.amount(resource) > 0
        && supplier.allows_getting(resource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageState;
    use crate::test_utils::*;

    #[test]
    fn try_add_respects_settings_when_asked() {
        let mut city = city_with_capacity(32);
        let w = add_warehouse(&mut city, 0, 0);
        set_state(&mut city, w, Resource::Oil, StorageState::NotAccepting);

        assert_eq!(city.warehouse_try_add_resource(w, Resource::Oil, 4, true), Ok(0));
        assert_eq!(city.warehouse_try_add_resource(w, Resource::Oil, 4, false), Ok(4));
        assert_eq!(city.warehouse_get_amount(w, Resource::Oil), Ok(4));
    }

    #[test]
    fn try_add_bounded_by_free_space() {
        let mut city = city_with_capacity(10);
        let w = add_warehouse(&mut city, 0, 0);
        set_stock(&mut city, w, Resource::Timber, 7);
        assert_eq!(city.warehouse_try_add_resource(w, Resource::Clay, 5, true), Ok(3));
        assert_eq!(city.warehouse_try_add_resource(w, Resource::Clay, 5, true), Ok(0));
    }

    #[test]
    fn try_remove_reports_removed() {
        let mut city = city_with_capacity(32);
        let w = add_warehouse(&mut city, 0, 0);
        set_stock(&mut city, w, Resource::Wine, 3);
        assert_eq!(city.warehouse_try_remove_resource(w, Resource::Wine, 5), Ok(3));
        assert!(matches!(
            city.warehouse_try_remove_resource(BuildingId(40), Resource::Wine, 1),
            Err(StorageError::BuildingNotFound(_))
        ));
    }

    #[test]
    fn curse_removes_lowest_ids_first() {
        let mut city = city_with_capacity(32);
        let w = add_warehouse(&mut city, 0, 0);
        set_stock(&mut city, w, Resource::Clay, 4);
        set_stock(&mut city, w, Resource::Iron, 10);
        set_stock(&mut city, w, Resource::Weapons, 2);

        assert_eq!(city.warehouse_remove_resource_curse(w, 9), Ok(9));
        assert_eq!(city.warehouse_get_amount(w, Resource::Clay), Ok(0));
        assert_eq!(city.warehouse_get_amount(w, Resource::Iron), Ok(5));
        assert_eq!(city.warehouse_get_amount(w, Resource::Weapons), Ok(2));
        assert_eq!(city.warehouse_remove_resource_curse(w, 50), Ok(7));
    }

    #[test]
    fn remove_from_all_two_pass() {
        let mut city = city_with_capacity(64);
        let maintaining = add_warehouse(&mut city, 0, 0);
        let accepting = add_warehouse(&mut city, 10, 0);
        set_state(&mut city, maintaining, Resource::Marble, StorageState::Maintaining);
        set_stock(&mut city, maintaining, Resource::Marble, 50);
        set_stock(&mut city, accepting, Resource::Marble, 50);

        assert_eq!(city.warehouses_remove_from_all(Resource::Marble, 60), 0);
        assert_eq!(city.warehouse_get_amount(accepting, Resource::Marble), Ok(0));
        assert_eq!(city.warehouse_get_amount(maintaining, Resource::Marble), Ok(40));
    }

    #[test]
    fn add_to_all_and_send_to_rome() {
        let mut city = city_with_capacity(8);
        let a = add_warehouse(&mut city, 0, 0);
        let b = add_warehouse(&mut city, 10, 0);
        assert_eq!(city.warehouses_add_to_all(Resource::Pottery, 20), 4);
        assert_eq!(city.warehouse_get_amount(a, Resource::Pottery), Ok(8));
        assert_eq!(city.warehouse_get_amount(b, Resource::Pottery), Ok(8));

        assert_eq!(city.warehouses_send_to_rome(Resource::Pottery, 10), 0);
        assert_eq!(city.warehouse_get_amount(a, Resource::Pottery), Ok(0));
        assert_eq!(city.warehouse_get_amount(b, Resource::Pottery), Ok(6));
    }

    #[test]
    fn for_getting_finds_nearest_supplier() {
        let mut city = city_with_capacity(32);
        let getter = add_warehouse(&mut city, 0, 0);
        let far = add_warehouse(&mut city, 30, 0);
        let near = add_warehouse(&mut city, 8, 0);
        let refusing = add_warehouse(&mut city, 3, 0);
        set_stock(&mut city, far, Resource::Furniture, 5);
        set_stock(&mut city, near, Resource::Furniture, 5);
        set_stock(&mut city, refusing, Resource::Furniture, 5);
        set_state(&mut city, refusing, Resource::Furniture, StorageState::Getting);
        let world = TestWorld::new();

        let dest = city
            .warehouse_for_getting(getter, Resource::Furniture, &world.roads)
            .unwrap()
            .unwrap();
        assert_eq!(dest.building, near);
    }

    #[test]
    fn for_storing_skips_stockpiled() {
        let mut city = city_with_capacity(32);
        let w = add_warehouse(&mut city, 5, 5);
        let mut world = TestWorld::new();
        let from = TilePoint::new(0, 0);

        let dest = city.warehouse_for_storing(from, Resource::Iron, 1, &world.roads, &world.economy);
        assert_eq!(dest.map(|d| d.building), Some(w));

        world.economy.stockpiled.insert(Resource::Iron);
        let dest = city.warehouse_for_storing(from, Resource::Iron, 1, &world.roads, &world.economy);
        assert_eq!(dest, None);
    }

    #[test]
    fn remove_for_getting_caps_at_quota() {
        let mut city = city_with_capacity(64);
        let src = add_warehouse(&mut city, 0, 0);
        let dst = add_warehouse(&mut city, 10, 0);
        set_stock(&mut city, src, Resource::Olives, 30);
        set_state(&mut city, dst, Resource::Olives, StorageState::Getting);
        assert_eq!(city.warehouse_remove_for_getting(src, dst, Resource::Olives), Ok(8));

        set_state(&mut city, src, Resource::Olives, StorageState::Maintaining);
        assert_eq!(city.warehouse_remove_for_getting(src, dst, Resource::Olives), Ok(0));
    }

    #[test]
    fn worker_task_order() {
        let mut city = city_with_capacity(32);
        let w = add_warehouse(&mut city, 0, 0);
        let supplier = add_warehouse(&mut city, 10, 0);
        let granary = add_granary(&mut city, 20, 0);

        assert_eq!(city.warehouse_determine_worker_task(w), Ok(WorkerTask::Idle));

        set_stock(&mut city, w, Resource::Wheat, 4);
        set_state(&mut city, granary, Resource::Wheat, StorageState::Getting);
        assert_eq!(
            city.warehouse_determine_worker_task(w),
            Ok(WorkerTask::Delivering {
                resource: Resource::Wheat,
                destination: granary
            })
        );

        set_stock(&mut city, supplier, Resource::Timber, 6);
        set_state(&mut city, w, Resource::Timber, StorageState::Getting);
        assert_eq!(
            city.warehouse_determine_worker_task(w),
            Ok(WorkerTask::Getting(Some(Resource::Timber)))
        );

        let sid = city.building(w).unwrap().storage_id;
        city.storages.toggle_empty_all(sid).unwrap();
        assert_eq!(
            city.warehouse_determine_worker_task(w),
            Ok(WorkerTask::Emptying(Resource::Wheat))
        );

        set_staffing(&mut city, w, 40);
        assert_eq!(city.warehouse_determine_worker_task(w), Ok(WorkerTask::Idle));
    }
}
