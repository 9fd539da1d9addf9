//! Read-only snapshots of storage buildings for UI and tooling. Every type
//! here is an owned copy.

use crate::building::StorageKind;
use crate::city::City;
use crate::id::{BuildingId, StorageId, TilePoint};
use crate::resource::Resource;
use crate::storage::{Permission, StorageError, StorageState};
use crate::task::WorkerTask;

/// Policy and stock of one resource in one building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSnapshot {
    pub resource: Resource,
    pub amount: u32,
    pub state: StorageState,
    pub quantity: u8,
    /// Units the building would still hold: 0 when not accepting.
    pub effective_max: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSnapshot {
    pub building: BuildingId,
    pub kind: StorageKind,
    pub storage: StorageId,
    pub origin: TilePoint,
    pub has_plague: bool,
    pub free_space: u32,
    pub empty_all: bool,
    pub denied: Vec<Permission>,
    pub worker_task: WorkerTask,
    /// Only resources the building can store, ascending.
    pub resources: Vec<ResourceSnapshot>,
}

impl StorageSnapshot {
    pub fn total_stored(&self) -> u32 {
        self.resources.iter().map(|r| r.amount).sum()
    }

    pub fn resource(&self, resource: Resource) -> Option<&ResourceSnapshot> {
        self.resources.iter().find(|r| r.resource == resource)
    }
}

impl City {
    pub fn storage_snapshot(&self, id: BuildingId) -> Result<StorageSnapshot, StorageError> {
        let view = self.view(id)?;
        let building = view.building;
        let record = view.record;
        let resources = Resource::goods()
            .filter(|&r| building.kind.can_store(r))
            .map(|r| {
                let setting = record.setting(r);
                ResourceSnapshot {
                    resource: r,
                    amount: building.stored(r),
                    state: setting.state,
                    quantity: setting.quantity,
                    effective_max: setting.effective_max(),
                }
            })
            .collect();
        Ok(StorageSnapshot {
            building: id,
            kind: building.kind,
            storage: building.storage_id,
            origin: building.origin,
            has_plague: building.has_plague,
            free_space: building.free_space(),
            empty_all: record.empty_all,
            denied: Permission::ALL
                .into_iter()
                .filter(|&p| !record.is_permitted(p))
                .collect(),
            worker_task: self.worker_task(id),
            resources,
        })
    }

    /// Snapshots of every storage building, ascending id.
    pub fn storage_snapshots(&self) -> Vec<StorageSnapshot> {
        self.buildings
            .keys()
            .filter_map(|&id| self.storage_snapshot(id).ok())
            .collect()
    }

    /// Units of `resource` held across all buildings of `kind`.
    pub fn city_total(&self, kind: StorageKind, resource: Resource) -> u32 {
        self.buildings
            .values()
            .filter(|b| b.kind == kind)
            .map(|b| b.stored(resource))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn snapshot_reports_policy_and_stock() {
        let mut city = city_with_capacity(32);
        let g = add_granary(&mut city, 0, 0);
        set_stock(&mut city, g, Resource::Meat, 6);
        set_state(&mut city, g, Resource::Fish, StorageState::NotAccepting);
        let sid = city.building(g).unwrap().storage_id;
        city.storages.set_permission(sid, Permission::Market).unwrap();

        let snap = city.storage_snapshot(g).unwrap();
        assert_eq!(snap.kind, StorageKind::Granary);
        assert_eq!(snap.resources.len(), 5);
        assert_eq!(snap.total_stored(), 6);
        assert_eq!(snap.free_space, 26);
        assert_eq!(snap.denied, vec![Permission::Market]);
        let fish = snap.resource(Resource::Fish).unwrap();
        assert_eq!(fish.quantity, 32);
        assert_eq!(fish.effective_max, 0);
        assert_eq!(snap.resource(Resource::Meat).unwrap().effective_max, 32);
        assert!(snap.resource(Resource::Iron).is_none());
    }

    #[test]
    fn snapshots_and_totals_span_the_city() {
        let mut city = city_with_capacity(32);
        let a = add_warehouse(&mut city, 0, 0);
        let b = add_warehouse(&mut city, 10, 0);
        let g = add_granary(&mut city, 20, 0);
        set_stock(&mut city, a, Resource::Wheat, 3);
        set_stock(&mut city, b, Resource::Wheat, 4);
        set_stock(&mut city, g, Resource::Wheat, 5);

        let ids: Vec<_> = city.storage_snapshots().iter().map(|s| s.building).collect();
        assert_eq!(ids, vec![a, b, g]);
        assert_eq!(city.city_total(StorageKind::Warehouse, Resource::Wheat), 7);
        assert_eq!(city.city_total(StorageKind::Granary, Resource::Wheat), 5);
        assert!(city.storage_snapshot(BuildingId(99)).is_err());
    }
}
