//! Storage buildings and their unit ledgers.
//!
//! A [`Building`] is the physical side of a granary or warehouse: footprint,
//! road connectivity, staffing, plague flag and the [`ResourceLedger`] of
//! units actually on hand. Its policy lives separately in the
//! [`StorageStore`](crate::storage::StorageStore) under `storage_id`.

use crate::id::{BuildingId, StorageId, TilePoint};
use crate::resource::{Resource, ResourceLedger};
use serde::{Deserialize, Serialize};

/// Units moved by a single delivery.
pub const STORAGE_ADDED_PER_CARTLOAD: u32 = 1;

/// Staffing percentage below which a storage building's worker stays home.
pub const MIN_WORKER_STAFFING: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageKind {
    /// Stores food only; tracks free space in the `Resource::None` slot.
    Granary,
    /// Stores every resource; free space is derived from the total.
    Warehouse,
}

impl StorageKind {
    pub fn name(self) -> &'static str {
        match self {
            StorageKind::Granary => "granary",
            StorageKind::Warehouse => "warehouse",
        }
    }

    /// Footprint edge length in tiles.
    pub fn size(self) -> i32 {
        match self {
            StorageKind::Granary => 3,
            StorageKind::Warehouse => 3,
        }
    }

    pub fn can_store(self, resource: Resource) -> bool {
        match self {
            StorageKind::Granary => resource.is_food(),
            StorageKind::Warehouse => resource != Resource::None,
        }
    }
}

/// Placement parameters for a new storage building, supplied by the
/// (external) construction layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingSite {
    pub origin: TilePoint,
    pub has_road_access: bool,
    pub road_network_id: u32,
    /// Road distance from the map entry; 0 means unreachable.
    pub distance_from_entry: u32,
    /// Worker slots of the building type.
    pub laborers: u32,
}

impl BuildingSite {
    pub fn new(origin: TilePoint) -> Self {
        Self {
            origin,
            has_road_access: true,
            road_network_id: 1,
            distance_from_entry: 1,
            laborers: 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Building {
    pub id: BuildingId,
    pub kind: StorageKind,
    pub origin: TilePoint,
    pub size: i32,
    pub has_road_access: bool,
    pub road_network_id: u32,
    pub distance_from_entry: u32,
    pub has_plague: bool,
    pub num_workers: u32,
    pub laborers: u32,
    pub storage_id: StorageId,
    pub capacity: u32,
    pub resources: ResourceLedger,
}

impl Building {
    pub(crate) fn new(
        id: BuildingId,
        kind: StorageKind,
        site: &BuildingSite,
        storage_id: StorageId,
        capacity: u32,
    ) -> Self {
        let mut resources = ResourceLedger::new();
        if kind == StorageKind::Granary {
            resources.set(Resource::None, capacity);
        }
        Self {
            id,
            kind,
            origin: site.origin,
            size: kind.size(),
            has_road_access: site.has_road_access,
            road_network_id: site.road_network_id,
            distance_from_entry: site.distance_from_entry,
            has_plague: false,
            num_workers: site.laborers,
            laborers: site.laborers,
            storage_id,
            capacity,
            resources,
        }
    }

    pub fn is_granary(&self) -> bool {
        self.kind == StorageKind::Granary
    }

    /// Integer staffing percentage, 0 when the type has no worker slots.
    pub fn staffing_percent(&self) -> u32 {
        if self.laborers == 0 {
            return 0;
        }
        self.num_workers.min(self.laborers) * 100 / self.laborers
    }

    pub fn is_staffed_for_work(&self) -> bool {
        self.staffing_percent() >= MIN_WORKER_STAFFING
    }

    /// Tile transporters aim for: the granary's center or the warehouse's
    /// origin.
    pub fn preferred_access_tile(&self) -> TilePoint {
        match self.kind {
            StorageKind::Granary => self.origin.offset(1, 1),
            StorageKind::Warehouse => self.origin,
        }
    }

    pub fn stored(&self, resource: Resource) -> u32 {
        if resource == Resource::None {
            return 0;
        }
        self.resources.get(resource)
    }

    pub fn total_stored(&self) -> u32 {
        self.resources.total()
    }

    pub fn free_space(&self) -> u32 {
        match self.kind {
            StorageKind::Granary => self.resources.get(Resource::None),
            StorageKind::Warehouse => self.capacity.saturating_sub(self.resources.total()),
        }
    }

    /// Put up to `amount` units of `resource` into the building, bounded by
    /// free space. Plagued buildings and foreign resources take nothing.
    pub(crate) fn deposit(&mut self, resource: Resource, amount: u32) -> u32 {
        if self.has_plague || !self.kind.can_store(resource) {
            return 0;
        }
        let added = amount.min(self.free_space());
        if added == 0 {
            return 0;
        }
        self.resources.add(resource, added);
        if self.kind == StorageKind::Granary {
            let free = self.resources.get(Resource::None);
            self.resources.set(Resource::None, free - added);
        }
        added
    }

    /// Take up to `amount` units out. Returns the amount actually removed.
    pub(crate) fn withdraw(&mut self, resource: Resource, amount: u32) -> u32 {
        if self.has_plague || resource == Resource::None {
            return 0;
        }
        let removed = self.resources.remove(resource, amount);
        if self.kind == StorageKind::Granary {
            self.resources.add(Resource::None, removed);
        }
        removed
    }

    /// Recompute the granary free-space slot from the capacity.
    pub(crate) fn recompute_free_space(&mut self) {
        if self.kind == StorageKind::Granary {
            let stored = self.resources.total_food();
            self.resources
                .set(Resource::None, self.capacity.saturating_sub(stored));
        }
    }
}
