//! Whole-city invariant checks.
//!
//! Nothing here runs during a normal step. Tests (property tests in
//! particular) and debug tooling call [`validate_city`] after arbitrary
//! operation sequences and expect an empty report.

use crate::building::StorageKind;
use crate::city::City;
use crate::id::{BuildingId, StorageId};
use crate::resource::Resource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Stock exceeds the building's capacity.
    OverCapacity {
        building: BuildingId,
        stored: u32,
        capacity: u32,
    },
    /// Granary free-space slot plus food differs from the capacity.
    SentinelMismatch {
        building: BuildingId,
        free: u32,
        stored: u32,
        capacity: u32,
    },
    NonFoodInGranary {
        building: BuildingId,
        resource: Resource,
    },
    /// A warehouse used the free-space slot.
    WarehouseSentinel { building: BuildingId, amount: u32 },
    /// Building holds the reserved storage id 0.
    ReservedStorageId { building: BuildingId },
    /// Building's record is unused or belongs to another building.
    MissingStorageRecord {
        building: BuildingId,
        storage: StorageId,
    },
    /// In-use record whose building is gone.
    OrphanRecord { storage: StorageId },
    /// Cached donor list names a plagued or missing granary.
    UnfitDonor { building: BuildingId },
}

/// Every violation found, in building order.
pub fn validate_city(city: &City) -> Vec<InvariantViolation> {
    use InvariantViolation::*;
    let mut violations = Vec::new();

    for building in city.buildings() {
        let id = building.id;
        let stored = building.total_stored();
        if stored > building.capacity {
            violations.push(OverCapacity {
                building: id,
                stored,
                capacity: building.capacity,
            });
        }

        match building.kind {
            StorageKind::Granary => {
                let free = building.resources.get(Resource::None);
                let food = building.resources.total_food();
                if free.checked_add(food) != Some(building.capacity) {
                    violations.push(SentinelMismatch {
                        building: id,
                        free,
                        stored: food,
                        capacity: building.capacity,
                    });
                }
                for resource in Resource::goods().filter(|r| !r.is_food()) {
                    if building.stored(resource) > 0 {
                        violations.push(NonFoodInGranary {
                            building: id,
                            resource,
                        });
                    }
                }
            }
            StorageKind::Warehouse => {
                let amount = building.resources.get(Resource::None);
                if amount > 0 {
                    violations.push(WarehouseSentinel {
                        building: id,
                        amount,
                    });
                }
            }
        }

        if building.storage_id.is_none() {
            violations.push(ReservedStorageId { building: id });
        } else {
            match city.storage(building.storage_id) {
                Ok(record) if record.building_id == id => {}
                _ => violations.push(MissingStorageRecord {
                    building: id,
                    storage: building.storage_id,
                }),
            }
        }
    }

    for (storage, record) in city.storages().iter() {
        if city.building(record.building_id).is_err() {
            violations.push(OrphanRecord { storage });
        }
    }

    if let Ok(stocks) = city.stocks() {
        for &building in &stocks.donors {
            if !city.building(building).is_ok_and(|b| !b.has_plague) {
                violations.push(UnfitDonor { building });
            }
        }
    }

    violations
}
