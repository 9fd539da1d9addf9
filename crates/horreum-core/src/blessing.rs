//! Divine interventions on city storage: blessings fill the emptiest
//! granary, curses raid (or burn) the fullest storage building.

use tracing::info;

use crate::building::StorageKind;
use crate::city::City;
use crate::context::CityEconomy;
use crate::event::Event;
use crate::id::BuildingId;
use crate::resource::Resource;

/// Rounds of one cartload per available food added by a blessing.
pub const BLESS_ROUNDS: u32 = 6;

/// Units destroyed by a small curse.
pub const CURSE_LOADS: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurseOutcome {
    /// No unplagued storage building holds anything.
    NoTarget,
    Removed { building: BuildingId, amount: u32 },
    /// The big curse sets the fullest building on fire; demolition is up to
    /// the building layer.
    SetOnFire(BuildingId),
}

impl City {
    /// Add [`BLESS_ROUNDS`] cartloads of every available food to the
    /// unplagued granary holding the least. Returns it and the units added.
    pub fn bless_granaries(&mut self, economy: &dyn CityEconomy) -> Option<(BuildingId, u32)> {
        let target = self
            .views(StorageKind::Granary)
            .filter(|v| !v.building.has_plague)
            .min_by_key(|v| (v.building.total_stored(), v.id()))
            .map(|v| v.id())?;

        let foods: Vec<Resource> = Resource::FOODS
            .into_iter()
            .filter(|&r| economy.is_food_available(r))
            .collect();
        let mut added = 0;
        for _ in 0..BLESS_ROUNDS {
            for &food in &foods {
                if self.granary_add_resource(target, food, false).unwrap_or(false) {
                    added += 1;
                }
            }
        }

        info!(building = target.0, added, "granary blessed");
        let tick = self.sim_state.tick;
        self.emit(Event::GranaryBlessed {
            building: target,
            amount: added,
            tick,
        });
        Some((target, added))
    }

    /// Strike the unplagued granary or warehouse holding the most (lowest
    /// id on ties). A small curse destroys [`CURSE_LOADS`] units; a big one
    /// sets the building on fire.
    pub fn curse_storage(&mut self, big: bool) -> CurseOutcome {
        let target = self
            .buildings
            .values()
            .filter(|b| !b.has_plague && b.total_stored() > 0)
            .filter(|b| self.storages.get(b.storage_id).is_ok())
            .fold(None::<(u32, BuildingId, StorageKind)>, |best, b| {
                match best {
                    Some((max, _, _)) if b.total_stored() <= max => best,
                    _ => Some((b.total_stored(), b.id, b.kind)),
                }
            });
        let Some((_, id, kind)) = target else {
            return CurseOutcome::NoTarget;
        };
        let tick = self.sim_state.tick;

        if big {
            info!(building = id.0, "storage set on fire by curse");
            self.emit(Event::BuildingSetOnFire { building: id, tick });
            return CurseOutcome::SetOnFire(id);
        }

        let removed = match kind {
            StorageKind::Warehouse => self.warehouse_remove_resource_curse(id, CURSE_LOADS),
            StorageKind::Granary => self.granary_remove_curse(id, CURSE_LOADS),
        }
        .unwrap_or(0);

        info!(building = id.0, removed, "storage cursed");
        self.emit(Event::StorageCursed {
            building: id,
            amount: removed,
            tick,
        });
        CurseOutcome::Removed {
            building: id,
            amount: removed,
        }
    }

    fn granary_remove_curse(
        &mut self,
        id: BuildingId,
        amount: u32,
    ) -> Result<u32, crate::storage::StorageError> {
        let mut remaining = amount;
        for food in Resource::FOODS {
            if remaining == 0 {
                break;
            }
            remaining -= self.granary_remove_resource(id, food, remaining)?;
        }
        Ok(amount - remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::test_utils::*;

    #[test]
    fn bless_fills_emptiest_granary() {
        let mut city = city_with_capacity(64);
        let full = add_granary(&mut city, 0, 0);
        let empty = add_granary(&mut city, 10, 0);
        let plagued = add_granary(&mut city, 20, 0);
        set_stock(&mut city, full, Resource::Wheat, 10);
        city.update_building(plagued, |b| b.has_plague = true).unwrap();
        let mut world = TestWorld::new();
        world.economy.unavailable.insert(Resource::Fish);

        let (target, added) = city.bless_granaries(&world.economy).unwrap();
        assert_eq!(target, empty);
        assert_eq!(added, 24);
        let b = city.building(empty).unwrap();
        assert_eq!(b.stored(Resource::Wheat), 6);
        assert_eq!(b.stored(Resource::Fish), 0);
        assert_eq!(city.event_bus().buffered_count(EventKind::GranaryBlessed), 1);
    }

    #[test]
    fn bless_stops_at_capacity() {
        let mut city = city_with_capacity(10);
        let g = add_granary(&mut city, 0, 0);
        let world = TestWorld::new();
        let (_, added) = city.bless_granaries(&world.economy).unwrap();
        assert_eq!(added, 10);
        assert_eq!(city.building(g).unwrap().free_space(), 0);
    }

    #[test]
    fn curse_hits_fullest_building() {
        let mut city = city_with_capacity(64);
        let g = add_granary(&mut city, 0, 0);
        let w = add_warehouse(&mut city, 10, 0);
        set_stock(&mut city, g, Resource::Wheat, 10);
        set_stock(&mut city, g, Resource::Fruit, 10);
        set_stock(&mut city, w, Resource::Iron, 12);

        assert_eq!(
            city.curse_storage(false),
            CurseOutcome::Removed {
                building: g,
                amount: 16
            }
        );
        let b = city.building(g).unwrap();
        assert_eq!(b.stored(Resource::Wheat), 0);
        assert_eq!(b.stored(Resource::Fruit), 4);
    }

    #[test]
    fn big_curse_sets_fire() {
        let mut city = city_with_capacity(32);
        let w = add_warehouse(&mut city, 10, 0);
        set_stock(&mut city, w, Resource::Iron, 12);
        assert_eq!(city.curse_storage(true), CurseOutcome::SetOnFire(w));
        assert_eq!(city.event_bus().buffered_count(EventKind::BuildingSetOnFire), 1);
    }

    #[test]
    fn curse_without_stock_has_no_target() {
        let mut city = city_with_capacity(32);
        add_granary(&mut city, 0, 0);
        assert_eq!(city.curse_storage(false), CurseOutcome::NoTarget);
    }
}
