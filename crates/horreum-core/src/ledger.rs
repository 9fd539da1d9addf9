//! Policy-aware predicates and the two-pass bulk transfers shared by the
//! granary and warehouse ledgers.

use tracing::trace;

use crate::building::{Building, StorageKind};
use crate::city::City;
use crate::event::Event;
use crate::id::{BuildingId, TilePoint};
use crate::resource::Resource;
use crate::storage::{StorageRecord, StorageState};

/// Where a transporter should go: the building and the tile it walks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Destination {
    pub building: BuildingId,
    pub tile: TilePoint,
}

/// A building's ledger together with its storage policy.
#[derive(Debug, Clone, Copy)]
pub struct StorageView<'a> {
    pub building: &'a Building,
    pub record: &'a StorageRecord,
}

impl<'a> StorageView<'a> {
    pub fn new(building: &'a Building, record: &'a StorageRecord) -> Self {
        Self { building, record }
    }

    pub fn id(&self) -> BuildingId {
        self.building.id
    }

    pub fn amount(&self, resource: Resource) -> u32 {
        self.building.stored(resource)
    }

    fn in_state_below_cap(&self, resource: Resource, state: StorageState) -> bool {
        if self.building.has_plague || !self.building.kind.can_store(resource) {
            return false;
        }
        let setting = self.record.setting(resource);
        setting.state == state && self.amount(resource) < u32::from(setting.quantity)
    }

    pub fn is_accepting(&self, resource: Resource) -> bool {
        self.in_state_below_cap(resource, StorageState::Accepting)
    }

    pub fn is_getting(&self, resource: Resource) -> bool {
        self.in_state_below_cap(resource, StorageState::Getting)
    }

    pub fn is_maintaining(&self, resource: Resource) -> bool {
        !self.building.has_plague && self.record.state(resource) == StorageState::Maintaining
    }

    /// Whether other buildings may pull this resource out of here.
    pub fn allows_getting(&self, resource: Resource) -> bool {
        !self.building.has_plague && self.record.setting(resource).is_donor_state()
    }

    /// Units the policy still lets in: `cap - amount`, 0 when plagued or
    /// NOT_ACCEPTING.
    pub fn maximum_receptible_amount(&self, resource: Resource) -> u32 {
        if self.building.has_plague || !self.building.kind.can_store(resource) {
            return 0;
        }
        self.record
            .setting(resource)
            .effective_max()
            .saturating_sub(self.amount(resource))
    }

    /// Receptible amount bounded by the building's free space.
    pub fn receptible_space(&self, resource: Resource) -> u32 {
        self.maximum_receptible_amount(resource)
            .min(self.building.free_space())
    }

    /// Either accepting or getting: a valid delivery target.
    pub fn accepts_delivery(&self, resource: Resource) -> bool {
        self.is_accepting(resource) || self.is_getting(resource)
    }
}

// ---------------------------------------------------------------------------
// Two-pass bulk transfers
// ---------------------------------------------------------------------------

/// Which buildings a bulk pass may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BulkPass {
    /// Neither getting nor maintaining the resource.
    Ordinary,
    /// Any building that is not plagued.
    Any,
}

impl BulkPass {
    pub(crate) const ORDER: [BulkPass; 2] = [BulkPass::Ordinary, BulkPass::Any];

    fn admits(self, view: &StorageView<'_>, resource: Resource) -> bool {
        if view.building.has_plague {
            return false;
        }
        match self {
            BulkPass::Ordinary => view.record.setting(resource).is_donor_state(),
            BulkPass::Any => true,
        }
    }

    /// Units this pass may put into the building.
    fn room(self, view: &StorageView<'_>, resource: Resource) -> u32 {
        match self {
            BulkPass::Ordinary => view.receptible_space(resource),
            BulkPass::Any => view.building.free_space(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BulkDirection {
    Add,
    Remove,
}

/// Per-building amounts moved by a bulk transfer, in visit order.
pub(crate) type Contributions = Vec<(BuildingId, u32)>;

impl City {
    /// Move `amount` units of `resource` into or out of every building of
    /// `kind`, ordinary buildings first and the rest only for the
    /// remainder. Returns the units left unmoved and the per-building moves.
    pub(crate) fn bulk_transfer(
        &mut self,
        kind: StorageKind,
        resource: Resource,
        amount: u32,
        direction: BulkDirection,
    ) -> (u32, Contributions) {
        let mut remaining = amount;
        let mut moved: Contributions = Vec::new();
        if !kind.can_store(resource) {
            return (remaining, moved);
        }

        for pass in BulkPass::ORDER {
            if remaining == 0 {
                break;
            }
            let plan: Vec<(BuildingId, u32)> = self
                .views(kind)
                .filter(|view| pass.admits(view, resource))
                .map(|view| {
                    let limit = match direction {
                        BulkDirection::Add => pass.room(&view, resource),
                        BulkDirection::Remove => view.amount(resource),
                    };
                    (view.id(), limit)
                })
                .filter(|&(_, limit)| limit > 0)
                .collect();

            for (id, limit) in plan {
                if remaining == 0 {
                    break;
                }
                let Some(building) = self.buildings.get_mut(&id) else {
                    continue;
                };
                let want = remaining.min(limit);
                let done = match direction {
                    BulkDirection::Add => building.deposit(resource, want),
                    BulkDirection::Remove => building.withdraw(resource, want),
                };
                if done == 0 {
                    continue;
                }
                trace!(building = id.0, ?pass, ?direction, amount = done, "bulk transfer");
                remaining -= done;
                match moved.iter_mut().find(|(b, _)| *b == id) {
                    Some((_, total)) => *total += done,
                    None => moved.push((id, done)),
                }
            }
        }
        (remaining, moved)
    }

    pub(crate) fn emit_moves(
        &mut self,
        resource: Resource,
        moves: &Contributions,
        direction: BulkDirection,
    ) {
        let tick = self.sim_state.tick;
        for &(building, amount) in moves {
            let event = match direction {
                BulkDirection::Add => Event::ResourceStored {
                    building,
                    resource,
                    amount,
                    produced: false,
                    tick,
                },
                BulkDirection::Remove => Event::ResourceRemoved {
                    building,
                    resource,
                    amount,
                    tick,
                },
            };
            self.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn accepting_requires_room_under_cap() {
        let mut city = city_with_capacity(64);
        let g = add_granary(&mut city, 0, 0);
        set_stock(&mut city, g, Resource::Wheat, 31);
        assert!(city.view(g).unwrap().is_accepting(Resource::Wheat));
        set_stock(&mut city, g, Resource::Wheat, 32);
        assert!(!city.view(g).unwrap().is_accepting(Resource::Wheat));
    }

    #[test]
    fn not_accepting_has_zero_receptible() {
        let mut city = city_with_capacity(32);
        let w = add_warehouse(&mut city, 0, 0);
        let sid = city.building(w).unwrap().storage_id;
        city.storages.accept_none(sid).unwrap();
        let view = city.view(w).unwrap();
        assert_eq!(view.maximum_receptible_amount(Resource::Iron), 0);
        assert!(view.allows_getting(Resource::Iron));
    }

    #[test]
    fn getting_and_maintaining_never_donate() {
        let mut city = city_with_capacity(32);
        let g = add_granary(&mut city, 0, 0);
        set_state(&mut city, g, Resource::Fruit, StorageState::Getting);
        set_state(&mut city, g, Resource::Meat, StorageState::Maintaining);
        let view = city.view(g).unwrap();
        assert!(!view.allows_getting(Resource::Fruit));
        assert!(!view.allows_getting(Resource::Meat));
        assert!(view.allows_getting(Resource::Wheat));
        assert!(view.is_maintaining(Resource::Meat));
        assert!(view.is_getting(Resource::Fruit));
    }

    #[test]
    fn plague_blocks_every_predicate() {
        let mut city = city_with_capacity(32);
        let g = add_granary(&mut city, 0, 0);
        city.update_building(g, |b| b.has_plague = true).unwrap();
        let view = city.view(g).unwrap();
        assert!(!view.is_accepting(Resource::Wheat));
        assert!(!view.allows_getting(Resource::Wheat));
        assert_eq!(view.maximum_receptible_amount(Resource::Wheat), 0);
    }

    #[test]
    fn receptible_space_bounded_by_free_space() {
        let mut city = city_with_capacity(10);
        let w = add_warehouse(&mut city, 0, 0);
        set_stock(&mut city, w, Resource::Clay, 8);
        let view = city.view(w).unwrap();
        assert_eq!(view.maximum_receptible_amount(Resource::Timber), 32);
        assert_eq!(view.receptible_space(Resource::Timber), 2);
    }
}
