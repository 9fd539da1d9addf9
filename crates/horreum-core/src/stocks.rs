//! The per-tick snapshot of food that getting granaries may pull.
//!
//! [`City::refresh_stocks`] rebuilds [`NonGettingGranaries`] once at the
//! start of each tick's distribution phase. Readers get it by reference
//! through [`City::stocks`], which refuses to hand out a snapshot taken on
//! an earlier tick.

use tracing::warn;

use crate::building::{STORAGE_ADDED_PER_CARTLOAD, StorageKind};
use crate::city::City;
use crate::id::BuildingId;
use crate::resource::{RESOURCE_COUNT, Resource};
use crate::sim::Ticks;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonGettingGranaries {
    /// Tick the snapshot was taken on.
    pub tick: Ticks,
    /// Granaries holding more than one cartload of donatable food,
    /// ascending id, at most `donor_list_capacity` entries.
    pub donors: Vec<BuildingId>,
    /// Donatable units per food across every eligible granary.
    pub totals: [u32; RESOURCE_COUNT],
    /// Donors that did not fit in the list.
    pub dropped: usize,
}

impl NonGettingGranaries {
    pub fn empty(tick: Ticks) -> Self {
        Self {
            tick,
            donors: Vec::new(),
            totals: [0; RESOURCE_COUNT],
            dropped: 0,
        }
    }

    pub fn total(&self, resource: Resource) -> u32 {
        self.totals[resource.index()]
    }

    pub fn is_donor(&self, id: BuildingId) -> bool {
        self.donors.contains(&id)
    }
}

impl City {
    /// Rebuild the non-getting granaries cache for the current tick.
    pub fn refresh_stocks(&mut self) {
        let tick = self.sim_state.tick;
        let capacity = self.config.donor_list_capacity;
        let mut stocks = NonGettingGranaries::empty(tick);

        for view in self.views(StorageKind::Granary) {
            let b = view.building;
            if !b.has_road_access || b.distance_from_entry == 0 || b.has_plague {
                continue;
            }
            let mut donatable = 0;
            for food in Resource::FOODS {
                if view.allows_getting(food) {
                    let amount = view.amount(food);
                    stocks.totals[food.index()] += amount;
                    donatable += amount;
                }
            }
            if donatable > STORAGE_ADDED_PER_CARTLOAD {
                if stocks.donors.len() < capacity {
                    stocks.donors.push(b.id);
                } else {
                    stocks.dropped += 1;
                }
            }
        }

        if stocks.dropped > 0 {
            warn!(
                dropped = stocks.dropped,
                capacity, "non-getting granary list full; extra donors ignored"
            );
        }
        self.stocks = Some(stocks);
    }
}
