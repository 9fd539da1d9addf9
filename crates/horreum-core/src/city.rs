//! The city: owns every storage building, policy record and trader, and
//! runs the per-tick distribution pipeline.
//!
//! # Six-Phase Pipeline
//!
//! Each [`City::step`] runs:
//! 1. **Commands** -- apply queued storage-policy edits
//! 2. **Stocks** -- rebuild the non-getting granaries cache
//! 3. **Workers** -- resolve the worker task of every storage building
//! 4. **Trade** -- route every trader waiting for a destination
//! 5. **Post-tick** -- deliver buffered events to listeners
//! 6. **Bookkeeping** -- advance the tick counter, compute the state hash
//!
//! Buildings are kept in a `BTreeMap`, so every scan visits them in
//! ascending id order. Two-pass bulk transfers and trade tie-breaks rely on
//! that order.

use std::collections::BTreeMap;

use slotmap::SlotMap;
use tracing::{debug, warn};

use crate::building::{Building, BuildingSite, StorageKind};
use crate::command_queue::{CommandQueue, StorageCommand};
use crate::config::StorageConfig;
use crate::context::{RoadNetwork, Services, TradeRoutes};
use crate::event::{Event, EventBus, EventKind, PassiveListener};
use crate::id::{BuildingId, StorageId, TilePoint, TradeRouteId, TraderId};
use crate::ledger::StorageView;
use crate::sim::{SimState, StateHash, StepResult};
use crate::stocks::NonGettingGranaries;
use crate::storage::{StorageError, StorageRecord, StorageStore};
use crate::task::WorkerTask;
use crate::trade::{TradeDecision, Trader, TraderKind, TraderState};

#[derive(Debug)]
pub struct City {
    pub config: StorageConfig,
    pub sim_state: SimState,
    pub(crate) storages: StorageStore,
    pub(crate) buildings: BTreeMap<BuildingId, Building>,
    pub(crate) next_building_id: u32,
    pub(crate) traders: SlotMap<TraderId, Trader>,
    /// Rebuilt in phase 2; `None` until the first refresh.
    pub(crate) stocks: Option<NonGettingGranaries>,
    pub(crate) worker_tasks: BTreeMap<BuildingId, WorkerTask>,
    pub(crate) commands: CommandQueue,
    pub(crate) last_state_hash: u64,
    pub(crate) event_bus: EventBus,
}

impl Default for City {
    fn default() -> Self {
        Self::new(StorageConfig::default())
    }
}

impl City {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            sim_state: SimState::new(),
            storages: StorageStore::new(),
            buildings: BTreeMap::new(),
            next_building_id: 1,
            traders: SlotMap::with_key(),
            stocks: None,
            worker_tasks: BTreeMap::new(),
            commands: CommandQueue::new(),
            last_state_hash: 0,
            event_bus: EventBus::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Building lifecycle
    // -----------------------------------------------------------------------

    /// Register a finished granary or warehouse and allocate its storage
    /// record.
    pub fn add_storage_building(&mut self, kind: StorageKind, site: BuildingSite) -> BuildingId {
        let id = BuildingId(self.next_building_id);
        self.next_building_id += 1;
        let storage_id = self
            .storages
            .create(id, self.config.warehouses_accept_nothing);
        let capacity = match kind {
            StorageKind::Granary => self.config.granary_capacity,
            StorageKind::Warehouse => self.config.warehouse_capacity,
        };
        self.buildings
            .insert(id, Building::new(id, kind, &site, storage_id, capacity));
        id
    }

    /// Remove a storage building and soft-delete its record. The returned
    /// building can be handed back to [`City::restore_storage_building`].
    pub fn remove_storage_building(&mut self, id: BuildingId) -> Result<Building, StorageError> {
        let building = self
            .buildings
            .remove(&id)
            .ok_or(StorageError::BuildingNotFound(id))?;
        self.storages.delete(building.storage_id)?;
        self.worker_tasks.remove(&id);
        Ok(building)
    }

    /// Undo a removal: re-activate the record and put the building back.
    pub fn restore_storage_building(&mut self, building: Building) -> Result<BuildingId, StorageError> {
        let id = building.id;
        if id.is_none() || self.buildings.contains_key(&id) {
            return Err(StorageError::BuildingNotFound(id));
        }
        self.storages.restore(building.storage_id)?;
        self.next_building_id = self.next_building_id.max(id.0 + 1);
        self.buildings.insert(id, building);
        Ok(id)
    }

    /// Mutate the physical state of a building (plague, staffing, roads).
    pub fn update_building(
        &mut self,
        id: BuildingId,
        update: impl FnOnce(&mut Building),
    ) -> Result<(), StorageError> {
        let building = self
            .buildings
            .get_mut(&id)
            .ok_or(StorageError::BuildingNotFound(id))?;
        update(building);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    pub fn building(&self, id: BuildingId) -> Result<&Building, StorageError> {
        self.buildings
            .get(&id)
            .ok_or(StorageError::BuildingNotFound(id))
    }

    pub fn buildings(&self) -> impl Iterator<Item = &Building> {
        self.buildings.values()
    }

    pub fn storage(&self, id: StorageId) -> Result<&StorageRecord, StorageError> {
        self.storages.get(id)
    }

    pub fn storages(&self) -> &StorageStore {
        &self.storages
    }

    /// Policy and ledger of one building, for read-only predicates.
    pub fn view(&self, id: BuildingId) -> Result<StorageView<'_>, StorageError> {
        let building = self.building(id)?;
        let record = self.storages.get(building.storage_id)?;
        Ok(StorageView::new(building, record))
    }

    pub(crate) fn expect_kind(
        &self,
        id: BuildingId,
        kind: StorageKind,
    ) -> Result<StorageView<'_>, StorageError> {
        let view = self.view(id)?;
        if view.building.kind != kind {
            return Err(StorageError::WrongBuildingKind {
                building: id,
                expected: kind.name(),
            });
        }
        Ok(view)
    }

    /// Ids of every building of `kind`, ascending.
    pub fn building_ids(&self, kind: StorageKind) -> Vec<BuildingId> {
        self.buildings
            .values()
            .filter(|b| b.kind == kind)
            .map(|b| b.id)
            .collect()
    }

    /// Views of every building of `kind` with an active record, ascending.
    pub(crate) fn views(&self, kind: StorageKind) -> impl Iterator<Item = StorageView<'_>> {
        self.buildings
            .values()
            .filter(move |b| b.kind == kind)
            .filter_map(|b| {
                self.storages
                    .get(b.storage_id)
                    .ok()
                    .map(|record| StorageView::new(b, record))
            })
    }

    pub fn worker_task(&self, id: BuildingId) -> WorkerTask {
        self.worker_tasks.get(&id).copied().unwrap_or_default()
    }

    /// The non-getting granaries cache of the current tick.
    ///
    /// Fails until [`City::refresh_stocks`] has run for this tick.
    pub fn stocks(&self) -> Result<&NonGettingGranaries, StorageError> {
        match &self.stocks {
            Some(stocks) if stocks.tick == self.sim_state.tick => Ok(stocks),
            _ => Err(StorageError::StocksNotComputed),
        }
    }

    pub fn state_hash(&self) -> u64 {
        self.last_state_hash
    }

    // -----------------------------------------------------------------------
    // Traders
    // -----------------------------------------------------------------------

    /// Register a trader entering the map. Its per-trip capacities come from
    /// the route store.
    pub fn add_trader(
        &mut self,
        kind: TraderKind,
        route: Option<TradeRouteId>,
        position: TilePoint,
        routes: &dyn TradeRoutes,
    ) -> TraderId {
        let units = routes.units_per_trip(kind);
        self.traders
            .insert(Trader::new(kind, route, position, units, units))
    }

    pub fn remove_trader(&mut self, id: TraderId) -> Result<Trader, StorageError> {
        self.traders.remove(id).ok_or(StorageError::TraderNotFound)
    }

    pub fn trader(&self, id: TraderId) -> Result<&Trader, StorageError> {
        self.traders.get(id).ok_or(StorageError::TraderNotFound)
    }

    pub fn traders(&self) -> impl Iterator<Item = (TraderId, &Trader)> {
        self.traders.iter()
    }

    // -----------------------------------------------------------------------
    // Commands and events
    // -----------------------------------------------------------------------

    /// Queue a policy edit for the next tick boundary.
    pub fn queue_command(&mut self, command: StorageCommand) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &CommandQueue {
        &self.commands
    }

    pub fn commands_mut(&mut self) -> &mut CommandQueue {
        &mut self.commands
    }

    pub fn on_event(&mut self, kind: EventKind, listener: PassiveListener) {
        self.event_bus.on_passive(kind, listener);
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn event_bus_mut(&mut self) -> &mut EventBus {
        &mut self.event_bus
    }

    pub(crate) fn emit(&mut self, event: Event) {
        self.event_bus.emit(event);
    }

    // -----------------------------------------------------------------------
    // Step
    // -----------------------------------------------------------------------

    /// Run one tick of the distribution pipeline.
    pub fn step(&mut self, services: &mut Services<'_>) -> StepResult {
        let mut result = StepResult::default();
        self.phase_commands(&mut result);
        self.refresh_stocks();
        self.phase_workers(&mut result);
        self.phase_trade(services, &mut result);
        self.event_bus.deliver();
        self.phase_bookkeeping();
        result
    }

    fn phase_commands(&mut self, result: &mut StepResult) {
        let tick = self.sim_state.tick;
        let step = self.config.quantity_step;
        for command in self.commands.drain(tick) {
            match command.apply(&mut self.storages, step) {
                Ok(()) => result.commands_applied += 1,
                Err(err) => {
                    warn!(?command, %err, "dropping storage command");
                    result.commands_rejected += 1;
                }
            }
        }
    }

    fn phase_workers(&mut self, result: &mut StepResult) {
        let tick = self.sim_state.tick;
        let Ok(stocks) = self.stocks() else {
            return;
        };

        let mut resolved = Vec::with_capacity(self.buildings.len());
        for building in self.buildings.values() {
            let task = match building.kind {
                StorageKind::Granary => self.granary_determine_worker_task(building.id, stocks),
                StorageKind::Warehouse => self.warehouse_determine_worker_task(building.id),
            };
            if let Ok(task) = task {
                resolved.push((building.id, task));
            }
        }

        for (id, task) in resolved {
            if !task.is_idle() {
                result.busy_workers += 1;
                debug!(building = id.0, ?task, "worker task");
            }
            let previous = self.worker_tasks.insert(id, task);
            if previous != Some(task) {
                self.emit(Event::WorkerTaskAssigned {
                    building: id,
                    task,
                    tick,
                });
            }
        }
    }

    fn phase_trade(&mut self, services: &Services<'_>, result: &mut StepResult) {
        let waiting: Vec<TraderId> = self
            .traders
            .iter()
            .filter(|(_, t)| t.state == TraderState::AwaitingDestination)
            .map(|(id, _)| id)
            .collect();

        for id in waiting {
            match self.route_trader(id, services) {
                Ok(TradeDecision::Visit { .. }) => result.traders_routed += 1,
                Ok(TradeDecision::Leave { .. }) => result.traders_leaving += 1,
                Err(err) => warn!(%err, "trader vanished before routing"),
            }
        }
    }

    fn phase_bookkeeping(&mut self) {
        self.sim_state.tick += 1;
        self.last_state_hash = self.compute_state_hash();
    }

    /// Deterministic hash over tick, ledgers, policies and trader states.
    pub fn compute_state_hash(&self) -> u64 {
        let mut hasher = StateHash::new();
        hasher.write_u64(self.sim_state.tick);

        for building in self.buildings.values() {
            hasher.write_u32(building.id.0);
            for resource in crate::resource::Resource::ALL {
                hasher.write_u32(building.resources.get(resource));
            }
            if let Ok(record) = self.storages.get(building.storage_id) {
                hasher.write_u32(record.permissions.bits());
                hasher.write_u8(u8::from(record.empty_all));
                for setting in &record.resource_state {
                    hasher.write_u8(setting.state.as_u8());
                    hasher.write_u8(setting.quantity);
                }
            }
        }

        for (_, trader) in &self.traders {
            hasher.write_u32(trader.sell_capacity);
            hasher.write_u32(trader.buy_capacity);
            hasher.write_u8(trader.state.tag());
        }

        hasher.finish()
    }

    /// Access tile for a building: the preferred tile if it touches a road,
    /// else any road next to the footprint, else the origin.
    pub fn access_tile(&self, building: &Building, roads: &dyn RoadNetwork) -> TilePoint {
        roads
            .road_access_near(building.preferred_access_tile(), 1)
            .or_else(|| roads.road_access_near(building.origin, building.size))
            .unwrap_or(building.origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageState;
    use crate::test_utils::*;

    #[test]
    fn add_and_remove_building_recycles_storage() {
        let mut city = City::default();
        let a = city.add_storage_building(StorageKind::Granary, site(0, 0));
        let b = city.add_storage_building(StorageKind::Warehouse, site(10, 0));
        assert_eq!(city.building(a).unwrap().storage_id, StorageId(1));
        assert_eq!(city.building(b).unwrap().storage_id, StorageId(2));

        let removed = city.remove_storage_building(a).unwrap();
        assert!(city.building(a).is_err());
        assert!(city.storage(removed.storage_id).is_err());

        let c = city.add_storage_building(StorageKind::Warehouse, site(20, 0));
        assert_eq!(city.building(c).unwrap().storage_id, StorageId(1));
    }

    #[test]
    fn restore_brings_back_policy_and_stock() {
        let mut city = City::default();
        let a = city.add_storage_building(StorageKind::Granary, site(0, 0));
        set_stock(&mut city, a, crate::resource::Resource::Wheat, 6);
        city.storages
            .cycle_state(StorageId(1), crate::resource::Resource::Wheat)
            .unwrap();

        let removed = city.remove_storage_building(a).unwrap();
        assert_eq!(city.restore_storage_building(removed), Ok(a));
        let view = city.view(a).unwrap();
        assert_eq!(view.amount(crate::resource::Resource::Wheat), 6);
        assert_eq!(
            view.record.state(crate::resource::Resource::Wheat),
            StorageState::Getting
        );
    }

    #[test]
    fn accept_nothing_config_applies_to_new_records() {
        let mut config = StorageConfig::default();
        config.warehouses_accept_nothing = true;
        let mut city = City::new(config);
        let id = city.add_storage_building(StorageKind::Warehouse, site(0, 0));
        let view = city.view(id).unwrap();
        assert_eq!(
            view.record.state(crate::resource::Resource::Oil),
            StorageState::NotAccepting
        );
    }

    #[test]
    fn stocks_unavailable_before_refresh_and_after_tick() {
        let mut city = City::default();
        assert_eq!(city.stocks().err(), Some(StorageError::StocksNotComputed));
        city.refresh_stocks();
        assert!(city.stocks().is_ok());

        let mut world = TestWorld::new();
        city.step(&mut world.services());
        assert_eq!(city.stocks().err(), Some(StorageError::StocksNotComputed));
    }

    #[test]
    fn step_advances_tick_and_hash() {
        let mut city = City::default();
        city.add_storage_building(StorageKind::Granary, site(0, 0));
        let mut world = TestWorld::new();

        city.step(&mut world.services());
        let first = city.state_hash();
        city.step(&mut world.services());
        assert_eq!(city.sim_state.tick, 2);
        assert_ne!(first, city.state_hash());
    }
}
