//! Whole-city snapshots for quick save and undo.
//!
//! Unlike the storage buffer in [`crate::codec`], a snapshot is private to
//! this build: bitcode-encoded behind a magic/version header, covering
//! buildings, storage records, traders and worker tasks. The event bus and
//! its listeners, the command queue and the non-getting granary cache are
//! left out; the cache is rebuilt on the next step.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::building::Building;
use crate::city::City;
use crate::command_queue::CommandQueue;
use crate::config::StorageConfig;
use crate::event::EventBus;
use crate::id::{BuildingId, TraderId};
use crate::sim::{SimState, Ticks};
use crate::storage::StorageStore;
use crate::task::WorkerTask;
use crate::trade::Trader;

/// Identifies a city snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0x4852_4D01;

/// Snapshot layout version of this build.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported snapshot version {0} (expected {FORMAT_VERSION})")]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build reads up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    pub tick: Ticks,
}

impl SnapshotHeader {
    pub fn new(tick: Ticks) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            tick,
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct CitySnapshot {
    header: SnapshotHeader,
    config: StorageConfig,
    sim_state: SimState,
    storages: StorageStore,
    buildings: BTreeMap<BuildingId, Building>,
    next_building_id: u32,
    traders: SlotMap<TraderId, Trader>,
    worker_tasks: BTreeMap<BuildingId, WorkerTask>,
    last_state_hash: u64,
}

/// Decode only to read the header.
pub fn read_snapshot_header(data: &[u8]) -> Result<SnapshotHeader, DeserializeError> {
    let snapshot: CitySnapshot =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    Ok(snapshot.header)
}

impl City {
    pub fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        let snapshot = CitySnapshot {
            header: SnapshotHeader::new(self.sim_state.tick),
            config: self.config.clone(),
            sim_state: self.sim_state.clone(),
            storages: self.storages.clone(),
            buildings: self.buildings.clone(),
            next_building_id: self.next_building_id,
            traders: self.traders.clone(),
            worker_tasks: self.worker_tasks.clone(),
            last_state_hash: self.last_state_hash,
        };
        bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
    }

    /// Rebuild a city from [`City::serialize`] output. Listeners must be
    /// registered again.
    pub fn deserialize(data: &[u8]) -> Result<Self, DeserializeError> {
        let snapshot: CitySnapshot =
            bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
        snapshot.header.validate()?;
        Ok(City {
            config: snapshot.config,
            sim_state: snapshot.sim_state,
            storages: snapshot.storages,
            buildings: snapshot.buildings,
            next_building_id: snapshot.next_building_id,
            traders: snapshot.traders,
            stocks: None,
            worker_tasks: snapshot.worker_tasks,
            commands: CommandQueue::new(),
            last_state_hash: snapshot.last_state_hash,
            event_bus: EventBus::default(),
        })
    }

    pub fn take_snapshot(&self, history: &mut SnapshotHistory) -> Result<(), SerializeError> {
        let data = self.serialize()?;
        history.push(self.sim_state.tick, data);
        Ok(())
    }

    /// Restore the `index`-th snapshot (0 is the oldest). `Ok(None)` when
    /// there is no such entry.
    pub fn restore_snapshot(
        history: &SnapshotHistory,
        index: usize,
    ) -> Result<Option<City>, DeserializeError> {
        history
            .get(index)
            .map(|(_, data)| City::deserialize(data))
            .transpose()
    }
}

// ---------------------------------------------------------------------------
// Undo history
// ---------------------------------------------------------------------------

/// Bounded list of encoded snapshots; pushing past capacity drops the
/// oldest.
#[derive(Debug)]
pub struct SnapshotHistory {
    entries: VecDeque<(Ticks, Vec<u8>)>,
    capacity: usize,
    total_taken: u64,
}

impl SnapshotHistory {
    /// A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            total_taken: 0,
        }
    }

    pub fn push(&mut self, tick: Ticks, data: Vec<u8>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((tick, data));
        self.total_taken += 1;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_taken(&self) -> u64 {
        self.total_taken
    }

    pub fn get(&self, index: usize) -> Option<(Ticks, &[u8])> {
        self.entries
            .get(index)
            .map(|(tick, data)| (*tick, data.as_slice()))
    }

    pub fn latest(&self) -> Option<(Ticks, &[u8])> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ===========================================================================
// Tests
// ===========================================================================
