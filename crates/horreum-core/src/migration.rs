//! Save-format upgrades.
//!
//! Storage buffers went through three layouts over the game's history.
//! Each layout has a small format number; a [`MigrationRegistry`] holds one
//! byte-level upgrade per step and chains them, so a buffer from any save
//! version reaches the current layout before it is decoded.
//!
//! | save version      | layout                                           |
//! |-------------------|--------------------------------------------------|
//! | `< 0x86`          | fixed 32-byte records, one packed byte/resource  |
//! | `0x86 ..= 0x8a`   | size-prefixed, one packed byte/resource          |
//! | `>= 0x8b`         | size-prefixed, separate state and quantity bytes |
//!
//! Packed layouts use the legacy 16-slot resource enumeration, which is
//! remapped here as well.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::building::StorageKind;
use crate::city::City;
use crate::codec::{ByteReader, CURRENT_RECORD_SIZE, RECORD_PREFIX_SIZE, RecordPrefix};
use crate::resource::{LEGACY_RESOURCE_COUNT, RESOURCE_COUNT, Resource, ResourceLedger};
use crate::storage::{ResourceSetting, decode_legacy_state};

/// First save version with size-prefixed storage records.
pub const SAVE_VERSION_SIZED_RECORDS: u32 = 0x86;
/// First save version storing granary food in cartload units.
pub const SAVE_VERSION_GRANARY_UNITS: u32 = 0x89;
/// First save version with separate state and quantity bytes.
pub const SAVE_VERSION_SPLIT_STATE: u32 = 0x8b;

/// Granary food in old saves was kept in hundredths of a unit.
pub const LEGACY_GRANARY_SCALE: u32 = 100;

/// Size of one record in the oldest layout.
pub const FIXED_LEGACY_RECORD_SIZE: usize = 32;
const FIXED_LEGACY_PAD: usize = 6;

/// Errors that can occur while upgrading a buffer.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("no migration path from format {from} to format {to}")]
    NoMigrationPath { from: u32, to: u32 },
    #[error("migration from format {from} to format {to} failed: {reason}")]
    MigrationFailed { from: u32, to: u32, reason: String },
}

// ---------------------------------------------------------------------------
// Formats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StorageFormat {
    FixedLegacy,
    SizedPacked,
    Current,
}

impl StorageFormat {
    pub fn for_save_version(save_version: u32) -> StorageFormat {
        if save_version < SAVE_VERSION_SIZED_RECORDS {
            StorageFormat::FixedLegacy
        } else if save_version < SAVE_VERSION_SPLIT_STATE {
            StorageFormat::SizedPacked
        } else {
            StorageFormat::Current
        }
    }

    /// Registry key of the layout.
    pub fn version(self) -> u32 {
        match self {
            StorageFormat::FixedLegacy => 1,
            StorageFormat::SizedPacked => 2,
            StorageFormat::Current => 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Upgrades `data` from format `N` to `N + 1`.
pub type MigrationFn = fn(&[u8]) -> Result<Vec<u8>, MigrationError>;

/// Upgrade steps keyed by source format.
#[derive(Debug, Default)]
pub struct MigrationRegistry {
    migrations: BTreeMap<u32, MigrationFn>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every storage-buffer step this build knows.
    pub fn storage_formats() -> Self {
        let mut registry = Self::new();
        registry.register(StorageFormat::FixedLegacy.version(), fixed_to_sized);
        registry.register(StorageFormat::SizedPacked.version(), packed_to_split);
        registry
    }

    pub fn register(&mut self, from_version: u32, migrate: MigrationFn) {
        self.migrations.insert(from_version, migrate);
    }

    pub fn can_migrate(&self, from: u32, to: u32) -> bool {
        if from >= to {
            return from == to;
        }
        (from..to).all(|v| self.migrations.contains_key(&v))
    }

    /// Chain registered steps from `from` to `to`. Identity when equal.
    pub fn migrate(&self, data: &[u8], from: u32, to: u32) -> Result<Vec<u8>, MigrationError> {
        if from > to {
            return Err(MigrationError::NoMigrationPath { from, to });
        }
        let mut current = data.to_vec();
        for version in from..to {
            let step = self
                .migrations
                .get(&version)
                .ok_or(MigrationError::NoMigrationPath { from, to })?;
            current = step(&current)?;
        }
        Ok(current)
    }

    pub fn step_count(&self) -> usize {
        self.migrations.len()
    }
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

fn failed(from: StorageFormat, reason: impl ToString) -> MigrationError {
    MigrationError::MigrationFailed {
        from: from.version(),
        to: from.version() + 1,
        reason: reason.to_string(),
    }
}

/// Drop the trailing pad of each fixed record and add a size header.
fn fixed_to_sized(data: &[u8]) -> Result<Vec<u8>, MigrationError> {
    if data.len() % FIXED_LEGACY_RECORD_SIZE != 0 {
        return Err(failed(
            StorageFormat::FixedLegacy,
            format!(
                "{} bytes is not a whole number of {FIXED_LEGACY_RECORD_SIZE}-byte records",
                data.len()
            ),
        ));
    }
    let kept = FIXED_LEGACY_RECORD_SIZE - FIXED_LEGACY_PAD;
    let mut out = Vec::with_capacity(4 + data.len() / FIXED_LEGACY_RECORD_SIZE * kept);
    out.extend_from_slice(&(kept as u32).to_le_bytes());
    for record in data.chunks_exact(FIXED_LEGACY_RECORD_SIZE) {
        out.extend_from_slice(&record[..kept]);
    }
    Ok(out)
}

/// Expand packed policy bytes into (state, quantity) pairs in the current
/// resource enumeration.
fn packed_to_split(data: &[u8]) -> Result<Vec<u8>, MigrationError> {
    let from = StorageFormat::SizedPacked;
    let mut reader = ByteReader::new(data);
    let record_size = reader.u32().map_err(|e| failed(from, e))?;
    if record_size < RECORD_PREFIX_SIZE {
        return Err(failed(from, format!("record size {record_size}")));
    }
    let packed = (record_size - RECORD_PREFIX_SIZE) as usize;

    let mut out = CURRENT_RECORD_SIZE.to_le_bytes().to_vec();
    let mut unknown = 0usize;
    while reader.remaining() > 0 {
        let prefix = RecordPrefix::read(&mut reader).map_err(|e| failed(from, e))?;
        let bytes = reader.take(packed).map_err(|e| failed(from, e))?;
        let settings = remap_packed_states(bytes, &mut unknown);
        prefix.write(&mut out);
        for setting in settings {
            out.push(setting.state.as_u8());
            out.push(setting.quantity);
        }
    }
    if unknown > 0 {
        warn!(unknown, "legacy storage buffer held unknown policy bytes");
    }
    Ok(out)
}

/// Decode legacy-ordered packed bytes. Resources the old enumeration lacks
/// keep their defaults; bytes past it are ignored.
pub fn remap_packed_states(bytes: &[u8], unknown: &mut usize) -> [ResourceSetting; RESOURCE_COUNT] {
    let mut settings = [ResourceSetting::default(); RESOURCE_COUNT];
    for (index, &byte) in bytes.iter().enumerate().take(LEGACY_RESOURCE_COUNT) {
        let Some(resource) = Resource::from_legacy_index(index) else {
            continue;
        };
        if byte > 11 {
            *unknown += 1;
        }
        settings[resource.index()] = decode_legacy_state(byte);
    }
    settings
}

/// Legacy-ordered unit counts as a current ledger.
pub fn ledger_from_legacy(amounts: &[u32]) -> ResourceLedger {
    let mut ledger = ResourceLedger::new();
    for (index, &amount) in amounts.iter().enumerate() {
        if let Some(resource) = Resource::from_legacy_index(index) {
            ledger.set(resource, amount);
        }
    }
    ledger
}

impl City {
    /// Convert granary stock of saves older than
    /// [`SAVE_VERSION_GRANARY_UNITS`] to cartload units and rebuild the
    /// free-space slot. Returns how many granaries were converted.
    pub fn migrate_granary_units(&mut self, save_version: u32) -> usize {
        if save_version >= SAVE_VERSION_GRANARY_UNITS {
            return 0;
        }
        let ids = self.building_ids(StorageKind::Granary);
        for &id in &ids {
            if let Some(building) = self.buildings.get_mut(&id) {
                for food in Resource::FOODS {
                    let scaled = building.resources.get(food) / LEGACY_GRANARY_SCALE;
                    building.resources.set(food, scaled);
                }
                building.recompute_free_space();
            }
        }
        info!(save_version, granaries = ids.len(), "granary stock rescaled");
        self.stocks = None;
        ids.len()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
