//! Binary storage buffer, the save-game form of a [`StorageStore`].
//!
//! Current layout, little-endian:
//!
//! ```text
//! u32 record_size
//! repeat:
//!     i32 permissions | i32 building_id | u8 in_use | u8 empty_all
//!     { u8 state, u8 quantity } x N        N = (record_size - 10) / 2
//! ```
//!
//! Every slot is written, slot 0 and unused slots included, so ids survive
//! a round trip. Readers take the first `min(N, RESOURCE_COUNT)` pairs and
//! skip the rest of each record; resources a short record does not cover
//! keep their defaults. Older layouts are upgraded through
//! [`crate::migration`] before they reach the current reader.

use tracing::debug;

use crate::city::City;
use crate::id::BuildingId;
use crate::migration::{MigrationError, MigrationRegistry, StorageFormat};
use crate::resource::RESOURCE_COUNT;
use crate::storage::{Permissions, ResourceSetting, StorageRecord, StorageState, StorageStore};

/// Bytes before the per-resource section of a record.
pub const RECORD_PREFIX_SIZE: u32 = 10;

/// Size of a record written by this build.
pub const CURRENT_RECORD_SIZE: u32 = RECORD_PREFIX_SIZE + 2 * RESOURCE_COUNT as u32;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("storage buffer too short: needed {needed} bytes, {available} available")]
    TooShort { needed: usize, available: usize },
    #[error("storage record size {0} is smaller than the fixed prefix")]
    RecordTooSmall(u32),
    #[error("storage buffer migration failed: {0}")]
    Migration(#[from] MigrationError),
}

// ---------------------------------------------------------------------------
// Byte cursor
// ---------------------------------------------------------------------------

/// Little-endian cursor over a borrowed buffer.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::TooShort {
                needed: self.pos + n,
                available: self.data.len(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u32(&mut self) -> Result<u32, DecodeError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn i32(&mut self) -> Result<i32, DecodeError> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Fixed fields shared by every layout.
pub(crate) struct RecordPrefix {
    pub permissions: i32,
    pub building_id: i32,
    pub in_use: u8,
    pub empty_all: u8,
}

impl RecordPrefix {
    pub(crate) fn read(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            permissions: reader.i32()?,
            building_id: reader.i32()?,
            in_use: reader.u8()?,
            empty_all: reader.u8()?,
        })
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.permissions.to_le_bytes());
        out.extend_from_slice(&self.building_id.to_le_bytes());
        out.push(self.in_use);
        out.push(self.empty_all);
    }

    fn of(record: &StorageRecord) -> Self {
        Self {
            permissions: record.permissions.bits() as i32,
            building_id: record.building_id.0 as i32,
            in_use: u8::from(record.in_use),
            empty_all: u8::from(record.empty_all),
        }
    }
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

pub fn encode_storages(store: &StorageStore) -> Vec<u8> {
    let records = store.raw_records();
    let mut out = Vec::with_capacity(4 + records.len() * CURRENT_RECORD_SIZE as usize);
    out.extend_from_slice(&CURRENT_RECORD_SIZE.to_le_bytes());
    for record in records {
        RecordPrefix::of(record).write(&mut out);
        for setting in &record.resource_state {
            out.push(setting.state.as_u8());
            out.push(setting.quantity);
        }
    }
    out
}

/// Decode a buffer in the current layout.
pub fn decode_storages(data: &[u8]) -> Result<StorageStore, DecodeError> {
    let mut reader = ByteReader::new(data);
    let record_size = reader.u32()?;
    if record_size < RECORD_PREFIX_SIZE {
        return Err(DecodeError::RecordTooSmall(record_size));
    }
    let pairs = ((record_size - RECORD_PREFIX_SIZE) / 2) as usize;
    let tail = record_size as usize - RECORD_PREFIX_SIZE as usize - 2 * pairs.min(RESOURCE_COUNT);

    let mut records = Vec::with_capacity(reader.remaining() / record_size as usize);
    while reader.remaining() > 0 {
        let prefix = RecordPrefix::read(&mut reader)?;
        let mut record = StorageRecord::unused();
        record.permissions = Permissions::from_bits(prefix.permissions as u32);
        record.building_id = BuildingId(prefix.building_id.max(0) as u32);
        record.in_use = prefix.in_use != 0;
        record.empty_all = prefix.empty_all != 0;
        for setting in record.resource_state.iter_mut().take(pairs) {
            let state = StorageState::from_u8(reader.u8()?);
            *setting = ResourceSetting::new(state, reader.u8()?);
        }
        reader.take(tail)?;
        records.push(record);
    }
    Ok(StorageStore::from_records(records))
}

/// Decode a buffer written by a game of `save_version`, upgrading older
/// layouts first.
pub fn decode_storages_from_save(
    data: &[u8],
    save_version: u32,
) -> Result<StorageStore, DecodeError> {
    let format = StorageFormat::for_save_version(save_version);
    if format == StorageFormat::Current {
        return decode_storages(data);
    }
    debug!(save_version, ?format, "upgrading legacy storage buffer");
    let upgraded = MigrationRegistry::storage_formats().migrate(
        data,
        format.version(),
        StorageFormat::Current.version(),
    )?;
    decode_storages(&upgraded)
}

impl City {
    pub fn save_storages(&self) -> Vec<u8> {
        encode_storages(&self.storages)
    }

    /// Replace every storage record from a save buffer. Building stock is
    /// not part of the buffer; see [`City::migrate_granary_units`].
    pub fn load_storages(&mut self, data: &[u8], save_version: u32) -> Result<(), DecodeError> {
        self.storages = decode_storages_from_save(data, save_version)?;
        self.stocks = None;
        Ok(())
    }
}
