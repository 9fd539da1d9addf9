//! Per-building storage policies.
//!
//! A [`StorageRecord`] holds, for one granary or warehouse, the policy state
//! and quantity cap of every resource, the transporter permission bits and
//! the `empty_all` flag. Records live in a [`StorageStore`]: a growable slot
//! vector indexed by [`StorageId`] with `in_use` flags, where freed slots are
//! recycled and slot 0 is never handed out.
//!
//! The store knows nothing about the units a building actually holds; the
//! ledgers in [`crate::granary`] and [`crate::warehouse`] consult it before
//! mutating.

use crate::id::{BuildingId, StorageId};
use crate::resource::{RESOURCE_COUNT, Resource};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Policy state and quantities
// ---------------------------------------------------------------------------

/// Policy for one (building, resource) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StorageState {
    #[default]
    Accepting = 0,
    NotAccepting = 1,
    /// Actively pull the resource from other storage buildings.
    Getting = 2,
    /// Accept passively but never act as a donor.
    Maintaining = 3,
}

impl StorageState {
    /// Decode a persisted state byte. Unknown values reset to `Accepting`.
    pub fn from_u8(value: u8) -> StorageState {
        match value {
            1 => StorageState::NotAccepting,
            2 => StorageState::Getting,
            3 => StorageState::Maintaining,
            _ => StorageState::Accepting,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Next state in the UI cycle:
    /// `Accepting -> Getting -> Maintaining -> NotAccepting -> Accepting`.
    pub fn next(self) -> StorageState {
        match self {
            StorageState::Accepting => StorageState::Getting,
            StorageState::Getting => StorageState::Maintaining,
            StorageState::Maintaining => StorageState::NotAccepting,
            StorageState::NotAccepting => StorageState::Accepting,
        }
    }
}

pub const QUANTITY_4: u8 = 4;
pub const QUANTITY_8: u8 = 8;
pub const QUANTITY_12: u8 = 12;
pub const QUANTITY_16: u8 = 16;
pub const QUANTITY_20: u8 = 20;
pub const QUANTITY_24: u8 = 24;
pub const QUANTITY_28: u8 = 28;
pub const QUANTITY_32: u8 = 32;
/// Largest quantity cap; also the cap of every freshly created record.
pub const QUANTITY_MAX: u8 = QUANTITY_32;

/// State and quantity cap of one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceSetting {
    pub state: StorageState,
    pub quantity: u8,
}

impl ResourceSetting {
    pub const fn new(state: StorageState, quantity: u8) -> Self {
        Self { state, quantity }
    }

    /// Units the building is willing to hold. Always 0 when not accepting.
    pub fn effective_max(&self) -> u32 {
        match self.state {
            StorageState::NotAccepting => 0,
            _ => u32::from(self.quantity),
        }
    }

    /// Neither getting nor maintaining: stock here may be pulled elsewhere.
    pub fn is_donor_state(&self) -> bool {
        !matches!(self.state, StorageState::Getting | StorageState::Maintaining)
    }
}

impl Default for ResourceSetting {
    fn default() -> Self {
        Self::new(StorageState::Accepting, QUANTITY_MAX)
    }
}

/// Decode the packed single-byte policy of older saves.
///
/// Values 0..=11 map to fixed `(state, cap)` pairs; anything else decodes
/// to `(NotAccepting, MAX)`.
pub fn decode_legacy_state(byte: u8) -> ResourceSetting {
    use StorageState::*;
    let (state, quantity) = match byte {
        0 => (Accepting, QUANTITY_MAX),
        1 => (NotAccepting, QUANTITY_MAX),
        2 => (Getting, QUANTITY_MAX),
        3 => (Accepting, QUANTITY_16),
        4 => (Accepting, QUANTITY_8),
        5 => (Getting, QUANTITY_16),
        6 => (Getting, QUANTITY_8),
        7 => (Getting, QUANTITY_24),
        8 => (Accepting, QUANTITY_24),
        9 => (Maintaining, QUANTITY_MAX),
        10 => (Maintaining, QUANTITY_24),
        11 => (Maintaining, QUANTITY_16),
        _ => (NotAccepting, QUANTITY_MAX),
    };
    ResourceSetting::new(state, quantity)
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

/// Transporter classes that can be allowed or denied access to a storage
/// building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Permission {
    Market = 0,
    Traders = 1,
    Dock = 2,
    Quartermaster = 3,
    Barkeep = 4,
    Caravanserai = 5,
    Workcamp = 6,
    Armoury = 7,
    Natives = 8,
}

impl Permission {
    pub const ALL: [Permission; 9] = [
        Permission::Market,
        Permission::Traders,
        Permission::Dock,
        Permission::Quartermaster,
        Permission::Barkeep,
        Permission::Caravanserai,
        Permission::Workcamp,
        Permission::Armoury,
        Permission::Natives,
    ];

    fn bit(self) -> u32 {
        1 << (self as u8)
    }
}

/// Permission bitset with **inverted** meaning: a set bit is an explicit
/// denial, so an all-zero set permits everyone.
///
/// Read it only through [`Permissions::is_permitted`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permissions(u32);

impl Permissions {
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn is_permitted(self, permission: Permission) -> bool {
        self.0 & permission.bit() == 0
    }

    /// Flip between permitted and denied.
    pub fn toggle(&mut self, permission: Permission) {
        self.0 ^= permission.bit();
    }
}

// ---------------------------------------------------------------------------
// Storage record
// ---------------------------------------------------------------------------

/// Storage policy of one building.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageRecord {
    pub in_use: bool,
    pub building_id: BuildingId,
    /// Push out all stock regardless of per-resource state.
    pub empty_all: bool,
    pub permissions: Permissions,
    pub resource_state: [ResourceSetting; RESOURCE_COUNT],
}

impl StorageRecord {
    pub(crate) fn unused() -> Self {
        Self {
            in_use: false,
            building_id: BuildingId::NONE,
            empty_all: false,
            permissions: Permissions::default(),
            resource_state: [ResourceSetting::default(); RESOURCE_COUNT],
        }
    }

    fn fresh(building_id: BuildingId, initial: StorageState) -> Self {
        Self {
            in_use: true,
            building_id,
            empty_all: false,
            permissions: Permissions::default(),
            resource_state: [ResourceSetting::new(initial, QUANTITY_MAX); RESOURCE_COUNT],
        }
    }

    pub fn setting(&self, resource: Resource) -> ResourceSetting {
        self.resource_state[resource.index()]
    }

    pub fn state(&self, resource: Resource) -> StorageState {
        self.setting(resource).state
    }

    pub fn is_permitted(&self, permission: Permission) -> bool {
        self.permissions.is_permitted(permission)
    }

    fn set_all_states(&mut self, state: StorageState) {
        for setting in &mut self.resource_state {
            setting.state = state;
        }
    }
}

/// Errors for storage and ledger lookups. Policy denials are not errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("storage record {0:?} not found")]
    StorageNotFound(StorageId),
    #[error("storage record {0:?} is already in use")]
    StorageInUse(StorageId),
    #[error("building {0:?} not found")]
    BuildingNotFound(BuildingId),
    #[error("building {building:?} is not a {expected}")]
    WrongBuildingKind {
        building: BuildingId,
        expected: &'static str,
    },
    #[error("non-getting granary stocks have not been computed yet")]
    StocksNotComputed,
    #[error("trader not found")]
    TraderNotFound,
}

// ---------------------------------------------------------------------------
// Storage store
// ---------------------------------------------------------------------------

/// Arena of storage records with recyclable ids.
///
/// `size` is the logical slot count. Trimming lowers it but leaves the
/// records in place, so a deleted tail record can still be restored intact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageStore {
    records: Vec<StorageRecord>,
    size: usize,
}

impl Default for StorageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageStore {
    pub fn new() -> Self {
        Self {
            records: vec![StorageRecord::unused()],
            size: 1,
        }
    }

    /// Rebuild a store from decoded records. Slot 0 is forced unused.
    pub fn from_records(mut records: Vec<StorageRecord>) -> Self {
        if records.is_empty() {
            records.push(StorageRecord::unused());
        } else {
            records[0] = StorageRecord::unused();
        }
        let size = records.len();
        let mut store = Self { records, size };
        store.trim();
        store
    }

    /// Allocate a record for `building_id`, reusing the lowest free slot.
    ///
    /// Every resource starts at `QUANTITY_MAX`; the state is `Accepting`
    /// unless `accept_none` is set.
    pub fn create(&mut self, building_id: BuildingId, accept_none: bool) -> StorageId {
        let initial = if accept_none {
            StorageState::NotAccepting
        } else {
            StorageState::Accepting
        };
        let record = StorageRecord::fresh(building_id, initial);

        let index = self.records[1..self.size]
            .iter()
            .position(|r| !r.in_use)
            .map_or(self.size, |pos| pos + 1);
        if index == self.size {
            self.size += 1;
        }
        match self.records.get_mut(index) {
            Some(slot) => *slot = record,
            None => self.records.push(record),
        }
        StorageId(index as u32)
    }

    /// Mark a record unused. The owning building's ledger is left untouched.
    pub fn delete(&mut self, id: StorageId) -> Result<(), StorageError> {
        let record = self.get_slot_mut(id)?;
        record.in_use = false;
        self.trim();
        Ok(())
    }

    /// Re-activate a deleted record (undo).
    pub fn restore(&mut self, id: StorageId) -> Result<StorageId, StorageError> {
        if id.is_none() {
            return Err(StorageError::StorageNotFound(id));
        }
        let record = self
            .records
            .get_mut(id.index())
            .ok_or(StorageError::StorageNotFound(id))?;
        if record.in_use {
            return Err(StorageError::StorageInUse(id));
        }
        record.in_use = true;
        self.size = self.size.max(id.index() + 1);
        Ok(id)
    }

    /// Shrink the logical size past unused tail slots.
    fn trim(&mut self) {
        while self.size > 1 && !self.records[self.size - 1].in_use {
            self.size -= 1;
        }
    }

    fn get_slot_mut(&mut self, id: StorageId) -> Result<&mut StorageRecord, StorageError> {
        if id.is_none() {
            return Err(StorageError::StorageNotFound(id));
        }
        self.records
            .get_mut(id.index())
            .ok_or(StorageError::StorageNotFound(id))
    }

    /// Active record for `id`.
    pub fn get(&self, id: StorageId) -> Result<&StorageRecord, StorageError> {
        if id.is_none() {
            return Err(StorageError::StorageNotFound(id));
        }
        self.records
            .get(id.index())
            .filter(|r| r.in_use)
            .ok_or(StorageError::StorageNotFound(id))
    }

    pub fn get_mut(&mut self, id: StorageId) -> Result<&mut StorageRecord, StorageError> {
        let record = self.get_slot_mut(id)?;
        if !record.in_use {
            return Err(StorageError::StorageNotFound(id));
        }
        Ok(record)
    }

    /// Advance a resource's state through the UI cycle. Returns the new state.
    pub fn cycle_state(
        &mut self,
        id: StorageId,
        resource: Resource,
    ) -> Result<StorageState, StorageError> {
        let setting = &mut self.get_mut(id)?.resource_state[resource.index()];
        setting.state = setting.state.next();
        Ok(setting.state)
    }

    /// Step a quantity cap by `step` units, wrapping at both ends. A
    /// NOT_ACCEPTING resource is left untouched. Returns the new cap.
    pub fn cycle_quantity(
        &mut self,
        id: StorageId,
        resource: Resource,
        step: u8,
        reverse: bool,
    ) -> Result<u8, StorageError> {
        let setting = &mut self.get_mut(id)?.resource_state[resource.index()];
        if setting.state == StorageState::NotAccepting {
            return Ok(setting.quantity);
        }
        let step = step.max(1);
        setting.quantity = if reverse {
            match setting.quantity.checked_sub(step) {
                Some(q) if q >= step => q,
                _ => QUANTITY_MAX,
            }
        } else {
            match setting.quantity.checked_add(step) {
                Some(q) if q <= QUANTITY_MAX => q,
                _ => step,
            }
        };
        Ok(setting.quantity)
    }

    /// Toggle one permission bit.
    pub fn set_permission(
        &mut self,
        id: StorageId,
        permission: Permission,
    ) -> Result<(), StorageError> {
        self.get_mut(id)?.permissions.toggle(permission);
        Ok(())
    }

    /// Whether `permission` is granted (its denial bit is clear).
    pub fn get_permission(
        &self,
        id: StorageId,
        permission: Permission,
    ) -> Result<bool, StorageError> {
        Ok(self.get(id)?.is_permitted(permission))
    }

    pub fn accept_all(&mut self, id: StorageId) -> Result<(), StorageError> {
        self.get_mut(id)?.set_all_states(StorageState::Accepting);
        Ok(())
    }

    pub fn accept_none(&mut self, id: StorageId) -> Result<(), StorageError> {
        self.get_mut(id)?.set_all_states(StorageState::NotAccepting);
        Ok(())
    }

    pub fn toggle_empty_all(&mut self, id: StorageId) -> Result<bool, StorageError> {
        let record = self.get_mut(id)?;
        record.empty_all = !record.empty_all;
        Ok(record.empty_all)
    }

    /// Number of slots, including the reserved slot 0 and unused slots.
    pub fn slot_count(&self) -> usize {
        self.size
    }

    /// Every slot (used or not) with its id, skipping slot 0.
    pub fn slots(&self) -> impl Iterator<Item = (StorageId, &StorageRecord)> {
        self.records[..self.size]
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, r)| (StorageId(i as u32), r))
    }

    /// Active records in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (StorageId, &StorageRecord)> {
        self.slots().filter(|(_, r)| r.in_use)
    }

    pub(crate) fn raw_records(&self) -> &[StorageRecord] {
        &self.records[..self.size]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_one() -> (StorageStore, StorageId) {
        let mut store = StorageStore::new();
        let id = store.create(BuildingId(10), false);
        (store, id)
    }

    #[test]
    fn create_skips_reserved_slot() {
        let (store, id) = store_with_one();
        assert_eq!(id, StorageId(1));
        assert!(store.get(StorageId::NONE).is_err());
    }

    #[test]
    fn create_defaults_to_accepting_max() {
        let (store, id) = store_with_one();
        let record = store.get(id).unwrap();
        assert_eq!(record.building_id, BuildingId(10));
        for setting in &record.resource_state {
            assert_eq!(setting.state, StorageState::Accepting);
            assert_eq!(setting.quantity, QUANTITY_MAX);
        }
    }

    #[test]
    fn create_with_accept_none() {
        let mut store = StorageStore::new();
        let id = store.create(BuildingId(4), true);
        let record = store.get(id).unwrap();
        assert!(record
            .resource_state
            .iter()
            .all(|s| s.state == StorageState::NotAccepting && s.quantity == QUANTITY_MAX));
    }

    #[test]
    fn fresh_record_permits_everything() {
        let (store, id) = store_with_one();
        for permission in Permission::ALL {
            assert!(store.get_permission(id, permission).unwrap());
        }
    }

    #[test]
    fn set_permission_toggles_denial() {
        let (mut store, id) = store_with_one();
        store.set_permission(id, Permission::Dock).unwrap();
        assert!(!store.get_permission(id, Permission::Dock).unwrap());
        assert!(store.get_permission(id, Permission::Traders).unwrap());
        store.set_permission(id, Permission::Dock).unwrap();
        assert!(store.get_permission(id, Permission::Dock).unwrap());
    }

    #[test]
    fn delete_reuses_and_trims() {
        let mut store = StorageStore::new();
        let a = store.create(BuildingId(1), false);
        let b = store.create(BuildingId(2), false);
        let c = store.create(BuildingId(3), false);
        assert_eq!(store.slot_count(), 4);

        store.delete(b).unwrap();
        assert_eq!(store.slot_count(), 4);
        let d = store.create(BuildingId(4), false);
        assert_eq!(d, b);

        store.delete(c).unwrap();
        assert_eq!(store.slot_count(), 3);
        assert!(store.get(a).is_ok());
    }

    #[test]
    fn restore_reactivates_deleted_record() {
        let (mut store, id) = store_with_one();
        store.cycle_state(id, Resource::Oil).unwrap();
        store.delete(id).unwrap();
        assert!(store.get(id).is_err());

        assert_eq!(store.restore(id), Ok(id));
        let record = store.get(id).unwrap();
        assert_eq!(record.state(Resource::Oil), StorageState::Getting);
        assert_eq!(store.restore(id), Err(StorageError::StorageInUse(id)));
    }

    #[test]
    fn restore_after_tail_trim_keeps_record() {
        let mut store = StorageStore::new();
        let keep = store.create(BuildingId(4), false);
        let tail = store.create(BuildingId(10), false);
        store.cycle_state(tail, Resource::Oil).unwrap();
        store.cycle_quantity(tail, Resource::Wheat, 8, true).unwrap();
        store.delete(tail).unwrap();
        assert_eq!(store.slot_count(), 2);
        assert_eq!(store.raw_records().len(), 2);

        assert_eq!(store.restore(tail), Ok(tail));
        assert_eq!(store.slot_count(), 3);
        let record = store.get(tail).unwrap();
        assert_eq!(record.building_id, BuildingId(10));
        assert_eq!(record.state(Resource::Oil), StorageState::Getting);
        assert_eq!(record.setting(Resource::Wheat).quantity, QUANTITY_MAX - 8);
        assert!(store.get(keep).is_ok());
    }

    #[test]
    fn create_past_trimmed_tail_overwrites_slot() {
        let mut store = StorageStore::new();
        let first = store.create(BuildingId(1), false);
        store.delete(first).unwrap();
        assert_eq!(store.slot_count(), 1);

        let again = store.create(BuildingId(2), true);
        assert_eq!(again, first);
        assert_eq!(store.get(again).unwrap().building_id, BuildingId(2));
        assert_eq!(store.restore(StorageId(9)), Err(StorageError::StorageNotFound(StorageId(9))));
    }

    #[test]
    fn cycle_state_full_loop() {
        let (mut store, id) = store_with_one();
        let r = Resource::Wheat;
        assert_eq!(store.cycle_state(id, r).unwrap(), StorageState::Getting);
        assert_eq!(store.cycle_state(id, r).unwrap(), StorageState::Maintaining);
        assert_eq!(store.cycle_state(id, r).unwrap(), StorageState::NotAccepting);
        assert_eq!(store.cycle_state(id, r).unwrap(), StorageState::Accepting);
    }

    #[test]
    fn unknown_state_byte_resets_to_accepting() {
        assert_eq!(StorageState::from_u8(77), StorageState::Accepting);
        assert_eq!(StorageState::from_u8(3), StorageState::Maintaining);
    }

    #[test]
    fn cycle_quantity_wraps_forward_and_back() {
        let (mut store, id) = store_with_one();
        let r = Resource::Timber;
        // At MAX, forward wraps to the step.
        assert_eq!(store.cycle_quantity(id, r, 4, false).unwrap(), 4);
        assert_eq!(store.cycle_quantity(id, r, 4, false).unwrap(), 8);
        // Reverse from 8 to 4, then below the step wraps to MAX.
        assert_eq!(store.cycle_quantity(id, r, 4, true).unwrap(), 4);
        assert_eq!(store.cycle_quantity(id, r, 4, true).unwrap(), QUANTITY_MAX);
    }

    #[test]
    fn cycle_quantity_step_eight() {
        let (mut store, id) = store_with_one();
        let r = Resource::Iron;
        assert_eq!(store.cycle_quantity(id, r, 8, true).unwrap(), 24);
        assert_eq!(store.cycle_quantity(id, r, 8, true).unwrap(), 16);
        assert_eq!(store.cycle_quantity(id, r, 8, true).unwrap(), 8);
        assert_eq!(store.cycle_quantity(id, r, 8, true).unwrap(), QUANTITY_MAX);
    }

    #[test]
    fn cycle_quantity_ignores_not_accepting() {
        let (mut store, id) = store_with_one();
        store.accept_none(id).unwrap();
        assert_eq!(
            store.cycle_quantity(id, Resource::Wine, 4, false).unwrap(),
            QUANTITY_MAX
        );
    }

    #[test]
    fn accept_all_and_none() {
        let (mut store, id) = store_with_one();
        store.accept_none(id).unwrap();
        assert_eq!(store.get(id).unwrap().state(Resource::Clay), StorageState::NotAccepting);
        store.accept_all(id).unwrap();
        assert_eq!(store.get(id).unwrap().state(Resource::Clay), StorageState::Accepting);
    }

    #[test]
    fn effective_max_is_zero_when_not_accepting() {
        let setting = ResourceSetting::new(StorageState::NotAccepting, QUANTITY_16);
        assert_eq!(setting.effective_max(), 0);
        let setting = ResourceSetting::new(StorageState::Maintaining, QUANTITY_16);
        assert_eq!(setting.effective_max(), 16);
    }

    #[test]
    fn legacy_decode_table() {
        assert_eq!(
            decode_legacy_state(7),
            ResourceSetting::new(StorageState::Getting, QUANTITY_24)
        );
        assert_eq!(
            decode_legacy_state(0),
            ResourceSetting::new(StorageState::Accepting, QUANTITY_MAX)
        );
        assert_eq!(
            decode_legacy_state(4),
            ResourceSetting::new(StorageState::Accepting, QUANTITY_8)
        );
        assert_eq!(
            decode_legacy_state(9),
            ResourceSetting::new(StorageState::Maintaining, QUANTITY_MAX)
        );
    }

    #[test]
    fn legacy_decode_out_of_table() {
        assert_eq!(
            decode_legacy_state(99),
            ResourceSetting::new(StorageState::NotAccepting, QUANTITY_MAX)
        );
        assert_eq!(
            decode_legacy_state(12),
            ResourceSetting::new(StorageState::NotAccepting, QUANTITY_MAX)
        );
    }

    #[test]
    fn missing_ids_are_errors() {
        let mut store = StorageStore::new();
        assert_eq!(
            store.cycle_state(StorageId(9), Resource::Wheat),
            Err(StorageError::StorageNotFound(StorageId(9)))
        );
        assert!(store.delete(StorageId::NONE).is_err());
    }
}
