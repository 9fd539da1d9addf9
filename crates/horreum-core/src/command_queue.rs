//! Queued storage-policy edits.
//!
//! The UI submits policy changes as commands; they are applied at the start
//! of the next tick so every tick sees a stable set of storage records.

use serde::{Deserialize, Serialize};

use crate::id::StorageId;
use crate::resource::Resource;
use crate::sim::Ticks;
use crate::storage::{Permission, StorageError, StorageStore};

// ---------------------------------------------------------------------------
// Command enum
// ---------------------------------------------------------------------------

/// A single edit to one storage record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageCommand {
    /// Advance a resource to the next state in the UI cycle.
    CycleState {
        storage: StorageId,
        resource: Resource,
    },
    /// Step a resource's quantity cap up (or down when `reverse`).
    CycleQuantity {
        storage: StorageId,
        resource: Resource,
        reverse: bool,
    },
    TogglePermission {
        storage: StorageId,
        permission: Permission,
    },
    AcceptAll(StorageId),
    AcceptNone(StorageId),
    ToggleEmptyAll(StorageId),
}

impl StorageCommand {
    pub fn storage(&self) -> StorageId {
        match *self {
            StorageCommand::CycleState { storage, .. }
            | StorageCommand::CycleQuantity { storage, .. }
            | StorageCommand::TogglePermission { storage, .. }
            | StorageCommand::AcceptAll(storage)
            | StorageCommand::AcceptNone(storage)
            | StorageCommand::ToggleEmptyAll(storage) => storage,
        }
    }

    /// Apply to `store`. `step` is the quantity increment in units.
    pub fn apply(&self, store: &mut StorageStore, step: u8) -> Result<(), StorageError> {
        match *self {
            StorageCommand::CycleState { storage, resource } => {
                store.cycle_state(storage, resource)?;
            }
            StorageCommand::CycleQuantity {
                storage,
                resource,
                reverse,
            } => {
                store.cycle_quantity(storage, resource, step, reverse)?;
            }
            StorageCommand::TogglePermission {
                storage,
                permission,
            } => store.set_permission(storage, permission)?,
            StorageCommand::AcceptAll(storage) => store.accept_all(storage)?,
            StorageCommand::AcceptNone(storage) => store.accept_none(storage)?,
            StorageCommand::ToggleEmptyAll(storage) => {
                store.toggle_empty_all(storage)?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CommandQueue
// ---------------------------------------------------------------------------

/// Commands waiting for the next tick, plus an optional bounded history of
/// what was drained and when.
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: Vec<StorageCommand>,
    history: Vec<(Ticks, StorageCommand)>,
    /// 0 disables history.
    max_history: usize,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            max_history,
            ..Self::default()
        }
    }

    pub fn push(&mut self, command: StorageCommand) {
        self.pending.push(command);
    }

    pub fn push_batch(&mut self, commands: impl IntoIterator<Item = StorageCommand>) {
        self.pending.extend(commands);
    }

    /// Take every pending command in submission order, recording them
    /// against `tick` when history is on.
    pub fn drain(&mut self, tick: Ticks) -> Vec<StorageCommand> {
        let commands = std::mem::take(&mut self.pending);
        if self.max_history > 0 {
            self.history
                .extend(commands.iter().cloned().map(|c| (tick, c)));
            let excess = self.history.len().saturating_sub(self.max_history);
            self.history.drain(..excess);
        }
        commands
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn history(&self) -> &[(Ticks, StorageCommand)] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::BuildingId;
    use crate::storage::StorageState;

    fn store_with_one() -> (StorageStore, StorageId) {
        let mut store = StorageStore::new();
        let id = store.create(BuildingId(1), false);
        (store, id)
    }

    // -----------------------------------------------------------------------
    // Test 1: drain_preserves_order_and_empties
    // -----------------------------------------------------------------------
    #[test]
    fn drain_preserves_order_and_empties() {
        let mut queue = CommandQueue::new();
        let s = StorageId(1);
        queue.push(StorageCommand::AcceptAll(s));
        queue.push_batch([
            StorageCommand::AcceptNone(s),
            StorageCommand::ToggleEmptyAll(s),
        ]);
        assert_eq!(queue.pending_count(), 3);

        let drained = queue.drain(0);
        assert!(queue.is_empty());
        assert_eq!(drained[0], StorageCommand::AcceptAll(s));
        assert_eq!(drained[2], StorageCommand::ToggleEmptyAll(s));
        assert!(queue.history().is_empty());
    }

    // -----------------------------------------------------------------------
    // Test 2: history_is_bounded
    // -----------------------------------------------------------------------
    #[test]
    fn history_is_bounded() {
        let mut queue = CommandQueue::with_max_history(3);
        let s = StorageId(1);
        for _ in 0..3 {
            queue.push(StorageCommand::AcceptAll(s));
        }
        queue.drain(1);
        queue.push(StorageCommand::AcceptNone(s));
        queue.push(StorageCommand::ToggleEmptyAll(s));
        queue.drain(2);

        let history = queue.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0], (1, StorageCommand::AcceptAll(s)));
        assert_eq!(history[2], (2, StorageCommand::ToggleEmptyAll(s)));

        queue.clear_history();
        assert!(queue.history().is_empty());
    }

    // -----------------------------------------------------------------------
    // Test 3: apply_edits_the_record
    // -----------------------------------------------------------------------
    #[test]
    fn apply_edits_the_record() {
        let (mut store, id) = store_with_one();
        StorageCommand::CycleState {
            storage: id,
            resource: Resource::Wheat,
        }
        .apply(&mut store, 4)
        .unwrap();
        StorageCommand::CycleQuantity {
            storage: id,
            resource: Resource::Oil,
            reverse: true,
        }
        .apply(&mut store, 4)
        .unwrap();
        StorageCommand::TogglePermission {
            storage: id,
            permission: Permission::Market,
        }
        .apply(&mut store, 4)
        .unwrap();

        let record = store.get(id).unwrap();
        assert_eq!(record.state(Resource::Wheat), StorageState::Getting);
        assert_eq!(record.setting(Resource::Oil).quantity, 28);
        assert!(!record.is_permitted(Permission::Market));
        assert_eq!(
            StorageCommand::AcceptAll(id).storage(),
            StorageCommand::ToggleEmptyAll(id).storage()
        );
    }

    // -----------------------------------------------------------------------
    // Test 4: apply_to_unused_record_fails
    // -----------------------------------------------------------------------
    #[test]
    fn apply_to_unused_record_fails() {
        let (mut store, _) = store_with_one();
        let missing = StorageId(7);
        assert_eq!(
            StorageCommand::AcceptNone(missing).apply(&mut store, 4),
            Err(StorageError::StorageNotFound(missing))
        );
    }
}
