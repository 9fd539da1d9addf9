//! Horreum Core -- resource storage and distribution for a city builder.
//!
//! Granaries hold food, warehouses hold everything. Each storage building
//! carries a per-resource policy (accept, refuse, get, maintain, with a
//! quantity cap) and a set of transporter permissions. This crate owns the
//! unit ledgers of those buildings, the city-wide bulk transfers, the
//! destination queries used by cart pushers, the worker task resolver and
//! the routing of foreign traders between storage buildings.
//!
//! # Tick pipeline
//!
//! Each call to [`city::City::step`] runs six phases:
//!
//! 1. **Commands** -- Apply queued storage-policy edits.
//! 2. **Stocks** -- Rebuild the non-getting granaries cache.
//! 3. **Workers** -- Resolve every storage building's worker task.
//! 4. **Trade** -- Route every trader waiting for a destination.
//! 5. **Post-tick** -- Deliver buffered events to listeners.
//! 6. **Bookkeeping** -- Increment the tick and compute the state hash.
//!
//! Ledger operations and bulk transfers can also be called directly
//! between steps; they emit events into the same buffers.
//!
//! # Collaborators
//!
//! Roads, empire trade routes and city prices are reached through the
//! traits in [`context`], bundled per call in a [`context::Services`].
//! Cart pushers and city-wide accounting listen on the [`event::EventBus`].
//!
//! # Key Types
//!
//! - [`city::City`] -- Buildings, storage records, traders and the pipeline.
//! - [`storage::StorageStore`] -- Recyclable arena of storage policies.
//! - [`building::Building`] -- Physical state and unit ledger of a building.
//! - [`trade::Trader`] -- A caravan, ship or native trader.
//! - [`codec`] / [`migration`] -- Save-game storage buffers, all versions.
//! - [`serialize`] -- Versioned whole-city snapshots via bitcode.

pub mod blessing;
pub mod building;
pub mod city;
pub mod codec;
pub mod command_queue;
pub mod config;
pub mod context;
pub mod event;
pub mod exchange;
pub mod granary;
pub mod id;
pub mod ledger;
pub mod migration;
pub mod query;
pub mod resource;
pub mod serialize;
pub mod sim;
pub mod stocks;
pub mod storage;
pub mod task;
pub mod trade;
pub mod validation;
pub mod warehouse;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
