//! Data-file loading for the storage engine.
//!
//! Reads a city's storage configuration, price list and trade-route quotas
//! from RON, TOML or JSON files and turns them into the collaborator
//! implementations [`horreum_core`] runs against.

pub mod loader;
pub mod schema;
pub mod tables;

pub use loader::{CityData, DataLoadError, load_city_data};
pub use tables::{PriceTable, RouteTable};
