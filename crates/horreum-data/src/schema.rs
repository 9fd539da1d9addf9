//! Serde data file structs for city economy definitions.
//!
//! These structs define the on-disk format of the price list and the trade
//! route quotas. Resources are named by their lowercase names (`"wheat"`,
//! `"pottery"`); the loader resolves them into engine types. The storage
//! configuration has no schema of its own: `storage.*` deserializes straight
//! into [`horreum_core::config::StorageConfig`].

use serde::Deserialize;

fn default_true() -> bool {
    true
}

// ===========================================================================
// Prices
// ===========================================================================

/// One entry of the city price list.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceData {
    pub resource: String,
    /// What the city pays a trader per unit.
    pub import: u32,
    /// What a trader pays the city per unit.
    pub export: u32,
    #[serde(default)]
    pub stockpiled: bool,
    /// Whether the resource can be obtained in this scenario.
    #[serde(default = "default_true")]
    pub available: bool,
}

/// TOML wrapper: `[[prices]]` array of tables.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlPrices {
    pub prices: Vec<PriceData>,
}

// ===========================================================================
// Trade routes
// ===========================================================================

/// A per-resource yearly quota, in short tuple form or full form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum QuotaData {
    /// Short form: `("oil", 15)`.
    Short(String, u32),
    Full { resource: String, limit: u32 },
}

impl QuotaData {
    pub fn resource(&self) -> &str {
        match self {
            QuotaData::Short(resource, _) | QuotaData::Full { resource, .. } => resource,
        }
    }

    pub fn limit(&self) -> u32 {
        match self {
            QuotaData::Short(_, limit) | QuotaData::Full { limit, .. } => *limit,
        }
    }
}

/// One empire trade route.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteData {
    pub id: u32,
    /// Goods the partner city sells to us.
    #[serde(default)]
    pub sells: Vec<QuotaData>,
    /// Goods the partner city buys from us.
    #[serde(default)]
    pub buys: Vec<QuotaData>,
}

/// Units each kind of trader carries per trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TripCapacityData {
    pub caravan: u32,
    pub ship: u32,
    pub native: u32,
}

impl Default for TripCapacityData {
    fn default() -> Self {
        Self {
            caravan: 8,
            ship: 12,
            native: 8,
        }
    }
}

/// The whole `routes.*` file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoutesData {
    #[serde(default)]
    pub units_per_trip: TripCapacityData,
    #[serde(default)]
    pub routes: Vec<RouteData>,
}

// ===========================================================================
// Tests
// ===========================================================================
