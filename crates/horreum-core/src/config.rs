//! Tunable storage and trade settings.
//!
//! [`StorageConfig`] carries the gameplay switches the ledgers consult
//! (default policy for new storage, getting quota, off-road getting) and the
//! constants of the trade scoring curves. It deserializes with defaults for
//! every missing field, so a data file only needs to name what it changes.

use serde::{Deserialize, Serialize};

/// Getting quota per errand in normal mode.
pub const GETTING_QUOTA: u32 = 8;

/// Getting quota per errand with `double_getting` enabled.
pub const DOUBLE_GETTING_QUOTA: u32 = 16;

/// Errors reported by [`StorageConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("quantity step must be 4 or 8, got {0}")]
    InvalidQuantityStep(u8),
    #[error("{0} capacity must be positive")]
    ZeroCapacity(&'static str),
    #[error("{name} clamp bounds are inverted: min {min} > max {max}")]
    InvertedClamp { name: &'static str, min: i64, max: i64 },
    #[error("{0} baseline must be positive")]
    NonPositiveBaseline(&'static str),
}

/// Storage and distribution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// New storage records start with every resource NOT_ACCEPTING.
    pub warehouses_accept_nothing: bool,
    /// Getting errands carry [`DOUBLE_GETTING_QUOTA`] instead of [`GETTING_QUOTA`].
    pub double_getting: bool,
    /// Getting granaries may fetch from granaries on other road networks.
    pub getting_granaries_go_offroad: bool,
    /// Increment used when cycling a quantity cap (4 or 8).
    pub quantity_step: u8,
    /// Units a granary holds across all foods.
    pub granary_capacity: u32,
    /// Units a warehouse holds across all resources.
    pub warehouse_capacity: u32,
    /// Maximum granaries tracked as getting donors per tick.
    pub donor_list_capacity: usize,
    pub trade: TradeTuning,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            warehouses_accept_nothing: false,
            double_getting: false,
            getting_granaries_go_offroad: false,
            quantity_step: 4,
            granary_capacity: 32,
            warehouse_capacity: 32,
            donor_list_capacity: 100,
            trade: TradeTuning::default(),
        }
    }
}

impl StorageConfig {
    /// Units a single getting errand may carry.
    pub fn getting_quota(&self) -> u32 {
        if self.double_getting {
            DOUBLE_GETTING_QUOTA
        } else {
            GETTING_QUOTA
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quantity_step != 4 && self.quantity_step != 8 {
            return Err(ConfigError::InvalidQuantityStep(self.quantity_step));
        }
        if self.granary_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("granary"));
        }
        if self.warehouse_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("warehouse"));
        }
        self.trade.validate()
    }
}

/// Constants of the trade scoring curves.
///
/// Both curves have the shape `clamp(100 + scaler * log10(x / baseline), min, max)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeTuning {
    pub price_baseline: f64,
    /// Scaler for the multiplier applied to what a trader sells to the city.
    pub sell_price_scaler: f64,
    /// Scaler for the multiplier applied to what a trader buys from the city.
    pub buy_price_scaler: f64,
    pub multiplier_min: i64,
    pub multiplier_max: i64,
    pub distance_baseline: f64,
    pub distance_scaler: f64,
    pub distance_score_min: i64,
    pub distance_score_max: i64,
    /// Buildings a trader remembers and will not revisit on the same trip.
    pub recently_visited_limit: usize,
}

impl Default for TradeTuning {
    fn default() -> Self {
        Self {
            price_baseline: 100.0,
            sell_price_scaler: 0.0,
            buy_price_scaler: 80.0,
            multiplier_min: 50,
            multiplier_max: 300,
            distance_baseline: 40.0,
            distance_scaler: 100.0,
            distance_score_min: 25,
            distance_score_max: 300,
            recently_visited_limit: 8,
        }
    }
}

impl TradeTuning {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.multiplier_min > self.multiplier_max {
            return Err(ConfigError::InvertedClamp {
                name: "price multiplier",
                min: self.multiplier_min,
                max: self.multiplier_max,
            });
        }
        if self.distance_score_min > self.distance_score_max {
            return Err(ConfigError::InvertedClamp {
                name: "distance score",
                min: self.distance_score_min,
                max: self.distance_score_max,
            });
        }
        if self.price_baseline <= 0.0 {
            return Err(ConfigError::NonPositiveBaseline("price"));
        }
        if self.distance_baseline <= 0.0 {
            return Err(ConfigError::NonPositiveBaseline("distance"));
        }
        Ok(())
    }
}
