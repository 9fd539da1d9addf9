//! Loading pipeline: reads data files, resolves resource names, builds the
//! tables the engine runs against.
//!
//! A city data directory holds up to three files, each in RON, TOML or JSON:
//!
//! | base name | contents                          | required |
//! |-----------|-----------------------------------|----------|
//! | `storage` | [`StorageConfig`] overrides       | no       |
//! | `prices`  | list of [`PriceData`]             | yes      |
//! | `routes`  | [`RoutesData`]                    | no       |

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use horreum_core::config::{ConfigError, StorageConfig};
use horreum_core::id::TradeRouteId;
use horreum_core::resource::Resource;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::schema::{PriceData, RoutesData};
use crate::tables::{PriceEntry, PriceTable, RouteQuotas, RouteTable, TripCapacity};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A resource name did not match any storable resource.
    #[error("unknown resource '{name}' in {file}")]
    UnknownResource { file: PathBuf, name: String },

    /// The same resource or route appears twice.
    #[error("duplicate entry '{name}' in {file}")]
    DuplicateEntry { file: PathBuf, name: String },

    #[error("invalid storage configuration in {file}: {source}")]
    Config {
        file: PathBuf,
        #[source]
        source: ConfigError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    const EXTENSIONS: [&'static str; 3] = ["ron", "toml", "json"];
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Find `{base_name}.ron`, `.toml` or `.json` in `dir`.
///
/// `Ok(None)` when absent; `ConflictingFormats` when more than one exists.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;
    for ext in Format::EXTENSIONS {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if !candidate.exists() {
            continue;
        }
        if let Some(existing) = found {
            return Err(DataLoadError::ConflictingFormats {
                a: existing,
                b: candidate,
            });
        }
        found = Some(candidate);
    }
    Ok(found)
}

pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, detail: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Read a file and deserialize it according to its extension.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list. TOML cannot hold a bare top-level array, so there
/// the list is read from the array at `toml_key`.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    if detect_format(path)? != Format::Toml {
        return deserialize_file(path);
    }
    let content = std::fs::read_to_string(path)?;
    let table: toml::Value = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
    let array = table
        .get(toml_key)
        .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?
        .clone();
    array
        .try_into()
        .map_err(|e: toml::de::Error| parse_error(path, e))
}

// ===========================================================================
// Name resolution
// ===========================================================================

/// Resolve a resource by name. `"none"` is not a resource a file may name.
pub fn resolve_resource(name: &str, file: &Path) -> Result<Resource, DataLoadError> {
    Resource::from_name(name)
        .filter(|r| *r != Resource::None)
        .ok_or_else(|| DataLoadError::UnknownResource {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
}

fn check_duplicate<T: Eq + std::hash::Hash>(
    seen: &mut HashSet<T>,
    key: T,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if seen.insert(key) {
        Ok(())
    } else {
        Err(DataLoadError::DuplicateEntry {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    }
}

// ===========================================================================
// Loading
// ===========================================================================

/// Everything a city needs from its data directory.
#[derive(Debug, Clone, PartialEq)]
pub struct CityData {
    pub config: StorageConfig,
    pub prices: PriceTable,
    pub routes: RouteTable,
}

/// Load and validate `storage`, `prices` and `routes` from `dir`.
pub fn load_city_data(dir: &Path) -> Result<CityData, DataLoadError> {
    let config = match find_data_file(dir, "storage")? {
        Some(path) => load_storage_config(&path)?,
        None => StorageConfig::default(),
    };
    let prices = load_prices(&require_data_file(dir, "prices")?)?;
    let routes = match find_data_file(dir, "routes")? {
        Some(path) => load_routes(&path)?,
        None => RouteTable::default(),
    };
    info!(
        dir = %dir.display(),
        prices = prices.len(),
        routes = routes.len(),
        "city data loaded"
    );
    Ok(CityData {
        config,
        prices,
        routes,
    })
}

pub fn load_storage_config(path: &Path) -> Result<StorageConfig, DataLoadError> {
    let config: StorageConfig = deserialize_file(path)?;
    config.validate().map_err(|source| DataLoadError::Config {
        file: path.to_path_buf(),
        source,
    })?;
    debug!(file = %path.display(), "storage config loaded");
    Ok(config)
}

pub fn load_prices(path: &Path) -> Result<PriceTable, DataLoadError> {
    let data: Vec<PriceData> = deserialize_list(path, "prices")?;
    let mut seen = HashSet::new();
    let mut table = PriceTable::new();
    for price in &data {
        let resource = resolve_resource(&price.resource, path)?;
        check_duplicate(&mut seen, resource, &price.resource, path)?;
        table.insert(
            resource,
            PriceEntry {
                import: price.import,
                export: price.export,
                stockpiled: price.stockpiled,
                available: price.available,
            },
        );
    }
    debug!(file = %path.display(), entries = table.len(), "prices loaded");
    Ok(table)
}

pub fn load_routes(path: &Path) -> Result<RouteTable, DataLoadError> {
    let data: RoutesData = deserialize_file(path)?;
    let trip = data.units_per_trip;
    let mut table = RouteTable::new(TripCapacity {
        caravan: trip.caravan,
        ship: trip.ship,
        native: trip.native,
    });

    let mut route_ids = HashSet::new();
    for route in &data.routes {
        check_duplicate(&mut route_ids, route.id, &format!("route {}", route.id), path)?;
        // A resource is either sold or bought on a route, never both.
        let mut traded = HashSet::new();
        let mut quotas = RouteQuotas::default();
        for (list, target) in [(&route.sells, &mut quotas.sells), (&route.buys, &mut quotas.buys)] {
            for quota in list {
                let resource = resolve_resource(quota.resource(), path)?;
                check_duplicate(&mut traded, resource, quota.resource(), path)?;
                target.insert(resource, quota.limit());
            }
        }
        table.insert(TradeRouteId(route.id), quotas);
    }
    debug!(file = %path.display(), routes = table.len(), "trade routes loaded");
    Ok(table)
}

// ===========================================================================
// Tests
// ===========================================================================
