use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a trader (caravan, ship or native trader) registered with the city.
    pub struct TraderId;
}

/// Identifies a building. `BuildingId(0)` is reserved and never names a real
/// building.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BuildingId(pub u32);

impl BuildingId {
    /// The reserved "no building" handle.
    pub const NONE: BuildingId = BuildingId(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// Identifies a storage record. Stable index into the storage store;
/// `StorageId(0)` is reserved.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct StorageId(pub u32);

impl StorageId {
    /// The reserved "no storage" handle.
    pub const NONE: StorageId = StorageId(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identifies an empire trade route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TradeRouteId(pub u32);

/// A map tile coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TilePoint {
    pub x: i32,
    pub y: i32,
}

impl TilePoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chess-board distance: `max(|dx|, |dy|)`.
    pub fn chebyshev(self, other: TilePoint) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_ids() {
        assert!(BuildingId::NONE.is_none());
        assert!(StorageId::default().is_none());
        assert!(!BuildingId(3).is_none());
    }

    #[test]
    fn chebyshev_is_max_axis_delta() {
        let a = TilePoint::new(10, 10);
        assert_eq!(a.chebyshev(TilePoint::new(13, 11)), 3);
        assert_eq!(a.chebyshev(TilePoint::new(4, 18)), 8);
        assert_eq!(a.chebyshev(a), 0);
    }

    #[test]
    fn ids_order_by_value() {
        let mut ids = vec![BuildingId(7), BuildingId(2), BuildingId(5)];
        ids.sort();
        assert_eq!(ids, vec![BuildingId(2), BuildingId(5), BuildingId(7)]);
    }
}
