use serde::{Deserialize, Serialize};

/// Number of slots in the resource enumeration, including [`Resource::None`].
pub const RESOURCE_COUNT: usize = 17;

/// Number of slots in the legacy (pre-fish) resource enumeration.
pub const LEGACY_RESOURCE_COUNT: usize = 16;

/// A tradeable, storable resource. `None` doubles as the granary free-space
/// slot in a [`ResourceLedger`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum Resource {
    #[default]
    None = 0,
    Wheat,
    Vegetables,
    Fruit,
    Meat,
    Fish,
    Olives,
    Vines,
    Clay,
    Timber,
    Marble,
    Iron,
    Oil,
    Wine,
    Pottery,
    Furniture,
    Weapons,
}

/// Legacy index -> current resource. Older saves had no separate fish slot
/// and ordered raw materials differently.
const LEGACY_RESOURCES: [Resource; LEGACY_RESOURCE_COUNT] = [
    Resource::None,
    Resource::Wheat,
    Resource::Vegetables,
    Resource::Fruit,
    Resource::Olives,
    Resource::Vines,
    Resource::Meat,
    Resource::Wine,
    Resource::Oil,
    Resource::Iron,
    Resource::Timber,
    Resource::Clay,
    Resource::Marble,
    Resource::Weapons,
    Resource::Furniture,
    Resource::Pottery,
];

impl Resource {
    /// Every slot in enumeration order, `None` first.
    pub const ALL: [Resource; RESOURCE_COUNT] = [
        Resource::None,
        Resource::Wheat,
        Resource::Vegetables,
        Resource::Fruit,
        Resource::Meat,
        Resource::Fish,
        Resource::Olives,
        Resource::Vines,
        Resource::Clay,
        Resource::Timber,
        Resource::Marble,
        Resource::Iron,
        Resource::Oil,
        Resource::Wine,
        Resource::Pottery,
        Resource::Furniture,
        Resource::Weapons,
    ];

    /// Food resources in ascending id order.
    pub const FOODS: [Resource; 5] = [
        Resource::Wheat,
        Resource::Vegetables,
        Resource::Fruit,
        Resource::Meat,
        Resource::Fish,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Resource> {
        Self::ALL.get(index).copied()
    }

    /// Map an index of the legacy 16-slot enumeration onto the current one.
    pub fn from_legacy_index(index: usize) -> Option<Resource> {
        LEGACY_RESOURCES.get(index).copied()
    }

    pub fn is_food(self) -> bool {
        matches!(
            self,
            Resource::Wheat | Resource::Vegetables | Resource::Fruit | Resource::Meat | Resource::Fish
        )
    }

    /// All real resources (everything except `None`) in ascending id order.
    pub fn goods() -> impl Iterator<Item = Resource> {
        Self::ALL.into_iter().skip(1)
    }

    pub fn name(self) -> &'static str {
        match self {
            Resource::None => "none",
            Resource::Wheat => "wheat",
            Resource::Vegetables => "vegetables",
            Resource::Fruit => "fruit",
            Resource::Meat => "meat",
            Resource::Fish => "fish",
            Resource::Olives => "olives",
            Resource::Vines => "vines",
            Resource::Clay => "clay",
            Resource::Timber => "timber",
            Resource::Marble => "marble",
            Resource::Iron => "iron",
            Resource::Oil => "oil",
            Resource::Wine => "wine",
            Resource::Pottery => "pottery",
            Resource::Furniture => "furniture",
            Resource::Weapons => "weapons",
        }
    }

    pub fn from_name(name: &str) -> Option<Resource> {
        Self::ALL.into_iter().find(|r| r.name() == name)
    }
}

/// Unit counts for one storage building, indexed by [`Resource`].
///
/// Granaries keep their free capacity in the `Resource::None` slot so that
/// `None + sum(food) == capacity` after every mutation. Warehouses leave the
/// slot at zero and derive free space from the total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceLedger {
    amounts: [u32; RESOURCE_COUNT],
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, resource: Resource) -> u32 {
        self.amounts[resource.index()]
    }

    pub fn set(&mut self, resource: Resource, amount: u32) {
        self.amounts[resource.index()] = amount;
    }

    /// Add units with no capacity check. Callers clamp beforehand.
    pub fn add(&mut self, resource: Resource, quantity: u32) {
        let slot = &mut self.amounts[resource.index()];
        *slot = slot.saturating_add(quantity);
    }

    /// Remove up to `quantity` units. Returns the amount actually removed.
    #[must_use = "returns the quantity actually removed, which may be less than requested"]
    pub fn remove(&mut self, resource: Resource, quantity: u32) -> u32 {
        let slot = &mut self.amounts[resource.index()];
        let removed = quantity.min(*slot);
        *slot -= removed;
        removed
    }

    /// Total of every real resource (the `None` slot is excluded).
    pub fn total(&self) -> u32 {
        self.amounts.iter().skip(1).sum()
    }

    pub fn total_food(&self) -> u32 {
        Resource::FOODS.iter().map(|&r| self.get(r)).sum()
    }

    /// Non-zero real resources in ascending id order.
    pub fn stocked(&self) -> impl Iterator<Item = (Resource, u32)> + '_ {
        Resource::goods()
            .map(|r| (r, self.get(r)))
            .filter(|&(_, amount)| amount > 0)
    }

    pub fn clear(&mut self) {
        self.amounts = [0; RESOURCE_COUNT];
    }
}
