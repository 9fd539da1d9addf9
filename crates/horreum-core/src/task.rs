//! Worker intents produced by the task resolvers.
//!
//! The resolvers in [`crate::granary`] and [`crate::warehouse`] only classify
//! what a storage building's worker should do next; turning that intent into
//! a walking cart-pusher is the figure layer's job.

use crate::id::BuildingId;
use crate::resource::Resource;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerTask {
    /// Understaffed, or nothing worth doing.
    #[default]
    Idle,
    /// Fetch from another storage building. Granaries fetch whatever food
    /// they are getting (`None`); warehouses name the resource.
    Getting(Option<Resource>),
    /// Carry `resource` to `destination`, which is getting it.
    Delivering {
        resource: Resource,
        destination: BuildingId,
    },
    /// Push `resource` out because the building is emptying.
    Emptying(Resource),
}

impl WorkerTask {
    pub fn is_idle(self) -> bool {
        self == WorkerTask::Idle
    }
}
