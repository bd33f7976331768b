//! Explicit caller context for engine operations.

use serde::{Deserialize, Serialize};

/// The lot a manager acts on and who they are. Passed into every manager
/// operation instead of living in ambient process state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerContext {
    pub lot_id: i32,
    pub manager_id: String,
}

impl ManagerContext {
    pub fn new(lot_id: i32, manager_id: impl Into<String>) -> Self {
        Self {
            lot_id,
            manager_id: manager_id.into(),
        }
    }
}
