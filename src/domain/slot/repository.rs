//! Slot store interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{Occupant, Slot};
use crate::domain::DomainResult;

/// Atomic slot reservation.
///
/// Implementations must make `reserve` and `release` compare-and-swap on the
/// single slot they touch: two concurrent `reserve` calls for the same slot
/// never both succeed, and no lot-wide lock is taken.
#[async_trait]
pub trait SlotStore: Send + Sync {
    /// Reserve `desired` or, when `None`, the lowest-numbered available slot.
    ///
    /// Errors: `SlotNotFound`, `SlotOccupied` (explicit slot), `LotFull`
    /// (no preference and nothing available).
    async fn reserve(
        &self,
        lot_id: i32,
        occupant: &Occupant,
        desired: Option<i32>,
        at: DateTime<Utc>,
    ) -> DomainResult<i32>;

    /// Occupied -> Available. `SlotNotOccupied` on a second call.
    async fn release(&self, lot_id: i32, slot_id: i32) -> DomainResult<()>;

    /// All slots of a lot ordered by number.
    async fn list_for_lot(&self, lot_id: i32) -> DomainResult<Vec<Slot>>;
}
