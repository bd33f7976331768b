//! SeaORM implementation of RepositoryProvider

use sea_orm::DatabaseConnection;

use crate::domain::{LotRepository, RepositoryProvider, SessionRepository, SlotStore};

use super::lot_repository::SeaOrmLotRepository;
use super::session_repository::SeaOrmSessionRepository;
use super::slot_store::SeaOrmSlotStore;

/// Unified repository provider backed by SeaORM.
///
/// Holds one connection pool and exposes per-aggregate repository accessors.
///
/// ```ignore
/// let repos = SeaOrmRepositoryProvider::new(db.clone());
/// let lot = repos.lots().find_by_id(1).await?;
/// let pending = repos.sessions().find_pending_payments(Some(1)).await?;
/// ```
pub struct SeaOrmRepositoryProvider {
    lots: SeaOrmLotRepository,
    slots: SeaOrmSlotStore,
    sessions: SeaOrmSessionRepository,
}

impl SeaOrmRepositoryProvider {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            lots: SeaOrmLotRepository::new(db.clone()),
            slots: SeaOrmSlotStore::new(db.clone()),
            sessions: SeaOrmSessionRepository::new(db),
        }
    }
}

impl RepositoryProvider for SeaOrmRepositoryProvider {
    fn lots(&self) -> &dyn LotRepository {
        &self.lots
    }

    fn slots(&self) -> &dyn SlotStore {
        &self.slots
    }

    fn sessions(&self) -> &dyn SessionRepository {
        &self.sessions
    }
}
