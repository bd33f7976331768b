//! Database repository implementations
//!
//! Per-aggregate SeaORM repositories + unified RepositoryProvider.

mod convert;
pub mod lot_repository;
pub mod repository_provider;
pub mod session_repository;
pub mod slot_store;

pub use lot_repository::SeaOrmLotRepository;
pub use repository_provider::SeaOrmRepositoryProvider;
pub use session_repository::SeaOrmSessionRepository;
pub use slot_store::SeaOrmSlotStore;

/// Fresh migrated in-memory database. One connection, since every
/// `sqlite::memory:` connection is its own database.
#[cfg(test)]
pub(crate) async fn test_db() -> sea_orm::DatabaseConnection {
    use super::migrator::{Migrator, MigratorTrait};
    use super::{init_database, DatabaseConfig};

    let db = init_database(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        ..DatabaseConfig::default()
    })
    .await
    .unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

/// Migrated SQLite file in the temp dir behind a pool of several
/// connections, for tests where writers really contend. The file is removed
/// on drop.
#[cfg(test)]
pub(crate) struct FileDb {
    pub db: sea_orm::DatabaseConnection,
    path: std::path::PathBuf,
}

#[cfg(test)]
impl FileDb {
    pub(crate) async fn new() -> Self {
        use super::migrator::{Migrator, MigratorTrait};
        use super::{init_database, DatabaseConfig};

        let path = std::env::temp_dir().join(format!("lotpay-{}.db", uuid::Uuid::new_v4()));
        let db = init_database(&DatabaseConfig {
            url: format!("sqlite://{}?mode=rwc", path.display()),
            max_connections: 8,
            busy_timeout_ms: 10_000,
        })
        .await
        .unwrap();
        Migrator::up(&db, None).await.unwrap();
        Self { db, path }
    }
}

#[cfg(test)]
impl Drop for FileDb {
    fn drop(&mut self) {
        for suffix in ["", "-journal", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}
