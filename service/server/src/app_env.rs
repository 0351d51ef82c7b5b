use crate::{
    app_config::{AppConfig, StoreKind},
    db::DB,
    store::{memory::MemoryStore, postgres::PostgresStore, Store},
};
use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

pub struct AppEnv {
    pub store: Store,
}

impl AppEnv {
    pub async fn new(app_config: &AppConfig) -> Result<Self> {
        let store = match app_config.store {
            StoreKind::Memory => {
                info!("Using in-memory store");
                Store::Memory(MemoryStore::new())
            }
            StoreKind::Postgres => {
                let db = DB::new(app_config.base_config.db_config()).await?;
                info!(
                    "Using postgres store at {}:{}/{}",
                    app_config.base_config.db_host,
                    app_config.base_config.db_port,
                    app_config.base_config.db_name
                );
                Store::Postgres(PostgresStore::new(db.pool))
            }
        };
        Ok(Self { store })
    }

    pub fn in_memory() -> Self {
        Self {
            store: Store::Memory(MemoryStore::new()),
        }
    }

    /// The connection pool, when the store is backed by postgres.
    pub fn pool(&self) -> Option<PgPool> {
        match &self.store {
            Store::Postgres(s) => Some(s.pool()),
            Store::Memory(_) => None,
        }
    }
}
