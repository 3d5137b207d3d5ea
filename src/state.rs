//! Shared application state, built once at startup and handed to every
//! handler through axum's `State`.

use std::{sync::Arc, time::Instant};

use crate::config::Config;
use crate::db::{self, DbConfig, PgDocumentStore};
use crate::identity::Identity;
use crate::store::{
    BlobStore, DocumentStore, HttpRealtimeStore, LocalBlobStore, MemoryBlobStore,
    MemoryDocumentStore, MemoryRealtimeStore, RealtimeStore,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub documents: Arc<dyn DocumentStore>,
    pub realtime: Arc<dyn RealtimeStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub identity: Arc<Identity>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: Config,
        documents: Arc<dyn DocumentStore>,
        realtime: Arc<dyn RealtimeStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        let identity = Arc::new(Identity::new(&config, documents.clone()));
        Self {
            config: Arc::new(config),
            documents,
            realtime,
            blobs,
            identity,
            started_at: Instant::now(),
        }
    }

    /// All three stores in memory. Nothing survives a restart.
    pub fn in_memory(config: Config) -> Self {
        Self::new(
            config,
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(MemoryRealtimeStore::new()),
            Arc::new(MemoryBlobStore::new()),
        )
    }

    /// Connect the configured backends, falling back to in-memory stores
    /// for whatever is not configured or not reachable.
    pub async fn connect(config: Config) -> Self {
        let documents: Arc<dyn DocumentStore> = match &config.database_url {
            Some(url) => match db::init_pool(DbConfig::new(url)).await {
                Ok(pool) => {
                    if let Err(e) = db::run_migrations(&pool).await {
                        tracing::error!("Failed to run database migrations: {}", e);
                    }
                    Arc::new(PgDocumentStore::new(pool))
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to initialize database pool: {}. Using in-memory document store.",
                        e
                    );
                    Arc::new(MemoryDocumentStore::new())
                }
            },
            None => {
                tracing::warn!("DATABASE_URL not set. Using in-memory document store.");
                Arc::new(MemoryDocumentStore::new())
            }
        };

        let realtime: Arc<dyn RealtimeStore> = match &config.realtime_url {
            Some(url) => {
                tracing::info!("Realtime store at {}", url);
                Arc::new(HttpRealtimeStore::new(url, config.realtime_auth.clone()))
            }
            None => {
                tracing::warn!("REALTIME_URL not set. Using in-memory realtime store.");
                Arc::new(MemoryRealtimeStore::new())
            }
        };

        tracing::info!("Blob storage at {}", config.upload_dir.display());
        let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(config.upload_dir.clone()));

        Self::new(config, documents, realtime, blobs)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::identity::tests::test_config;

    /// Memory stores with concrete handles kept for assertions.
    pub(crate) struct TestState {
        pub state: AppState,
        pub documents: Arc<MemoryDocumentStore>,
        pub realtime: Arc<MemoryRealtimeStore>,
        pub blobs: Arc<MemoryBlobStore>,
    }

    pub(crate) fn test_state() -> TestState {
        test_state_with(test_config())
    }

    pub(crate) fn test_state_with(config: Config) -> TestState {
        let documents = Arc::new(MemoryDocumentStore::new());
        let realtime = Arc::new(MemoryRealtimeStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let state = AppState::new(config, documents.clone(), realtime.clone(), blobs.clone());
        TestState {
            state,
            documents,
            realtime,
            blobs,
        }
    }

    impl TestState {
        pub fn bearer(&self) -> String {
            let token = self
                .state
                .identity
                .create_access_token(crate::identity::tests::TEST_EMAIL)
                .unwrap();
            format!("Bearer {}", token)
        }
    }
}
