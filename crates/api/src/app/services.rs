//! Store selection and engine wiring.
//!
//! `USE_PERSISTENT_STORES=true` runs against Postgres (schema created on
//! startup); otherwise everything lives in memory.

use std::sync::Arc;

use stockflow_infra::config::{Config, StoreBackend};
use stockflow_infra::fulfillment::OrderFulfillmentCoordinator;
use stockflow_infra::store::{EngineStore, InMemoryStore, PostgresStore, StoreResult};

pub struct AppServices {
    store: Arc<dyn EngineStore>,
    coordinator: OrderFulfillmentCoordinator<dyn EngineStore>,
    backend: &'static str,
    low_stock_default_limit: usize,
}

impl AppServices {
    pub fn new(store: Arc<dyn EngineStore>, backend: &'static str, low_stock_default_limit: usize) -> Self {
        Self {
            coordinator: OrderFulfillmentCoordinator::new(Arc::clone(&store)),
            store,
            backend,
            low_stock_default_limit,
        }
    }

    /// Fresh in-memory services (dev/tests).
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryStore::new()),
            "in_memory",
            Config::default().low_stock_default_limit,
        )
    }

    pub fn store(&self) -> &dyn EngineStore {
        &*self.store
    }

    pub fn coordinator(&self) -> &OrderFulfillmentCoordinator<dyn EngineStore> {
        &self.coordinator
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }

    pub fn low_stock_default_limit(&self) -> usize {
        self.low_stock_default_limit
    }
}

pub async fn build_services(config: &Config) -> StoreResult<AppServices> {
    match &config.store {
        StoreBackend::InMemory => {
            tracing::info!("using in-memory stores");
            Ok(AppServices::new(
                Arc::new(InMemoryStore::new()),
                "in_memory",
                config.low_stock_default_limit,
            ))
        }
        StoreBackend::Postgres {
            database_url,
            max_connections,
        } => {
            let store = PostgresStore::connect(database_url, *max_connections).await?;
            store.ensure_schema().await?;
            tracing::info!(max_connections, "using postgres stores");
            Ok(AppServices::new(
                Arc::new(store),
                "postgres",
                config.low_stock_default_limit,
            ))
        }
    }
}
