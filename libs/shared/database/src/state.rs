use std::any::{Any, TypeId};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use shared_config::{AppConfig, StorageBackend};

use crate::locks::TimelineLocks;
use crate::memory::MemoryRepository;
use crate::postgrest::SupabaseRepository;
use crate::repository::{Record, Repository};
use crate::supabase::SupabaseClient;

type TableRegistry = DashMap<TypeId, Arc<dyn Any + Send + Sync>>;

#[derive(Clone)]
enum Backend {
    Memory(Arc<TableRegistry>),
    Supabase(Arc<SupabaseClient>),
}

/// Storage handle shared by every service. Cloning shares the same tables
/// and the same lock registry.
#[derive(Clone)]
pub struct Database {
    backend: Backend,
    locks: TimelineLocks,
}

impl Database {
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(DashMap::new())),
            locks: TimelineLocks::new(),
        }
    }

    pub fn supabase(client: SupabaseClient) -> Self {
        Self {
            backend: Backend::Supabase(Arc::new(client)),
            locks: TimelineLocks::new(),
        }
    }

    pub fn backend(&self) -> StorageBackend {
        match self.backend {
            Backend::Memory(_) => StorageBackend::Memory,
            Backend::Supabase(_) => StorageBackend::Supabase,
        }
    }

    pub fn repository<T: Record>(&self) -> Arc<dyn Repository<T>> {
        match &self.backend {
            Backend::Memory(tables) => {
                let table = tables
                    .entry(TypeId::of::<T>())
                    .or_insert_with(|| Arc::new(MemoryRepository::<T>::new()) as Arc<dyn Any + Send + Sync>)
                    .clone();
                match table.downcast::<MemoryRepository<T>>() {
                    Ok(repo) => repo as Arc<dyn Repository<T>>,
                    Err(_) => unreachable!("memory table for {} registered under a foreign type", T::TABLE),
                }
            }
            Backend::Supabase(client) => Arc::new(SupabaseRepository::<T>::new(client.clone())),
        }
    }

    pub fn locks(&self) -> &TimelineLocks {
        &self.locks
    }
}

/// Shared application state handed to every router.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Database,
}

impl AppState {
    /// Picks the storage backend the configuration asks for.
    pub fn from_config(config: AppConfig) -> Self {
        let db = if config.uses_supabase() {
            info!("Using Supabase storage at {}", config.supabase_url);
            Database::supabase(SupabaseClient::new(&config))
        } else {
            info!("Using in-memory storage");
            Database::in_memory()
        };
        Self::with_database(config, db)
    }

    pub fn in_memory() -> Self {
        Self::with_database(AppConfig::in_memory(), Database::in_memory())
    }

    pub fn with_database(config: AppConfig, db: Database) -> Self {
        Self { config: Arc::new(config), db }
    }
}
