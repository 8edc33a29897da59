pub mod locks;
pub mod memory;
pub mod postgrest;
pub mod repository;
pub mod state;
pub mod supabase;

pub use locks::{TimelineGuard, TimelineLocks};
pub use memory::MemoryRepository;
pub use postgrest::SupabaseRepository;
pub use repository::{Condition, DatabaseError, FilterOp, Page, PageParams, Query, Record, Repository};
pub use state::{AppState, Database};
pub use supabase::SupabaseClient;
