//! Job lifecycle, per-tenant inventory store, and the movement engine
//! (spec §4.G/H/I): everything that owns persisted, tenant-scoped state.

pub mod error;
pub mod job;
pub mod movement;
pub mod tenant_registry;
pub mod tenant_store;

pub use error::{Result, StoreError};
pub use job::{Job, JobManager, JobStatus, JobUpdate};
pub use movement::{MovementEngine, MovementOutcome, MovementType, SetQuantityOutcome};
pub use tenant_registry::TenantRegistry;
pub use tenant_store::{Facets, Snapshot, TenantStore, WineRow};
