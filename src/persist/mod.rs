//! Storage and locking collaborators

mod datastore;
mod memory;
mod table;
mod task_lock;

pub use datastore::{Datastore, DatastoreError};
pub use memory::{MemoryDatastore, StorageLimits, DEFAULT_SCHEMA};
pub use table::{ColumnDescriptor, ColumnType, TableDescriptor, TableShape};
pub use task_lock::{LockOptions, MemoryTaskLock, TaskLock, TaskLockError, TaskLockType};
