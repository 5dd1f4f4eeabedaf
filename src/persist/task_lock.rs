//! Cross-compilation mutual exclusion

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;

/// The operation a lock serializes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskLockType {
    FormSchemaCreation,
}

impl TaskLockType {
    pub fn name(&self) -> &'static str {
        match self {
            TaskLockType::FormSchemaCreation => "FORM_SCHEMA_CREATION",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskLockError {
    #[error("lock service unavailable: {message}")]
    Unavailable { message: String },
}

/// An advisory lock keyed by resource and lock type.
///
/// `obtain_lock` answers `false` while another holder owns the lock;
/// `release_lock` answers `false` when `lock_id` does not hold it.
pub trait TaskLock: Send + Sync {
    fn obtain_lock(
        &self,
        lock_id: &str,
        resource: &str,
        lock_type: TaskLockType,
    ) -> Result<bool, TaskLockError>;

    fn release_lock(
        &self,
        lock_id: &str,
        resource: &str,
        lock_type: TaskLockType,
    ) -> Result<bool, TaskLockError>;
}

/// Polling and release behaviour for lock acquisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOptions {
    /// First sleep between attempts; doubles each attempt
    pub base_backoff: Duration,
    /// Upper bound for a single sleep
    pub max_backoff: Duration,
    /// Contention is logged once this many attempts have failed
    pub warn_after_attempts: u32,
    pub release_attempts: u32,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            base_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_secs(2),
            warn_after_attempts: 20,
            release_attempts: 10,
        }
    }
}

impl LockOptions {
    /// Sleep before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Lock table held in memory
#[derive(Debug, Default)]
pub struct MemoryTaskLock {
    held: Mutex<HashMap<(String, TaskLockType), String>>,
}

impl MemoryTaskLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn held(&self) -> MutexGuard<'_, HashMap<(String, TaskLockType), String>> {
        self.held.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current holder of a lock, if any
    pub fn holder(&self, resource: &str, lock_type: TaskLockType) -> Option<String> {
        self.held()
            .get(&(resource.to_string(), lock_type))
            .cloned()
    }
}

impl TaskLock for MemoryTaskLock {
    fn obtain_lock(
        &self,
        lock_id: &str,
        resource: &str,
        lock_type: TaskLockType,
    ) -> Result<bool, TaskLockError> {
        let mut held = self.held();
        let key = (resource.to_string(), lock_type);
        match held.get(&key) {
            Some(owner) => Ok(owner == lock_id),
            None => {
                held.insert(key, lock_id.to_string());
                Ok(true)
            }
        }
    }

    fn release_lock(
        &self,
        lock_id: &str,
        resource: &str,
        lock_type: TaskLockType,
    ) -> Result<bool, TaskLockError> {
        let mut held = self.held();
        let key = (resource.to_string(), lock_type);
        if held.get(&key).map(String::as_str) == Some(lock_id) {
            held.remove(&key);
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
