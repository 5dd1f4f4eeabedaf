//! Compiling a form definition into physical tables
//!
//! [`compile_form`] runs the whole pipeline under the per-form creation
//! lock: build the node tree with placeholder names, resolve the names,
//! create the tables (dividing any the datastore rejects as too wide) and
//! record the resulting node list.

mod materializer;
mod splitter;

use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::SchemaCompilerError;
use crate::form::FormDefinition;
use crate::model::{build_schema_tree, substitute_placeholders, SchemaNode, SchemaTree, TreeBuild};
use crate::persist::{Datastore, LockOptions, TableDescriptor, TaskLock, TaskLockType};

pub use materializer::{derive_tables, materialize};

/// Wait after a schema is recorded before reporting success
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(3);

/// Upper bound on create/divide rounds for one form
pub const DEFAULT_MAX_ATTEMPTS: u32 = 100;

#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub settle: Duration,
    pub max_attempts: u32,
    pub lock: LockOptions,
    /// Overrides the datastore's default schema
    pub schema: Option<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            settle: DEFAULT_SETTLE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lock: LockOptions::default(),
            schema: None,
        }
    }
}

/// Output of a successful compilation
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    pub form_id: String,
    pub title: Option<String>,
    pub version: Option<String>,
    pub nodes: Vec<SchemaNode>,
    /// Created tables by name
    pub tables: BTreeMap<String, TableDescriptor>,
    pub warnings: Vec<String>,
    pub form_hash: String,
}

/// Compile `form` into tables of `ds`, serialized per form id through `locks`.
pub fn compile_form(
    form: &FormDefinition,
    ds: &dyn Datastore,
    locks: &dyn TaskLock,
    options: &CompileOptions,
) -> Result<CompiledSchema, SchemaCompilerError> {
    let guard = FormLockGuard::acquire(locks, &form.form_id, &options.lock);
    let result = compile_locked(form, ds, options);
    drop(guard);

    let compiled = result?;
    if !options.settle.is_zero() {
        debug!(form_id = %form.form_id, settle_ms = options.settle.as_millis() as u64, "settling");
        thread::sleep(options.settle);
    }
    Ok(compiled)
}

fn compile_locked(
    form: &FormDefinition,
    ds: &dyn Datastore,
    options: &CompileOptions,
) -> Result<CompiledSchema, SchemaCompilerError> {
    let form_id = form.form_id.as_str();
    let exists = ds
        .has_form_schema(form_id)
        .map_err(|source| SchemaCompilerError::Datastore {
            table: form_id.to_string(),
            source,
        })?;
    if exists {
        return Err(SchemaCompilerError::SchemaAlreadyExists {
            form_id: form_id.to_string(),
        });
    }

    let schema = options
        .schema
        .clone()
        .unwrap_or_else(|| ds.default_schema_name().to_string());

    let TreeBuild {
        drafts,
        naming,
        warnings,
    } = build_schema_tree(form, &schema)?;
    let names = naming.resolve(ds)?;
    let nodes = substitute_placeholders(drafts, &names)?;
    let mut allocator = names.into_allocator();

    let mut tree = SchemaTree::new(nodes)?;
    let tables = materialize(&mut tree, ds, &mut allocator, options.max_attempts)?;
    let nodes = tree.into_nodes();

    if let Err(source) = ds.put_form_schema(form_id, &nodes) {
        for table in &tables {
            if let Err(e) = ds.drop_relation(table) {
                error!(table = %table.name, error = %e, "drop failed after schema write failure");
            }
        }
        return Err(SchemaCompilerError::Datastore {
            table: form_id.to_string(),
            source,
        });
    }

    info!(
        form_id,
        nodes = nodes.len(),
        tables = tables.len(),
        warnings = warnings.len(),
        "compiled form"
    );

    Ok(CompiledSchema {
        form_id: form_id.to_string(),
        title: form.title.clone(),
        version: form.version.clone(),
        nodes,
        tables: tables.into_iter().map(|t| (t.name.clone(), t)).collect(),
        warnings,
        form_hash: form.form_hash.clone(),
    })
}

/// Holds the form schema creation lock; released on drop.
struct FormLockGuard<'a> {
    locks: &'a dyn TaskLock,
    lock_id: String,
    form_id: String,
    options: LockOptions,
}

impl<'a> FormLockGuard<'a> {
    /// Polls until the lock is obtained. Contention and lock service errors
    /// are logged, never returned.
    fn acquire(locks: &'a dyn TaskLock, form_id: &str, options: &LockOptions) -> Self {
        let lock_id = Uuid::new_v4().to_string();
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            match locks.obtain_lock(&lock_id, form_id, TaskLockType::FormSchemaCreation) {
                Ok(true) => break,
                Ok(false) => {}
                Err(e) => warn!(form_id, error = %e, "lock service error"),
            }
            if options.warn_after_attempts > 0 && attempt % options.warn_after_attempts == 0 {
                warn!(form_id, attempts = attempt, "excessive wait for form creation lock");
            }
            thread::sleep(options.backoff(attempt));
        }
        debug!(form_id, lock_id = %lock_id, attempts = attempt, "acquired form creation lock");

        Self {
            locks,
            lock_id,
            form_id: form_id.to_string(),
            options: options.clone(),
        }
    }
}

impl Drop for FormLockGuard<'_> {
    fn drop(&mut self) {
        for attempt in 1..=self.options.release_attempts {
            match self.locks.release_lock(
                &self.lock_id,
                &self.form_id,
                TaskLockType::FormSchemaCreation,
            ) {
                Ok(true) => {
                    debug!(form_id = %self.form_id, "released form creation lock");
                    return;
                }
                Ok(false) => {}
                Err(e) => warn!(form_id = %self.form_id, error = %e, "lock service error on release"),
            }
            thread::sleep(self.options.backoff(attempt));
        }
        warn!(form_id = %self.form_id, "unable to release form creation lock");
    }
}
