//! In-memory datastore

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::model::SchemaNode;

use super::{Datastore, DatastoreError, TableDescriptor};

/// Default schema for relations created by the compiler
pub const DEFAULT_SCHEMA: &str = "ODK";

/// Limits enforced by [`MemoryDatastore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageLimits {
    pub max_table_name_len: usize,
    pub max_column_name_len: usize,
    /// Counts form-derived columns only; metadata columns are free
    pub max_data_columns: usize,
}

impl Default for StorageLimits {
    fn default() -> Self {
        Self {
            max_table_name_len: 64,
            max_column_name_len: 64,
            max_data_columns: 1000,
        }
    }
}

#[derive(Debug, Default)]
struct CatalogState {
    relations: BTreeMap<(String, String), TableDescriptor>,
    injected_failures: BTreeSet<String>,
    form_schemas: BTreeMap<String, Vec<SchemaNode>>,
    dropped: Vec<String>,
}

/// A relation catalog held in memory
#[derive(Debug)]
pub struct MemoryDatastore {
    schema: String,
    limits: StorageLimits,
    state: Mutex<CatalogState>,
}

impl Default for MemoryDatastore {
    fn default() -> Self {
        Self::new(StorageLimits::default())
    }
}

impl MemoryDatastore {
    pub fn new(limits: StorageLimits) -> Self {
        Self {
            schema: DEFAULT_SCHEMA.to_string(),
            limits,
            state: Mutex::new(CatalogState::default()),
        }
    }

    pub fn limits(&self) -> StorageLimits {
        self.limits
    }

    fn state(&self) -> MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a relation that exists before compilation starts.
    pub fn add_existing_relation(&self, schema: &str, name: &str) {
        let table = TableDescriptor::new(schema, name, super::TableShape::Dynamic, Vec::new());
        self.state()
            .relations
            .insert((schema.to_string(), name.to_string()), table);
    }

    /// Make every creation of `name` fail.
    pub fn fail_creation_of(&self, name: &str) {
        self.state().injected_failures.insert(name.to_string());
    }

    pub fn relation(&self, schema: &str, name: &str) -> Option<TableDescriptor> {
        self.state()
            .relations
            .get(&(schema.to_string(), name.to_string()))
            .cloned()
    }

    pub fn relation_names(&self) -> Vec<String> {
        self.state()
            .relations
            .keys()
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Names of relations dropped so far, in order
    pub fn dropped_relations(&self) -> Vec<String> {
        self.state().dropped.clone()
    }

    pub fn form_schema(&self, form_id: &str) -> Option<Vec<SchemaNode>> {
        self.state().form_schemas.get(form_id).cloned()
    }

    fn check_names(&self, table: &TableDescriptor) -> Result<(), DatastoreError> {
        if table.name.chars().count() > self.limits.max_table_name_len {
            return Err(DatastoreError::NameTooLong {
                name: table.name.clone(),
                max: self.limits.max_table_name_len,
            });
        }
        for column in table.columns.iter().filter(|c| !c.is_metadata) {
            if column.name.chars().count() > self.limits.max_column_name_len {
                return Err(DatastoreError::NameTooLong {
                    name: column.name.clone(),
                    max: self.limits.max_column_name_len,
                });
            }
        }
        Ok(())
    }
}

impl Datastore for MemoryDatastore {
    fn default_schema_name(&self) -> &str {
        &self.schema
    }

    fn max_table_name_len(&self) -> usize {
        self.limits.max_table_name_len
    }

    fn max_column_name_len(&self) -> usize {
        self.limits.max_column_name_len
    }

    fn has_relation(&self, schema: &str, name: &str) -> Result<bool, DatastoreError> {
        Ok(self
            .state()
            .relations
            .contains_key(&(schema.to_string(), name.to_string())))
    }

    fn create_relation(&self, table: &TableDescriptor) -> Result<(), DatastoreError> {
        self.check_names(table)?;

        let mut state = self.state();
        if state.injected_failures.contains(&table.name) {
            return Err(DatastoreError::Rejected {
                table: table.name.clone(),
                reason: "creation refused".to_string(),
            });
        }
        let key = (table.schema.clone(), table.name.clone());
        if state.relations.contains_key(&key) {
            return Err(DatastoreError::AlreadyExists {
                name: table.name.clone(),
            });
        }
        let columns = table.data_column_count();
        if columns > self.limits.max_data_columns {
            return Err(DatastoreError::TooManyColumns {
                table: table.name.clone(),
                columns,
                max: self.limits.max_data_columns,
            });
        }

        debug!(table = %table.name, columns, "created relation");
        state.relations.insert(key, table.clone());
        Ok(())
    }

    fn drop_relation(&self, table: &TableDescriptor) -> Result<(), DatastoreError> {
        let mut state = self.state();
        let key = (table.schema.clone(), table.name.clone());
        match state.relations.remove(&key) {
            Some(_) => {
                state.dropped.push(table.name.clone());
                Ok(())
            }
            None => Err(DatastoreError::NotFound {
                name: table.name.clone(),
            }),
        }
    }

    fn assert_relation(&self, table: &TableDescriptor) -> Result<(), DatastoreError> {
        let existing = self.relation(&table.schema, &table.name);
        match existing {
            None => self.create_relation(table),
            Some(found) if found.columns == table.columns => Ok(()),
            Some(_) => Err(DatastoreError::Rejected {
                table: table.name.clone(),
                reason: "existing relation has a different definition".to_string(),
            }),
        }
    }

    fn has_form_schema(&self, form_id: &str) -> Result<bool, DatastoreError> {
        Ok(self.state().form_schemas.contains_key(form_id))
    }

    fn put_form_schema(&self, form_id: &str, nodes: &[SchemaNode]) -> Result<(), DatastoreError> {
        self.state()
            .form_schemas
            .insert(form_id.to_string(), nodes.to_vec());
        Ok(())
    }
}
