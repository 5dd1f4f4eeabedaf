//! Storage backend interface

use thiserror::Error;

use crate::model::SchemaNode;

use super::TableDescriptor;

/// Failures reported by a storage backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatastoreError {
    #[error("relation {table} has {columns} data columns, the limit is {max}")]
    TooManyColumns {
        table: String,
        columns: usize,
        max: usize,
    },

    #[error("identifier {name} exceeds {max} characters")]
    NameTooLong { name: String, max: usize },

    #[error("relation {name} already exists")]
    AlreadyExists { name: String },

    #[error("relation {name} does not exist")]
    NotFound { name: String },

    #[error("relation {table} rejected: {reason}")]
    Rejected { table: String, reason: String },

    #[error("datastore unavailable: {message}")]
    Unavailable { message: String },
}

/// The relational backend the compiler creates tables in.
///
/// Implementations are shared between concurrent compilations of different
/// forms, hence `&self` receivers and the `Send + Sync` bound.
pub trait Datastore: Send + Sync {
    fn default_schema_name(&self) -> &str;

    fn max_table_name_len(&self) -> usize;

    fn max_column_name_len(&self) -> usize;

    fn has_relation(&self, schema: &str, name: &str) -> Result<bool, DatastoreError>;

    /// Create a new physical table. Fails on width or constraint violations.
    fn create_relation(&self, table: &TableDescriptor) -> Result<(), DatastoreError>;

    fn drop_relation(&self, table: &TableDescriptor) -> Result<(), DatastoreError>;

    /// Create the table if missing, otherwise verify its definition.
    fn assert_relation(&self, table: &TableDescriptor) -> Result<(), DatastoreError>;

    fn has_form_schema(&self, form_id: &str) -> Result<bool, DatastoreError>;

    fn put_form_schema(&self, form_id: &str, nodes: &[SchemaNode]) -> Result<(), DatastoreError>;
}
