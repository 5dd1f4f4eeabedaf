//! Error types for form-schema-compiler

use std::path::PathBuf;
use thiserror::Error;

use crate::persist::DatastoreError;

/// Broad classification reported to callers of a failed compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The form definition itself is unusable; the author must fix it.
    MalformedForm,
    /// The compiler or its storage backend failed.
    Internal,
}

/// Errors that can occur during form schema compilation
#[derive(Error, Debug)]
pub enum SchemaCompilerError {
    #[error("Failed to read form file: {path}")]
    FormReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse form file: {path}")]
    FormParseError {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("Invalid form definition: {message}")]
    MalformedForm { message: String },

    #[error("Form id is not well formed: {form_id}")]
    InvalidFormId { form_id: String },

    #[error("Unsupported content type '{content_type}' on element {path}")]
    UnsupportedContentType { path: String, content_type: String },

    #[error("Invalid name request: {message}")]
    InvalidNameRequest { message: String },

    #[error("A schema for form {form_id} already exists")]
    SchemaAlreadyExists { form_id: String },

    #[error("Datastore failure on {table}")]
    Datastore {
        table: String,
        #[source]
        source: DatastoreError,
    },

    #[error("Schema compiler internal error: {message}")]
    Internal { message: String },

    #[error("Failed to write schema package to {path}")]
    PackageWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SchemaCompilerError {
    pub fn internal(message: impl Into<String>) -> Self {
        SchemaCompilerError::Internal {
            message: message.into(),
        }
    }

    /// Distinguishes author mistakes from compiler/backend failures.
    pub fn kind(&self) -> FailureKind {
        match self {
            SchemaCompilerError::FormParseError { .. }
            | SchemaCompilerError::MalformedForm { .. }
            | SchemaCompilerError::InvalidFormId { .. }
            | SchemaCompilerError::UnsupportedContentType { .. }
            | SchemaCompilerError::InvalidNameRequest { .. }
            | SchemaCompilerError::SchemaAlreadyExists { .. } => FailureKind::MalformedForm,
            SchemaCompilerError::FormReadError { .. }
            | SchemaCompilerError::Datastore { .. }
            | SchemaCompilerError::Internal { .. }
            | SchemaCompilerError::PackageWriteError { .. } => FailureKind::Internal,
        }
    }
}
