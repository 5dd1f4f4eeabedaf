//! form-schema-compiler: compiles XForm definitions into relational schemas
//!
//! A form's element tree is mapped onto tables and columns whose names fit
//! the storage backend's length limits. Tables the backend rejects as too
//! wide are divided into continuation tables until every table fits.

pub mod compiler;
pub mod error;
pub mod form;
pub mod model;
pub mod naming;
pub mod package;
pub mod persist;
pub mod util;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use glob::Pattern;
use rayon::prelude::*;
use tracing::info;
use walkdir::WalkDir;

pub use compiler::{compile_form, CompileOptions, CompiledSchema};
pub use error::{FailureKind, SchemaCompilerError};
pub use form::{parse_form_file, FormDefinition};
pub use persist::{Datastore, MemoryDatastore, MemoryTaskLock, StorageLimits, TaskLock};

/// Options for compiling one form file into a schema package
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Path to the XForm file
    pub form_path: PathBuf,
    /// Output path for the package (defaults to `<form>.schema.zip` next to the form)
    pub output_path: Option<PathBuf>,
    /// Limits of the in-memory datastore compiled against
    pub limits: StorageLimits,
    pub verbose: bool,
}

/// Options for compiling every matching form under a directory
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Directory searched recursively
    pub dir: PathBuf,
    /// File name pattern, e.g. `*.xml`
    pub pattern: String,
    /// Root for packages; the layout below `dir` is mirrored. Defaults to
    /// next to each form.
    pub output_dir: Option<PathBuf>,
    /// Limits of the shared in-memory datastore
    pub limits: StorageLimits,
}

/// One successfully compiled form of a batch
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub form_id: String,
    pub package_path: PathBuf,
    pub tables: usize,
}

/// Compile a form file against a fresh in-memory datastore and write the
/// schema package
pub fn build_schema_package(options: BuildOptions) -> Result<PathBuf> {
    let ds = MemoryDatastore::new(options.limits);
    let locks = MemoryTaskLock::new();
    let compile_options = CompileOptions {
        settle: Duration::ZERO,
        ..CompileOptions::default()
    };
    let (compiled, output_path) = compile_file(
        &options.form_path,
        options.output_path.clone(),
        &ds,
        &locks,
        &compile_options,
    )?;

    if options.verbose {
        println!("Compiled form {}", compiled.form_id);
        for table in compiled.tables.values() {
            println!(
                "  {}.{} ({}, {} data columns)",
                table.schema,
                table.name,
                table.shape.name(),
                table.data_column_count()
            );
        }
        for warning in &compiled.warnings {
            println!("  warning: {}", warning);
        }
        println!("Created package: {}", output_path.display());
    }

    Ok(output_path)
}

/// Parse, compile and package one form file using shared collaborators.
pub fn compile_file(
    form_path: &Path,
    output_path: Option<PathBuf>,
    ds: &dyn Datastore,
    locks: &dyn TaskLock,
    options: &CompileOptions,
) -> Result<(CompiledSchema, PathBuf)> {
    info!(form = %form_path.display(), "compiling form");

    let form = form::parse_form_file(form_path)?;
    let compiled = compile_form(&form, ds, locks, options)?;

    info!(
        form_id = %compiled.form_id,
        tables = compiled.tables.len(),
        nodes = compiled.nodes.len(),
        "compiled schema"
    );

    let output_path = output_path.unwrap_or_else(|| default_output_path(form_path));
    package::create_schema_package(&compiled, &output_path)?;

    info!(package = %output_path.display(), "wrote schema package");
    Ok((compiled, output_path))
}

fn default_output_path(form_path: &Path) -> PathBuf {
    let dir = form_path.parent().unwrap_or(Path::new("."));
    let stem = form_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("form");
    dir.join(format!("{}.schema.zip", stem))
}

/// Compile every form under `options.dir` in parallel against one shared
/// in-memory datastore and lock table. Per-form results are returned in
/// path order.
pub fn build_schema_packages(
    options: &BatchOptions,
) -> Result<Vec<(PathBuf, Result<BatchEntry>)>> {
    let pattern = Pattern::new(&options.pattern)?;
    let forms = find_forms(&options.dir, &pattern);
    if forms.is_empty() {
        bail!(
            "no files matching '{}' under {}",
            options.pattern,
            options.dir.display()
        );
    }

    let ds = MemoryDatastore::new(options.limits);
    let locks = MemoryTaskLock::new();
    let compile_options = CompileOptions {
        settle: Duration::ZERO,
        ..CompileOptions::default()
    };

    let results = forms
        .par_iter()
        .map(|path| {
            let output = options
                .output_dir
                .as_deref()
                .map(|out| batch_output_path(&options.dir, out, path));
            let result = compile_file(path, output, &ds, &locks, &compile_options).map(
                |(compiled, package_path)| BatchEntry {
                    form_id: compiled.form_id,
                    package_path,
                    tables: compiled.tables.len(),
                },
            );
            (path.clone(), result)
        })
        .collect();

    Ok(results)
}

fn find_forms(dir: &Path, pattern: &Pattern) -> Vec<PathBuf> {
    let mut forms: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.file_name()
                .to_str()
                .is_some_and(|name| pattern.matches(name))
        })
        .map(|e| e.into_path())
        .collect();
    forms.sort();
    forms
}

/// `<output_dir>/<path relative to dir>` with a `.schema.zip` extension, so
/// forms sharing a file name in different directories do not collide.
fn batch_output_path(dir: &Path, output_dir: &Path, form_path: &Path) -> PathBuf {
    let relative = match form_path.strip_prefix(dir) {
        Ok(relative) => relative.to_path_buf(),
        Err(_) => PathBuf::from(form_path.file_name().unwrap_or_default()),
    };
    output_dir.join(relative).with_extension("schema.zip")
}
