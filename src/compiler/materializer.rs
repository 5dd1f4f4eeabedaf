//! Creating the physical tables implied by a schema tree

use std::collections::{BTreeMap, HashMap};

use tracing::{error, info, warn};

use crate::error::SchemaCompilerError;
use crate::model::{ElementKind, SchemaTree};
use crate::naming::TableNameAllocator;
use crate::persist::{
    ColumnDescriptor, ColumnType, Datastore, DatastoreError, TableDescriptor, TableShape,
};

use super::splitter::divide_table;

/// Derive one descriptor per distinct table, in order of first appearance.
pub fn derive_tables(tree: &SchemaTree) -> Result<Vec<TableDescriptor>, SchemaCompilerError> {
    let mut order: Vec<String> = Vec::new();
    let mut shapes: HashMap<String, TableShape> = HashMap::new();
    let mut schemas: HashMap<String, String> = HashMap::new();
    let mut columns: HashMap<String, Vec<ColumnDescriptor>> = HashMap::new();

    for (idx, node) in tree.nodes().iter().enumerate() {
        let table = node.persist_as_table.as_deref().ok_or_else(|| {
            SchemaCompilerError::internal(format!("node {} has no table", node.uri))
        })?;
        if !schemas.contains_key(table) {
            order.push(table.to_string());
            schemas.insert(table.to_string(), node.persist_as_schema.clone());
        }

        if let Some(column) = &node.persist_as_column {
            let column_type = ColumnType::for_kind(node.kind).ok_or_else(|| {
                SchemaCompilerError::internal(format!(
                    "node {} of kind {} cannot hold a column",
                    node.uri,
                    node.kind.type_name()
                ))
            })?;
            columns
                .entry(table.to_string())
                .or_default()
                .push(ColumnDescriptor::data(column, column_type));
        }

        // the node entering a table decides its shape
        let parent_table = tree
            .parent_of(idx)
            .and_then(|p| tree.node(p).persist_as_table.as_deref());
        if parent_table == Some(table) {
            continue;
        }
        let shape = match (node.is_root(), node.kind) {
            (true, _) => TableShape::TopLevelDynamic,
            (false, ElementKind::MultiSelect) => TableShape::SelectChoice,
            (false, ElementKind::Binary) => TableShape::BinaryContent,
            (false, ElementKind::BinaryContentRef) => TableShape::BinaryContentRefBlob,
            (false, ElementKind::RefBlob) => TableShape::RefBlob,
            (false, _) => TableShape::Dynamic,
        };
        match shapes.get(table) {
            Some(existing) if *existing != shape => {
                return Err(SchemaCompilerError::internal(format!(
                    "table {} is used as both {} and {}",
                    table,
                    existing.name(),
                    shape.name()
                )));
            }
            Some(_) => {}
            None => {
                shapes.insert(table.to_string(), shape);
            }
        }
    }

    order
        .into_iter()
        .map(|name| {
            let shape = shapes.get(&name).copied().ok_or_else(|| {
                SchemaCompilerError::internal(format!("no node enters table {}", name))
            })?;
            let schema = schemas.get(&name).cloned().unwrap_or_default();
            let data = columns.remove(&name).unwrap_or_default();
            Ok(TableDescriptor::new(&schema, &name, shape, data))
        })
        .collect()
}

/// Create every table of `tree`, dividing dynamic tables the datastore
/// rejects. On failure every table created here is dropped again.
pub fn materialize(
    tree: &mut SchemaTree,
    ds: &dyn Datastore,
    allocator: &mut TableNameAllocator,
    max_attempts: u32,
) -> Result<Vec<TableDescriptor>, SchemaCompilerError> {
    let mut created: BTreeMap<String, TableDescriptor> = BTreeMap::new();
    match create_tables(tree, ds, allocator, max_attempts, &mut created) {
        Ok(tables) => Ok(tables),
        Err(e) => {
            warn!(error = %e, "aborting table creation; dropping created tables");
            roll_back(ds, &created);
            Err(e)
        }
    }
}

fn create_tables(
    tree: &mut SchemaTree,
    ds: &dyn Datastore,
    allocator: &mut TableNameAllocator,
    max_attempts: u32,
    created: &mut BTreeMap<String, TableDescriptor>,
) -> Result<Vec<TableDescriptor>, SchemaCompilerError> {
    let mut rejections = RejectionLog::default();

    for attempt in 1..=max_attempts {
        let tables = derive_tables(tree)?;
        let mut too_wide: Vec<TableDescriptor> = Vec::new();
        let mut renamed = false;

        for table in &tables {
            if created.contains_key(&table.name) {
                continue;
            }
            match ds.create_relation(table) {
                Ok(()) => {
                    created.insert(table.name.clone(), table.clone());
                }
                Err(DatastoreError::AlreadyExists { .. }) => {
                    // someone else claimed the name after it was resolved
                    let fresh =
                        allocator.generate_unique_table_name(&table.schema, &table.name, ds)?;
                    warn!(table = %table.name, new_table = %fresh, "table name taken; renaming");
                    rename_table(tree, &table.name, &fresh);
                    renamed = true;
                }
                Err(err) => {
                    warn!(table = %table.name, error = %err, "create failed");
                    if !table.shape.is_dynamic() {
                        return Err(SchemaCompilerError::Datastore {
                            table: table.name.clone(),
                            source: err,
                        });
                    }
                    too_wide.push(table.clone());
                }
            }
        }

        if too_wide.is_empty() && !renamed {
            for table in &tables {
                ds.assert_relation(table)
                    .map_err(|source| SchemaCompilerError::Datastore {
                        table: table.name.clone(),
                        source,
                    })?;
            }
            info!(tables = tables.len(), attempts = attempt, "created tables");
            return Ok(tables);
        }

        for table in &too_wide {
            let n = rejections.record(table)?;
            divide_table(tree, &table.name, n, ds, allocator)?;
        }
    }

    Err(SchemaCompilerError::internal(format!(
        "tables still not created after {} attempts",
        max_attempts
    )))
}

/// Data columns of every table the datastore rejected as too wide.
#[derive(Debug, Default)]
struct RejectionLog {
    columns: HashMap<String, Vec<String>>,
}

impl RejectionLog {
    /// Record a rejection and return the table's data column count. A table
    /// rejected again with an unchanged column set means dividing it made no
    /// progress.
    fn record(&mut self, table: &TableDescriptor) -> Result<usize, SchemaCompilerError> {
        let columns = table.data_column_names();
        if self.columns.get(&table.name) == Some(&columns) {
            return Err(SchemaCompilerError::internal(format!(
                "table {} was rejected twice with the same {} columns",
                table.name,
                columns.len()
            )));
        }
        let n = columns.len();
        self.columns.insert(table.name.clone(), columns);
        Ok(n)
    }
}

fn rename_table(tree: &mut SchemaTree, from: &str, to: &str) {
    for idx in 0..tree.len() {
        if tree.node(idx).in_table(from) {
            tree.node_mut(idx).persist_as_table = Some(to.to_string());
        }
    }
}

/// Drop the tables this compilation created. Names it never created may
/// belong to someone else and are left alone.
fn roll_back(ds: &dyn Datastore, created: &BTreeMap<String, TableDescriptor>) {
    for table in created.values() {
        error!(table = %table.name, "dropping");
        if let Err(e) = ds.drop_relation(table) {
            error!(table = %table.name, error = %e, "drop failed during rollback");
        }
    }
}
