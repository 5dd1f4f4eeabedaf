//! Two-phase table and column name resolution
//!
//! While the form tree is walked, every table and column that will be needed
//! is *requested* and an opaque placeholder is handed back. Names cannot be
//! fixed at that point: the length budget for each fragment depends on every
//! other name competing for the same namespace. Once the walk is complete,
//! [`NamingSet::resolve`] shortens all fragments consistently, removes
//! collisions (within the batch and against relations that already exist in
//! the datastore) and returns a [`ResolvedNames`] lookup used to substitute
//! the placeholders.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, error};

use crate::error::SchemaCompilerError;
use crate::persist::Datastore;

use super::trim::trim_name;

/// Opaque token for a requested table name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TablePlaceholder(u32);

/// Opaque token for a requested column name, scoped to one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnPlaceholder(u32);

/// A pending identifier request.
#[derive(Debug, Clone)]
struct Name {
    schema: String,
    prefix: String,
    qualifier: String,
    item: String,
    munged_prefix: String,
    munged_qualifier: String,
    munged_item: String,
    resolved: Option<String>,
}

impl Name {
    fn new(schema: &str, prefix: &str, qualifier: &str, item: &str) -> Self {
        Self {
            schema: schema.to_string(),
            prefix: prefix.to_string(),
            qualifier: qualifier.to_string(),
            item: item.to_string(),
            munged_prefix: String::new(),
            munged_qualifier: String::new(),
            munged_item: String::new(),
            resolved: None,
        }
    }
}

/// Collects name requests; consumed by [`NamingSet::resolve`].
#[derive(Debug, Default)]
pub struct NamingSet {
    tables: BTreeMap<TablePlaceholder, Name>,
    columns: BTreeMap<TablePlaceholder, BTreeMap<ColumnPlaceholder, Name>>,
    counter: u32,
}

impl NamingSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_token(&mut self) -> u32 {
        self.counter += 1;
        self.counter
    }

    /// Record a table request. `prefix`, `qualifier` and `item` must already
    /// be sanitized; `prefix` and `qualifier` may be empty.
    pub fn request_table_name(
        &mut self,
        schema: &str,
        prefix: &str,
        qualifier: &str,
        item: &str,
    ) -> Result<TablePlaceholder, SchemaCompilerError> {
        if schema.is_empty() {
            return Err(invalid_request("table request without a schema"));
        }
        check_fragment("item", item, false)?;
        check_fragment("prefix", prefix, true)?;
        check_fragment("qualifier", qualifier, true)?;

        let placeholder = TablePlaceholder(self.next_token());
        self.tables
            .insert(placeholder, Name::new(schema, prefix, qualifier, item));
        Ok(placeholder)
    }

    /// Record a column request within a previously requested table.
    pub fn request_column_name(
        &mut self,
        table: TablePlaceholder,
        qualifier: &str,
        item: &str,
    ) -> Result<ColumnPlaceholder, SchemaCompilerError> {
        if !self.tables.contains_key(&table) {
            return Err(invalid_request(&format!(
                "column '{}' requested for unknown table {:?}",
                item, table
            )));
        }
        check_fragment("item", item, false)?;
        check_fragment("qualifier", qualifier, true)?;

        let placeholder = ColumnPlaceholder(self.next_token());
        self.columns
            .entry(table)
            .or_default()
            .insert(placeholder, Name::new("", "", qualifier, item));
        Ok(placeholder)
    }

    /// Withdraw a column request that turned out not to need a column
    /// (structured fields such as geopoints, binaries and repeats).
    pub fn release_column_request(&mut self, table: TablePlaceholder, column: ColumnPlaceholder) {
        if let Some(columns) = self.columns.get_mut(&table) {
            columns.remove(&column);
        }
    }

    pub fn table_request_count(&self) -> usize {
        self.tables.len()
    }

    /// Resolve every table name, then every column name.
    pub fn resolve(mut self, ds: &dyn Datastore) -> Result<ResolvedNames, SchemaCompilerError> {
        let max_table_len = ds.max_table_name_len();
        let max_column_len = ds.max_column_name_len();

        let taken = self.resolve_table_names(ds, max_table_len)?;
        self.resolve_column_names(max_column_len)?;

        Ok(ResolvedNames {
            tables: self.tables,
            columns: self.columns,
            allocator: TableNameAllocator {
                taken,
                stem_counters: BTreeMap::new(),
                max_len: max_table_len,
            },
        })
    }

    fn resolve_table_names(
        &mut self,
        ds: &dyn Datastore,
        limit: usize,
    ) -> Result<BTreeSet<(String, String)>, SchemaCompilerError> {
        let budget = TableBudget::compute(self.tables.values(), limit)?;
        debug!(
            limit,
            prefix = budget.prefix,
            qualifier = budget.qualifier,
            item = budget.item,
            "table name budget"
        );

        for nm in self.tables.values_mut() {
            nm.munged_prefix = trim_name(&nm.prefix, budget.prefix);
            nm.munged_qualifier = trim_name(&nm.qualifier, budget.qualifier);
            nm.munged_item = trim_name(&nm.item, budget.item);

            let mut resolved = join_fragments(&[
                &nm.munged_prefix,
                &nm.munged_qualifier,
                &nm.munged_item,
            ]);
            if resolved.chars().count() > limit {
                error!(name = %resolved, "munged table name still too long");
                resolved = trim_name(&resolved, limit);
            }
            nm.resolved = Some(resolved);
        }

        let mut taken: BTreeSet<(String, String)> = BTreeSet::new();
        for (placeholder, nm) in self.tables.iter_mut() {
            let candidate = nm.resolved.clone().unwrap_or_default();
            let unique = unique_name(&candidate, 2, limit, |name| {
                Ok(taken.contains(&(nm.schema.clone(), name.to_string()))
                    || relation_exists(ds, &nm.schema, name)?)
            })?;
            debug!(?placeholder, schema = %nm.schema, item = %nm.item, resolved = %unique.0, "resolved table name");
            taken.insert((nm.schema.clone(), unique.0.clone()));
            nm.resolved = Some(unique.0);
        }

        Ok(taken)
    }

    fn resolve_column_names(&mut self, limit: usize) -> Result<(), SchemaCompilerError> {
        if limit == 0 {
            return Err(SchemaCompilerError::internal(
                "datastore reports a maximum column name length of 0",
            ));
        }

        for (table, columns) in self.columns.iter_mut() {
            // longest item per qualifier, so all items sharing a qualifier
            // get the same qualifier abbreviation
            let mut qual_max_item: BTreeMap<String, usize> = BTreeMap::new();
            for nm in columns.values() {
                let len = nm.item.chars().count();
                let entry = qual_max_item.entry(nm.qualifier.clone()).or_insert(0);
                *entry = (*entry).max(len);
            }

            for nm in columns.values_mut() {
                let max_item = qual_max_item.get(&nm.qualifier).copied().unwrap_or(0);
                let (qualifier, item) = column_fragments(&nm.qualifier, &nm.item, max_item, limit);
                nm.munged_qualifier = qualifier;
                nm.munged_item = item;

                let mut resolved = join_fragments(&[&nm.munged_qualifier, &nm.munged_item]);
                if resolved.chars().count() > limit {
                    error!(name = %resolved, "munged column name still too long");
                    resolved = trim_name(&resolved, limit);
                }
                nm.resolved = Some(resolved);
            }

            let mut in_table: BTreeSet<String> = BTreeSet::new();
            for nm in columns.values_mut() {
                let candidate = nm.resolved.clone().unwrap_or_default();
                let (unique, _) = unique_name(&candidate, 2, limit, |name| Ok(in_table.contains(name)))?;
                in_table.insert(unique.clone());
                nm.resolved = Some(unique);
            }
            debug!(?table, columns = in_table.len(), "resolved column names");
        }
        Ok(())
    }
}

/// Final names, looked up by placeholder.
#[derive(Debug)]
pub struct ResolvedNames {
    tables: BTreeMap<TablePlaceholder, Name>,
    columns: BTreeMap<TablePlaceholder, BTreeMap<ColumnPlaceholder, Name>>,
    allocator: TableNameAllocator,
}

impl ResolvedNames {
    pub fn resolve_table_placeholder(
        &self,
        table: TablePlaceholder,
    ) -> Result<&str, SchemaCompilerError> {
        self.tables
            .get(&table)
            .and_then(|nm| nm.resolved.as_deref())
            .ok_or_else(|| SchemaCompilerError::internal(format!("unknown table placeholder {:?}", table)))
    }

    /// `None` in, `None` out: nodes without a column stay without one.
    pub fn resolve_column_placeholder(
        &self,
        table: TablePlaceholder,
        column: Option<ColumnPlaceholder>,
    ) -> Result<Option<&str>, SchemaCompilerError> {
        let Some(column) = column else {
            return Ok(None);
        };
        self.columns
            .get(&table)
            .and_then(|cols| cols.get(&column))
            .and_then(|nm| nm.resolved.as_deref())
            .map(Some)
            .ok_or_else(|| {
                SchemaCompilerError::internal(format!(
                    "unknown column placeholder {:?} in table {:?}",
                    column, table
                ))
            })
    }

    /// Hand over the set of claimed table names for post-resolution
    /// allocation (table splitting).
    pub fn into_allocator(self) -> TableNameAllocator {
        self.allocator
    }
}

/// Allocates further unique table names once resolution is complete.
#[derive(Debug)]
pub struct TableNameAllocator {
    taken: BTreeSet<(String, String)>,
    stem_counters: BTreeMap<String, u64>,
    max_len: usize,
}

impl TableNameAllocator {
    /// A fresh table name derived from `original`: trailing digits are
    /// stripped and the next unused counter for that stem is appended.
    pub fn generate_unique_table_name(
        &mut self,
        schema: &str,
        original: &str,
        ds: &dyn Datastore,
    ) -> Result<String, SchemaCompilerError> {
        let key = (schema.to_string(), original.to_string());
        if !self.taken.contains(&key) && !relation_exists(ds, schema, original)? {
            self.taken.insert(key);
            return Ok(original.to_string());
        }

        let stem = strip_trailing_digits(original);
        let start = self.stem_counters.get(stem).copied().unwrap_or(2);
        let taken = &self.taken;
        let (name, next) = unique_name(stem, start, self.max_len, |name| {
            Ok(taken.contains(&(schema.to_string(), name.to_string()))
                || relation_exists(ds, schema, name)?)
        })?;

        self.stem_counters.insert(stem.to_string(), next);
        self.taken.insert((schema.to_string(), name.clone()));
        Ok(name)
    }
}

struct TableBudget {
    prefix: usize,
    qualifier: usize,
    item: usize,
}

impl TableBudget {
    fn compute<'a>(
        names: impl Iterator<Item = &'a Name>,
        limit: usize,
    ) -> Result<Self, SchemaCompilerError> {
        let (mut max_prefix, mut max_qual, mut max_item) = (0usize, 0usize, 0usize);
        for nm in names {
            max_prefix = max_prefix.max(nm.prefix.chars().count());
            max_qual = max_qual.max(nm.qualifier.chars().count());
            max_item = max_item.max(nm.item.chars().count());
        }

        let seps = usize::from(max_prefix > 0) + usize::from(max_qual > 0);
        if limit <= seps {
            return Err(SchemaCompilerError::internal(format!(
                "datastore maximum table name length {} leaves no room for names",
                limit
            )));
        }

        if max_prefix + max_qual + max_item + seps <= limit {
            return Ok(Self {
                prefix: max_prefix,
                qualifier: max_qual,
                item: max_item,
            });
        }

        if max_prefix + max_qual + seps <= (2 * limit) / 5 {
            return Ok(Self {
                prefix: max_prefix,
                qualifier: max_qual,
                item: limit - seps - max_prefix - max_qual,
            });
        }

        // the item gets ~60%, the prefix a third of the rest
        let item = ((3 * limit) / 5).min(max_item).clamp(1, limit - seps);
        let remainder = limit - seps - item;
        let prefix = (remainder / 3).min(max_prefix);
        let qualifier = (remainder - prefix).min(max_qual);
        let item = (limit - seps - prefix - qualifier).min(max_item);

        Ok(Self {
            prefix,
            qualifier,
            item,
        })
    }
}

/// Split the column budget between qualifier and item.
fn column_fragments(qualifier: &str, item: &str, max_item: usize, limit: usize) -> (String, String) {
    let qual_len = qualifier.chars().count();
    // what the longest item with this qualifier leaves for the qualifier
    let remainder = limit as isize - max_item as isize - 1;

    if qual_len == 0 {
        (String::new(), trim_name(item, limit))
    } else if qual_len as isize <= remainder {
        (qualifier.to_string(), item.to_string())
    } else if remainder >= 3
        && (qual_len <= 11 || remainder as usize >= (qual_len - 2).to_string().len() + 2)
    {
        (trim_name(qualifier, remainder as usize), item.to_string())
    } else {
        let third = limit / 3;
        (
            trim_name(qualifier, third.saturating_sub(1)),
            trim_name(item, limit - third),
        )
    }
}

fn join_fragments(fragments: &[&str]) -> String {
    fragments
        .iter()
        .filter(|f| !f.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// `base` itself if free, otherwise `base` (trimmed to make room) followed by
/// the first free counter starting at `start`. Returns the name and the next
/// counter value.
fn unique_name<F>(
    base: &str,
    start: u64,
    limit: usize,
    mut is_taken: F,
) -> Result<(String, u64), SchemaCompilerError>
where
    F: FnMut(&str) -> Result<bool, SchemaCompilerError>,
{
    if !base.is_empty() && base.chars().count() <= limit && !is_taken(base)? {
        return Ok((base.to_string(), start));
    }

    let mut counter = start;
    loop {
        let digits = counter.to_string();
        if digits.len() >= limit {
            return Err(SchemaCompilerError::internal(format!(
                "unable to find a unique name for {} within {} characters",
                base, limit
            )));
        }
        let candidate = format!("{}{}", trim_name(base, limit - digits.len()), digits);
        counter += 1;
        if !is_taken(&candidate)? {
            return Ok((candidate, counter));
        }
    }
}

fn strip_trailing_digits(name: &str) -> &str {
    let stripped = name.trim_end_matches(|c: char| c.is_ascii_digit());
    if stripped.is_empty() {
        name
    } else {
        stripped
    }
}

fn relation_exists(ds: &dyn Datastore, schema: &str, name: &str) -> Result<bool, SchemaCompilerError> {
    ds.has_relation(schema, name)
        .map_err(|source| SchemaCompilerError::Datastore {
            table: format!("{}.{}", schema, name),
            source,
        })
}

fn check_fragment(what: &str, fragment: &str, may_be_empty: bool) -> Result<(), SchemaCompilerError> {
    if fragment.is_empty() {
        if may_be_empty {
            return Ok(());
        }
        return Err(invalid_request(&format!("empty {} fragment", what)));
    }
    let sanitized = fragment
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
    if sanitized {
        Ok(())
    } else {
        Err(invalid_request(&format!(
            "{} fragment '{}' is not a sanitized identifier",
            what, fragment
        )))
    }
}

fn invalid_request(message: &str) -> SchemaCompilerError {
    SchemaCompilerError::InvalidNameRequest {
        message: message.to_string(),
    }
}
