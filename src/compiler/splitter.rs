//! Dividing a table the datastore refused to create
//!
//! A dynamic table that is too wide is relieved either by moving whole
//! nested subtrees (groups, geopoints) into a fresh table, or, when no
//! subtree is large enough, by inserting a phantom node that takes over a
//! contiguous run of siblings and stores them in a continuation table.

use std::collections::BTreeSet;

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::SchemaCompilerError;
use crate::model::{ElementKind, SchemaNode, SchemaTree};
use crate::naming::TableNameAllocator;
use crate::persist::Datastore;

/// Subtrees holding more than this many columns are always worth moving
const CLEAVE_MIN_COLUMNS: usize = 10;

/// Rearrange `tree` so that fewer than `n` data columns remain in `table`.
pub(crate) fn divide_table(
    tree: &mut SchemaTree,
    table: &str,
    n: usize,
    ds: &dyn Datastore,
    allocator: &mut TableNameAllocator,
) -> Result<(), SchemaCompilerError> {
    info!(table, columns = n, "dividing table");
    if n < 2 {
        return Err(SchemaCompilerError::internal(format!(
            "too few columns to subdivide table {}",
            table
        )));
    }

    let child_lists = tree.child_lists();
    let mut content_parents = find_content_parents(tree, &child_lists, table);
    if content_parents.is_empty() {
        return Err(SchemaCompilerError::internal(format!(
            "no schema nodes are stored in table {}",
            table
        )));
    }

    // descend while a single subtree dominates
    let structural = loop {
        let mut structural: Vec<(usize, usize)> = content_parents
            .iter()
            .filter(|&&i| !tree.node(i).has_column())
            .map(|&i| (i, count_in_same_table(tree, &child_lists, i)))
            .collect();
        structural.sort_by(|a, b| b.1.cmp(&a.1));

        let Some(&(largest, largest_count)) = structural.first() else {
            break structural;
        };
        if content_parents.len() == 1 || largest_count > (3 * n) / 4 {
            debug!(
                table,
                node = %tree.node(largest).uri,
                columns = largest_count,
                "descending into dominant subtree"
            );
            content_parents = child_lists[largest]
                .iter()
                .copied()
                .filter(|&c| tree.node(c).in_table(table))
                .collect();
            continue;
        }
        break structural;
    };

    let schema = tree
        .node(content_parents.iter().next().copied().unwrap_or(tree.root()))
        .persist_as_schema
        .clone();
    let new_table = allocator.generate_unique_table_name(&schema, table, ds)?;

    let cleavable: Vec<(usize, usize)> = structural
        .into_iter()
        .filter(|&(_, count)| count > CLEAVE_MIN_COLUMNS || count > n / 4)
        .collect();
    if !cleavable.is_empty() {
        let mut moved = 0;
        for (idx, count) in cleavable {
            if moved + count > (3 * n) / 4 {
                continue;
            }
            reassign_subtree(tree, &child_lists, idx, table, &new_table);
            moved += count;
            if moved > n / 2 {
                break;
            }
        }
        if moved > 0 {
            info!(table, new_table = %new_table, columns = moved, "cleaved along groups");
            return Ok(());
        }
    }

    info!(table, "unable to cleave along groups; creating phantom table");
    insert_phantom(
        tree,
        &child_lists,
        &content_parents,
        table,
        &new_table,
        n,
    )
}

/// For every node in `table`, the topmost ancestor reachable without
/// leaving the table or crossing a parent that is already spread across
/// several data tables.
fn find_content_parents(
    tree: &SchemaTree,
    child_lists: &[Vec<usize>],
    table: &str,
) -> BTreeSet<usize> {
    let mut parents = BTreeSet::new();
    for idx in 0..tree.len() {
        if !tree.node(idx).in_table(table) {
            continue;
        }
        let mut top = idx;
        while let Some(parent) = tree.parent_of(top) {
            if !tree.node(parent).in_table(table) {
                break;
            }
            let fragmented = child_lists[parent].iter().any(|&c| {
                let child = tree.node(c);
                !child.in_table(table) && !child.kind.has_own_table()
            });
            if fragmented {
                break;
            }
            top = parent;
        }
        parents.insert(top);
    }
    parents
}

/// Columns of `idx` and of its descendants reachable through nodes stored in
/// the same table.
fn count_in_same_table(tree: &SchemaTree, child_lists: &[Vec<usize>], idx: usize) -> usize {
    let node = tree.node(idx);
    let own = usize::from(node.has_column());
    own + child_lists[idx]
        .iter()
        .filter(|&&c| tree.node(c).persist_as_table == node.persist_as_table)
        .map(|&c| count_in_same_table(tree, child_lists, c))
        .sum::<usize>()
}

/// Move `idx` and its descendants stored in `from` into table `to`.
fn reassign_subtree(
    tree: &mut SchemaTree,
    child_lists: &[Vec<usize>],
    idx: usize,
    from: &str,
    to: &str,
) {
    let mut stack = vec![idx];
    while let Some(i) = stack.pop() {
        if !tree.node(i).in_table(from) {
            continue;
        }
        tree.node_mut(i).persist_as_table = Some(to.to_string());
        stack.extend(child_lists[i].iter().copied());
    }
}

fn insert_phantom(
    tree: &mut SchemaTree,
    child_lists: &[Vec<usize>],
    content_parents: &BTreeSet<usize>,
    table: &str,
    new_table: &str,
    n: usize,
) -> Result<(), SchemaCompilerError> {
    // the parent holding the most column-bearing content parents; purely
    // structural content parents only count when there are no others
    let mut tallies = tally_parents(
        tree,
        content_parents.iter().filter(|&&cp| tree.node(cp).has_column()),
    );
    if tallies.is_empty() {
        tallies = tally_parents(tree, content_parents.iter());
    }
    let parent = tallies
        .iter()
        .fold(None, |best: Option<(usize, usize)>, &(p, t)| match best {
            Some((_, bt)) if bt >= t => best,
            _ => Some((p, t)),
        })
        .map(|(p, _)| p)
        .ok_or_else(|| {
            SchemaCompilerError::internal(format!(
                "no parent found for a phantom table splitting {}",
                table
            ))
        })?;

    let children = &child_lists[parent];
    let counts: Vec<usize> = children
        .iter()
        .map(|&c| count_in_same_table(tree, child_lists, c))
        .collect();

    // longest contiguous span of children in `table`; children stored in
    // their own tables do not interrupt a span
    let mut best: Option<(usize, usize)> = None;
    let mut span_start = 0;
    let mut span_total = 0;
    for (pos, &c) in children.iter().enumerate() {
        let child = tree.node(c);
        if child.kind.has_own_table() {
            continue;
        }
        if !child.in_table(table) || counts[pos] == 0 {
            span_start = pos + 1;
            span_total = 0;
            continue;
        }
        span_total += counts[pos];
        if best.map_or(true, |(_, total)| span_total > total) {
            best = Some((span_start, span_total));
        }
    }
    let (start, _) = best.ok_or_else(|| {
        SchemaCompilerError::internal(format!(
            "no contiguous run of columns to move out of table {}",
            table
        ))
    })?;

    let first_ordinal = tree.node(children[start]).ordinal;
    let parent_node = tree.node(parent);
    let phantom = SchemaNode {
        uri: format!("uuid:{}", Uuid::new_v4()),
        ordinal: first_ordinal,
        parent_uri: Some(parent_node.uri.clone()),
        element_name: None,
        kind: ElementKind::Phantom,
        persist_as_table: Some(new_table.to_string()),
        persist_as_column: None,
        persist_as_schema: parent_node.persist_as_schema.clone(),
    };
    let phantom_uri = phantom.uri.clone();
    tree.push(phantom)?;

    let desired = n / 2;
    let mut moved = 0;
    let mut ordinal = 0;
    let mut pos = start;
    while pos < children.len() && moved < desired {
        let c = children[pos];
        let child = tree.node(c);
        if !child.kind.has_own_table() {
            if !child.in_table(table) || counts[pos] == 0 {
                break;
            }
            reassign_subtree(tree, child_lists, c, table, new_table);
            moved += counts[pos];
        }
        ordinal += 1;
        let child = tree.node_mut(c);
        child.parent_uri = Some(phantom_uri.clone());
        child.ordinal = ordinal;
        pos += 1;
    }

    let mut remaining = first_ordinal;
    for &c in &children[pos..] {
        remaining += 1;
        tree.node_mut(c).ordinal = remaining;
    }

    info!(
        table,
        new_table,
        ordinal = first_ordinal,
        columns = moved,
        "created phantom table"
    );
    Ok(())
}

/// Number of the given nodes under each parent, in order of first appearance.
fn tally_parents<'a>(
    tree: &SchemaTree,
    nodes: impl Iterator<Item = &'a usize>,
) -> Vec<(usize, usize)> {
    let mut tallies: Vec<(usize, usize)> = Vec::new();
    for &idx in nodes {
        let Some(parent) = tree.parent_of(idx) else {
            continue;
        };
        match tallies.iter_mut().find(|(p, _)| *p == parent) {
            Some((_, tally)) => *tally += 1,
            None => tallies.push((parent, 1)),
        }
    }
    tallies
}
