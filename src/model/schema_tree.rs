//! Arena of schema nodes linked by parent uri

use std::collections::HashMap;

use crate::error::SchemaCompilerError;

use super::SchemaNode;

/// The compiled node list.
///
/// Nodes are stored flat; child lists are rebuilt from parent links on
/// demand, so re-parenting a node is a single field update.
#[derive(Debug, Clone)]
pub struct SchemaTree {
    nodes: Vec<SchemaNode>,
    index: HashMap<String, usize>,
    root: usize,
}

impl SchemaTree {
    /// Validates that uris are unique, that there is exactly one root and
    /// that every parent link points at a node of the list.
    pub fn new(nodes: Vec<SchemaNode>) -> Result<Self, SchemaCompilerError> {
        let mut index = HashMap::with_capacity(nodes.len());
        let mut root = None;
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.uri.clone(), i).is_some() {
                return Err(SchemaCompilerError::internal(format!(
                    "duplicate node uri {}",
                    node.uri
                )));
            }
            if node.is_root() {
                if root.is_some() {
                    return Err(SchemaCompilerError::internal("schema has more than one root"));
                }
                root = Some(i);
            }
        }
        let root = root.ok_or_else(|| SchemaCompilerError::internal("schema has no root"))?;

        for node in &nodes {
            if let Some(parent) = &node.parent_uri {
                if !index.contains_key(parent) {
                    return Err(SchemaCompilerError::internal(format!(
                        "node {} references missing parent {}",
                        node.uri, parent
                    )));
                }
            }
        }

        Ok(Self { nodes, index, root })
    }

    pub fn nodes(&self) -> &[SchemaNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: usize) -> &SchemaNode {
        &self.nodes[idx]
    }

    pub fn node_mut(&mut self, idx: usize) -> &mut SchemaNode {
        &mut self.nodes[idx]
    }

    pub fn root(&self) -> usize {
        self.root
    }

    pub fn index_of(&self, uri: &str) -> Option<usize> {
        self.index.get(uri).copied()
    }

    pub fn parent_of(&self, idx: usize) -> Option<usize> {
        self.nodes[idx]
            .parent_uri
            .as_deref()
            .and_then(|p| self.index_of(p))
    }

    /// Children of `idx`, ordered by ordinal.
    pub fn children_of(&self, idx: usize) -> Vec<usize> {
        let uri = self.nodes[idx].uri.as_str();
        let mut children: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.parent_uri.as_deref() == Some(uri))
            .map(|(i, _)| i)
            .collect();
        children.sort_by_key(|&i| self.nodes[i].ordinal);
        children
    }

    /// Child lists for every node at once, each ordered by ordinal.
    pub fn child_lists(&self) -> Vec<Vec<usize>> {
        let mut lists = vec![Vec::new(); self.nodes.len()];
        for i in 0..self.nodes.len() {
            if let Some(parent) = self.parent_of(i) {
                lists[parent].push(i);
            }
        }
        for list in &mut lists {
            list.sort_by_key(|&i| self.nodes[i].ordinal);
        }
        lists
    }

    /// Add a node; its parent must already be present.
    pub fn push(&mut self, node: SchemaNode) -> Result<usize, SchemaCompilerError> {
        match &node.parent_uri {
            Some(parent) if !self.index.contains_key(parent) => {
                return Err(SchemaCompilerError::internal(format!(
                    "node {} references missing parent {}",
                    node.uri, parent
                )));
            }
            None => {
                return Err(SchemaCompilerError::internal("a schema has exactly one root"));
            }
            _ => {}
        }
        if self.index.contains_key(&node.uri) {
            return Err(SchemaCompilerError::internal(format!(
                "duplicate node uri {}",
                node.uri
            )));
        }
        let idx = self.nodes.len();
        self.index.insert(node.uri.clone(), idx);
        self.nodes.push(node);
        Ok(idx)
    }

    /// Indices of `idx` and all of its descendants, preorder.
    pub fn subtree(&self, idx: usize, child_lists: &[Vec<usize>]) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![idx];
        while let Some(i) = stack.pop() {
            out.push(i);
            for &c in child_lists[i].iter().rev() {
                stack.push(c);
            }
        }
        out
    }

    pub fn into_nodes(self) -> Vec<SchemaNode> {
        self.nodes
    }
}
