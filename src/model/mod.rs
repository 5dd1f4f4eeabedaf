//! Schema node model and tree building

mod builder;
mod elements;
mod schema_tree;

pub use builder::{build_schema_tree, substitute_placeholders, NodeDraft, TreeBuild};
pub use elements::*;
pub use schema_tree::SchemaTree;
