//! Physical identifier generation: sanitizing, shortening and resolving
//! table and column names

mod naming_set;
mod sanitize;
mod trim;

pub use naming_set::{
    ColumnPlaceholder, NamingSet, ResolvedNames, TableNameAllocator, TablePlaceholder,
};
pub use sanitize::sanitize_identifier;
pub use trim::trim_name;
