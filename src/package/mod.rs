//! Schema package generation

mod origin_xml;
mod packager;
mod schema_xml;

pub use packager::create_schema_package;
pub use schema_xml::{generate_schema_xml, generate_tables_xml};
