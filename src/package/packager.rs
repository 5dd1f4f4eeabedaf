//! Create schema ZIP packages

use std::fs::File;
use std::io::{Cursor, Write};
use std::path::Path;

use anyhow::Result;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::compiler::CompiledSchema;
use crate::error::SchemaCompilerError;
use crate::util::sha256_hex;

use super::{origin_xml, schema_xml};

/// Write `schema` as a package at `output_path`
pub fn create_schema_package(schema: &CompiledSchema, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SchemaCompilerError::PackageWriteError {
            path: output_path.to_path_buf(),
            source: e,
        })?;
    }

    let file = File::create(output_path).map_err(|e| SchemaCompilerError::PackageWriteError {
        path: output_path.to_path_buf(),
        source: e,
    })?;

    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .compression_level(Some(1));

    let mut schema_buffer = Cursor::new(Vec::with_capacity(schema.nodes.len() * 200));
    schema_xml::generate_schema_xml(&mut schema_buffer, schema)?;
    zip.start_file("schema.xml", options)?;
    zip.write_all(schema_buffer.get_ref())?;

    let mut tables_buffer = Cursor::new(Vec::with_capacity(schema.tables.len() * 1000));
    schema_xml::generate_tables_xml(&mut tables_buffer, schema)?;
    zip.start_file("tables.xml", options)?;
    zip.write_all(tables_buffer.get_ref())?;

    let checksum = sha256_hex(schema_buffer.get_ref());
    let mut origin_buffer = Cursor::new(Vec::with_capacity(1024));
    origin_xml::generate_origin_xml(&mut origin_buffer, &checksum, &schema.form_hash)?;
    zip.start_file("Origin.xml", options)?;
    zip.write_all(origin_buffer.get_ref())?;

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(generate_content_types_xml().as_bytes())?;

    zip.finish()?;

    Ok(())
}

pub(crate) fn generate_content_types_xml() -> &'static str {
    r#"<?xml version="1.0" encoding="utf-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="xml" ContentType="text/xml" />
</Types>"#
}
