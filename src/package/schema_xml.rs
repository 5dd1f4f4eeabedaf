//! Generate schema.xml and tables.xml

use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::compiler::CompiledSchema;

const NAMESPACE: &str = "urn:form-schema-compiler:schema:1";

/// Write the compiled node list
pub fn generate_schema_xml<W: Write>(writer: W, schema: &CompiledSchema) -> anyhow::Result<()> {
    let mut xml_writer = Writer::new_with_indent(writer, b' ', 2);
    xml_writer
        .config_mut()
        .add_space_before_slash_in_empty_elements = true;

    xml_writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut root = BytesStart::new("FormSchema");
    root.push_attribute(("xmlns", NAMESPACE));
    root.push_attribute(("FormId", schema.form_id.as_str()));
    if let Some(version) = &schema.version {
        root.push_attribute(("Version", version.as_str()));
    }
    xml_writer.write_event(Event::Start(root))?;

    if let Some(title) = &schema.title {
        write_element(&mut xml_writer, "Title", title)?;
    }

    xml_writer.write_event(Event::Start(BytesStart::new("Nodes")))?;
    for node in &schema.nodes {
        let ordinal = node.ordinal.to_string();
        let mut elem = BytesStart::new("Node");
        elem.push_attribute(("Uri", node.uri.as_str()));
        elem.push_attribute(("Ordinal", ordinal.as_str()));
        if let Some(parent) = &node.parent_uri {
            elem.push_attribute(("Parent", parent.as_str()));
        }
        elem.push_attribute(("Type", node.kind.type_name()));
        if let Some(name) = &node.element_name {
            elem.push_attribute(("Name", name.as_str()));
        }
        elem.push_attribute(("Schema", node.persist_as_schema.as_str()));
        if let Some(table) = &node.persist_as_table {
            elem.push_attribute(("Table", table.as_str()));
        }
        if let Some(column) = &node.persist_as_column {
            elem.push_attribute(("Column", column.as_str()));
        }
        xml_writer.write_event(Event::Empty(elem))?;
    }
    xml_writer.write_event(Event::End(BytesEnd::new("Nodes")))?;

    if !schema.warnings.is_empty() {
        xml_writer.write_event(Event::Start(BytesStart::new("Warnings")))?;
        for warning in &schema.warnings {
            write_element(&mut xml_writer, "Warning", warning)?;
        }
        xml_writer.write_event(Event::End(BytesEnd::new("Warnings")))?;
    }

    xml_writer.write_event(Event::End(BytesEnd::new("FormSchema")))?;
    Ok(())
}

/// Write the created tables and their columns
pub fn generate_tables_xml<W: Write>(writer: W, schema: &CompiledSchema) -> anyhow::Result<()> {
    let mut xml_writer = Writer::new_with_indent(writer, b' ', 2);
    xml_writer
        .config_mut()
        .add_space_before_slash_in_empty_elements = true;

    xml_writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut root = BytesStart::new("Tables");
    root.push_attribute(("xmlns", NAMESPACE));
    xml_writer.write_event(Event::Start(root))?;

    for table in schema.tables.values() {
        let mut elem = BytesStart::new("Table");
        elem.push_attribute(("Schema", table.schema.as_str()));
        elem.push_attribute(("Name", table.name.as_str()));
        elem.push_attribute(("Shape", table.shape.name()));
        xml_writer.write_event(Event::Start(elem))?;

        for column in &table.columns {
            let mut col = BytesStart::new("Column");
            col.push_attribute(("Name", column.name.as_str()));
            col.push_attribute(("Type", column.column_type.name()));
            if column.is_metadata {
                col.push_attribute(("Metadata", "true"));
            }
            xml_writer.write_event(Event::Empty(col))?;
        }

        xml_writer.write_event(Event::End(BytesEnd::new("Table")))?;
    }

    xml_writer.write_event(Event::End(BytesEnd::new("Tables")))?;
    Ok(())
}

pub(crate) fn write_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    value: &str,
) -> anyhow::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
