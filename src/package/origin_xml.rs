//! Generate Origin.xml for schema packages

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;

use super::schema_xml::write_element;

const NAMESPACE: &str = "urn:form-schema-compiler:origin:1";

const PRODUCT_NAME: &str = "form-schema-compiler";

const PRODUCT_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn generate_origin_xml<W: Write>(
    writer: W,
    schema_xml_checksum: &str,
    form_hash: &str,
) -> anyhow::Result<()> {
    let mut xml_writer = Writer::new_with_indent(writer, b' ', 2);

    xml_writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut root = BytesStart::new("SchemaOrigin");
    root.push_attribute(("xmlns", NAMESPACE));
    xml_writer.write_event(Event::Start(root))?;

    xml_writer.write_event(Event::Start(BytesStart::new("Operation")))?;
    write_element(&mut xml_writer, "Identity", PRODUCT_NAME)?;
    write_element(&mut xml_writer, "Timestamp", &chrono::Utc::now().to_rfc3339())?;
    write_element(&mut xml_writer, "ProductName", PRODUCT_NAME)?;
    write_element(&mut xml_writer, "ProductVersion", PRODUCT_VERSION)?;
    xml_writer.write_event(Event::End(BytesEnd::new("Operation")))?;

    xml_writer.write_event(Event::Start(BytesStart::new("Checksums")))?;
    let mut checksum = BytesStart::new("Checksum");
    checksum.push_attribute(("Uri", "/schema.xml"));
    xml_writer.write_event(Event::Start(checksum))?;
    xml_writer.write_event(Event::Text(BytesText::new(schema_xml_checksum)))?;
    xml_writer.write_event(Event::End(BytesEnd::new("Checksum")))?;
    xml_writer.write_event(Event::End(BytesEnd::new("Checksums")))?;

    // absent for forms built in memory
    if !form_hash.is_empty() {
        write_element(&mut xml_writer, "FormHash", form_hash)?;
    }

    xml_writer.write_event(Event::End(BytesEnd::new("SchemaOrigin")))?;

    Ok(())
}
