//! Unit tests for schema package XML generation

use std::path::Path;
use std::time::Duration;

use form_schema_compiler::form::parse_form_xml;
use form_schema_compiler::package::{generate_schema_xml, generate_tables_xml};
use form_schema_compiler::{
    compile_form, CompileOptions, CompiledSchema, MemoryDatastore, MemoryTaskLock,
};

const FORM: &str = r#"<?xml version="1.0"?>
<h:html xmlns="http://www.w3.org/2002/xforms" xmlns:h="http://www.w3.org/1999/xhtml">
  <h:head>
    <h:title>Market &amp; Prices</h:title>
    <model>
      <instance>
        <data id="market_prices" version="7">
          <market/>
          <price/>
          <open/>
        </data>
      </instance>
      <bind nodeset="/data/market" type="string"/>
      <bind nodeset="/data/price" type="decimal"/>
      <bind nodeset="/data/open" type="boolean"/>
    </model>
  </h:head>
  <h:body/>
</h:html>"#;

fn compiled() -> CompiledSchema {
    let form = parse_form_xml(FORM, Path::new("market.xml")).unwrap();
    let ds = MemoryDatastore::default();
    let locks = MemoryTaskLock::new();
    let options = CompileOptions {
        settle: Duration::ZERO,
        ..CompileOptions::default()
    };
    compile_form(&form, &ds, &locks, &options).unwrap()
}

fn render<F>(generate: F, schema: &CompiledSchema) -> String
where
    F: Fn(&mut Vec<u8>, &CompiledSchema) -> anyhow::Result<()>,
{
    let mut buffer = Vec::new();
    generate(&mut buffer, schema).unwrap();
    String::from_utf8(buffer).unwrap()
}

#[test]
fn test_schema_xml_header_and_escaping() {
    let schema = compiled();
    let xml = render(|w, s| generate_schema_xml(w, s), &schema);

    assert!(xml.starts_with(r#"<?xml version="1.0" encoding="utf-8"?>"#));
    assert!(xml.contains(r#"FormId="market_prices""#));
    assert!(xml.contains(r#"Version="7""#));
    assert!(xml.contains("<Title>Market &amp; Prices</Title>"));
    assert!(!xml.contains("<Warnings>"));
}

#[test]
fn test_schema_xml_lists_every_node() {
    let schema = compiled();
    let xml = render(|w, s| generate_schema_xml(w, s), &schema);

    let doc = roxmltree::Document::parse(&xml).unwrap();
    let nodes: Vec<_> = doc.descendants().filter(|n| n.has_tag_name("Node")).collect();
    assert_eq!(nodes.len(), schema.nodes.len());
    assert_eq!(nodes.len(), 4);

    let price = nodes
        .iter()
        .find(|n| n.attribute("Name") == Some("price"))
        .unwrap();
    assert_eq!(price.attribute("Type"), Some("DECIMAL"));
    assert_eq!(price.attribute("Table"), Some("MARKET_PRICES_CORE"));
    assert_eq!(price.attribute("Column"), Some("PRICE"));
    assert_eq!(price.attribute("Ordinal"), Some("2"));
}

#[test]
fn test_tables_xml_marks_metadata_columns() {
    let schema = compiled();
    let xml = render(|w, s| generate_tables_xml(w, s), &schema);

    let doc = roxmltree::Document::parse(&xml).unwrap();
    let table = doc
        .descendants()
        .find(|n| n.has_tag_name("Table"))
        .unwrap();
    assert_eq!(table.attribute("Name"), Some("MARKET_PRICES_CORE"));
    assert_eq!(table.attribute("Shape"), Some("TOP_LEVEL_DYNAMIC"));

    let columns: Vec<_> = table
        .children()
        .filter(|c| c.has_tag_name("Column"))
        .collect();
    assert!(columns
        .iter()
        .any(|c| c.attribute("Name") == Some("_URI") && c.attribute("Metadata") == Some("true")));
    let open = columns
        .iter()
        .find(|c| c.attribute("Name") == Some("OPEN"))
        .unwrap();
    assert_eq!(open.attribute("Type"), Some("BOOLEAN"));
    assert_eq!(open.attribute("Metadata"), None);
}
