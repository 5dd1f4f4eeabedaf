//! Unit tests for XForm parsing

use std::io::Write;
use std::path::Path;

use form_schema_compiler::form::{parse_form_file, parse_form_xml, ContentType};
use form_schema_compiler::{FailureKind, SchemaCompilerError};
use pretty_assertions::assert_eq;

fn form_with_body(instance: &str, binds: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<h:html xmlns="http://www.w3.org/2002/xforms" xmlns:h="http://www.w3.org/1999/xhtml"
        xmlns:jr="http://openrosa.org/javarosa">
  <h:head>
    <h:title>Test</h:title>
    <model>
      <instance>
{instance}
      </instance>
      <instance id="lookup"><root><item/></root></instance>
{binds}
    </model>
  </h:head>
  <h:body>{body}</h:body>
</h:html>"#
    )
}

#[test]
fn test_repeat_declared_in_body() {
    let xml = form_with_body(
        r#"<data id="visits"><visit><day/></visit></data>"#,
        r#"<bind nodeset="/data/visit/day" type="date"/>"#,
        r#"<group><repeat nodeset="/data/visit/"/></group>"#,
    );
    let form = parse_form_xml(&xml, Path::new("visits.xml")).unwrap();
    let visit = &form.root.children[0];
    assert!(visit.repeatable);
    assert_eq!(visit.children[0].content_type, ContentType::Date);
}

#[test]
fn test_secondary_instance_is_ignored() {
    let xml = form_with_body(r#"<data id="primary"><a/></data>"#, "", "");
    let form = parse_form_xml(&xml, Path::new("primary.xml")).unwrap();
    assert_eq!(form.form_id, "primary");
    assert_eq!(form.root.children.len(), 1);
    assert_eq!(form.root.children[0].name, "a");
}

#[test]
fn test_namespaced_bind_types() {
    let xml = form_with_body(
        r#"<data id="typed"><a/><b/><c/><d/></data>"#,
        r#"<bind nodeset="/data/a" type="xsd:int"/>
<bind nodeset="/data/b" type="select1"/>
<bind nodeset="/data/c" type="xsd:dateTime"/>
<bind nodeset="/data/d" type="geoshape"/>"#,
        "",
    );
    let form = parse_form_xml(&xml, Path::new("typed.xml")).unwrap();
    let types: Vec<_> = form
        .root
        .children
        .iter()
        .map(|c| c.content_type.clone())
        .collect();
    assert_eq!(
        types,
        vec![
            ContentType::Integer,
            ContentType::Choice,
            ContentType::DateTime,
            ContentType::GeoShape,
        ]
    );
}

#[test]
fn test_field_count_skips_groups() {
    let xml = form_with_body(
        r#"<data id="counted"><a/><g><b/><c/></g></data>"#,
        "",
        "",
    );
    let form = parse_form_xml(&xml, Path::new("counted.xml")).unwrap();
    assert_eq!(form.root.field_count(), 3);
}

#[test]
fn test_invalid_xml_is_a_parse_error() {
    let err = parse_form_xml("<h:html>", Path::new("broken.xml")).unwrap_err();
    assert!(matches!(err, SchemaCompilerError::FormParseError { .. }));
    assert_eq!(err.kind(), FailureKind::MalformedForm);
}

#[test]
fn test_bad_form_id_is_rejected() {
    let xml = form_with_body(r#"<data id="has space"><a/></data>"#, "", "");
    let err = parse_form_xml(&xml, Path::new("space.xml")).unwrap_err();
    assert!(matches!(err, SchemaCompilerError::InvalidFormId { .. }));
}

#[test]
fn test_missing_file_is_internal() {
    let err = parse_form_file(Path::new("/nonexistent/form.xml")).unwrap_err();
    assert!(matches!(err, SchemaCompilerError::FormReadError { .. }));
    assert_eq!(err.kind(), FailureKind::Internal);
}

#[test]
fn test_windows_1252_file_is_decoded() {
    let xml = form_with_body(r#"<data id="latin"><a/></data>"#, "", "")
        .replace("<h:title>Test</h:title>", "<h:title>Caf\u{e9}</h:title>");
    let (encoded, _, _) = encoding_rs::WINDOWS_1252.encode(&xml);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&encoded).unwrap();

    let form = parse_form_file(file.path()).unwrap();
    assert_eq!(form.title.as_deref(), Some("Caf\u{e9}"));
}
