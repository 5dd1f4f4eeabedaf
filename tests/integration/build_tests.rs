//! Integration tests for the build workflow: form file in, schema package out

use form_schema_compiler::StorageLimits;
use pretty_assertions::assert_eq;

use crate::common::{wide_form_xml, PackageInfo, TestContext};

// ============================================================================
// Basic Build Tests
// ============================================================================

#[test]
fn test_successful_simple_build() {
    let ctx = TestContext::with_fixture("household_survey");
    let result = ctx.build();

    assert!(
        result.success,
        "Simple build should succeed. Errors: {:?}",
        result.errors
    );
    let package_path = result.package_path.unwrap();
    assert!(package_path.exists(), "Package file should exist");
    assert_eq!(
        package_path.file_name().and_then(|n| n.to_str()),
        Some("form.schema.zip")
    );

    let info = PackageInfo::from_package(&package_path).expect("Should read package");
    assert!(info.is_valid(), "Package should have all required entries");
}

#[test]
fn test_repeat_and_multi_select_get_own_tables() {
    let ctx = TestContext::with_fixture("household_survey");
    let info = PackageInfo::from_package(&ctx.build_successfully()).unwrap();

    let names: Vec<String> = info.tables().into_iter().map(|t| t.name).collect();
    assert_eq!(
        names,
        vec![
            "HOUSEHOLD_SURVEY_ASSETS",
            "HOUSEHOLD_SURVEY_CORE",
            "HOUSEHOLD_SURVEY_MEMBER",
        ]
    );

    let core = info.table("HOUSEHOLD_SURVEY_CORE").unwrap();
    assert_eq!(core.shape, "TOP_LEVEL_DYNAMIC");
    assert_eq!(
        core.data_columns,
        vec!["INTERVIEWER", "VISIT_DATE", "HEAD_NAME", "HEAD_AGE", "NOTES"]
    );

    let member = info.table("HOUSEHOLD_SURVEY_MEMBER").unwrap();
    assert_eq!(member.shape, "DYNAMIC");
    assert_eq!(member.data_columns, vec!["NAME", "AGE", "ATTENDS_SCHOOL"]);

    let assets = info.table("HOUSEHOLD_SURVEY_ASSETS").unwrap();
    assert_eq!(assets.shape, "SELECT_CHOICE");
}

#[test]
fn test_untyped_leaf_is_reported_as_warning() {
    let ctx = TestContext::with_fixture("household_survey");
    let info = PackageInfo::from_package(&ctx.build_successfully()).unwrap();

    let warnings = info.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("/data/notes"));

    let notes = info
        .nodes()
        .into_iter()
        .find(|n| n.name.as_deref() == Some("notes"))
        .unwrap();
    assert_eq!(notes.node_type, "STRING");
}

#[test]
fn test_every_node_reaches_the_root() {
    let ctx = TestContext::with_fixture("household_survey");
    let info = PackageInfo::from_package(&ctx.build_successfully()).unwrap();
    let nodes = info.nodes();

    let roots: Vec<_> = nodes.iter().filter(|n| n.parent.is_none()).collect();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].table.as_deref(), Some("HOUSEHOLD_SURVEY_CORE"));

    for node in &nodes {
        let mut current = node;
        let mut steps = 0;
        while let Some(parent) = &current.parent {
            current = nodes.iter().find(|n| &n.uri == parent).unwrap();
            steps += 1;
            assert!(steps <= nodes.len(), "cycle above {}", node.uri);
        }
        assert_eq!(current.uri, roots[0].uri);
    }
}

#[test]
fn test_geopoint_and_binary_expansion() {
    let ctx = TestContext::with_fixture("site_visit");
    let info = PackageInfo::from_package(&ctx.build_successfully()).unwrap();

    let core = info.table("SITE_VISIT_CORE").unwrap();
    assert_eq!(
        core.data_columns,
        vec![
            "LOCATION_LAT",
            "LOCATION_LNG",
            "LOCATION_ALT",
            "LOCATION_ACC",
            "WEIGHT",
            "OBSERVED_AT",
        ]
    );

    assert_eq!(info.table("SITE_VISIT_PHOTO_BN").unwrap().shape, "BINARY_CONTENT");
    assert_eq!(
        info.table("SITE_VISIT_PHOTO_REF").unwrap().shape,
        "BINARY_CONTENT_REF_BLOB"
    );
    assert_eq!(info.table("SITE_VISIT_PHOTO_BLB").unwrap().shape, "REF_BLOB");
}

#[test]
fn test_origin_checksum_matches_schema_xml() {
    let ctx = TestContext::with_fixture("site_visit");
    let info = PackageInfo::from_package(&ctx.build_successfully()).unwrap();

    let schema_xml = info.schema_xml_content.as_deref().unwrap();
    let origin_xml = info.origin_xml_content.as_deref().unwrap();

    let digest = form_schema_compiler::util::sha256_hex(schema_xml.as_bytes());
    assert!(
        origin_xml.contains(&format!(r#"<Checksum Uri="/schema.xml">{}</Checksum>"#, digest)),
        "Origin.xml should carry the schema.xml checksum"
    );
    assert!(origin_xml.contains("<FormHash>"));
}

// ============================================================================
// Table Division Tests
// ============================================================================

#[test]
fn test_wide_form_is_divided_across_tables() {
    let ctx = TestContext::with_form_xml("wide_form", &wide_form_xml("wide_form", 100));
    let result = ctx.build_with_limits(StorageLimits {
        max_data_columns: 60,
        ..StorageLimits::default()
    });
    assert!(result.success, "Errors: {:?}", result.errors);

    let info = PackageInfo::from_package(&result.package_path.unwrap()).unwrap();
    let tables = info.tables();
    assert_eq!(tables.len(), 2);
    assert!(tables.iter().any(|t| t.name == "WIDE_FORM_CORE"));
    assert!(tables.iter().all(|t| t.data_columns.len() <= 60));
    assert_eq!(
        tables.iter().map(|t| t.data_columns.len()).sum::<usize>(),
        100
    );

    let nodes = info.nodes();
    let phantom = nodes.iter().find(|n| n.node_type == "PHANTOM").unwrap();
    assert!(phantom.column.is_none());
    let moved = nodes
        .iter()
        .filter(|n| n.parent.as_deref() == Some(phantom.uri.as_str()))
        .count();
    assert!(moved > 0);
}

#[test]
fn test_narrow_limits_divide_repeatedly() {
    let ctx = TestContext::with_form_xml("narrow_form", &wide_form_xml("narrow_form", 40));
    let result = ctx.build_with_limits(StorageLimits {
        max_data_columns: 8,
        ..StorageLimits::default()
    });
    assert!(result.success, "Errors: {:?}", result.errors);

    let info = PackageInfo::from_package(&result.package_path.unwrap()).unwrap();
    let tables = info.tables();
    assert!(tables.len() >= 5);
    assert!(tables.iter().all(|t| t.data_columns.len() <= 8));
    assert_eq!(
        tables.iter().map(|t| t.data_columns.len()).sum::<usize>(),
        40
    );
}

#[test]
fn test_long_names_are_shortened_to_limits() {
    let ctx = TestContext::with_fixture("household_survey");
    let result = ctx.build_with_limits(StorageLimits {
        max_table_name_len: 16,
        max_column_name_len: 8,
        ..StorageLimits::default()
    });
    assert!(result.success, "Errors: {:?}", result.errors);

    let info = PackageInfo::from_package(&result.package_path.unwrap()).unwrap();
    for table in info.tables() {
        assert!(table.name.len() <= 16, "table {} too long", table.name);
        for column in &table.data_columns {
            assert!(column.len() <= 8, "column {} too long", column);
        }
    }
}

// ============================================================================
// Failure Tests
// ============================================================================

#[test]
fn test_missing_form_id_fails() {
    let ctx = TestContext::with_fixture("missing_id");
    let result = ctx.build();

    assert!(!result.success);
    assert!(result.errors[0].contains("no id attribute"));
    assert!(!ctx.form_dir.join("form.schema.zip").exists());
}

#[test]
fn test_unsupported_type_fails() {
    let ctx = TestContext::with_fixture("unsupported_type");
    let result = ctx.build();

    assert!(!result.success);
    assert!(result.errors[0].contains("/data/hologram"));
}
