//! Integration tests for compiling a directory of forms in one run

use form_schema_compiler::{build_schema_packages, BatchOptions, StorageLimits};
use pretty_assertions::assert_eq;

use crate::common::{PackageInfo, TestContext};

fn batch(ctx: &TestContext, output_dir: Option<std::path::PathBuf>) -> BatchOptions {
    BatchOptions {
        dir: ctx.form_dir.clone(),
        pattern: "*.xml".to_string(),
        output_dir,
        limits: StorageLimits::default(),
    }
}

fn form_id(info: &PackageInfo) -> String {
    let content = info.schema_xml_content.as_deref().unwrap();
    let doc = roxmltree::Document::parse(content).unwrap();
    doc.root_element()
        .attribute("FormId")
        .unwrap_or_default()
        .to_string()
}

#[test]
fn test_forms_sharing_a_file_name_get_separate_packages() {
    let ctx = TestContext::with_fixtures(&["household_survey", "site_visit"]);
    let out = ctx.form_dir.join("out");

    let results = build_schema_packages(&batch(&ctx, Some(out.clone()))).unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|(_, r)| r.is_ok()));

    for id in ["household_survey", "site_visit"] {
        let package = out.join(id).join("form.schema.zip");
        assert!(package.exists(), "missing {}", package.display());
        let info = PackageInfo::from_package(&package).unwrap();
        assert_eq!(form_id(&info), id);
    }
}

#[test]
fn test_packages_default_to_next_to_each_form() {
    let ctx = TestContext::with_fixtures(&["household_survey", "site_visit"]);

    let results = build_schema_packages(&batch(&ctx, None)).unwrap();
    let written: Vec<_> = results
        .into_iter()
        .map(|(_, r)| r.unwrap().package_path)
        .collect();
    assert_eq!(
        written,
        vec![
            ctx.form_dir.join("household_survey").join("form.schema.zip"),
            ctx.form_dir.join("site_visit").join("form.schema.zip"),
        ]
    );
}

#[test]
fn test_failing_form_does_not_stop_the_batch() {
    let ctx = TestContext::with_fixtures(&["missing_id", "site_visit"]);

    let results = build_schema_packages(&batch(&ctx, None)).unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].0.ends_with("missing_id/form.xml"));
    assert!(results[0].1.is_err());
    assert_eq!(results[1].1.as_ref().unwrap().form_id, "site_visit");
}

#[test]
fn test_no_matching_forms_is_an_error() {
    let ctx = TestContext::with_fixtures(&["site_visit"]);
    let mut options = batch(&ctx, None);
    options.pattern = "*.json".to_string();

    let err = build_schema_packages(&options).unwrap_err();
    assert!(err.to_string().contains("no files matching"));
}
