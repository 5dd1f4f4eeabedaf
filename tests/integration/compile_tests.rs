//! Integration tests for compiling against shared collaborators

use std::time::Duration;

use form_schema_compiler::persist::TaskLockType;
use form_schema_compiler::{
    compile_file, CompileOptions, FailureKind, MemoryDatastore, MemoryTaskLock,
    SchemaCompilerError,
};
use pretty_assertions::assert_eq;

use crate::common::{wide_form_xml, TestContext};

fn options() -> CompileOptions {
    CompileOptions {
        settle: Duration::ZERO,
        ..CompileOptions::default()
    }
}

fn compiler_error(err: &anyhow::Error) -> &SchemaCompilerError {
    err.downcast_ref::<SchemaCompilerError>()
        .expect("error should come from the compiler")
}

#[test]
fn test_second_compile_of_same_form_is_rejected() {
    let ctx = TestContext::with_fixture("household_survey");
    let ds = MemoryDatastore::default();
    let locks = MemoryTaskLock::new();

    let (compiled, _) = compile_file(&ctx.form_path(), None, &ds, &locks, &options()).unwrap();
    assert_eq!(ds.form_schema("household_survey"), Some(compiled.nodes.clone()));

    let output = ctx.form_dir.join("again.zip");
    let err = compile_file(&ctx.form_path(), Some(output.clone()), &ds, &locks, &options())
        .unwrap_err();
    let err = compiler_error(&err);
    assert!(matches!(err, SchemaCompilerError::SchemaAlreadyExists { .. }));
    assert_eq!(err.kind(), FailureKind::MalformedForm);
    assert!(!output.exists());
    assert_eq!(
        locks.holder("household_survey", TaskLockType::FormSchemaCreation),
        None
    );
}

#[test]
fn test_existing_relation_forces_a_suffix() {
    let ctx = TestContext::with_fixture("site_visit");
    let ds = MemoryDatastore::default();
    ds.add_existing_relation("ODK", "SITE_VISIT_CORE");
    let locks = MemoryTaskLock::new();

    let (compiled, _) = compile_file(&ctx.form_path(), None, &ds, &locks, &options()).unwrap();
    assert!(compiled.tables.contains_key("SITE_VISIT_CORE2"));
    assert!(!compiled.tables.contains_key("SITE_VISIT_CORE"));
}

#[test]
fn test_fixed_table_failure_rolls_back_everything() {
    let ctx = TestContext::with_fixture("site_visit");
    let ds = MemoryDatastore::default();
    ds.fail_creation_of("SITE_VISIT_PHOTO_REF");
    let locks = MemoryTaskLock::new();

    let err = compile_file(&ctx.form_path(), None, &ds, &locks, &options()).unwrap_err();
    let err = compiler_error(&err);
    assert!(matches!(err, SchemaCompilerError::Datastore { .. }));
    assert_eq!(err.kind(), FailureKind::Internal);

    assert!(ds.relation_names().is_empty());
    assert_eq!(ds.form_schema("site_visit"), None);
    assert!(!ctx.form_dir.join("form.schema.zip").exists());
    assert_eq!(locks.holder("site_visit", TaskLockType::FormSchemaCreation), None);
}

#[test]
fn test_forms_compile_concurrently_against_one_datastore() {
    let household = TestContext::with_fixture("household_survey");
    let site = TestContext::with_fixture("site_visit");
    let wide = TestContext::with_form_xml("wide_form", &wide_form_xml("wide_form", 30));
    let ds = MemoryDatastore::default();
    let locks = MemoryTaskLock::new();
    let opts = options();

    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = [&household, &site, &wide]
            .into_iter()
            .map(|ctx| {
                let (ds, locks, opts) = (&ds, &locks, &opts);
                s.spawn(move || compile_file(&ctx.form_path(), None, ds, locks, opts))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(results.iter().all(|r| r.is_ok()));
    let names = ds.relation_names();
    assert!(names.contains(&"HOUSEHOLD_SURVEY_CORE".to_string()));
    assert!(names.contains(&"SITE_VISIT_CORE".to_string()));
    assert!(names.contains(&"WIDE_FORM_CORE".to_string()));
    assert!(ds.form_schema("wide_form").is_some());
}

#[test]
fn test_compile_writes_to_requested_output() {
    let ctx = TestContext::with_fixture("household_survey");
    let ds = MemoryDatastore::default();
    let locks = MemoryTaskLock::new();
    let output = ctx.form_dir.join("out").join("household.zip");

    let (_, written) =
        compile_file(&ctx.form_path(), Some(output.clone()), &ds, &locks, &options()).unwrap();
    assert_eq!(written, output);
    assert!(output.exists());
}
