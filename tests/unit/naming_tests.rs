//! Unit tests for identifier naming

use form_schema_compiler::naming::{sanitize_identifier, trim_name, NamingSet};
use form_schema_compiler::{MemoryDatastore, StorageLimits};
use pretty_assertions::assert_eq;

fn datastore(max_len: usize) -> MemoryDatastore {
    MemoryDatastore::new(StorageLimits {
        max_table_name_len: max_len,
        max_column_name_len: max_len,
        ..StorageLimits::default()
    })
}

#[test]
fn test_sanitized_names_trim_within_budget() {
    for tag in ["householdMemberAge", "first-name.lastName", "2nd_visit_date"] {
        let id = sanitize_identifier(tag);
        for len in 3..id.len() {
            let trimmed = trim_name(&id, len);
            assert!(trimmed.chars().count() <= len, "{} -> {}", id, trimmed);
        }
    }
}

#[test]
fn test_form_ids_become_table_prefixes() {
    let ds = datastore(64);
    let mut naming = NamingSet::new();
    let prefix = sanitize_identifier("org.example:householdSurvey");
    let core = naming
        .request_table_name("ODK", &prefix, "", "CORE")
        .unwrap();

    let resolved = naming.resolve(&ds).unwrap();
    assert_eq!(
        resolved.resolve_table_placeholder(core).unwrap(),
        "ORG_EXAMPLE_HOUSEHOLD_SURVEY_CORE"
    );
}

#[test]
fn test_trimmed_names_that_collide_are_suffixed() {
    let ds = datastore(10);
    let mut naming = NamingSet::new();
    let t = naming.request_table_name("ODK", "F", "", "CORE").unwrap();
    let a = naming
        .request_column_name(t, "", "RESPONDENT_WEIGHT")
        .unwrap();
    let b = naming
        .request_column_name(t, "", "RESPONDENT_HEIGHT")
        .unwrap();

    let resolved = naming.resolve(&ds).unwrap();
    let a = resolved
        .resolve_column_placeholder(t, Some(a))
        .unwrap()
        .unwrap()
        .to_string();
    let b = resolved
        .resolve_column_placeholder(t, Some(b))
        .unwrap()
        .unwrap()
        .to_string();
    assert_ne!(a, b);
    assert!(a.chars().count() <= 10);
    assert!(b.chars().count() <= 10);
}

#[test]
fn test_allocator_continues_after_resolution() {
    let ds = datastore(64);
    let mut naming = NamingSet::new();
    let t = naming.request_table_name("ODK", "SURVEY", "", "CORE").unwrap();
    let resolved = naming.resolve(&ds).unwrap();
    let base = resolved.resolve_table_placeholder(t).unwrap().to_string();

    let mut allocator = resolved.into_allocator();
    let next = allocator
        .generate_unique_table_name("ODK", &base, &ds)
        .unwrap();
    assert_eq!(next, "SURVEY_CORE2");
}
