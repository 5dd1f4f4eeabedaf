//! Build schema node drafts from a parsed form
//!
//! The walk is depth-first. Each visited element becomes one draft carrying
//! placeholder table and column tokens; composite fields expand into their
//! auxiliary nodes here. Names are resolved afterwards in one pass, see
//! [`crate::naming::NamingSet::resolve`].

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::SchemaCompilerError;
use crate::form::{ContentType, FormDefinition, FormElement};
use crate::naming::{
    sanitize_identifier, ColumnPlaceholder, NamingSet, ResolvedNames, TablePlaceholder,
};

use super::{ElementKind, SchemaNode};

/// Item fragment of the top-level table name
const CORE_TABLE_ITEM: &str = "CORE";

/// A schema node whose table and column are still placeholders.
#[derive(Debug, Clone)]
pub struct NodeDraft {
    pub uri: String,
    pub ordinal: u32,
    pub parent_uri: Option<String>,
    pub element_name: Option<String>,
    pub kind: ElementKind,
    pub schema: String,
    pub table: TablePlaceholder,
    pub column: Option<ColumnPlaceholder>,
}

/// Result of the tree walk
#[derive(Debug)]
pub struct TreeBuild {
    pub drafts: Vec<NodeDraft>,
    pub naming: NamingSet,
    pub warnings: Vec<String>,
}

/// Walk `form` and request every table and column its storage needs.
pub fn build_schema_tree(
    form: &FormDefinition,
    schema: &str,
) -> Result<TreeBuild, SchemaCompilerError> {
    let mut builder = TreeBuilder {
        naming: NamingSet::new(),
        drafts: Vec::new(),
        warnings: Vec::new(),
        schema: schema.to_string(),
        prefix: sanitize_identifier(&form.form_id),
        uri_base: format!("uuid:{}", Uuid::new_v4()),
        next_uri: 0,
    };

    let root_table =
        builder
            .naming
            .request_table_name(schema, &builder.prefix, "", CORE_TABLE_ITEM)?;
    let root_uri = builder.push(
        None,
        1,
        Some(form.root.name.clone()),
        ElementKind::Group,
        root_table,
        None,
    );
    builder.visit_children(&form.root, &root_uri, root_table, "")?;

    debug!(
        form_id = %form.form_id,
        nodes = builder.drafts.len(),
        tables = builder.naming.table_request_count(),
        "built schema tree"
    );

    Ok(TreeBuild {
        drafts: builder.drafts,
        naming: builder.naming,
        warnings: builder.warnings,
    })
}

/// Replace placeholders with resolved names.
pub fn substitute_placeholders(
    drafts: Vec<NodeDraft>,
    names: &ResolvedNames,
) -> Result<Vec<SchemaNode>, SchemaCompilerError> {
    drafts
        .into_iter()
        .map(|d| {
            let table = names.resolve_table_placeholder(d.table)?.to_string();
            let column = names
                .resolve_column_placeholder(d.table, d.column)?
                .map(|c| c.to_string());
            Ok(SchemaNode {
                uri: d.uri,
                ordinal: d.ordinal,
                parent_uri: d.parent_uri,
                element_name: d.element_name,
                kind: d.kind,
                persist_as_table: Some(table),
                persist_as_column: column,
                persist_as_schema: d.schema,
            })
        })
        .collect()
}

struct TreeBuilder {
    naming: NamingSet,
    drafts: Vec<NodeDraft>,
    warnings: Vec<String>,
    schema: String,
    prefix: String,
    uri_base: String,
    next_uri: u64,
}

impl TreeBuilder {
    fn push(
        &mut self,
        parent_uri: Option<&str>,
        ordinal: u32,
        element_name: Option<String>,
        kind: ElementKind,
        table: TablePlaceholder,
        column: Option<ColumnPlaceholder>,
    ) -> String {
        self.next_uri += 1;
        let uri = format!("{}/{}", self.uri_base, self.next_uri);
        self.drafts.push(NodeDraft {
            uri: uri.clone(),
            ordinal,
            parent_uri: parent_uri.map(|p| p.to_string()),
            element_name,
            kind,
            schema: self.schema.clone(),
            table,
            column,
        });
        uri
    }

    fn request_table(
        &mut self,
        qualifier: &str,
        item: &str,
    ) -> Result<TablePlaceholder, SchemaCompilerError> {
        let schema = self.schema.clone();
        let prefix = self.prefix.clone();
        self.naming
            .request_table_name(&schema, &prefix, qualifier, item)
    }

    fn visit_children(
        &mut self,
        element: &FormElement,
        parent_uri: &str,
        table: TablePlaceholder,
        qualifier: &str,
    ) -> Result<(), SchemaCompilerError> {
        let mut ordinal = 0;
        let mut previous: Option<&str> = None;
        for child in &element.children {
            // a repeated tag right after itself closes the previous element
            if previous == Some(child.name.as_str()) {
                continue;
            }
            previous = Some(child.name.as_str());
            ordinal += 1;
            self.visit(child, parent_uri, ordinal, table, qualifier)?;
        }
        Ok(())
    }

    fn visit(
        &mut self,
        element: &FormElement,
        parent_uri: &str,
        ordinal: u32,
        table: TablePlaceholder,
        qualifier: &str,
    ) -> Result<(), SchemaCompilerError> {
        let item = sanitize_identifier(&element.name);
        let name = Some(element.name.clone());

        // assume a column; structural kinds give it back
        let column = self.naming.request_column_name(table, qualifier, &item)?;

        if element.repeatable {
            self.naming.release_column_request(table, column);
            let repeat_table = self.request_table(qualifier, &item)?;
            let uri = self.push(
                Some(parent_uri),
                ordinal,
                name,
                ElementKind::Repeat,
                repeat_table,
                None,
            );
            return self.visit_children(element, &uri, repeat_table, "");
        }

        if !element.children.is_empty() {
            self.naming.release_column_request(table, column);
            let uri = self.push(Some(parent_uri), ordinal, name, ElementKind::Group, table, None);
            let nested = if qualifier.is_empty() {
                item
            } else {
                format!("{}_{}", qualifier, item)
            };
            return self.visit_children(element, &uri, table, &nested);
        }

        let kind = match &element.content_type {
            ContentType::Null => {
                let message = format!(
                    "element {} has no declared type and no children; storing it as a string",
                    element.path
                );
                warn!("{}", message);
                self.warnings.push(message);
                ElementKind::String
            }
            ContentType::Text
            | ContentType::Choice
            | ContentType::Barcode
            | ContentType::GeoTrace
            | ContentType::GeoShape => ElementKind::String,
            ContentType::Integer => ElementKind::Integer,
            ContentType::Decimal => ElementKind::Decimal,
            ContentType::Boolean => ElementKind::Boolean,
            ContentType::Date => ElementKind::Date,
            ContentType::Time => ElementKind::Time,
            ContentType::DateTime => ElementKind::DateTime,
            ContentType::ChoiceList => {
                self.naming.release_column_request(table, column);
                let choice_table = self.request_table(qualifier, &item)?;
                self.push(
                    Some(parent_uri),
                    ordinal,
                    name,
                    ElementKind::MultiSelect,
                    choice_table,
                    None,
                );
                return Ok(());
            }
            ContentType::GeoPoint => {
                self.naming.release_column_request(table, column);
                let uri = self.push(
                    Some(parent_uri),
                    ordinal,
                    name,
                    ElementKind::GeoPoint,
                    table,
                    None,
                );
                let parts = [
                    (ElementKind::GeoLat, "LAT"),
                    (ElementKind::GeoLng, "LNG"),
                    (ElementKind::GeoAlt, "ALT"),
                    (ElementKind::GeoAcc, "ACC"),
                ];
                for (i, (kind, suffix)) in parts.into_iter().enumerate() {
                    let part_column = self.naming.request_column_name(
                        table,
                        qualifier,
                        &format!("{}_{}", item, suffix),
                    )?;
                    self.push(Some(&uri), i as u32 + 1, None, kind, table, Some(part_column));
                }
                return Ok(());
            }
            ContentType::Binary => {
                self.naming.release_column_request(table, column);
                let content_table = self.request_table(qualifier, &format!("{}_BN", item))?;
                let ref_table = self.request_table(qualifier, &format!("{}_REF", item))?;
                let blob_table = self.request_table(qualifier, &format!("{}_BLB", item))?;
                let uri = self.push(
                    Some(parent_uri),
                    ordinal,
                    name,
                    ElementKind::Binary,
                    content_table,
                    None,
                );
                let ref_uri = self.push(
                    Some(&uri),
                    1,
                    None,
                    ElementKind::BinaryContentRef,
                    ref_table,
                    None,
                );
                self.push(Some(&ref_uri), 1, None, ElementKind::RefBlob, blob_table, None);
                return Ok(());
            }
            ContentType::Unsupported(raw) => {
                return Err(SchemaCompilerError::UnsupportedContentType {
                    path: element.path.clone(),
                    content_type: raw.clone(),
                });
            }
        };

        self.push(Some(parent_uri), ordinal, name, kind, table, Some(column));
        Ok(())
    }
}
