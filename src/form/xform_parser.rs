//! Parser for XForm definition files
//!
//! Only the parts of an XForm that shape storage are read: the primary
//! instance (the element tree), the `bind` types and the `repeat` markers.
//! Labels, hints, constraints and the rest of the body are ignored.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use roxmltree::{Document, Node};

use crate::error::SchemaCompilerError;
use crate::util::{read_form_text, sha256_hex};

use super::ContentType;

static FORM_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.:/-]*$").unwrap());

/// One element of the submission instance tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FormElement {
    /// Tag name as authored
    pub name: String,
    /// Absolute instance path, e.g. `/data/household/member`
    pub path: String,
    pub content_type: ContentType,
    pub repeatable: bool,
    pub children: Vec<FormElement>,
}

impl FormElement {
    /// A leaf field with a declared type.
    pub fn field(name: &str, content_type: ContentType) -> Self {
        Self {
            name: name.to_string(),
            path: format!("/{}", name),
            content_type,
            repeatable: false,
            children: Vec::new(),
        }
    }

    /// A non-repeating group.
    pub fn group(name: &str, children: Vec<FormElement>) -> Self {
        Self {
            name: name.to_string(),
            path: format!("/{}", name),
            content_type: ContentType::Null,
            repeatable: false,
            children,
        }
    }

    /// A repeating group.
    pub fn repeat(name: &str, children: Vec<FormElement>) -> Self {
        Self {
            repeatable: true,
            ..Self::group(name, children)
        }
    }

    fn assign_paths(&mut self, parent_path: &str) {
        self.path = format!("{}/{}", parent_path, self.name);
        let path = self.path.clone();
        for child in &mut self.children {
            child.assign_paths(&path);
        }
    }

    /// Number of elements in this subtree that carry data (everything except
    /// groups and repeats).
    pub fn field_count(&self) -> usize {
        if self.children.is_empty() {
            return 1;
        }
        self.children.iter().map(|c| c.field_count()).sum()
    }
}

/// A parsed form definition
#[derive(Debug, Clone)]
pub struct FormDefinition {
    /// Form id from the instance root's `id` attribute
    pub form_id: String,
    /// Optional `version` attribute
    pub version: Option<String>,
    /// Title from `h:head/h:title`
    pub title: Option<String>,
    /// Instance root; always treated as the top-level group
    pub root: FormElement,
    /// SHA-256 of the form text (empty for programmatically built forms)
    pub form_hash: String,
}

impl FormDefinition {
    /// Build a definition from an in-memory element tree. Paths are
    /// recomputed from the root down.
    pub fn new(form_id: &str, mut root: FormElement) -> Result<Self, SchemaCompilerError> {
        validate_form_id(form_id)?;
        root.assign_paths("");
        Ok(Self {
            form_id: form_id.to_string(),
            version: None,
            title: None,
            root,
            form_hash: String::new(),
        })
    }
}

pub fn validate_form_id(form_id: &str) -> Result<(), SchemaCompilerError> {
    if FORM_ID_RE.is_match(form_id) {
        Ok(())
    } else {
        Err(SchemaCompilerError::InvalidFormId {
            form_id: form_id.to_string(),
        })
    }
}

/// Parse an XForm file
pub fn parse_form_file(path: &Path) -> Result<FormDefinition, SchemaCompilerError> {
    let content = read_form_text(path).map_err(|e| SchemaCompilerError::FormReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_form_xml(&content, path)
}

/// Parse XForm text. `origin` is only used for error messages.
pub fn parse_form_xml(content: &str, origin: &Path) -> Result<FormDefinition, SchemaCompilerError> {
    let doc = Document::parse(content).map_err(|e| SchemaCompilerError::FormParseError {
        path: origin.to_path_buf(),
        source: e,
    })?;

    let html = doc.root_element();

    let model = find_descendant(&html, "model").ok_or_else(|| malformed("no <model> element"))?;
    let instance = model
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "instance")
        .find(|n| n.attribute("id").is_none())
        .ok_or_else(|| malformed("no primary <instance> element"))?;
    let submission = instance
        .children()
        .find(|n| n.is_element())
        .ok_or_else(|| malformed("primary instance is empty"))?;

    let form_id = submission
        .attribute("id")
        .ok_or_else(|| {
            malformed("the submission element has no id attribute; add id=\"your.domain:formId\"")
        })?
        .to_string();
    validate_form_id(&form_id)?;

    let version = submission.attribute("version").map(|s| s.to_string());
    let title = find_descendant(&html, "title")
        .and_then(|n| n.text())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let binds = collect_binds(&model);
    let repeats = collect_repeats(&html);

    let root = read_element(&submission, "", &binds, &repeats);

    Ok(FormDefinition {
        form_id,
        version,
        title,
        root,
        form_hash: sha256_hex(content.as_bytes()),
    })
}

fn malformed(message: &str) -> SchemaCompilerError {
    SchemaCompilerError::MalformedForm {
        message: message.to_string(),
    }
}

fn find_descendant<'a, 'input>(
    root: &Node<'a, 'input>,
    local_name: &str,
) -> Option<Node<'a, 'input>> {
    root.descendants()
        .find(|n| n.is_element() && n.tag_name().name() == local_name)
}

/// nodeset path -> declared type
fn collect_binds(model: &Node) -> HashMap<String, ContentType> {
    let mut binds = HashMap::new();
    for node in model.descendants() {
        if !node.is_element() || node.tag_name().name() != "bind" {
            continue;
        }
        let (Some(nodeset), Some(ty)) = (node.attribute("nodeset"), node.attribute("type")) else {
            continue;
        };
        binds.insert(
            normalize_nodeset(nodeset),
            ContentType::from_bind_type(ty),
        );
    }
    binds
}

fn collect_repeats(html: &Node) -> HashSet<String> {
    html.descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "repeat")
        .filter_map(|n| n.attribute("nodeset"))
        .map(normalize_nodeset)
        .collect()
}

fn normalize_nodeset(nodeset: &str) -> String {
    nodeset.trim().trim_end_matches('/').to_string()
}

fn read_element(
    node: &Node,
    parent_path: &str,
    binds: &HashMap<String, ContentType>,
    repeats: &HashSet<String>,
) -> FormElement {
    let name = node.tag_name().name().to_string();
    let path = format!("{}/{}", parent_path, name);

    let is_template = node.attributes().any(|a| a.name() == "template");
    let repeatable = is_template || repeats.contains(&path);
    let content_type = binds.get(&path).cloned().unwrap_or(ContentType::Null);

    let children = node
        .children()
        .filter(|n| n.is_element())
        .map(|child| read_element(&child, &path, binds, repeats))
        .collect();

    FormElement {
        name,
        path,
        content_type,
        repeatable,
        children,
    }
}
