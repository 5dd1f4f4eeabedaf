//! Physical table descriptors

use crate::model::ElementKind;

/// The layout family of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableShape {
    /// The submission's top-level table
    TopLevelDynamic,
    /// Repeat groups and continuation tables
    Dynamic,
    SelectChoice,
    BinaryContent,
    BinaryContentRefBlob,
    RefBlob,
}

impl TableShape {
    /// Dynamic tables take their data columns from the form and can be
    /// split; the other shapes have a fixed set of columns.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, TableShape::TopLevelDynamic | TableShape::Dynamic)
    }

    pub fn name(&self) -> &'static str {
        match self {
            TableShape::TopLevelDynamic => "TOP_LEVEL_DYNAMIC",
            TableShape::Dynamic => "DYNAMIC",
            TableShape::SelectChoice => "SELECT_CHOICE",
            TableShape::BinaryContent => "BINARY_CONTENT",
            TableShape::BinaryContentRefBlob => "BINARY_CONTENT_REF_BLOB",
            TableShape::RefBlob => "REF_BLOB",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Uri,
    String,
    Integer,
    Decimal,
    Boolean,
    DateTime,
    Date,
    Time,
    Blob,
}

impl ColumnType {
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Uri => "URI",
            ColumnType::String => "STRING",
            ColumnType::Integer => "INTEGER",
            ColumnType::Decimal => "DECIMAL",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::DateTime => "DATETIME",
            ColumnType::Date => "DATE",
            ColumnType::Time => "TIME",
            ColumnType::Blob => "BLOB",
        }
    }

    /// Storage type for a value-carrying node kind
    pub fn for_kind(kind: ElementKind) -> Option<Self> {
        match kind {
            ElementKind::String => Some(ColumnType::String),
            ElementKind::Integer => Some(ColumnType::Integer),
            ElementKind::Decimal
            | ElementKind::GeoLat
            | ElementKind::GeoLng
            | ElementKind::GeoAlt
            | ElementKind::GeoAcc => Some(ColumnType::Decimal),
            ElementKind::Boolean => Some(ColumnType::Boolean),
            ElementKind::DateTime => Some(ColumnType::DateTime),
            ElementKind::Date => Some(ColumnType::Date),
            ElementKind::Time => Some(ColumnType::Time),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub column_type: ColumnType,
    /// Bookkeeping column supplied by the table shape, not by a form field
    pub is_metadata: bool,
}

impl ColumnDescriptor {
    fn metadata(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            is_metadata: true,
        }
    }

    pub fn data(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            is_metadata: false,
        }
    }
}

/// A table the compiler asks the backend to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub schema: String,
    pub name: String,
    pub shape: TableShape,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    /// Builds the shape's metadata columns followed by `data_columns`.
    /// Fixed shapes ignore `data_columns`.
    pub fn new(
        schema: &str,
        name: &str,
        shape: TableShape,
        data_columns: Vec<ColumnDescriptor>,
    ) -> Self {
        use ColumnType::*;

        let mut columns = vec![
            ColumnDescriptor::metadata("_URI", Uri),
            ColumnDescriptor::metadata("_CREATOR_URI_USER", Uri),
            ColumnDescriptor::metadata("_CREATION_DATE", DateTime),
            ColumnDescriptor::metadata("_LAST_UPDATE_URI_USER", Uri),
            ColumnDescriptor::metadata("_LAST_UPDATE_DATE", DateTime),
        ];

        let extra: &[(&str, ColumnType)] = match shape {
            TableShape::TopLevelDynamic => &[
                ("_MODEL_VERSION", Integer),
                ("_UI_VERSION", Integer),
                ("_IS_COMPLETE", Boolean),
                ("_SUBMISSION_DATE", DateTime),
                ("_MARKED_AS_COMPLETE_DATE", DateTime),
            ],
            TableShape::Dynamic => &[
                ("_PARENT_AURI", Uri),
                ("_ORDINAL_NUMBER", Integer),
                ("_TOP_LEVEL_AURI", Uri),
            ],
            TableShape::SelectChoice => &[
                ("_PARENT_AURI", Uri),
                ("_ORDINAL_NUMBER", Integer),
                ("_TOP_LEVEL_AURI", Uri),
                ("VALUE", String),
            ],
            TableShape::BinaryContent => &[
                ("_PARENT_AURI", Uri),
                ("_ORDINAL_NUMBER", Integer),
                ("_TOP_LEVEL_AURI", Uri),
                ("UNROOTED_FILE_PATH", String),
                ("CONTENT_TYPE", String),
                ("CONTENT_LENGTH", Integer),
                ("CONTENT_HASH", String),
            ],
            TableShape::BinaryContentRefBlob => &[
                ("_DOM_AURI", Uri),
                ("_SUB_AURI", Uri),
                ("_TOP_LEVEL_AURI", Uri),
                ("PART", Integer),
            ],
            TableShape::RefBlob => &[("_TOP_LEVEL_AURI", Uri), ("VALUE", Blob)],
        };
        columns.extend(
            extra
                .iter()
                .map(|(name, ty)| ColumnDescriptor::metadata(name, *ty)),
        );

        if shape.is_dynamic() {
            columns.extend(data_columns);
        }

        Self {
            schema: schema.to_string(),
            name: name.to_string(),
            shape,
            columns,
        }
    }

    pub fn data_column_count(&self) -> usize {
        self.columns.iter().filter(|c| !c.is_metadata).count()
    }

    pub fn data_column_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| !c.is_metadata)
            .map(|c| c.name.clone())
            .collect()
    }
}
