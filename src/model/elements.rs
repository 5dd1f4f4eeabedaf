//! Schema node types

/// What a schema node represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Group,
    Repeat,
    /// Continuation node created when a table is split
    Phantom,
    String,
    Integer,
    Decimal,
    Boolean,
    DateTime,
    Date,
    Time,
    GeoPoint,
    Binary,
    MultiSelect,
    /// Expansion of `Binary`: the reference table row
    BinaryContentRef,
    /// Expansion of `Binary`: the blob table row
    RefBlob,
    GeoLat,
    GeoLng,
    GeoAlt,
    GeoAcc,
}

impl ElementKind {
    /// Name used in the schema package
    pub fn type_name(&self) -> &'static str {
        match self {
            ElementKind::Group => "GROUP",
            ElementKind::Repeat => "REPEAT",
            ElementKind::Phantom => "PHANTOM",
            ElementKind::String => "STRING",
            ElementKind::Integer => "INTEGER",
            ElementKind::Decimal => "DECIMAL",
            ElementKind::Boolean => "BOOLEAN",
            ElementKind::DateTime => "JRDATETIME",
            ElementKind::Date => "JRDATE",
            ElementKind::Time => "JRTIME",
            ElementKind::GeoPoint => "GEOPOINT",
            ElementKind::Binary => "BINARY",
            ElementKind::MultiSelect => "SELECTN",
            ElementKind::BinaryContentRef => "BINARY_CONTENT_REF_BLOB",
            ElementKind::RefBlob => "REF_BLOB",
            ElementKind::GeoLat => "GEO_LATITUDE",
            ElementKind::GeoLng => "GEO_LONGITUDE",
            ElementKind::GeoAlt => "GEO_ALTITUDE",
            ElementKind::GeoAcc => "GEO_ACCURACY",
        }
    }

    /// Kinds that hold a value in a column of their table.
    pub fn has_value_column(&self) -> bool {
        matches!(
            self,
            ElementKind::String
                | ElementKind::Integer
                | ElementKind::Decimal
                | ElementKind::Boolean
                | ElementKind::DateTime
                | ElementKind::Date
                | ElementKind::Time
                | ElementKind::GeoLat
                | ElementKind::GeoLng
                | ElementKind::GeoAlt
                | ElementKind::GeoAcc
        )
    }

    /// Kinds whose rows live in a table of their own, outside the dynamic
    /// table hierarchy a split can rearrange.
    pub fn has_own_table(&self) -> bool {
        matches!(
            self,
            ElementKind::Repeat
                | ElementKind::Binary
                | ElementKind::MultiSelect
                | ElementKind::BinaryContentRef
                | ElementKind::RefBlob
        )
    }

    /// Nodes introduced by expanding a composite field; they carry no
    /// element name.
    pub fn is_expansion(&self) -> bool {
        matches!(
            self,
            ElementKind::BinaryContentRef
                | ElementKind::RefBlob
                | ElementKind::GeoLat
                | ElementKind::GeoLng
                | ElementKind::GeoAlt
                | ElementKind::GeoAcc
        )
    }
}

/// One node of the compiled schema
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub uri: String,
    /// 1-based position among siblings
    pub ordinal: u32,
    pub parent_uri: Option<String>,
    /// Absent for expansion and phantom nodes
    pub element_name: Option<String>,
    pub kind: ElementKind,
    pub persist_as_table: Option<String>,
    pub persist_as_column: Option<String>,
    pub persist_as_schema: String,
}

impl SchemaNode {
    pub fn is_root(&self) -> bool {
        self.parent_uri.is_none()
    }

    pub fn has_column(&self) -> bool {
        self.persist_as_column.is_some()
    }

    /// Whether this node is stored in `table`
    pub fn in_table(&self, table: &str) -> bool {
        self.persist_as_table.as_deref() == Some(table)
    }
}
