//! Declared content types of form elements

/// The content type declared for an element by its `bind`, or `Null` when
/// no type was declared (groups, repeats and untyped leaves).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    Null,
    Text,
    Integer,
    Decimal,
    Date,
    Time,
    DateTime,
    /// select one
    Choice,
    /// select many
    ChoiceList,
    Boolean,
    GeoPoint,
    GeoTrace,
    GeoShape,
    Barcode,
    Binary,
    Unsupported(String),
}

impl ContentType {
    /// Map a bind `type` attribute to a content type. Namespace prefixes such
    /// as `xsd:` are ignored and matching is case-insensitive.
    pub fn from_bind_type(raw: &str) -> ContentType {
        let local = raw.rsplit(':').next().unwrap_or(raw).trim();
        match local.to_ascii_lowercase().as_str() {
            "" => ContentType::Null,
            "string" => ContentType::Text,
            "int" | "integer" => ContentType::Integer,
            "decimal" => ContentType::Decimal,
            "date" => ContentType::Date,
            "time" => ContentType::Time,
            "datetime" => ContentType::DateTime,
            "select1" => ContentType::Choice,
            "select" => ContentType::ChoiceList,
            "boolean" => ContentType::Boolean,
            "geopoint" => ContentType::GeoPoint,
            "geotrace" => ContentType::GeoTrace,
            "geoshape" => ContentType::GeoShape,
            "barcode" => ContentType::Barcode,
            "binary" => ContentType::Binary,
            _ => ContentType::Unsupported(raw.to_string()),
        }
    }
}
