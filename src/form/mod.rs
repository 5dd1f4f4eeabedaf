//! XForm definition parsing

mod content_type;
mod xform_parser;

pub use content_type::ContentType;
pub use xform_parser::{
    parse_form_file, parse_form_xml, validate_form_id, FormDefinition, FormElement,
};
