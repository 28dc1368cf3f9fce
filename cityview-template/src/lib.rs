//! Placeholder templates for entity cards and map popups.
//!
//! Three placeholder forms are recognized:
//!
//! ```text
//! {{entityId}}            full entity URN
//! {{entityType}}          short entity type
//! {{data.path.to.value}}  attribute value, formatted for display
//! ```
//!
//! Anything else inside `{{ }}` renders as an empty string. Templates are
//! author-supplied free text, so a typo blanks one placeholder instead of
//! failing the render.

mod context;
mod format;
mod parser;
mod paths;

pub use context::TemplateContext;
pub use format::{format_coordinates, format_number, format_value};
pub use parser::{Placeholder, Segment, Template, get_nested_value, parse_template};
pub use paths::{DEFAULT_PATH_DEPTH, extract_attribute_paths, placeholder_suggestions};
