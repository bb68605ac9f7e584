//! Member-list import handling: delimited-file parsing and the
//! downloadable template.

pub mod parser;

pub use parser::{import_template, parse_import_file, ParseError};
