//! C-CDA clinical document parser.

pub mod parser;
pub mod sections;
pub mod xml;

pub use parser::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CcdError {
    #[error("Malformed clinical document: {0}")]
    MalformedDocument(String),
}
