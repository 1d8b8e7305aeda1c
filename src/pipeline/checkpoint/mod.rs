//! Checkpoint codec: a member's graph as a human-readable markdown file,
//! and that file back into graph upserts.

pub mod export;
pub mod import;
pub mod table;
pub mod types;

pub use export::*;
pub use import::*;
pub use types::*;

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("No member id found in checkpoint")]
    MissingIdentity,

    #[error("Member not found: {0}")]
    MemberNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
