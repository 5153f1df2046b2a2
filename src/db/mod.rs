pub mod row;
pub mod schema;
pub mod sqlite;

#[cfg(test)]
pub(crate) mod fixtures;

pub use row::*;
pub use schema::*;
pub use sqlite::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("No active record store at {0}")]
    NoActiveRecordStore(PathBuf),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },
}
