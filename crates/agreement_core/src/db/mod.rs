//! SQLite storage bootstrap and table service entry points.
//!
//! # Responsibility
//! - Open and configure SQLite connections for agreement storage.
//! - Expose the key-value `Table` contract and its SQLite implementation.
//!
//! # Invariants
//! - Opening a connection never creates application tables.
//! - Table-level failures are classified before reaching the store.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod open;
pub mod sqlite_table;
pub mod table;

pub use open::{open_db, open_db_in_memory};
pub use sqlite_table::{is_valid_table_name, provision_table, table_exists, SqliteTable};
pub use table::{Condition, Table, TableError, TableResult, UpdateAction, UpdateExpression};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
