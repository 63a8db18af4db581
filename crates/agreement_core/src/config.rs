//! Store configuration assembled once at process start.
//!
//! # Responsibility
//! - Resolve the table name and table-service location from the environment.
//! - Bind table handles for an opened connection.
//!
//! # Invariants
//! - Blank environment values fall back to defaults.
//! - Configuration is passed explicitly; nothing here is global.

use crate::codec::agreement_codec::attr;
use crate::db::{open_db, DbResult, SqliteTable, TableResult};
use rusqlite::Connection;
use std::path::PathBuf;

/// Environment variable naming the agreement table.
pub const TABLE_NAME_ENV: &str = "TABLE_NAME";
/// Environment variable overriding the table-service location.
///
/// For the SQLite table service this is the database file path.
pub const ENDPOINT_OVERRIDE_ENV: &str = "ENDPOINT_OVERRIDE";
pub const DEFAULT_TABLE_NAME: &str = "agreement";
const DEFAULT_DB_FILE_NAME: &str = "agreement.sqlite3";

/// Where agreements live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub table_name: String,
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
        }
    }
}

impl StoreConfig {
    /// Reads `TABLE_NAME` and `ENDPOINT_OVERRIDE` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through `lookup`, falling back to defaults for
    /// absent or blank values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_blank = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            table_name: non_blank(TABLE_NAME_ENV).unwrap_or(defaults.table_name),
            db_path: non_blank(ENDPOINT_OVERRIDE_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
        }
    }

    /// Opens the configured SQLite database file.
    pub fn open_connection(&self) -> DbResult<Connection> {
        open_db(&self.db_path)
    }

    /// Binds the configured agreement table on `conn`, keyed by `xref`.
    pub fn bind_table<'conn>(&self, conn: &'conn Connection) -> TableResult<SqliteTable<'conn>> {
        SqliteTable::try_new(conn, self.table_name.as_str(), attr::XREF)
    }
}

#[cfg(test)]
mod tests {
    use super::{StoreConfig, DEFAULT_TABLE_NAME, ENDPOINT_OVERRIDE_ENV, TABLE_NAME_ENV};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect::<HashMap<_, _>>();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = StoreConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config.table_name, DEFAULT_TABLE_NAME);
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn overrides_are_trimmed_and_blank_values_ignored() {
        let config = StoreConfig::from_lookup(lookup_from(&[
            (TABLE_NAME_ENV, "  agreement_dev "),
            (ENDPOINT_OVERRIDE_ENV, "   "),
        ]));
        assert_eq!(config.table_name, "agreement_dev");
        assert_eq!(config.db_path, StoreConfig::default().db_path);

        let config = StoreConfig::from_lookup(lookup_from(&[(
            ENDPOINT_OVERRIDE_ENV,
            "/var/lib/agreement/db.sqlite3",
        )]));
        assert_eq!(
            config.db_path,
            PathBuf::from("/var/lib/agreement/db.sqlite3")
        );
    }

    #[test]
    fn bind_table_rejects_invalid_table_name() {
        let conn = crate::db::open_db_in_memory().unwrap();
        let config = StoreConfig {
            table_name: "not valid".to_string(),
            ..StoreConfig::default()
        };
        assert!(config.bind_table(&conn).is_err());
    }
}
