//! SQLite-backed implementation of the `Table` contract.
//!
//! # Responsibility
//! - Persist items as JSON documents keyed by the table's key attribute.
//! - Provide compare-and-swap semantics for conditional writes.
//!
//! # Invariants
//! - Every conditional write runs inside one `IMMEDIATE` transaction
//!   (read, evaluate, write, commit). Plain reads take no write lock.
//! - Table names are validated before being quoted into SQL.
//! - Stores never create their table; `provision_table` is explicit.

use crate::db::table::{Condition, Table, TableError, TableResult, UpdateExpression};
use crate::db::DbError;
use crate::model::item::{AttributeValue, Item};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

static TABLE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]{0,254}$").expect("valid table name regex")
});

/// Returns whether `name` can be used as a table name.
pub fn is_valid_table_name(name: &str) -> bool {
    TABLE_NAME_RE.is_match(name)
}

/// Creates the backing SQLite table for `name` if it does not exist yet.
///
/// # Errors
/// - `InvalidTableName` when `name` fails validation.
/// - `Db` when the DDL statement fails.
pub fn provision_table(conn: &Connection, name: &str) -> TableResult<()> {
    let quoted = quote_table_name(name)?;
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {quoted} (
            pk TEXT PRIMARY KEY NOT NULL,
            item TEXT NOT NULL
        ) WITHOUT ROWID;"
    ))
    .map_err(|err| TableError::Db(DbError::Sqlite(err)))?;
    info!("event=table_provision module=db status=ok table={name}");
    Ok(())
}

/// Returns whether the backing SQLite table for `name` exists.
pub fn table_exists(conn: &Connection, name: &str) -> TableResult<bool> {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [name],
            |row| row.get(0),
        )
        .map_err(|err| TableError::Db(DbError::Sqlite(err)))?;
    Ok(exists == 1)
}

/// Table handle bound to a borrowed SQLite connection.
pub struct SqliteTable<'conn> {
    conn: &'conn Connection,
    name: String,
    quoted: String,
    key_attribute: String,
}

impl<'conn> SqliteTable<'conn> {
    /// Binds a table handle without touching the database.
    ///
    /// A missing table is only detected when an operation runs.
    pub fn try_new(
        conn: &'conn Connection,
        name: impl Into<String>,
        key_attribute: impl Into<String>,
    ) -> TableResult<Self> {
        let name = name.into();
        let quoted = quote_table_name(&name)?;
        Ok(Self {
            conn,
            name,
            quoted,
            key_attribute: key_attribute.into(),
        })
    }

    fn begin(&self) -> TableResult<Transaction<'conn>> {
        Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(|err| self.classify(err))
    }

    /// Reads one item; `conn` is either the bound connection or an open
    /// write transaction.
    fn load(&self, conn: &Connection, key: &str) -> TableResult<Option<Item>> {
        let payload: Option<String> = conn
            .query_row(
                &format!("SELECT item FROM {} WHERE pk = ?1;", self.quoted),
                [key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| self.classify(err))?;
        payload.map(|text| decode_item(&text, &self.name)).transpose()
    }

    fn store(&self, tx: &Transaction<'_>, key: &str, item: &Item) -> TableResult<()> {
        let payload = encode_item(item)?;
        tx.execute(
            &format!(
                "INSERT INTO {} (pk, item) VALUES (?1, ?2)
                 ON CONFLICT(pk) DO UPDATE SET item = excluded.item;",
                self.quoted
            ),
            params![key, payload],
        )
        .map_err(|err| self.classify(err))?;
        Ok(())
    }

    fn check(
        &self,
        condition: Option<&Condition>,
        existing: Option<&Item>,
        values: &Item,
    ) -> TableResult<()> {
        if let Some(condition) = condition {
            if !condition.evaluate(existing, values)? {
                return Err(TableError::ConditionFailed {
                    item_exists: existing.is_some(),
                });
            }
        }
        Ok(())
    }

    fn classify(&self, err: rusqlite::Error) -> TableError {
        if err.to_string().contains("no such table") {
            TableError::TableMissing(self.name.clone())
        } else {
            TableError::Db(DbError::Sqlite(err))
        }
    }
}

impl Table for SqliteTable<'_> {
    fn table_name(&self) -> &str {
        &self.name
    }

    fn key_attribute(&self) -> &str {
        &self.key_attribute
    }

    fn get_item(&self, key: &str) -> TableResult<Option<Item>> {
        self.load(self.conn, key)
    }

    fn put_item(
        &self,
        item: &Item,
        condition: Option<&Condition>,
        values: &Item,
    ) -> TableResult<()> {
        let key = item
            .get(&self.key_attribute)
            .and_then(AttributeValue::as_s)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                TableError::InvalidData(format!(
                    "item is missing string key attribute `{}`",
                    self.key_attribute
                ))
            })?;

        let tx = self.begin()?;
        let existing = self.load(&tx, key)?;
        self.check(condition, existing.as_ref(), values)?;
        self.store(&tx, key, item)?;
        tx.commit().map_err(|err| self.classify(err))?;
        Ok(())
    }

    fn update_item(
        &self,
        key: &str,
        update: &UpdateExpression,
        condition: Option<&Condition>,
        values: &Item,
    ) -> TableResult<Item> {
        let tx = self.begin()?;
        let existing = self.load(&tx, key)?;
        self.check(condition, existing.as_ref(), values)?;

        let mut item = existing.unwrap_or_else(|| {
            let mut fresh = Item::new();
            fresh.insert(self.key_attribute.clone(), AttributeValue::s(key));
            fresh
        });
        update.apply(&mut item, values)?;
        if item.get(&self.key_attribute).and_then(AttributeValue::as_s) != Some(key) {
            return Err(TableError::InvalidExpression(format!(
                "update must not modify key attribute `{}`",
                self.key_attribute
            )));
        }

        self.store(&tx, key, &item)?;
        tx.commit().map_err(|err| self.classify(err))?;
        Ok(item)
    }

    fn delete_item(
        &self,
        key: &str,
        condition: Option<&Condition>,
        values: &Item,
    ) -> TableResult<Option<Item>> {
        let tx = self.begin()?;
        let existing = self.load(&tx, key)?;
        self.check(condition, existing.as_ref(), values)?;
        if existing.is_some() {
            tx.execute(
                &format!("DELETE FROM {} WHERE pk = ?1;", self.quoted),
                [key],
            )
            .map_err(|err| self.classify(err))?;
        }
        tx.commit().map_err(|err| self.classify(err))?;
        Ok(existing)
    }
}

fn quote_table_name(name: &str) -> TableResult<String> {
    if !is_valid_table_name(name) {
        return Err(TableError::InvalidTableName(name.to_string()));
    }
    Ok(format!("\"{name}\""))
}

fn encode_item(item: &Item) -> TableResult<String> {
    serde_json::to_string(item)
        .map_err(|err| TableError::InvalidData(format!("failed to encode item: {err}")))
}

fn decode_item(text: &str, table: &str) -> TableResult<Item> {
    serde_json::from_str(text).map_err(|err| {
        TableError::InvalidData(format!("invalid item payload in table `{table}`: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::{is_valid_table_name, provision_table, table_exists};
    use crate::db::open_db_in_memory;
    use crate::db::table::TableError;

    #[test]
    fn table_name_validation() {
        assert!(is_valid_table_name("agreement"));
        assert!(is_valid_table_name("agreement-dev_2"));
        assert!(!is_valid_table_name(""));
        assert!(!is_valid_table_name("2fast"));
        assert!(!is_valid_table_name("x\"; DROP TABLE y; --"));
    }

    #[test]
    fn provision_is_idempotent() {
        let conn = open_db_in_memory().unwrap();
        assert!(!table_exists(&conn, "agreement").unwrap());

        provision_table(&conn, "agreement").unwrap();
        provision_table(&conn, "agreement").unwrap();
        assert!(table_exists(&conn, "agreement").unwrap());
    }

    #[test]
    fn provision_rejects_invalid_name() {
        let conn = open_db_in_memory().unwrap();
        let err = provision_table(&conn, "bad name").unwrap_err();
        assert!(matches!(err, TableError::InvalidTableName(name) if name == "bad name"));
    }
}
