//! SQLite storage implementation

use super::{Batch, DependencyRow, Statement, Store, Value, schema};
use crate::constraint::ForeignKey;
use crate::{Error, Result};
use regex::Regex;
use rusqlite::types::{ToSqlOutput, Type, ValueRef};
use rusqlite::{Connection, OpenFlags, OptionalExtension, ToSql, params_from_iter};
use std::path::Path;
use std::sync::OnceLock;
use uuid::Uuid;

static CREATE_HEAD: OnceLock<Regex> = OnceLock::new();

/// SQLite-backed dependency store
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open an existing database.
    ///
    /// Accepts a plain path, `sqlite://<path>`, or a `file:` URI.
    pub fn open(target: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let path = target.strip_prefix("sqlite://").unwrap_or(target);
        let conn = Connection::open_with_flags(path, flags).map_err(|source| Error::Connect {
            target: target.to_string(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open a database file, creating it if it doesn't exist
    pub fn create(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| Error::Connect {
            target: path.display().to_string(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        Ok(Self { conn })
    }

    /// Create the tables the migration operates on, if missing
    pub fn apply_schema(&self) -> Result<()> {
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    fn table_sql(&self, table: &str) -> Result<String> {
        self.conn
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| Error::TableNotFound(table.to_string()))
    }

    /// Replace `table` with one created from `create_sql`, keeping rows and indexes.
    ///
    /// Enforcement is paused for the rebuild. When `validate` is given, rows that
    /// violate it abort the rebuild.
    fn rebuild_table(&mut self, table: &str, create_sql: &str, validate: Option<&ForeignKey>) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = OFF")?;
        let rebuilt = rebuild_in_transaction(&mut self.conn, table, create_sql, validate);
        let restored = self.conn.execute_batch("PRAGMA foreign_keys = ON");
        rebuilt?;
        restored?;
        Ok(())
    }
}

fn rebuild_in_transaction(
    conn: &mut Connection,
    table: &str,
    create_sql: &str,
    validate: Option<&ForeignKey>,
) -> Result<()> {
    let tx = conn.transaction()?;

    let indexes: Vec<String> = {
        let mut stmt = tx.prepare(
            "SELECT sql FROM sqlite_master WHERE type = 'index' AND tbl_name = ?1 AND sql IS NOT NULL",
        )?;
        let rows = stmt.query_map([table], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<_>>()?
    };

    let staging = format!("{}__rebuild", table);
    tx.execute_batch(&rename_create(create_sql, &staging)?)?;
    tx.execute(&format!("INSERT INTO \"{}\" SELECT * FROM \"{}\"", staging, table), [])?;
    tx.execute(&format!("DROP TABLE \"{}\"", table), [])?;
    tx.execute(&format!("ALTER TABLE \"{}\" RENAME TO \"{}\"", staging, table), [])?;
    for index in &indexes {
        tx.execute_batch(index)?;
    }

    if let Some(fk) = validate {
        let rows: u64 = {
            let mut stmt = tx.prepare(&format!("PRAGMA foreign_key_check(\"{}\")", table))?;
            let parents = stmt.query_map([], |row| row.get::<_, String>(2))?;
            let mut violations = 0;
            for parent in parents {
                if parent?.eq_ignore_ascii_case(&fk.references_table) {
                    violations += 1;
                }
            }
            violations
        };
        if rows > 0 {
            return Err(Error::ConstraintViolation {
                constraint: fk.name.clone(),
                rows,
            });
        }
    }

    tx.commit()?;
    Ok(())
}

/// Point a `CREATE TABLE` statement at a different table name
fn rename_create(create_sql: &str, name: &str) -> Result<String> {
    let head = match CREATE_HEAD.get() {
        Some(re) => re,
        None => {
            let re = Regex::new(r#"(?is)^\s*CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:"[^"]+"|`[^`]+`|\[[^\]]+\]|\w+)"#)?;
            CREATE_HEAD.get_or_init(|| re)
        }
    };
    Ok(head.replace(create_sql, format!("CREATE TABLE \"{}\"", name).as_str())
        .into_owned())
}

/// Matches the named constraint clause, including its leading comma
fn constraint_clause(name: &str) -> Result<Regex> {
    let pattern = format!(
        r#"(?is),\s*CONSTRAINT\s+["`]?{}["`]?\s+FOREIGN\s+KEY\s*\([^)]*\)\s*REFERENCES\s+["`]?\w+["`]?\s*\([^)]*\)(?:\s+ON\s+(?:DELETE|UPDATE)\s+(?:SET\s+NULL|SET\s+DEFAULT|CASCADE|RESTRICT|NO\s+ACTION))*(?:\s+(?:NOT\s+)?DEFERRABLE(?:\s+INITIALLY\s+(?:DEFERRED|IMMEDIATE))?)?"#,
        regex::escape(name)
    );
    Ok(Regex::new(&pattern)?)
}

impl Store for SqliteStore {
    fn execute(&mut self, statement: &Statement) -> Result<usize> {
        let affected = self
            .conn
            .execute(statement.sql.as_ref(), params_from_iter(statement.params.iter()))?;
        Ok(affected)
    }

    fn count(&mut self, statement: &Statement) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            statement.sql.as_ref(),
            params_from_iter(statement.params.iter()),
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn submit(&mut self, batch: &Batch) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut affected = 0;
        for (index, statement) in batch.statements().iter().enumerate() {
            let result = tx
                .prepare_cached(statement.sql.as_ref())
                .and_then(|mut stmt| stmt.execute(params_from_iter(statement.params.iter())));
            match result {
                Ok(n) if batch.requires_one_row_each() && n != 1 => {
                    return Err(Error::RowMismatch {
                        label: batch.label(),
                        index,
                        affected: n,
                    });
                }
                Ok(n) => affected += n,
                Err(source) => {
                    return Err(Error::BatchFailed {
                        label: batch.label(),
                        index,
                        source,
                    });
                }
            }
        }
        tx.commit()?;
        Ok(affected)
    }

    fn load_dependencies(&mut self) -> Result<Vec<DependencyRow>> {
        let mut stmt = self.conn.prepare(schema::SELECT_DEPENDENCIES)?;
        let rows = stmt.query_map([], row_to_dependency)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Error::Decode)
    }

    fn has_foreign_key(&mut self, fk: &ForeignKey) -> Result<bool> {
        let sql = self.table_sql(&fk.table)?;
        Ok(constraint_clause(&fk.name)?.is_match(&sql))
    }

    fn drop_foreign_key(&mut self, fk: &ForeignKey) -> Result<()> {
        let sql = self.table_sql(&fk.table)?;
        let clause = constraint_clause(&fk.name)?;
        if !clause.is_match(&sql) {
            return Err(Error::ConstraintMissing(fk.name.clone()));
        }
        let stripped = clause.replace(&sql, "").into_owned();
        self.rebuild_table(&fk.table, &stripped, None)
    }

    fn add_foreign_key(&mut self, fk: &ForeignKey) -> Result<()> {
        let sql = self.table_sql(&fk.table)?;
        if constraint_clause(&fk.name)?.is_match(&sql) {
            return Err(Error::ConstraintExists(fk.name.clone()));
        }
        let close = sql
            .rfind(')')
            .ok_or_else(|| Error::TableNotFound(fk.table.clone()))?;
        let extended = format!("{},\n    {}\n{}", sql[..close].trim_end(), fk.clause(), &sql[close..]);
        self.rebuild_table(&fk.table, &extended, Some(fk))
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Uuid(id) => ToSqlOutput::Owned(rusqlite::types::Value::Text(id.to_string())),
            Value::Blob(bytes) => ToSqlOutput::Borrowed(ValueRef::Blob(bytes.as_slice())),
        })
    }
}

/// Decode a UUID stored as TEXT or a 16-byte BLOB
fn uuid_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    match row.get_ref(idx)? {
        ValueRef::Null => Ok(None),
        ValueRef::Text(text) => {
            let s = std::str::from_utf8(text)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))?;
            Uuid::parse_str(s)
                .map(Some)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
        }
        ValueRef::Blob(blob) => Uuid::from_slice(blob)
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Blob, Box::new(e))),
        other => Err(rusqlite::Error::FromSqlConversionFailure(
            idx,
            other.data_type(),
            "expected a UUID".into(),
        )),
    }
}

fn required_uuid(row: &rusqlite::Row, idx: usize, column: &str) -> rusqlite::Result<Uuid> {
    uuid_column(row, idx)?.ok_or_else(|| rusqlite::Error::InvalidColumnType(idx, column.to_string(), Type::Null))
}

/// A column's raw TEXT or BLOB value
fn stored_value(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Value> {
    match row.get_ref(idx)? {
        ValueRef::Blob(blob) => Ok(Value::Blob(blob.to_vec())),
        _ => row.get(idx).map(Value::Text),
    }
}

fn row_to_dependency(row: &rusqlite::Row) -> rusqlite::Result<DependencyRow> {
    Ok(DependencyRow {
        id: required_uuid(row, 0, "id")?,
        stored_id: stored_value(row, 0)?,
        package_id: required_uuid(row, 1, "package_id")?,
        dependent_package_version_id: uuid_column(row, 2)?.unwrap_or_else(Uuid::nil),
        dependency_type: row.get(3)?,
        justification: row.get(4)?,
        origin: row.get(5)?,
        collector: row.get(6)?,
        document_ref: row.get(7)?,
    })
}
