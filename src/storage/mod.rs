//! Storage Layer - the store handle every migration step receives
//!
//! The migration only touches three tables:
//! - dependencies(id, package_id, dependent_package_name_id, dependent_package_version_id, version_range, ...)
//! - package_versions(id, name_id, version)
//! - bill_of_materials_included_dependencies(bill_of_materials_id, dependency_id)
//!
//! Steps talk to the store through [`Store`], so the same logic runs against
//! SQLite or a recording store in tests.

pub mod schema;
pub mod sqlite;

use crate::Result;
use crate::constraint::ForeignKey;
use std::borrow::Cow;
use uuid::Uuid;

pub use sqlite::SqliteStore;

/// A bound parameter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Uuid(Uuid),
    Blob(Vec<u8>),
}

impl Value {
    /// `id` written in the same storage form as `self`
    pub fn same_form(&self, id: Uuid) -> Value {
        match self {
            Value::Blob(_) => Value::Blob(id.as_bytes().to_vec()),
            _ => Value::Uuid(id),
        }
    }
}

impl From<Uuid> for Value {
    fn from(id: Uuid) -> Self {
        Value::Uuid(id)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

/// One parameterized statement. Placeholders are positional (`?1`, `?2`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: Cow<'static, str>,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<Cow<'static, str>>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }
}

/// Ordered list of statements applied as one logical unit of work.
///
/// A failure of any statement fails the whole batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    label: &'static str,
    statements: Vec<Statement>,
    one_row_each: bool,
}

impl Batch {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            statements: Vec::new(),
            one_row_each: false,
        }
    }

    /// A batch in which every statement must affect exactly one row
    pub fn one_row_each(label: &'static str) -> Self {
        Self {
            one_row_each: true,
            ..Self::new(label)
        }
    }

    pub fn requires_one_row_each(&self) -> bool {
        self.one_row_each
    }

    pub fn queue(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// A dependency row as read for re-keying: its current id plus every hashed column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRow {
    pub id: Uuid,
    /// `id` exactly as the store holds it, for matching the row on update
    pub stored_id: Value,
    pub package_id: Uuid,
    /// Nil when the row never resolved to a concrete version
    pub dependent_package_version_id: Uuid,
    pub dependency_type: String,
    pub justification: String,
    pub origin: String,
    pub collector: String,
    pub document_ref: String,
}

/// Handle to the relational store being migrated.
///
/// Every call is synchronous and commits on its own; there is no transaction
/// spanning more than one call.
pub trait Store {
    /// Execute one statement, returning the number of affected rows
    fn execute(&mut self, statement: &Statement) -> Result<usize>;

    /// Run a query that yields a single integer value
    fn count(&mut self, statement: &Statement) -> Result<u64>;

    /// Apply a batch as one unit, returning the total number of affected rows.
    ///
    /// For a [`Batch::one_row_each`] batch, a statement affecting any other
    /// number of rows fails the batch with [`crate::Error::RowMismatch`].
    fn submit(&mut self, batch: &Batch) -> Result<usize>;

    /// Read every dependency row
    fn load_dependencies(&mut self) -> Result<Vec<DependencyRow>>;

    fn has_foreign_key(&mut self, fk: &ForeignKey) -> Result<bool>;

    fn drop_foreign_key(&mut self, fk: &ForeignKey) -> Result<()>;

    fn add_foreign_key(&mut self, fk: &ForeignKey) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_binds_in_order() {
        let id = Uuid::from_u128(7);
        let stmt = Statement::new("UPDATE t SET a = ?1 WHERE b = ?2")
            .bind(id)
            .bind("x");

        assert_eq!(stmt.params, vec![Value::Uuid(id), Value::Text("x".to_string())]);
    }

    #[test]
    fn test_same_form_keeps_blob_ids_binary() {
        let id = Uuid::from_u128(9);
        let blob = Value::Blob(vec![0; 16]);
        let text = Value::Text("00000000-0000-0000-0000-000000000001".to_string());

        assert_eq!(blob.same_form(id), Value::Blob(id.as_bytes().to_vec()));
        assert_eq!(text.same_form(id), Value::Uuid(id));
    }

    #[test]
    fn test_batch_keeps_queue_order() {
        let mut batch = Batch::new("demo");
        assert!(batch.is_empty());

        batch.queue(Statement::new("SELECT 1"));
        batch.queue(Statement::new("SELECT 2"));

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.label(), "demo");
        assert_eq!(batch.statements()[1].sql, "SELECT 2");
        assert!(!batch.requires_one_row_each());
        assert!(Batch::one_row_each("ids").requires_one_row_each());
    }
}
