//! Constraint gate - brackets the identifier rewrite window
//!
//! The link table's foreign key to `dependencies(id)` would reject every
//! primary-key rewrite, so it is dropped before the rewrite and re-added
//! afterwards with the same name, column, target and delete behavior.
//!
//! Opening the gate yields a [`DisabledConstraint`]; the only way to close it
//! is [`DisabledConstraint::enable`]. Nothing re-adds the constraint on a
//! failure path.

use crate::storage::schema;
use crate::storage::Store;
use crate::Result;
use std::fmt;

/// A named single-column foreign key that cascades deletes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub name: String,
    pub table: String,
    pub column: String,
    pub references_table: String,
    pub references_column: String,
}

impl ForeignKey {
    /// `bill_of_materials_included_dependencies(dependency_id) -> dependencies(id)`, cascading deletes
    pub fn included_dependency() -> Self {
        Self {
            name: schema::INCLUDED_DEPENDENCY_FK.to_string(),
            table: schema::INCLUDED_DEPENDENCIES_TABLE.to_string(),
            column: "dependency_id".to_string(),
            references_table: schema::DEPENDENCIES_TABLE.to_string(),
            references_column: "id".to_string(),
        }
    }

    /// Table-constraint clause, as it appears inside `CREATE TABLE` or after `ADD`
    pub fn clause(&self) -> String {
        format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE CASCADE",
            self.name, self.column, self.references_table, self.references_column
        )
    }
}

impl fmt::Display for ForeignKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.name, self.table)
    }
}

pub struct ConstraintGate {
    fk: ForeignKey,
}

impl ConstraintGate {
    pub fn new(fk: ForeignKey) -> Self {
        Self { fk }
    }

    /// Drop the constraint. Integrity checking stays off until `enable`.
    pub fn disable<S: Store + ?Sized>(self, store: &mut S) -> Result<DisabledConstraint> {
        store.drop_foreign_key(&self.fk)?;
        tracing::info!("Dropped foreign key {}", self.fk);
        Ok(DisabledConstraint {
            fk: self.fk,
            restored: false,
        })
    }
}

/// Proof that the constraint is currently dropped
#[must_use = "the constraint stays dropped until `enable` is called"]
pub struct DisabledConstraint {
    fk: ForeignKey,
    restored: bool,
}

impl DisabledConstraint {
    /// Re-add the exact constraint that was dropped
    pub fn enable<S: Store + ?Sized>(mut self, store: &mut S) -> Result<()> {
        store.add_foreign_key(&self.fk)?;
        self.restored = true;
        tracing::info!("Restored foreign key {}", self.fk);
        Ok(())
    }
}

impl Drop for DisabledConstraint {
    fn drop(&mut self) {
        if !self.restored {
            tracing::warn!(
                "Foreign key {} left disabled; restore it manually with: ALTER TABLE {} ADD {}",
                self.fk,
                self.fk.table,
                self.fk.clause()
            );
        }
    }
}
