//! In-memory store that records every call, for exercising steps without SQLite

use crate::constraint::ForeignKey;
use crate::storage::{Batch, DependencyRow, Statement, Store, Value, schema};
use crate::{Error, Result};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Execute(String),
    Count(String),
    Submit { label: &'static str, len: usize, one_row_each: bool },
    Load,
    HasForeignKey(String),
    DropForeignKey(String),
    AddForeignKey(String),
}

/// Which call should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Execute,
    Load,
    Submit(&'static str),
    Drop,
    Add,
}

pub struct RecordingStore {
    pub ops: Vec<Op>,
    pub rows: Vec<DependencyRow>,
    /// `dependency_id` of each link row
    pub links: Vec<Uuid>,
    pub fk_present: bool,
    pub executed_rows: usize,
    pub count_result: u64,
    pub fail_at: Option<FailAt>,
    /// Returned by `load_dependencies` instead of `rows` when set
    pub loaded: Option<Vec<DependencyRow>>,
}

impl RecordingStore {
    pub fn new(rows: Vec<DependencyRow>, links: Vec<Uuid>) -> Self {
        Self {
            ops: Vec::new(),
            rows,
            links,
            fk_present: true,
            executed_rows: 0,
            count_result: 0,
            fail_at: None,
            loaded: None,
        }
    }

    pub fn failing_at(mut self, fail_at: FailAt) -> Self {
        self.fail_at = Some(fail_at);
        self
    }

    fn fail(&self, at: FailAt) -> Result<()> {
        if self.fail_at == Some(at) {
            return Err(Error::Storage(rusqlite::Error::ExecuteReturnedResults));
        }
        Ok(())
    }
}

pub fn row(id: u128, package: u128, version: u128, document_ref: &str) -> DependencyRow {
    DependencyRow {
        id: Uuid::from_u128(id),
        stored_id: Value::Text(Uuid::from_u128(id).to_string()),
        package_id: Uuid::from_u128(package),
        dependent_package_version_id: Uuid::from_u128(version),
        dependency_type: "DIRECT".to_string(),
        justification: String::new(),
        origin: "guac".to_string(),
        collector: "guac".to_string(),
        document_ref: document_ref.to_string(),
    }
}

fn uuid_param(statement: &Statement, idx: usize) -> Uuid {
    match &statement.params[idx] {
        Value::Uuid(id) => *id,
        Value::Text(s) => Uuid::parse_str(s).unwrap(),
        Value::Blob(b) => Uuid::from_slice(b).unwrap(),
    }
}

impl Store for RecordingStore {
    fn execute(&mut self, statement: &Statement) -> Result<usize> {
        self.ops.push(Op::Execute(statement.sql.to_string()));
        self.fail(FailAt::Execute)?;
        Ok(self.executed_rows)
    }

    fn count(&mut self, statement: &Statement) -> Result<u64> {
        self.ops.push(Op::Count(statement.sql.to_string()));
        Ok(self.count_result)
    }

    fn submit(&mut self, batch: &Batch) -> Result<usize> {
        self.ops.push(Op::Submit {
            label: batch.label(),
            len: batch.len(),
            one_row_each: batch.requires_one_row_each(),
        });
        if self.fail_at == Some(FailAt::Submit(batch.label())) {
            return Err(Error::BatchFailed {
                label: batch.label(),
                index: 0,
                source: rusqlite::Error::ExecuteReturnedResults,
            });
        }

        let mut affected = 0;
        for (index, statement) in batch.statements().iter().enumerate() {
            let new_id = uuid_param(statement, 0);
            let n = if statement.sql == schema::UPDATE_DEPENDENCY_ID {
                let mut n = 0;
                for row in self.rows.iter_mut().filter(|r| r.stored_id == statement.params[1]) {
                    row.id = new_id;
                    row.stored_id = statement.params[0].clone();
                    n += 1;
                }
                n
            } else if statement.sql == schema::UPDATE_INCLUDED_DEPENDENCY_ID {
                let old_id = uuid_param(statement, 1);
                let mut n = 0;
                for link in self.links.iter_mut().filter(|id| **id == old_id) {
                    *link = new_id;
                    n += 1;
                }
                n
            } else {
                panic!("unexpected batch statement: {}", statement.sql);
            };
            if batch.requires_one_row_each() && n != 1 {
                return Err(Error::RowMismatch {
                    label: batch.label(),
                    index,
                    affected: n,
                });
            }
            affected += n;
        }
        Ok(affected)
    }

    fn load_dependencies(&mut self) -> Result<Vec<DependencyRow>> {
        self.ops.push(Op::Load);
        self.fail(FailAt::Load)?;
        Ok(self.loaded.clone().unwrap_or_else(|| self.rows.clone()))
    }

    fn has_foreign_key(&mut self, fk: &ForeignKey) -> Result<bool> {
        self.ops.push(Op::HasForeignKey(fk.name.clone()));
        Ok(self.fk_present)
    }

    fn drop_foreign_key(&mut self, fk: &ForeignKey) -> Result<()> {
        self.ops.push(Op::DropForeignKey(fk.name.clone()));
        self.fail(FailAt::Drop)?;
        if !self.fk_present {
            return Err(Error::ConstraintMissing(fk.name.clone()));
        }
        self.fk_present = false;
        Ok(())
    }

    fn add_foreign_key(&mut self, fk: &ForeignKey) -> Result<()> {
        self.ops.push(Op::AddForeignKey(fk.name.clone()));
        self.fail(FailAt::Add)?;
        if self.fk_present {
            return Err(Error::ConstraintExists(fk.name.clone()));
        }
        self.fk_present = true;
        Ok(())
    }
}
