//! Migration orchestrator
//!
//! Order of operations against a single store:
//! 1. backfill resolvable dependent versions
//! 2. drop the link table's foreign key
//! 3. read every dependency, derive its content id
//! 4. rewrite `dependencies.id` (one batch)
//! 5. rewrite `bill_of_materials_included_dependencies.dependency_id` (one batch)
//! 6. re-add the foreign key
//!
//! Each step commits on its own. A failure after step 2 leaves the store
//! partially migrated with the foreign key dropped.

use crate::backfill;
use crate::constraint::{ConstraintGate, ForeignKey};
use crate::identity::DependencyContent;
use crate::storage::{Batch, DependencyRow, Statement, Store, schema};
use crate::{Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Old and new identifier of one dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rekey {
    pub old_id: Uuid,
    pub new_id: Uuid,
}

impl Rekey {
    /// Row already carries its content id
    pub fn is_noop(&self) -> bool {
        self.old_id == self.new_id
    }
}

/// Derive the new id of every row, in row order
pub fn derive_rekeys(rows: &[DependencyRow]) -> Vec<Rekey> {
    rows.iter()
        .map(|row| Rekey {
            old_id: row.id,
            new_id: DependencyContent::from(row).derive_id(),
        })
        .collect()
}

/// Number of derived ids shared by more than one row
pub fn duplicate_groups(rekeys: &[Rekey]) -> usize {
    let mut seen: HashMap<Uuid, usize> = HashMap::new();
    for rekey in rekeys {
        *seen.entry(rekey.new_id).or_default() += 1;
    }
    seen.values().filter(|&&n| n > 1).count()
}

pub const DEPENDENCY_BATCH: &str = "dependency ids";
pub const LINK_BATCH: &str = "included dependency links";

/// One update per row, matched on the id as stored and keeping its storage form
fn rewrite_batch(mut batch: Batch, sql: &'static str, rows: &[DependencyRow], rekeys: &[Rekey]) -> Batch {
    for (row, rekey) in rows.iter().zip(rekeys) {
        batch.queue(
            Statement::new(sql)
                .bind(row.stored_id.same_form(rekey.new_id))
                .bind(row.stored_id.clone()),
        );
    }
    batch
}

/// Outcome of a completed migration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub backfilled: usize,
    pub dependencies: usize,
    pub rekeyed: usize,
    pub unchanged: usize,
    pub links_rewritten: usize,
    pub duplicate_groups: usize,
}

/// Read-only preview of what `run` would do with the current content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationPlan {
    pub backfill_candidates: u64,
    pub dependencies: usize,
    pub to_rekey: usize,
    pub already_deterministic: usize,
    pub duplicate_groups: usize,
    pub constraint_present: bool,
    pub rekeys: Vec<Rekey>,
}

/// Post-migration checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub dependencies: usize,
    /// Rows whose id is not their content id
    pub mismatched: Vec<Uuid>,
    pub orphaned_links: u64,
    pub constraint_present: bool,
}

impl Verification {
    pub fn is_clean(&self) -> bool {
        self.mismatched.is_empty() && self.orphaned_links == 0 && self.constraint_present
    }
}

/// Runs the re-keying against one store handle
pub struct Migrator<'a, S: Store + ?Sized> {
    store: &'a mut S,
    fk: ForeignKey,
}

impl<'a, S: Store + ?Sized> Migrator<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self {
            store,
            fk: ForeignKey::included_dependency(),
        }
    }

    /// Apply the full migration
    pub fn run(&mut self) -> Result<MigrationReport> {
        tracing::info!("Phase 1: backfilling dependent versions");
        let backfilled = backfill::backfill_dependent_versions(self.store)?;

        tracing::info!("Phase 2: dropping foreign key {}", self.fk);
        let disabled = ConstraintGate::new(self.fk.clone()).disable(self.store)?;

        let mut report = match self.rewrite() {
            Ok(report) => report,
            Err(source) => {
                return Err(Error::ConstraintLeftDisabled {
                    constraint: self.fk.name.clone(),
                    source: Box::new(source),
                });
            }
        };

        tracing::info!("Phase 4: restoring foreign key {}", self.fk);
        if let Err(source) = disabled.enable(self.store) {
            return Err(Error::ConstraintLeftDisabled {
                constraint: self.fk.name.clone(),
                source: Box::new(source),
            });
        }

        report.backfilled = backfilled;
        Ok(report)
    }

    fn rewrite(&mut self) -> Result<MigrationReport> {
        tracing::info!("Phase 3: re-keying dependencies");
        let rows = self.store.load_dependencies()?;
        let rekeys = derive_rekeys(&rows);
        let unchanged = rekeys.iter().filter(|r| r.is_noop()).count();
        let duplicates = duplicate_groups(&rekeys);
        if duplicates > 0 {
            tracing::warn!(
                "{} groups of dependencies share identical content and derive the same id; the id rewrite will hit the primary key",
                duplicates
            );
        }

        let dependencies = rewrite_batch(
            Batch::one_row_each(DEPENDENCY_BATCH),
            schema::UPDATE_DEPENDENCY_ID,
            &rows,
            &rekeys,
        );
        tracing::debug!("Submitting {} dependency id updates", dependencies.len());
        self.store.submit(&dependencies)?;

        let links = rewrite_batch(
            Batch::new(LINK_BATCH),
            schema::UPDATE_INCLUDED_DEPENDENCY_ID,
            &rows,
            &rekeys,
        );
        tracing::debug!("Submitting {} link updates", links.len());
        let links_rewritten = self.store.submit(&links)?;

        tracing::info!(
            "Re-keyed {} of {} dependencies, rewrote {} links",
            rekeys.len() - unchanged,
            rekeys.len(),
            links_rewritten
        );

        Ok(MigrationReport {
            backfilled: 0,
            dependencies: rekeys.len(),
            rekeyed: rekeys.len() - unchanged,
            unchanged,
            links_rewritten,
            duplicate_groups: duplicates,
        })
    }

    /// Preview without writing
    pub fn plan(&mut self) -> Result<MigrationPlan> {
        let backfill_candidates = backfill::count_backfill_candidates(self.store)?;
        let constraint_present = self.store.has_foreign_key(&self.fk)?;
        let rows = self.store.load_dependencies()?;
        let rekeys = derive_rekeys(&rows);
        let already_deterministic = rekeys.iter().filter(|r| r.is_noop()).count();

        Ok(MigrationPlan {
            backfill_candidates,
            dependencies: rekeys.len(),
            to_rekey: rekeys.len() - already_deterministic,
            already_deterministic,
            duplicate_groups: duplicate_groups(&rekeys),
            constraint_present,
            rekeys,
        })
    }

    /// Check the post-conditions of a completed migration
    pub fn verify(&mut self) -> Result<Verification> {
        let rows = self.store.load_dependencies()?;
        let mismatched = derive_rekeys(&rows)
            .into_iter()
            .filter(|r| !r.is_noop())
            .map(|r| r.old_id)
            .collect();
        let orphaned_links = self
            .store
            .count(&Statement::new(schema::COUNT_ORPHANED_LINKS))?;
        let constraint_present = self.store.has_foreign_key(&self.fk)?;

        Ok(Verification {
            dependencies: rows.len(),
            mismatched,
            orphaned_links,
            constraint_present,
        })
    }
}
