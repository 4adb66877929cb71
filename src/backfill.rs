//! Backfill of `dependent_package_version_id`
//!
//! Older rows only recorded the dependent package by name plus a
//! `version_range`. When exactly one `package_versions` row has that name and
//! version string, the row is pointed at it. Anything else stays NULL and will
//! hash with the nil version.

use crate::storage::{Statement, Store, schema};
use crate::Result;

/// Fill every resolvable row in one set-based update, returning how many were filled
pub fn backfill_dependent_versions<S: Store + ?Sized>(store: &mut S) -> Result<usize> {
    let filled = store.execute(&Statement::new(schema::BACKFILL_DEPENDENT_VERSIONS))?;
    tracing::info!("Backfilled dependent package version on {} dependencies", filled);
    Ok(filled)
}

/// Rows the backfill would fill, without touching them
pub fn count_backfill_candidates<S: Store + ?Sized>(store: &mut S) -> Result<u64> {
    store.count(&Statement::new(schema::COUNT_BACKFILL_CANDIDATES))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailAt, Op, RecordingStore};

    #[test]
    fn test_backfill_is_single_statement() {
        let mut store = RecordingStore::new(Vec::new(), Vec::new());
        store.executed_rows = 3;

        assert_eq!(backfill_dependent_versions(&mut store).unwrap(), 3);
        assert_eq!(
            store.ops,
            vec![Op::Execute(schema::BACKFILL_DEPENDENT_VERSIONS.to_string())]
        );
    }

    #[test]
    fn test_backfill_propagates_store_error() {
        let mut store = RecordingStore::new(Vec::new(), Vec::new()).failing_at(FailAt::Execute);
        assert!(backfill_dependent_versions(&mut store).is_err());
    }

    #[test]
    fn test_candidates_are_counted_not_updated() {
        let mut store = RecordingStore::new(Vec::new(), Vec::new());
        store.count_result = 2;

        assert_eq!(count_backfill_candidates(&mut store).unwrap(), 2);
        assert!(matches!(store.ops.as_slice(), [Op::Count(_)]));
    }
}
