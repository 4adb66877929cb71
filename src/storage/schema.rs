//! Table layout and SQL used by the migration

pub const DEPENDENCIES_TABLE: &str = "dependencies";
pub const PACKAGE_VERSIONS_TABLE: &str = "package_versions";
pub const INCLUDED_DEPENDENCIES_TABLE: &str = "bill_of_materials_included_dependencies";

/// Name of the foreign key from the link table to `dependencies(id)`
pub const INCLUDED_DEPENDENCY_FK: &str = "bill_of_materials_included_dependencies_dependency_id";

/// Every column the identity hash reads, `id` first
pub const SELECT_DEPENDENCIES: &str = r#"
SELECT id, package_id, dependent_package_version_id, dependency_type, justification, origin, collector, document_ref
FROM dependencies
"#;

/// Resolve `version_range` to a concrete version for rows that only know the package name.
/// A row is filled only when exactly one version matches.
pub const BACKFILL_DEPENDENT_VERSIONS: &str = r#"
UPDATE dependencies
SET dependent_package_version_id = (
    SELECT pv.id FROM package_versions pv
    WHERE pv.name_id = dependencies.dependent_package_name_id
      AND pv.version = dependencies.version_range
)
WHERE dependent_package_name_id IS NOT NULL
  AND dependent_package_version_id IS NULL
  AND (
    SELECT COUNT(*) FROM package_versions pv
    WHERE pv.name_id = dependencies.dependent_package_name_id
      AND pv.version = dependencies.version_range
  ) = 1
"#;

/// Rows [`BACKFILL_DEPENDENT_VERSIONS`] would fill
pub const COUNT_BACKFILL_CANDIDATES: &str = r#"
SELECT COUNT(*) FROM dependencies
WHERE dependent_package_name_id IS NOT NULL
  AND dependent_package_version_id IS NULL
  AND (
    SELECT COUNT(*) FROM package_versions pv
    WHERE pv.name_id = dependencies.dependent_package_name_id
      AND pv.version = dependencies.version_range
  ) = 1
"#;

pub const UPDATE_DEPENDENCY_ID: &str = "UPDATE dependencies SET id = ?1 WHERE id = ?2";

pub const UPDATE_INCLUDED_DEPENDENCY_ID: &str =
    "UPDATE bill_of_materials_included_dependencies SET dependency_id = ?1 WHERE dependency_id = ?2";

/// Link rows pointing at no dependency
pub const COUNT_ORPHANED_LINKS: &str = r#"
SELECT COUNT(*) FROM bill_of_materials_included_dependencies l
WHERE NOT EXISTS (SELECT 1 FROM dependencies d WHERE d.id = l.dependency_id)
"#;

pub const CREATE_PACKAGE_NAMES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS package_names (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL
)
"#;

pub const CREATE_PACKAGE_VERSIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS package_versions (
    id TEXT PRIMARY KEY,
    name_id TEXT NOT NULL,
    version TEXT NOT NULL DEFAULT '',
    CONSTRAINT package_versions_package_names_versions FOREIGN KEY (name_id) REFERENCES package_names (id) ON DELETE NO ACTION
)
"#;

pub const CREATE_DEPENDENCIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS dependencies (
    id TEXT PRIMARY KEY,
    package_id TEXT NOT NULL,
    dependent_package_name_id TEXT,
    dependent_package_version_id TEXT,
    version_range TEXT,
    dependency_type TEXT NOT NULL,
    justification TEXT NOT NULL,
    origin TEXT NOT NULL,
    collector TEXT NOT NULL,
    document_ref TEXT NOT NULL,
    CONSTRAINT dependencies_package_versions_package FOREIGN KEY (package_id) REFERENCES package_versions (id) ON DELETE NO ACTION,
    CONSTRAINT dependencies_package_names_dependent_package_name FOREIGN KEY (dependent_package_name_id) REFERENCES package_names (id) ON DELETE SET NULL,
    CONSTRAINT dependencies_package_versions_dependent_package_version FOREIGN KEY (dependent_package_version_id) REFERENCES package_versions (id) ON DELETE SET NULL
)
"#;

pub const CREATE_BILL_OF_MATERIALS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS bill_of_materials (
    id TEXT PRIMARY KEY,
    uri TEXT NOT NULL DEFAULT ''
)
"#;

pub const CREATE_INCLUDED_DEPENDENCIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS bill_of_materials_included_dependencies (
    bill_of_materials_id TEXT NOT NULL,
    dependency_id TEXT NOT NULL,
    PRIMARY KEY (bill_of_materials_id, dependency_id),
    CONSTRAINT bill_of_materials_included_dependencies_bill_of_materials_id FOREIGN KEY (bill_of_materials_id) REFERENCES bill_of_materials (id) ON DELETE CASCADE,
    CONSTRAINT bill_of_materials_included_dependencies_dependency_id FOREIGN KEY (dependency_id) REFERENCES dependencies (id) ON DELETE CASCADE
)
"#;

pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_package_versions_name_version ON package_versions(name_id, version)",
    "CREATE INDEX IF NOT EXISTS idx_included_dependencies_dependency ON bill_of_materials_included_dependencies(dependency_id)",
];

/// All schema creation statements, parents before children
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_PACKAGE_NAMES_TABLE,
        CREATE_PACKAGE_VERSIONS_TABLE,
        CREATE_DEPENDENCIES_TABLE,
        CREATE_BILL_OF_MATERIALS_TABLE,
        CREATE_INCLUDED_DEPENDENCIES_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
