//! Database Migrations
//!
//! Forward-only SQL migrations, one file per version under `migrations/`,
//! ordered by numeric prefix. A migration may open with a requirement
//! header naming runtime capabilities:
//!
//! ```sql
//! -- REQUIRES: sqlite-vec
//! ```
//!
//! A migration whose requirements are unmet is recorded as skipped and
//! re-evaluated on every open, so installing the capability later heals
//! the schema without manual intervention.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StoreError};

/// Migration definitions, in apply order
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: nodes, edges, side tables, embeddings, FTS",
        sql: include_str!("migrations/0001_initial.sql"),
    },
    Migration {
        version: 2,
        description: "Vector KNN index over node embeddings",
        sql: include_str!("migrations/0002_vector_index.sql"),
    },
    Migration {
        version: 3,
        description: "Consolidation fields: relevance, access, archive, importance",
        sql: include_str!("migrations/0003_consolidation.sql"),
    },
    Migration {
        version: 4,
        description: "Per-segment message counters",
        sql: include_str!("migrations/0004_message_counts.sql"),
    },
    Migration {
        version: 5,
        description: "Aggregated pattern tables",
        sql: include_str!("migrations/0005_aggregates.sql"),
    },
    Migration {
        version: 6,
        description: "Aggregated insights and prompt effectiveness",
        sql: include_str!("migrations/0006_insights.sql"),
    },
];

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version number (numeric file prefix)
    pub version: u32,
    /// Description recorded in `schema_version`
    pub description: &'static str,
    /// SQL to apply, possibly opening with a `-- REQUIRES:` header
    pub sql: &'static str,
}

impl Migration {
    /// Capabilities named in the leading `-- REQUIRES:` header, if any
    pub fn requirements(&self) -> Vec<&'static str> {
        let Some(first) = self.sql.lines().next() else {
            return vec![];
        };
        let Some(rest) = first.trim().strip_prefix("-- REQUIRES:") else {
            return vec![];
        };
        rest.split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
    }
}

/// Runtime capabilities migrations may require
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    /// The sqlite-vec extension resolves (`vec_version()` works)
    pub sqlite_vec: bool,
}

impl Capabilities {
    fn satisfies(&self, requirement: &str) -> bool {
        match requirement {
            "sqlite-vec" => self.sqlite_vec,
            _ => false,
        }
    }

    /// Requirements of `migration` that this capability set does not meet
    fn missing(&self, migration: &Migration) -> Vec<&'static str> {
        migration
            .requirements()
            .into_iter()
            .filter(|r| !self.satisfies(r))
            .collect()
    }
}

const SCHEMA_VERSION_TABLE: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL UNIQUE,
    description TEXT NOT NULL,
    applied_at TEXT NOT NULL
);";

/// Get the highest applied (or skipped) schema version
pub fn current_version(conn: &Connection) -> Result<u32> {
    let version = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);
    Ok(version)
}

fn skipped_marker(reason: &str) -> String {
    format!(" (skipped: {reason})")
}

/// Apply pending migrations.
///
/// Per migration, in declared order:
/// 1. already applied -> skip
/// 2. previously skipped -> re-evaluate requirements; re-apply when they
///    are now met, otherwise leave the placeholder row alone
/// 3. requirements unmet on first encounter -> record a skipped row and
///    continue, unless `strict` names the missing capability mandatory
/// 4. otherwise apply, with the `schema_version` insert in the same
///    transaction
///
/// Returns the number of migrations applied.
pub fn apply_migrations(
    conn: &mut Connection,
    caps: Capabilities,
    strict: bool,
) -> Result<u32> {
    conn.execute_batch(SCHEMA_VERSION_TABLE)?;

    let mut applied = 0;
    for migration in MIGRATIONS {
        let recorded: Option<String> = conn
            .query_row(
                "SELECT description FROM schema_version WHERE version = ?1",
                params![migration.version],
                |row| row.get(0),
            )
            .optional()?;

        let missing = caps.missing(migration);

        match recorded {
            Some(desc) if !desc.contains(" (skipped:") => continue,
            Some(_) if !missing.is_empty() => continue,
            Some(_) => {
                // Requirements are satisfied now; drop the placeholder and apply.
                tracing::info!(
                    "Re-applying previously skipped migration v{}: {}",
                    migration.version,
                    migration.description
                );
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM schema_version WHERE version = ?1",
                    params![migration.version],
                )?;
                tx.execute_batch(migration.sql)?;
                record_applied(&tx, migration)?;
                tx.commit()?;
                applied += 1;
            }
            None if !missing.is_empty() => {
                let reason = format!("requires {}", missing.join(", "));
                if strict {
                    return Err(StoreError::MigrationBlocked {
                        version: migration.version,
                        missing: missing.join(", "),
                    });
                }
                tracing::warn!(
                    "Skipping migration v{}: {}",
                    migration.version,
                    reason
                );
                conn.execute(
                    "INSERT INTO schema_version (version, description, applied_at)
                     VALUES (?1, ?2, datetime('now'))",
                    params![
                        migration.version,
                        format!("{}{}", migration.description, skipped_marker(&reason))
                    ],
                )?;
            }
            None => {
                tracing::info!(
                    "Applying migration v{}: {}",
                    migration.version,
                    migration.description
                );
                let tx = conn.transaction()?;
                tx.execute_batch(migration.sql)?;
                record_applied(&tx, migration)?;
                tx.commit()?;
                applied += 1;
            }
        }
    }

    Ok(applied)
}

fn record_applied(tx: &rusqlite::Transaction<'_>, migration: &Migration) -> Result<()> {
    tx.execute(
        "INSERT INTO schema_version (version, description, applied_at)
         VALUES (?1, ?2, datetime('now'))",
        params![migration.version, migration.description],
    )?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
