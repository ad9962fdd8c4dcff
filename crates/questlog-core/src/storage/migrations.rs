//! Database schema migrations for questlog.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    // Ensure schema_version table exists
    create_schema_version_table(conn)?;

    // Get current version
    let current_version = get_schema_version(conn);

    // Apply migrations sequentially
    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Create the schema_version table if it doesn't exist.
fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        // If table doesn't exist or query fails, return 0
        if matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            0
        } else {
            eprintln!("Warning: failed to read schema_version: {}", e);
            0
        }
    })
}

/// Set the schema version in the database.
fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    // Delete any existing version
    conn.execute("DELETE FROM schema_version", [])?;

    // Insert new version
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;

    Ok(())
}

/// Migration v1: Initial schema (baseline).
///
/// This migration represents the original schema before any migrations were
/// tracked. It's a no-op since the tables are created by Store::migrate()
/// directly.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    // Mark as v1 (tables already exist)
    set_schema_version(conn, 1)?;
    Ok(())
}

/// Migration v2: Offline-sync deduplication for completions.
///
/// Adds the `client_ref` column to the completions table. Clients that
/// record work offline attach a stable reference so a replayed upload
/// cannot double-count; uniqueness is enforced per user, and rows
/// without a reference are exempt.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "ALTER TABLE completions ADD COLUMN client_ref TEXT;
         CREATE UNIQUE INDEX IF NOT EXISTS idx_completions_client_ref
             ON completions(user_id, client_ref)
             WHERE client_ref IS NOT NULL;",
    )?;

    // Mark as v2
    tx.execute("DELETE FROM schema_version", [])?;
    tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [2])?;

    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_v1_completions(conn: &Connection) {
        conn.execute_batch(
            "CREATE TABLE completions (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL,
                completion_date TEXT NOT NULL,
                done_count      INTEGER NOT NULL,
                created_at      TEXT NOT NULL
            );",
        )
        .unwrap();
    }

    /// Test migration from scratch (v0 -> v2)
    #[test]
    fn test_migrate_from_scratch() {
        let conn = Connection::open_in_memory().unwrap();
        create_v1_completions(&conn);

        conn.execute(
            "INSERT INTO completions (id, user_id, completion_date, done_count, created_at)
             VALUES ('c1', 'u1', '2025-01-01', 2, '2025-01-01T12:00:00Z')",
            [],
        )
        .unwrap();

        // Run migrations
        migrate(&conn).unwrap();

        // Check version
        assert_eq!(get_schema_version(&conn), 2);

        // Old rows get a NULL client_ref
        let client_ref: Option<String> = conn
            .query_row("SELECT client_ref FROM completions WHERE id = 'c1'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert!(client_ref.is_none());

        // The unique index rejects a reused reference
        conn.execute(
            "INSERT INTO completions (id, user_id, completion_date, done_count, client_ref, created_at)
             VALUES ('c2', 'u1', '2025-01-02', 1, 'ref-1', '2025-01-02T12:00:00Z')",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO completions (id, user_id, completion_date, done_count, client_ref, created_at)
             VALUES ('c3', 'u1', '2025-01-03', 1, 'ref-1', '2025-01-03T12:00:00Z')",
            [],
        );
        assert!(dup.is_err());
    }

    /// Test that migrations are idempotent
    #[test]
    fn test_migrate_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_v1_completions(&conn);

        // Run migrations twice
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();

        // Should still be at version 2
        assert_eq!(get_schema_version(&conn), 2);
    }

    /// Test incremental migration (v1 -> v2)
    #[test]
    fn test_incremental_migration() {
        let conn = Connection::open_in_memory().unwrap();

        // Create schema_version table at v1
        conn.execute("CREATE TABLE schema_version (version INTEGER PRIMARY KEY)", [])
            .unwrap();
        conn.execute("INSERT INTO schema_version (version) VALUES (1)", [])
            .unwrap();

        create_v1_completions(&conn);

        // Run migrations
        migrate(&conn).unwrap();

        // Should be at version 2 with the new column queryable
        assert_eq!(get_schema_version(&conn), 2);
        let stmt = conn
            .prepare("SELECT client_ref FROM completions")
            .unwrap();
        drop(stmt);
    }

    /// NULL client_refs never collide with each other
    #[test]
    fn test_null_refs_do_not_collide() {
        let conn = Connection::open_in_memory().unwrap();
        create_v1_completions(&conn);
        migrate(&conn).unwrap();

        for id in ["c1", "c2", "c3"] {
            conn.execute(
                "INSERT INTO completions (id, user_id, completion_date, done_count, created_at)
                 VALUES (?1, 'u1', '2025-01-01', 1, '2025-01-01T12:00:00Z')",
                [id],
            )
            .unwrap();
        }
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM completions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 3);
    }
}
