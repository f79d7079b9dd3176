use anyhow::{Context, Result};
use rusqlite::Connection;
use std::sync::{Mutex, OnceLock};

use crate::core::config;

mod embedded {
    use refinery::embed_migrations;

    embed_migrations!("./migrations");
}

static MIGRATION_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Applies pending schema migrations.
///
/// Serialized per-process; refinery wraps each migration in its own
/// transaction, and the busy timeout covers a second instance starting up.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let mutex = MIGRATION_LOCK.get_or_init(|| Mutex::new(()));
    // Migrations are idempotent, so a poisoned lock is safe to recover
    let _guard = match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Migration lock was poisoned, recovering...");
            poisoned.into_inner()
        }
    };

    conn.busy_timeout(config::db::busy_timeout())
        .context("set SQLite busy timeout")?;

    let report = embedded::migrations::runner().run(conn).context("apply migrations")?;
    for migration in report.applied_migrations() {
        log::info!("Applied migration {}", migration);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_create_users_table_and_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        run_migrations(&mut conn).unwrap();

        let exists: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='users'",
                [],
                |row| Ok(row.get::<_, i32>(0)? > 0),
            )
            .unwrap();
        assert!(exists);
    }

    #[test]
    fn test_schema_rejects_composing_fields_outside_composing() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();

        let result = conn.execute(
            "INSERT INTO users (stable_id, platform_id, state, contact_stable_id) VALUES ('a', 1, 'idle', 'b')",
            [],
        );
        assert!(result.is_err());

        let result = conn.execute(
            "INSERT INTO users (stable_id, platform_id, state) VALUES ('a', 1, 'composing')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_schema_rejects_uppercase_handle() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();

        let result = conn.execute(
            "INSERT INTO users (stable_id, platform_id, handle) VALUES ('a', 1, 'Alice')",
            [],
        );
        assert!(result.is_err());
    }
}
