use std::sync::Arc;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};

use crate::core::config;
use crate::relay::handle::Handle;
use crate::relay::ports::{StoreError, StoreResult, UserStore};
use crate::relay::state::{ConversationState, UserUpdate};
use crate::relay::user::{PlatformId, StableId, User};
use crate::storage::migrations::run_migrations;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

const USER_COLUMNS: &str = "stable_id, platform_id, handle, state, contact_stable_id, reply_to_message_id, pending_delivery_message_id, version";

/// Create a new database connection pool
///
/// Initializes a pool with up to [`config::db::POOL_MAX_SIZE`] connections and
/// applies pending migrations on the first one.
///
/// # Example
///
/// ```no_run
/// use anonbot::storage::create_pool;
///
/// let pool = create_pool("database.sqlite")?;
/// # Ok::<(), anonbot::relay::StoreError>(())
/// ```
pub fn create_pool(database_path: &str) -> StoreResult<DbPool> {
    let manager =
        SqliteConnectionManager::file(database_path).with_init(|conn| conn.busy_timeout(config::db::busy_timeout()));
    let pool = Pool::builder().max_size(config::db::POOL_MAX_SIZE).build(manager)?;

    let mut conn = pool.get()?;
    run_migrations(&mut conn).map_err(StoreError::Migration)?;

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection goes back to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let kind: String = row.get(3)?;
    let state = ConversationState::from_columns(&kind, row.get(4)?, row.get(5)?, row.get(6)?)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e)))?;

    Ok(User {
        stable_id: StableId::from_stored(row.get(0)?),
        platform_id: row.get(1)?,
        handle: row.get::<_, Option<String>>(2)?.map(Handle::from_stored),
        state,
        version: row.get(7)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// SQLite-backed [`UserStore`].
///
/// Every update is a single `UPDATE .. WHERE version = ?`, so two events for
/// the same user cannot both apply a transition computed from the same snapshot.
#[derive(Clone)]
pub struct SqliteUserStore {
    pool: Arc<DbPool>,
}

impl SqliteUserStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<DbPool> {
        &self.pool
    }

    fn conn(&self) -> StoreResult<DbConnection> {
        Ok(get_connection(&self.pool)?)
    }

    fn find_one(conn: &DbConnection, filter: &str, value: &dyn rusqlite::ToSql) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, filter);
        Ok(conn.query_row(&sql, [value], row_to_user).optional()?)
    }

    /// Number of stored users.
    pub fn count(&self) -> StoreResult<i64> {
        let conn = self.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
    }
}

impl UserStore for SqliteUserStore {
    fn find_by_platform_id(&self, platform_id: PlatformId) -> StoreResult<Option<User>> {
        let conn = self.conn()?;
        Self::find_one(&conn, "platform_id = ?1", &platform_id)
    }

    fn find_by_stable_id(&self, stable_id: &StableId) -> StoreResult<Option<User>> {
        let conn = self.conn()?;
        Self::find_one(&conn, "stable_id = ?1", &stable_id.as_str())
    }

    fn find_by_handle(&self, handle: &str) -> StoreResult<Option<User>> {
        let conn = self.conn()?;
        Self::find_one(&conn, "handle = lower(?1)", &handle)
    }

    fn create(&self, platform_id: PlatformId) -> StoreResult<User> {
        let conn = self.conn()?;
        let stable_id = StableId::generate();
        let inserted = conn.execute(
            "INSERT INTO users (stable_id, platform_id) VALUES (?1, ?2) ON CONFLICT(platform_id) DO NOTHING",
            params![stable_id.as_str(), platform_id],
        )?;
        if inserted > 0 {
            log::info!("Created user {} for platform id {}", stable_id, platform_id);
        }

        Self::find_one(&conn, "platform_id = ?1", &platform_id)?.ok_or(StoreError::UserNotFound {
            stable_id: stable_id.to_string(),
        })
    }

    fn update(&self, user: &User, update: &UserUpdate) -> StoreResult<User> {
        if update.is_empty() {
            return Ok(user.clone());
        }

        let next = update.apply_to(user);
        let cols = next.state.to_columns();
        let handle = next.handle.as_ref().map(Handle::as_str);

        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE users
                 SET handle = ?1, state = ?2, contact_stable_id = ?3, reply_to_message_id = ?4,
                     pending_delivery_message_id = ?5, version = version + 1
                 WHERE stable_id = ?6 AND version = ?7",
                params![
                    handle,
                    cols.kind,
                    cols.contact,
                    cols.reply_to,
                    cols.pending_delivery,
                    user.stable_id.as_str(),
                    user.version
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::HandleTaken {
                        handle: handle.unwrap_or_default().to_string(),
                    }
                } else {
                    StoreError::Database(e)
                }
            })?;

        if changed == 0 {
            return match Self::find_one(&conn, "stable_id = ?1", &user.stable_id.as_str())? {
                Some(_) => Err(StoreError::Conflict {
                    stable_id: user.stable_id.to_string(),
                }),
                None => Err(StoreError::UserNotFound {
                    stable_id: user.stable_id.to_string(),
                }),
            };
        }

        log::debug!(
            "User {} -> {} (version {})",
            next.stable_id,
            next.state.kind(),
            next.version
        );
        Ok(next)
    }
}
