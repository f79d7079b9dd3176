//! Shared harness for relay integration tests
//!
//! Wires a [`Relay`] to a temp-file SQLite store and a [`RecordingTransport`].

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anonbot::relay::{
    ButtonPress, ConversationState, Handle, IncomingMessage, PressedMessage, Relay, StableId, StoreResult, User,
    UserStore, UserUpdate,
};
use anonbot::storage::{create_pool, SqliteUserStore};
use anonbot::testing::RecordingTransport;
use tempfile::TempDir;

pub const ENTRY_URL: &str = "https://t.me/relay_test_bot";

pub const ALICE: i64 = 111;
pub const BOB: i64 = 222;
pub const CAROL: i64 = 333;

pub struct Harness<S = SqliteUserStore> {
    _dir: TempDir,
    sqlite: SqliteUserStore,
    pub relay: Relay<RecordingTransport, S>,
}

fn temp_store() -> (TempDir, SqliteUserStore) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("relay.sqlite");
    let pool = create_pool(path.to_str().unwrap()).unwrap();
    (dir, SqliteUserStore::new(Arc::new(pool)))
}

impl Harness {
    pub fn new() -> Self {
        let (dir, sqlite) = temp_store();
        Self {
            _dir: dir,
            relay: Relay::new(RecordingTransport::new(), sqlite.clone(), ENTRY_URL),
            sqlite,
        }
    }
}

impl Harness<RacingStore> {
    /// Harness whose store lets a competing write land right before the relay's next write.
    pub fn racing() -> Self {
        let (dir, sqlite) = temp_store();
        Self {
            _dir: dir,
            relay: Relay::new(RecordingTransport::new(), RacingStore::new(sqlite.clone()), ENTRY_URL),
            sqlite,
        }
    }

    pub fn before_next_write(&self, write: impl FnOnce(&SqliteUserStore) + Send + 'static) {
        self.relay.store().before_next_write(write);
    }
}

impl<S: UserStore> Harness<S> {
    pub fn transport(&self) -> &RecordingTransport {
        self.relay.transport()
    }

    /// The database behind the relay, bypassing any wrapper.
    pub fn store(&self) -> &SqliteUserStore {
        &self.sqlite
    }

    /// Current record for `platform_id`, which must exist.
    pub fn user(&self, platform_id: i64) -> User {
        self.store().find_by_platform_id(platform_id).unwrap().unwrap()
    }

    /// Creates the user and gives it `handle`.
    pub fn user_with_handle(&self, platform_id: i64, handle: &str) -> User {
        let user = self.store().create(platform_id).unwrap();
        let update = UserUpdate::reset().with_handle(Handle::parse(handle).unwrap());
        self.store().update(&user, &update).unwrap()
    }

    pub fn user_without_handle(&self, platform_id: i64) -> User {
        self.store().create(platform_id).unwrap()
    }

    /// Deletes the record behind `platform_id`, as if the account were gone.
    pub fn forget(&self, platform_id: i64) {
        let conn = self.store().pool().get().unwrap();
        conn.execute("DELETE FROM users WHERE platform_id = ?1", [platform_id])
            .unwrap();
    }
}

type PendingWrite = Box<dyn FnOnce(&SqliteUserStore) + Send>;

/// [`UserStore`] that runs a queued write against the same database just
/// before the next `update`, so the relay's snapshot is stale when it writes.
pub struct RacingStore {
    inner: SqliteUserStore,
    pending: Mutex<Option<PendingWrite>>,
}

impl RacingStore {
    pub fn new(inner: SqliteUserStore) -> Self {
        Self {
            inner,
            pending: Mutex::new(None),
        }
    }

    pub fn before_next_write(&self, write: impl FnOnce(&SqliteUserStore) + Send + 'static) {
        *self.pending.lock().unwrap() = Some(Box::new(write));
    }
}

impl UserStore for RacingStore {
    fn find_by_platform_id(&self, platform_id: i64) -> StoreResult<Option<User>> {
        self.inner.find_by_platform_id(platform_id)
    }

    fn find_by_stable_id(&self, stable_id: &StableId) -> StoreResult<Option<User>> {
        self.inner.find_by_stable_id(stable_id)
    }

    fn find_by_handle(&self, handle: &str) -> StoreResult<Option<User>> {
        self.inner.find_by_handle(handle)
    }

    fn create(&self, platform_id: i64) -> StoreResult<User> {
        self.inner.create(platform_id)
    }

    fn update(&self, user: &User, update: &UserUpdate) -> StoreResult<User> {
        let pending = self.pending.lock().unwrap().take();
        if let Some(write) = pending {
            write(&self.inner);
        }
        self.inner.update(user, update)
    }
}

/// Moves `platform_id` to `state` through the raw store.
pub fn force_state(store: &SqliteUserStore, platform_id: i64, state: ConversationState) {
    let user = store.find_by_platform_id(platform_id).unwrap().unwrap();
    store.update(&user, &UserUpdate::to_state(state)).unwrap();
}

pub fn text(from: i64, message_id: i32, text: &str) -> IncomingMessage {
    IncomingMessage {
        from,
        chat: from,
        message_id,
        text: Some(text.to_string()),
    }
}

/// A non-text message such as a sticker or photo.
pub fn media(from: i64, message_id: i32) -> IncomingMessage {
    IncomingMessage {
        from,
        chat: from,
        message_id,
        text: None,
    }
}

pub fn press(from: i64, data: &str, on: Option<(i32, Option<i32>)>) -> ButtonPress {
    ButtonPress {
        callback_id: format!("cb-{}-{}", from, data.len()),
        from,
        message: on.map(|(id, reply_to)| PressedMessage {
            chat: from,
            id,
            reply_to,
        }),
        data: data.to_string(),
    }
}
