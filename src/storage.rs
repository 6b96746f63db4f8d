use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::{collections::HashMap, fmt::Debug, path::Path};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    config::{Preferences, PreferencesPatch},
    error::StorageError,
    result::TestResult,
    test_type::TestType,
    user_stats::{Achievement, UserStats},
};

/// Every key is stored under this namespace
pub const KEY_PREFIX: &str = "reflex_";
/// Oldest results are dropped beyond this many
pub const MAX_RESULTS: usize = 1000;

pub const USER_STATS_KEY: &str = "user_stats";
pub const TEST_RESULTS_KEY: &str = "test_results";
pub const PREFERENCES_KEY: &str = "preferences";

const ALL_KEYS: [&str; 3] = [USER_STATS_KEY, TEST_RESULTS_KEY, PREFERENCES_KEY];

/// JSON values by key. Backends implement the fallible `read`/`write`/`delete`;
/// callers use `get`/`set`/`remove`, which log failures instead of returning them.
pub trait KeyValueStore: Debug {
    fn read(&self, key: &str) -> Result<Option<Value>, StorageError>;
    fn write(&mut self, key: &str, value: &Value) -> Result<(), StorageError>;
    fn delete(&mut self, key: &str) -> Result<(), StorageError>;

    fn get(&self, key: &str) -> Option<Value> {
        self.read(key).unwrap_or_else(|e| {
            error!(key, error = %e, "error reading key");
            None
        })
    }

    fn set(&mut self, key: &str, value: &Value) -> bool {
        match self.write(key, value) {
            Ok(()) => true,
            Err(e) => {
                error!(key, error = %e, "error saving key");
                false
            }
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.delete(key) {
            Ok(()) => true,
            Err(e) => {
                error!(key, error = %e, "error removing key");
                false
            }
        }
    }
}

fn namespaced(key: &str) -> String {
    format!("{KEY_PREFIX}{key}")
}

/// SQLite-backed store: one `kv` table holding JSON text
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (creating directories and schema as needed) the database at `path`
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )?;
        Ok(Self { conn })
    }
}

impl KeyValueStore for SqliteStore {
    fn read(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let text: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                [namespaced(key)],
                |row| row.get(0),
            )
            .optional()?;

        match text {
            Some(t) => Ok(Some(serde_json::from_str(&t)?)),
            None => Ok(None),
        }
    }

    fn write(&mut self, key: &str, value: &Value) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![
                namespaced(key),
                serde_json::to_string(value)?,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", [namespaced(key)])?;
        Ok(())
    }
}

/// Process-lifetime store, used when no database can be opened
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.values.get(&namespaced(key)).cloned())
    }

    fn write(&mut self, key: &str, value: &Value) -> Result<(), StorageError> {
        self.values.insert(namespaced(key), value.clone());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StorageError> {
        self.values.remove(&namespaced(key));
        Ok(())
    }
}

/// Which stored results to return, oldest first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryFilter {
    pub test_type: Option<TestType>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// Keep only the most recent N after the other filters
    pub limit: Option<usize>,
}

impl HistoryFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn recent(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn of_type(test_type: TestType) -> Self {
        Self {
            test_type: Some(test_type),
            ..Self::default()
        }
    }

    fn matches(&self, result: &TestResult) -> bool {
        self.test_type.map_or(true, |t| result.test_type() == t)
            && self.since.map_or(true, |s| result.completed_at() >= s)
            && self.until.map_or(true, |u| result.completed_at() <= u)
    }
}

/// A result as it was stored, with the achievements it unlocked
#[derive(Debug, Clone, PartialEq)]
pub struct SavedResult {
    pub result: TestResult,
    pub unlocked: Vec<Achievement>,
}

/// Results, statistics and preferences on top of a [`KeyValueStore`].
///
/// Storage failures never propagate out of here: they are logged and the
/// caller sees `None`/`false` or defaults.
#[derive(Debug)]
pub struct ResultStore {
    backend: Box<dyn KeyValueStore>,
    degraded: bool,
}

impl ResultStore {
    /// Open the SQLite store at `path`, falling back to memory for this run if
    /// it cannot be opened
    pub fn open(path: &Path) -> Self {
        match SqliteStore::open(path) {
            Ok(store) => Self::with_backend(Box::new(store)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "database unavailable, results will not persist");
                let mut store = Self::with_backend(Box::new(MemoryStore::new()));
                store.degraded = true;
                store
            }
        }
    }

    pub fn in_memory() -> Self {
        Self::with_backend(Box::new(MemoryStore::new()))
    }

    pub fn with_backend(backend: Box<dyn KeyValueStore>) -> Self {
        let mut store = Self {
            backend,
            degraded: false,
        };
        store.initialize();
        store
    }

    /// True when running on the in-memory fallback
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    fn initialize(&mut self) {
        if self.backend.get(USER_STATS_KEY).is_none() {
            self.put(USER_STATS_KEY, &UserStats::new(Utc::now()));
        }
        if self.backend.get(PREFERENCES_KEY).is_none() {
            self.put(PREFERENCES_KEY, &Preferences::default());
        }
        if self.backend.get(TEST_RESULTS_KEY).is_none() {
            self.put(TEST_RESULTS_KEY, &Vec::<TestResult>::new());
        }
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.backend.get(key)?;
        serde_json::from_value(value)
            .map_err(|e| warn!(key, error = %e, "stored record is malformed, ignoring it"))
            .ok()
    }

    fn put<T: Serialize>(&mut self, key: &str, value: &T) -> bool {
        match serde_json::to_value(value) {
            Ok(v) => self.backend.set(key, &v),
            Err(e) => {
                error!(key, error = %e, "could not serialize record");
                false
            }
        }
    }

    /// Raw stored history. A missing record is an empty history; an unreadable
    /// one or anything other than a list is an error.
    fn stored_entries(&self) -> Result<Vec<Value>, StorageError> {
        match self.backend.read(TEST_RESULTS_KEY)? {
            None => Ok(Vec::new()),
            Some(Value::Array(entries)) => Ok(entries),
            Some(_) => Err(StorageError::Malformed(TEST_RESULTS_KEY.to_string())),
        }
    }

    /// Stored user statistics, fresh ones if none exist yet
    fn stored_user_stats(&self) -> Result<UserStats, StorageError> {
        match self.backend.read(USER_STATS_KEY)? {
            None => Ok(UserStats::new(Utc::now())),
            Some(value) => Ok(serde_json::from_value(value)?),
        }
    }

    /// Entries that do not parse as a result are skipped, not dropped
    fn parse_entries(entries: &[Value]) -> Vec<TestResult> {
        entries
            .iter()
            .filter_map(|entry| {
                serde_json::from_value(entry.clone())
                    .map_err(|e| warn!(error = %e, "skipping malformed stored result"))
                    .ok()
            })
            .collect()
    }

    fn results(&self) -> Vec<TestResult> {
        match self.stored_entries() {
            Ok(entries) => Self::parse_entries(&entries),
            Err(e) => {
                error!(error = %e, "error loading test results");
                Vec::new()
            }
        }
    }

    fn prepare_save(
        &self,
        stored: &TestResult,
    ) -> Result<(Vec<Value>, UserStats, Value), StorageError> {
        Ok((
            self.stored_entries()?,
            self.stored_user_stats()?,
            serde_json::to_value(stored)?,
        ))
    }

    /// Stamp an id on `result`, append it to the history (keeping the newest
    /// [`MAX_RESULTS`]) and fold it into the user statistics.
    ///
    /// Returns `None` and writes nothing if the stored history or statistics
    /// cannot be read, so a bad record never overwrites the good ones.
    pub fn save_result(&mut self, result: TestResult) -> Option<SavedResult> {
        let stored = result.with_id(Uuid::new_v4().to_string());

        let (mut entries, mut stats, entry) = match self.prepare_save(&stored) {
            Ok(loaded) => loaded,
            Err(e) => {
                error!(test_type = %stored.test_type(), error = %e, "error saving test result");
                return None;
            }
        };

        entries.push(entry);
        if entries.len() > MAX_RESULTS {
            let excess = entries.len() - MAX_RESULTS;
            entries.drain(..excess);
        }

        if !self.backend.set(TEST_RESULTS_KEY, &Value::Array(entries.clone())) {
            error!(test_type = %stored.test_type(), "error saving test result");
            return None;
        }
        info!(
            id = stored.id().unwrap_or_default(),
            test_type = %stored.test_type(),
            reaction_ms = stored.reaction_time_ms(),
            "test result saved"
        );

        let history = Self::parse_entries(&entries);
        let unlocked = stats.record(&stored, &history, Utc::now());
        for achievement in &unlocked {
            info!(id = %achievement.id, name = %achievement.name, "achievement unlocked");
        }
        if !self.put(USER_STATS_KEY, &stats) {
            error!("error updating user stats");
        }

        Some(SavedResult {
            result: stored,
            unlocked,
        })
    }

    pub fn load_history(&self, filter: &HistoryFilter) -> Vec<TestResult> {
        let mut results: Vec<TestResult> = self
            .results()
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();

        if let Some(limit) = filter.limit {
            let start = results.len().saturating_sub(limit);
            results.drain(..start);
        }
        results
    }

    pub fn user_stats(&self) -> UserStats {
        self.load(USER_STATS_KEY)
            .unwrap_or_else(|| UserStats::new(Utc::now()))
    }

    pub fn preferences(&self) -> Preferences {
        self.load(PREFERENCES_KEY).unwrap_or_default()
    }

    pub fn update_preferences(&mut self, patch: &PreferencesPatch) -> Preferences {
        let updated = self.preferences().merged(patch);
        self.put(PREFERENCES_KEY, &updated);
        updated
    }

    /// Remove every record and start over with defaults
    pub fn clear_all(&mut self) -> bool {
        let mut ok = true;
        for key in ALL_KEYS {
            ok &= self.backend.remove(key);
        }
        self.initialize();
        info!("all user data cleared");
        ok
    }
}
