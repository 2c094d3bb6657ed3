// src/store.rs
//! Whole-document persistence. Every mutating request loads the state,
//! applies one operation and writes the state back, one request at a time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::auth::{user_key, User};
use crate::error::{ApiError, ApiResult};
use crate::inventory::Inventory;
use crate::models::{Job, Location, Notification};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    #[serde(default)]
    pub users: BTreeMap<String, User>,
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub notifications: Vec<Notification>,
    #[serde(default)]
    pub inventory: Inventory,
    /// Last known position per user key.
    #[serde(default)]
    pub tracking: BTreeMap<String, Location>,
}

impl State {
    /// Fresh state: the fixed material catalog, no users or jobs.
    pub fn seeded() -> Self {
        Self {
            inventory: Inventory::seeded(),
            ..Self::default()
        }
    }

    /// Brings a document written by an older version up to date.
    pub fn normalize(&mut self) {
        self.inventory.migrate_legacy();

        if self.users.keys().any(|k| *k != user_key(k)) {
            let users = std::mem::take(&mut self.users);
            self.users = users.into_values().map(|u| (user_key(&u.username), u)).collect();
        }
    }

    pub fn next_job_id(&self) -> String {
        let max = self.jobs.iter().filter_map(|j| j.id.parse::<u64>().ok()).max().unwrap_or(0);
        (max + 1).to_string()
    }

    pub fn job(&self, id: &str) -> ApiResult<&Job> {
        self.jobs.iter().find(|j| j.id == id).ok_or_else(|| ApiError::job_not_found(id))
    }

    pub fn job_mut(&mut self, id: &str) -> ApiResult<&mut Job> {
        self.jobs.iter_mut().find(|j| j.id == id).ok_or_else(|| ApiError::job_not_found(id))
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn load(&self) -> ApiResult<State>;
    async fn save(&self, state: &State) -> ApiResult<()>;
}

// ==================== JSON FILE ====================

pub struct JsonFileStore {
    path: PathBuf,
    seed: State,
    pretty: bool,
}

impl JsonFileStore {
    /// Opens the data file, writing `seed` to it first if it does not exist.
    pub async fn open(path: impl Into<PathBuf>, seed: State, pretty: bool) -> ApiResult<Self> {
        let store = Self {
            path: path.into(),
            seed,
            pretty,
        };

        if !tokio::fs::try_exists(&store.path).await? {
            log::info!("Data file {} not found, seeding a new one", store.path.display());
            store.save(&store.seed).await?;
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn load(&self) -> ApiResult<State> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Data file {} disappeared, using seed state", self.path.display());
                return Ok(self.seed.clone());
            }
            Err(e) => return Err(e.into()),
        };

        let mut state: State = serde_json::from_slice(&bytes)?;
        state.normalize();
        Ok(state)
    }

    async fn save(&self, state: &State) -> ApiResult<()> {
        let body = if self.pretty {
            serde_json::to_vec_pretty(state)?
        } else {
            serde_json::to_vec(state)?
        };
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomically(&path, &body))
            .await
            .map_err(|e| ApiError::InternalServerError(format!("Write task failed: {}", e)))??;

        Ok(())
    }
}

/// Writes through a temp file in the same directory, then renames it over
/// the target so readers never observe a partial document.
fn write_atomically(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(body)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ==================== MEMORY ====================

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new(state: State) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load(&self) -> ApiResult<State> {
        let mut state = self.state.read().await.clone();
        state.normalize();
        Ok(state)
    }

    async fn save(&self, state: &State) -> ApiResult<()> {
        *self.state.write().await = state.clone();
        Ok(())
    }
}

// ==================== HANDLE ====================

/// Serializes access to a [`Store`]. Operations run one at a time, and the
/// state is written back only when the operation returns `Ok`.
#[derive(Clone)]
pub struct StoreHandle {
    store: Arc<dyn Store>,
    lock: Arc<Mutex<()>>,
}

impl StoreHandle {
    pub fn new<S: Store + 'static>(store: S) -> Self {
        Self {
            store: Arc::new(store),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn read(&self) -> ApiResult<State> {
        let _guard = self.lock.lock().await;
        self.store.load().await
    }

    pub async fn transact<T, F>(&self, op: F) -> ApiResult<T>
    where
        F: FnOnce(&mut State) -> ApiResult<T>,
    {
        let _guard = self.lock.lock().await;
        let mut state = self.store.load().await?;
        let result = op(&mut state)?;
        self.store.save(&state).await?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::models::Pool;

    fn user(name: &str, role: Role) -> User {
        User {
            username: name.to_string(),
            password_hash: String::new(),
            role,
            name: name.to_string(),
            email: String::new(),
            phone: String::new(),
        }
    }

    #[tokio::test]
    async fn test_open_seeds_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");

        let store = JsonFileStore::open(&path, State::seeded(), true).await.unwrap();
        assert!(path.exists());

        let state = store.load().await.unwrap();
        assert_eq!(state.inventory.materials.len(), 8);
        assert!(state.inventory.materials.iter().all(|m| m.quantity == 0));
    }

    #[tokio::test]
    async fn test_transact_persists_only_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("db.json");
        let handle = StoreHandle::new(JsonFileStore::open(&path, State::seeded(), false).await.unwrap());

        handle
            .transact(|state| {
                state.inventory.materials[0].put(4, Pool::New)?;
                Ok(())
            })
            .await
            .unwrap();

        let failed: ApiResult<()> = handle
            .transact(|state| {
                state.inventory.materials[0].put(100, Pool::New)?;
                Err(ApiError::BadRequest("abort".into()))
            })
            .await;
        assert!(failed.is_err());

        let reopened = JsonFileStore::open(&path, State::default(), false).await.unwrap();
        let state = reopened.load().await.unwrap();
        assert_eq!(state.inventory.materials[0].quantity_new, 4);
    }

    #[tokio::test]
    async fn test_legacy_document_is_migrated_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(
            &path,
            r#"{
                "users": {"Admin": {"username": "Admin", "passwordHash": "", "role": "admin", "name": "Admin"}},
                "inventory": {"materials": [{"id": 1, "name": "Medium Box", "quantity": 12, "minThreshold": 10}]}
            }"#,
        )
        .unwrap();

        let store = JsonFileStore::open(&path, State::seeded(), true).await.unwrap();
        let state = store.load().await.unwrap();
        let m = &state.inventory.materials[0];
        assert_eq!((m.quantity_new, m.quantity_old, m.quantity), (12, 0, 12));
        assert!(state.users.contains_key("admin"));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = JsonFileStore::open(&path, State::seeded(), true).await.unwrap();
        assert!(matches!(store.load().await, Err(ApiError::StorageError(_))));
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let handle = StoreHandle::new(MemoryStore::new(State::seeded()));
        handle
            .transact(|state| {
                state.users.insert("ic".into(), user("ic", Role::InventoryController));
                Ok(())
            })
            .await
            .unwrap();
        let state = handle.read().await.unwrap();
        assert_eq!(state.users.len(), 1);
    }

    #[test]
    fn test_next_job_id_is_sequential() {
        let state = State::seeded();
        assert_eq!(state.next_job_id(), "1");
    }
}
