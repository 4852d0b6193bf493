/*
Persistent storage: one JSON document per user plus a shared catalogue.

Layout under the data directory:

users/<user-id>.json   UserBook of one user
catalog.json           system rewards

Every user book sits behind its own async mutex. Mutations clone the
book, apply the change, write the clone to disk, and only then publish
it, so a failed write leaves the previous state in place. Lock waits are
bounded: a caller that cannot get the lock in time receives
StoreError::LockTimeout instead of queueing forever.

Lock order is always directory → user book. The catalogue lock is never
held while a user lock is taken.
*/

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Reward, User, UserBook};

pub const USERS_DIR: &str = "users";
pub const CATALOG_FILE: &str = "catalog.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Corrupt document {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Timed out waiting for lock on {0}")]
    LockTimeout(Uuid),

    #[error("Unknown user {0}")]
    UnknownUser(Uuid),
}

type BookCell = Arc<Mutex<UserBook>>;

#[derive(Debug, Default)]
struct Directory {
    by_email: HashMap<String, Uuid>,
    by_username: HashMap<String, Uuid>,
}

impl Directory {
    fn insert(&mut self, user: &User) {
        self.by_email.insert(email_key(&user.email), user.id);
        self.by_username.insert(user.username.clone(), user.id);
    }

    fn remove(&mut self, username: &str, email: &str) {
        self.by_email.remove(&email_key(email));
        self.by_username.remove(username);
    }

    fn check_free(&self, id: Uuid, username: Option<&str>, email: Option<&str>) -> Result<(), AppError> {
        let taken = |owner: Option<&Uuid>| owner.is_some_and(|o| *o != id);
        if email.is_some_and(|e| taken(self.by_email.get(&email_key(e)))) {
            return Err(AppError::AlreadyExists("Email already registered".into()));
        }
        if username.is_some_and(|u| taken(self.by_username.get(u))) {
            return Err(AppError::AlreadyExists("Username already taken".into()));
        }
        Ok(())
    }
}

fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct Store {
    data_dir: Option<PathBuf>,
    lock_timeout: Duration,
    books: RwLock<HashMap<Uuid, BookCell>>,
    directory: Mutex<Directory>,
    catalog: RwLock<Vec<Reward>>,
}

impl Store {
    // Store without a backing directory, used by tests and dry runs.
    pub fn in_memory(lock_timeout: Duration) -> Self {
        Self {
            data_dir: None,
            lock_timeout,
            books: RwLock::new(HashMap::new()),
            directory: Mutex::new(Directory::default()),
            catalog: RwLock::new(Vec::new()),
        }
    }

    // Load every user book and the catalogue from `data_dir`, creating the
    // directory layout when missing.
    pub fn open(data_dir: impl Into<PathBuf>, lock_timeout: Duration) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        let users_dir = data_dir.join(USERS_DIR);
        fs::create_dir_all(&users_dir).map_err(|source| StoreError::Io {
            path: users_dir.clone(),
            source,
        })?;

        let mut books = HashMap::new();
        let mut directory = Directory::default();
        let entries = fs::read_dir(&users_dir).map_err(|source| StoreError::Io {
            path: users_dir.clone(),
            source,
        })?;
        for entry in entries {
            let path = entry
                .map_err(|source| StoreError::Io {
                    path: users_dir.clone(),
                    source,
                })?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let book: UserBook = read_json(&path)?;
            directory.insert(&book.user);
            books.insert(book.user.id, Arc::new(Mutex::new(book)));
        }

        let catalog_path = data_dir.join(CATALOG_FILE);
        let catalog: Vec<Reward> = if catalog_path.exists() {
            read_json(&catalog_path)?
        } else {
            Vec::new()
        };

        info!(
            path = %data_dir.display(),
            users = books.len(),
            rewards = catalog.len(),
            "store opened"
        );

        Ok(Self {
            data_dir: Some(data_dir),
            lock_timeout,
            books: RwLock::new(books),
            directory: Mutex::new(directory),
            catalog: RwLock::new(catalog),
        })
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.books.read().await.contains_key(&id)
    }

    pub async fn user_count(&self) -> usize {
        self.books.read().await.len()
    }

    async fn cell(&self, id: Uuid) -> Result<BookCell, StoreError> {
        self.books
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::UnknownUser(id))
    }

    async fn lock_book(&self, id: Uuid) -> Result<OwnedMutexGuard<UserBook>, StoreError> {
        let cell = self.cell(id).await?;
        tokio::time::timeout(self.lock_timeout, cell.lock_owned())
            .await
            .map_err(|_| {
                warn!(user_id = %id, "timed out waiting for user lock");
                StoreError::LockTimeout(id)
            })
    }

    async fn lock_directory(&self) -> Result<MutexGuard<'_, Directory>, StoreError> {
        tokio::time::timeout(self.lock_timeout, self.directory.lock())
            .await
            .map_err(|_| {
                warn!("timed out waiting for directory lock");
                StoreError::LockTimeout(Uuid::nil())
            })
    }

    // Run a read-only view over one user's book.
    pub async fn read<T>(&self, id: Uuid, f: impl FnOnce(&UserBook) -> T) -> Result<T, StoreError> {
        let guard = self.lock_book(id).await?;
        Ok(f(&guard))
    }

    // Apply a mutation to one user's book as a single atomic step.
    //
    // If `f` fails, or the write to disk fails, the stored book is unchanged.
    pub async fn update<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut UserBook) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut guard = self.lock_book(id).await?;
        let mut draft = UserBook::clone(&guard);
        let out = f(&mut draft)?;
        self.persist_book(&draft)?;
        *guard = draft;
        Ok(out)
    }

    // Create a new account. Username and email must be unused.
    pub async fn register(&self, user: User) -> Result<User, AppError> {
        let mut dir = self.lock_directory().await?;
        dir.check_free(user.id, Some(&user.username), Some(&user.email))?;

        let book = UserBook::new(user.clone());
        self.persist_book(&book)?;
        dir.insert(&user);
        self.books.write().await.insert(user.id, Arc::new(Mutex::new(book)));

        info!(user_id = %user.id, username = %user.username, "user registered");
        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Uuid>, StoreError> {
        let directory = self.lock_directory().await?;
        Ok(directory.by_email.get(&email_key(email)).copied())
    }

    // Change username and/or email, then run `f` in the same critical section.
    //
    // The directory lock is held across the whole update so two users
    // cannot claim the same name concurrently.
    pub async fn update_identity<T>(
        &self,
        id: Uuid,
        username: Option<String>,
        email: Option<String>,
        f: impl FnOnce(&mut UserBook) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut dir = self.lock_directory().await?;
        dir.check_free(id, username.as_deref(), email.as_deref())?;

        let (old_name, old_email, new_user, out) = self
            .update(id, |book| {
                let old_name = book.user.username.clone();
                let old_email = book.user.email.clone();
                if let Some(name) = username {
                    book.user.username = name;
                }
                if let Some(email) = email {
                    book.user.email = email;
                }
                let out = f(book)?;
                Ok((old_name, old_email, book.user.clone(), out))
            })
            .await?;

        dir.remove(&old_name, &old_email);
        dir.insert(&new_user);
        Ok(out)
    }

    // Collect `f` over every user book, in user id order.
    pub async fn snapshot<T>(&self, f: impl Fn(&UserBook) -> T) -> Result<Vec<T>, StoreError> {
        let mut cells: Vec<(Uuid, BookCell)> = self
            .books
            .read()
            .await
            .iter()
            .map(|(id, cell)| (*id, Arc::clone(cell)))
            .collect();
        cells.sort_by_key(|(id, _)| *id);

        let mut out = Vec::with_capacity(cells.len());
        for (id, cell) in cells {
            let guard = tokio::time::timeout(self.lock_timeout, cell.lock())
                .await
                .map_err(|_| StoreError::LockTimeout(id))?;
            out.push(f(&guard));
        }
        Ok(out)
    }

    pub async fn catalog(&self) -> Vec<Reward> {
        self.catalog.read().await.clone()
    }

    pub async fn catalog_reward(&self, id: Uuid) -> Option<Reward> {
        self.catalog.read().await.iter().find(|r| r.id == id).cloned()
    }

    // Append system rewards and persist the catalogue.
    pub async fn add_catalog_rewards(&self, rewards: Vec<Reward>) -> Result<(), StoreError> {
        let mut catalog = self.catalog.write().await;
        let mut draft = Vec::clone(&catalog);
        draft.extend(rewards);
        if let Some(dir) = &self.data_dir {
            write_json_atomic(&dir.join(CATALOG_FILE), &draft)?;
        }
        *catalog = draft;
        Ok(())
    }

    fn persist_book(&self, book: &UserBook) -> Result<(), StoreError> {
        let Some(dir) = &self.data_dir else {
            return Ok(());
        };
        let path = dir.join(USERS_DIR).join(format!("{}.json", book.user.id));
        write_json_atomic(&path, book).inspect_err(|e| {
            warn!(user_id = %book.user.id, "failed to persist user book: {}", e);
        })?;
        debug!(user_id = %book.user.id, "user book persisted");
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let text = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

// Write to "<path>.tmp" then rename over the target
fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let text = serde_json::to_string_pretty(value)?;
    let io_err = |source: io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");
    fs::write(&tmp_path, text).map_err(io_err)?;
    fs::rename(&tmp_path, path).map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::ledger;
    use chrono::Utc;

    fn user(name: &str, coins: u64) -> User {
        User {
            id: Uuid::new_v4(),
            username: name.into(),
            email: format!("{name}@example.com"),
            password_hash: String::new(),
            coins,
            is_premium: false,
            created_at: Utc::now(),
        }
    }

    fn reward(cost: u64) -> Reward {
        Reward {
            id: Uuid::new_v4(),
            user_id: None,
            name: "Snack".into(),
            description: None,
            coins_cost: cost,
            is_premium: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn register_rejects_duplicates() {
        let store = Store::in_memory(Duration::from_secs(1));
        store.register(user("ada", 0)).await.unwrap();

        let mut same_email = user("other", 0);
        same_email.email = "ADA@example.com".into();
        assert!(matches!(store.register(same_email).await, Err(AppError::AlreadyExists(_))));

        let mut same_name = user("ada", 0);
        same_name.email = "fresh@example.com".into();
        assert!(matches!(store.register(same_name).await, Err(AppError::AlreadyExists(_))));
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn failed_update_leaves_book_untouched() {
        let store = Store::in_memory(Duration::from_secs(1));
        let u = store.register(user("bob", 10)).await.unwrap();

        let res: Result<(), AppError> = store
            .update(u.id, |b| {
                ledger::credit(&mut b.user, 100);
                Err(AppError::validation("boom"))
            })
            .await;
        assert!(res.is_err());
        assert_eq!(store.read(u.id, |b| b.user.coins).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn concurrent_redemptions_never_overdraw() {
        let store = Arc::new(Store::in_memory(Duration::from_secs(5)));
        let id = store.register(user("cy", 100)).await.unwrap().id;
        let r = reward(30);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = Arc::clone(&store);
            let r = r.clone();
            handles.push(tokio::spawn(async move {
                store.update(id, |b| catalog::redeem(b, &r, Utc::now())).await
            }));
        }

        let mut ok = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 3);
        assert_eq!(store.read(id, |b| b.user.coins).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn held_lock_times_out_as_busy() {
        let store = Store::in_memory(Duration::from_millis(50));
        let u = store.register(user("dee", 0)).await.unwrap();

        let cell = store.cell(u.id).await.unwrap();
        let _held = cell.lock().await;

        let res = store.update(u.id, |b| Ok(ledger::credit(&mut b.user, 1))).await;
        assert!(matches!(res, Err(AppError::Busy)));
    }

    #[tokio::test]
    async fn held_directory_times_out_email_lookup() {
        let store = Store::in_memory(Duration::from_millis(50));
        store.register(user("dot", 0)).await.unwrap();

        let _held = store.directory.lock().await;

        let res = store.find_by_email("dot@example.com").await;
        assert!(matches!(res, Err(StoreError::LockTimeout(_))));
    }

    #[tokio::test]
    async fn other_users_are_not_blocked() {
        let store = Store::in_memory(Duration::from_millis(50));
        let a = store.register(user("eve", 0)).await.unwrap();
        let b = store.register(user("fay", 0)).await.unwrap();

        let cell = store.cell(a.id).await.unwrap();
        let _held = cell.lock().await;

        let balance = store.update(b.id, |bk| Ok(ledger::credit(&mut bk.user, 5))).await.unwrap();
        assert_eq!(balance, 5);
    }

    #[tokio::test]
    async fn identity_change_frees_old_name() {
        let store = Store::in_memory(Duration::from_secs(1));
        let a = store.register(user("gus", 0)).await.unwrap();
        store.register(user("hal", 0)).await.unwrap();

        let clash = store.update_identity(a.id, Some("hal".into()), None, |_| Ok(())).await;
        assert!(matches!(clash, Err(AppError::AlreadyExists(_))));

        store
            .update_identity(a.id, Some("gus2".into()), Some("gus2@example.com".into()), |_| Ok(()))
            .await
            .unwrap();
        assert_eq!(store.find_by_email("gus2@example.com").await.unwrap(), Some(a.id));
        assert_eq!(store.find_by_email("gus@example.com").await.unwrap(), None);
        store.register(user("gus", 0)).await.unwrap();
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = Store::open(dir.path(), Duration::from_secs(1)).unwrap();
            let u = store.register(user("ivy", 0)).await.unwrap();
            store.update(u.id, |b| Ok(ledger::credit(&mut b.user, 42))).await.unwrap();
            store.add_catalog_rewards(vec![reward(5)]).await.unwrap();
            u.id
        };

        let store = Store::open(dir.path(), Duration::from_secs(1)).unwrap();
        assert_eq!(store.read(id, |b| b.user.coins).await.unwrap(), 42);
        assert_eq!(store.find_by_email("ivy@example.com").await.unwrap(), Some(id));
        assert_eq!(store.catalog().await.len(), 1);
    }

    #[tokio::test]
    async fn snapshot_is_sorted_by_id() {
        let store = Store::in_memory(Duration::from_secs(1));
        for name in ["j1", "j2", "j3", "j4"] {
            store.register(user(name, 0)).await.unwrap();
        }
        let ids = store.snapshot(|b| b.user.id).await.unwrap();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }
}
