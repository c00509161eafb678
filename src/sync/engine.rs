use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::services::access::Capability;
use crate::tools;

use super::cache::{CacheKey, CachedState, LocalCache};
use super::remote::{RemoteError, RemoteState, RemoteTools};
use super::{SyncError, SyncStatus};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(800);

/// Debounced local+remote state of one tool in one project
#[derive(Clone)]
pub struct ToolStateSync {
    shared: Arc<Shared>,
}

struct Shared {
    key: CacheKey,
    cache: Arc<dyn LocalCache>,
    remote: Arc<dyn RemoteTools>,
    debounce: Duration,
    state: Mutex<Inner>,
    /// One save in flight at a time
    flush_lock: Mutex<()>,
    status: watch::Sender<SyncStatus>,
}

struct Inner {
    payload: Value,
    revision: i64,
    dirty: bool,
    loaded: bool,
    capability: Option<Capability>,
    conflict: Option<Value>,
    /// Bumped on every local edit; a debounce timer only fires for the edit that armed it
    generation: u64,
}

impl Inner {
    fn snapshot(&self) -> CachedState {
        CachedState {
            payload: self.payload.clone(),
            revision: self.revision,
            dirty: self.dirty,
            updated_at: Utc::now(),
        }
    }

    fn adopt(&mut self, server: RemoteState) {
        self.payload = server.payload;
        self.revision = server.revision;
        self.capability = Some(server.capability);
        self.dirty = false;
        self.loaded = true;
    }
}

impl ToolStateSync {
    pub fn new(key: CacheKey, cache: Arc<dyn LocalCache>, remote: Arc<dyn RemoteTools>) -> Self {
        Self::with_debounce(key, cache, remote, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(
        key: CacheKey,
        cache: Arc<dyn LocalCache>,
        remote: Arc<dyn RemoteTools>,
        debounce: Duration,
    ) -> Self {
        let (status, _) = watch::channel(SyncStatus::Idle);
        Self {
            shared: Arc::new(Shared {
                key,
                cache,
                remote,
                debounce,
                state: Mutex::new(Inner {
                    payload: tools::empty_payload(key.tool),
                    revision: 0,
                    dirty: false,
                    loaded: false,
                    capability: None,
                    conflict: None,
                    generation: 0,
                }),
                flush_lock: Mutex::new(()),
                status,
            }),
        }
    }

    pub fn key(&self) -> CacheKey {
        self.shared.key
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.shared.status.subscribe()
    }

    pub fn status(&self) -> SyncStatus {
        *self.shared.status.borrow()
    }

    pub async fn payload(&self) -> Value {
        self.shared.state.lock().await.payload.clone()
    }

    pub async fn revision(&self) -> i64 {
        self.shared.state.lock().await.revision
    }

    /// Unknown until the server has been reached once
    pub async fn capability(&self) -> Option<Capability> {
        self.shared.state.lock().await.capability
    }

    pub async fn is_dirty(&self) -> bool {
        self.shared.state.lock().await.dirty
    }

    /// Local payload that lost a revision conflict, if any. Cleared by reading it.
    pub async fn take_conflict(&self) -> Option<Value> {
        self.shared.state.lock().await.conflict.take()
    }

    /// Local cache first, then the server. Unsaved local edits are pushed; a clean
    /// local copy is replaced by the server's.
    pub async fn load(&self) -> Result<Value, SyncError> {
        let shared = &self.shared;
        shared.set_status(SyncStatus::Loading);

        if let Some(cached) = shared.cache.get(&shared.key).await? {
            let mut inner = shared.state.lock().await;
            inner.payload = tools::validate_and_coerce(shared.key.tool, &cached.payload);
            inner.revision = cached.revision;
            inner.dirty = cached.dirty;
            inner.loaded = true;
        }

        let server = match shared.remote.fetch(&shared.key).await {
            Ok(server) => server,
            Err(RemoteError::Unreachable(msg)) => {
                shared.set_status(SyncStatus::Offline);
                let inner = shared.state.lock().await;
                return if inner.loaded {
                    debug!("Working offline from cache for {:?}", shared.key);
                    Ok(inner.payload.clone())
                } else {
                    Err(SyncError::Offline(msg))
                };
            }
            Err(e) => {
                shared.set_status(SyncStatus::Idle);
                return Err(remote_error(e));
            }
        };

        let push_local = {
            let mut inner = shared.state.lock().await;
            if inner.dirty && server.capability.allows(Capability::Edit) {
                inner.capability = Some(server.capability);
                true
            } else {
                if inner.dirty {
                    warn!("Discarding local edits to {:?}: no edit access", shared.key);
                    inner.conflict = Some(inner.payload.clone());
                }
                inner.adopt(server);
                shared.cache.put(&shared.key, &inner.snapshot()).await?;
                false
            }
        };

        if push_local {
            match shared.flush().await {
                Ok(()) | Err(SyncError::Conflict { .. }) => {}
                Err(e) => return Err(e),
            }
        } else {
            shared.set_status(SyncStatus::Synced);
        }
        Ok(self.payload().await)
    }

    /// Replace the payload locally (coerced, cached, marked dirty) and arm the debounce timer.
    /// Returns the coerced payload.
    pub async fn set(&self, payload: Value) -> Result<Value, SyncError> {
        let shared = &self.shared;
        let mut inner = shared.state.lock().await;
        if !inner.loaded {
            return Err(SyncError::NotLoaded);
        }
        if let Some(capability) = inner.capability {
            if !capability.allows(Capability::Edit) {
                return Err(SyncError::ReadOnly);
            }
        }

        let coerced = tools::validate_and_coerce(shared.key.tool, &payload);
        inner.payload = coerced.clone();
        inner.dirty = true;
        inner.generation += 1;
        let generation = inner.generation;
        shared.cache.put(&shared.key, &inner.snapshot()).await?;
        drop(inner);

        shared.set_status(SyncStatus::Pending);
        self.arm_timer(generation);
        Ok(coerced)
    }

    /// Push unsaved local edits now
    pub async fn flush(&self) -> Result<(), SyncError> {
        self.shared.flush().await
    }

    fn arm_timer(&self, generation: u64) {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            tokio::time::sleep(shared.debounce).await;
            if shared.state.lock().await.generation != generation {
                return;
            }
            if let Err(e) = shared.flush().await {
                debug!("Debounced save of {:?} failed: {}", shared.key, e);
            }
        });
    }
}

impl Shared {
    fn set_status(&self, status: SyncStatus) {
        self.status.send_replace(status);
    }

    async fn flush(&self) -> Result<(), SyncError> {
        let _saving = self.flush_lock.lock().await;

        let (payload, revision, generation) = {
            let inner = self.state.lock().await;
            if !inner.dirty {
                return Ok(());
            }
            (inner.payload.clone(), inner.revision, inner.generation)
        };

        self.set_status(SyncStatus::Saving);
        let result = self.remote.save(&self.key, &payload, Some(revision)).await;
        let mut inner = self.state.lock().await;

        match result {
            Ok(server) => {
                inner.revision = server.revision;
                inner.capability = Some(server.capability);
                if inner.generation == generation {
                    inner.payload = server.payload;
                    inner.dirty = false;
                    self.set_status(SyncStatus::Synced);
                } else {
                    // Edited while saving; the newer edit has its own timer
                    self.set_status(SyncStatus::Pending);
                }
                self.cache.put(&self.key, &inner.snapshot()).await?;
                Ok(())
            }
            Err(RemoteError::Conflict(server)) => {
                let server_revision = server.revision;
                info!(
                    "Revision conflict on {:?}: local base {}, server {}; server state adopted",
                    self.key, revision, server_revision
                );
                inner.conflict = Some(inner.payload.clone());
                inner.adopt(*server);
                inner.generation += 1;
                self.cache.put(&self.key, &inner.snapshot()).await?;
                self.set_status(SyncStatus::Conflict);
                Err(SyncError::Conflict { server_revision })
            }
            Err(RemoteError::Unreachable(msg)) => {
                self.set_status(SyncStatus::Offline);
                Err(SyncError::Offline(msg))
            }
            Err(RemoteError::Rejected { status, .. }) if status == 403 => {
                inner.capability = Some(Capability::View);
                self.set_status(SyncStatus::Pending);
                Err(SyncError::ReadOnly)
            }
            Err(e) => {
                self.set_status(SyncStatus::Pending);
                Err(remote_error(e))
            }
        }
    }
}

fn remote_error(e: RemoteError) -> SyncError {
    match e {
        RemoteError::Unreachable(msg) => SyncError::Offline(msg),
        RemoteError::Conflict(server) => SyncError::Conflict {
            server_revision: server.revision,
        },
        RemoteError::Rejected { status, message, .. } => SyncError::Remote { status, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::MemoryCache;
    use crate::types::ToolKey;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use uuid::Uuid;

    struct FakeServer {
        payload: Value,
        revision: i64,
        capability: Capability,
        offline: bool,
        saves: usize,
    }

    struct FakeRemote(StdMutex<FakeServer>);

    impl FakeRemote {
        fn new(capability: Capability) -> Arc<Self> {
            Arc::new(Self(StdMutex::new(FakeServer {
                payload: tools::empty_payload(ToolKey::PunchList),
                revision: 0,
                capability,
                offline: false,
                saves: 0,
            })))
        }

        fn with<T>(&self, f: impl FnOnce(&mut FakeServer) -> T) -> T {
            f(&mut self.0.lock().unwrap())
        }

        fn state(&self, key: &CacheKey, s: &FakeServer) -> RemoteState {
            RemoteState {
                project_id: key.project_id,
                tool: key.tool,
                capability: s.capability,
                revision: s.revision,
                updated_at: None,
                payload: s.payload.clone(),
            }
        }
    }

    #[async_trait]
    impl RemoteTools for FakeRemote {
        async fn fetch(&self, key: &CacheKey) -> Result<RemoteState, RemoteError> {
            let s = self.0.lock().unwrap();
            if s.offline {
                return Err(RemoteError::Unreachable("connection refused".into()));
            }
            Ok(self.state(key, &s))
        }

        async fn save(&self, key: &CacheKey, payload: &Value, base: Option<i64>) -> Result<RemoteState, RemoteError> {
            let mut s = self.0.lock().unwrap();
            if s.offline {
                return Err(RemoteError::Unreachable("connection refused".into()));
            }
            if base.is_some_and(|b| b != s.revision) {
                return Err(RemoteError::Conflict(Box::new(self.state(key, &s))));
            }
            s.payload = payload.clone();
            s.revision += 1;
            s.saves += 1;
            Ok(self.state(key, &s))
        }
    }

    fn item(title: &str) -> Value {
        json!({"items": [{"id": "a", "title": title}]})
    }

    fn engine(remote: Arc<FakeRemote>, cache: Arc<MemoryCache>) -> ToolStateSync {
        let key = CacheKey::new(Uuid::new_v4(), ToolKey::PunchList);
        ToolStateSync::with_debounce(key, cache, remote, Duration::from_millis(500))
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_coalesce_into_one_save() {
        let remote = FakeRemote::new(Capability::Edit);
        let sync = engine(remote.clone(), Arc::new(MemoryCache::new()));
        sync.load().await.unwrap();

        for title in ["Fix gate", "Fix gate latch", "Fix gate latch and hinge"] {
            sync.set(item(title)).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(sync.status(), SyncStatus::Pending);
        assert_eq!(remote.with(|s| s.saves), 0);

        let mut status = sync.subscribe();
        tokio::time::sleep(Duration::from_millis(600)).await;
        status.wait_for(|s| *s == SyncStatus::Synced).await.unwrap();

        assert_eq!(remote.with(|s| s.saves), 1);
        assert_eq!(sync.revision().await, 1);
        assert_eq!(remote.with(|s| s.payload["items"][0]["title"].clone()), "Fix gate latch and hinge");
        assert!(!sync.is_dirty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn clones_share_the_configured_debounce() {
        let remote = FakeRemote::new(Capability::Edit);
        let sync = engine(remote.clone(), Arc::new(MemoryCache::new()));
        let handle = sync.clone();
        sync.load().await.unwrap();

        handle.set(item("Patch drywall")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(remote.with(|s| s.saves), 0);

        let mut status = sync.subscribe();
        tokio::time::sleep(Duration::from_millis(200)).await;
        status.wait_for(|s| *s == SyncStatus::Synced).await.unwrap();
        assert_eq!(remote.with(|s| s.saves), 1);
        assert!(DEFAULT_DEBOUNCE > Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn view_access_is_read_only() {
        let sync = engine(FakeRemote::new(Capability::View), Arc::new(MemoryCache::new()));
        sync.load().await.unwrap();
        assert!(matches!(sync.set(item("x")).await, Err(SyncError::ReadOnly)));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_save_adopts_server_and_keeps_local_aside() {
        let remote = FakeRemote::new(Capability::Edit);
        let sync = engine(remote.clone(), Arc::new(MemoryCache::new()));
        sync.load().await.unwrap();

        // Someone else saves first
        remote.with(|s| {
            s.payload = item("Theirs");
            s.revision = 1;
        });

        sync.set(item("Mine")).await.unwrap();
        let err = sync.flush().await.unwrap_err();
        assert!(matches!(err, SyncError::Conflict { server_revision: 1 }));
        assert_eq!(sync.status(), SyncStatus::Conflict);
        assert_eq!(sync.payload().await["items"][0]["title"], "Theirs");
        assert_eq!(sync.take_conflict().await.unwrap()["items"][0]["title"], "Mine");
        assert!(sync.take_conflict().await.is_none());

        // The armed timer must not resurrect the discarded edit
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(remote.with(|s| s.saves), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn offline_edits_survive_and_retry() {
        let remote = FakeRemote::new(Capability::Edit);
        let cache = Arc::new(MemoryCache::new());
        let sync = engine(remote.clone(), cache.clone());
        sync.load().await.unwrap();

        remote.with(|s| s.offline = true);
        sync.set(item("Rewire lanai light")).await.unwrap();
        assert!(matches!(sync.flush().await, Err(SyncError::Offline(_))));
        assert_eq!(sync.status(), SyncStatus::Offline);
        let cached = cache.get(&sync.key()).await.unwrap().unwrap();
        assert!(cached.dirty);

        remote.with(|s| s.offline = false);
        sync.flush().await.unwrap();
        assert_eq!(sync.status(), SyncStatus::Synced);
        assert_eq!(remote.with(|s| s.revision), 1);
        assert!(!cache.get(&sync.key()).await.unwrap().unwrap().dirty);
    }

    #[tokio::test(start_paused = true)]
    async fn dirty_cache_is_pushed_on_load() {
        let remote = FakeRemote::new(Capability::Edit);
        let cache = Arc::new(MemoryCache::new());
        let key = CacheKey::new(Uuid::new_v4(), ToolKey::PunchList);
        cache
            .put(
                &key,
                &CachedState {
                    payload: item("Made offline"),
                    revision: 0,
                    dirty: true,
                    updated_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        let sync = ToolStateSync::new(key, cache, remote.clone());
        let payload = sync.load().await.unwrap();
        assert_eq!(payload["items"][0]["title"], "Made offline");
        assert_eq!(remote.with(|s| s.saves), 1);
        assert_eq!(sync.status(), SyncStatus::Synced);
    }

    #[tokio::test(start_paused = true)]
    async fn offline_load_serves_the_cache() {
        let remote = FakeRemote::new(Capability::Edit);
        remote.with(|s| s.offline = true);
        let cache = Arc::new(MemoryCache::new());
        let key = CacheKey::new(Uuid::new_v4(), ToolKey::PunchList);

        let cold = ToolStateSync::new(key, cache.clone(), remote.clone());
        assert!(matches!(cold.load().await, Err(SyncError::Offline(_))));

        cache
            .put(
                &key,
                &CachedState {
                    payload: item("Cached"),
                    revision: 4,
                    dirty: false,
                    updated_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        let warm = ToolStateSync::new(key, cache, remote);
        assert_eq!(warm.load().await.unwrap()["items"][0]["title"], "Cached");
        assert_eq!(warm.status(), SyncStatus::Offline);
    }
}
