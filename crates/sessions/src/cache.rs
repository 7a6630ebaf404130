use std::{
    collections::HashMap,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use {
    relay_agents::SessionStore,
    tokio::sync::{Mutex, RwLock},
    tracing::{debug, info, warn},
};

use crate::{ConversationIdentity, Result};

/// The remote session currently bound to a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub identity: ConversationIdentity,
    pub session_id: String,
    /// Unix milliseconds.
    pub created_at: u64,
}

impl SessionRecord {
    pub fn new(identity: ConversationIdentity, session_id: impl Into<String>) -> Self {
        Self {
            identity,
            session_id: session_id.into(),
            created_at: now_ms(),
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

type Slot = Arc<Mutex<Option<SessionRecord>>>;

/// Lazily binds conversations to remote sessions.
///
/// Slots are never removed from the map, only emptied; a conversation that
/// was seen once keeps its (cheap) lock for the life of the process.
pub struct SessionCache {
    store: Arc<dyn SessionStore>,
    slots: RwLock<HashMap<String, Slot>>,
}

impl SessionCache {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            slots: RwLock::new(HashMap::new()),
        }
    }

    async fn slot(&self, identity: &ConversationIdentity) -> Slot {
        if let Some(slot) = self.slots.read().await.get(identity.as_str()) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().await;
        Arc::clone(slots.entry(identity.as_str().to_string()).or_default())
    }

    async fn existing_slot(&self, identity: &ConversationIdentity) -> Option<Slot> {
        self.slots.read().await.get(identity.as_str()).cloned()
    }

    /// Session for `identity`, adopting the newest remote session or creating
    /// one on a miss. A hit makes no remote calls.
    pub async fn resolve(&self, identity: &ConversationIdentity) -> Result<SessionRecord> {
        let slot = self.slot(identity).await;
        let mut entry = slot.lock().await;
        if let Some(record) = entry.as_ref() {
            debug!(conversation = %identity, session_id = %record.session_id, "session cache hit");
            return Ok(record.clone());
        }

        let user_id = identity.external_user_id();
        let sessions = self.store.list_sessions(user_id).await?;
        let session_id = match sessions.last() {
            Some(existing) => {
                info!(conversation = %identity, session_id = %existing.id, "reusing remote session");
                existing.id.clone()
            },
            None => {
                let id = self.store.create_session(user_id).await?;
                info!(conversation = %identity, session_id = %id, "created remote session");
                id
            },
        };

        let record = SessionRecord::new(identity.clone(), session_id);
        *entry = Some(record.clone());
        Ok(record)
    }

    /// Bind `identity` to its newest remote session without ever creating
    /// one. Lets a fresh process act on sessions an earlier one started.
    pub async fn adopt(&self, identity: &ConversationIdentity) -> Result<Option<SessionRecord>> {
        let slot = self.slot(identity).await;
        let mut entry = slot.lock().await;
        if let Some(record) = entry.as_ref() {
            return Ok(Some(record.clone()));
        }

        let sessions = self.store.list_sessions(identity.external_user_id()).await?;
        let Some(existing) = sessions.last() else {
            debug!(conversation = %identity, "no remote session to adopt");
            return Ok(None);
        };
        info!(conversation = %identity, session_id = %existing.id, "adopted remote session");
        let record = SessionRecord::new(identity.clone(), existing.id.clone());
        *entry = Some(record.clone());
        Ok(Some(record))
    }

    /// Peek at the cached binding without touching the store.
    pub async fn cached(&self, identity: &ConversationIdentity) -> Option<SessionRecord> {
        let slot = self.existing_slot(identity).await?;
        let entry = slot.lock().await;
        entry.clone()
    }

    /// Forget the binding and delete the remote session. Remote failures are
    /// logged and swallowed.
    pub async fn invalidate(&self, identity: &ConversationIdentity) {
        self.evict(identity, None).await;
    }

    /// Like [`Self::invalidate`], but only when the cached binding is still
    /// `stale_session_id`. A binding that already moved on to a newer session
    /// is left alone. Returns whether anything was evicted.
    pub async fn invalidate_if(
        &self,
        identity: &ConversationIdentity,
        stale_session_id: &str,
    ) -> bool {
        self.evict(identity, Some(stale_session_id)).await
    }

    async fn evict(&self, identity: &ConversationIdentity, expected: Option<&str>) -> bool {
        let Some(slot) = self.existing_slot(identity).await else {
            return false;
        };
        // Held across the remote delete so a concurrent resolve cannot adopt
        // the session being removed.
        let mut entry = slot.lock().await;
        let Some(current) = entry.as_ref() else {
            return false;
        };
        if let Some(expected) = expected
            && current.session_id != expected
        {
            debug!(
                conversation = %identity,
                stale_session_id = expected,
                session_id = %current.session_id,
                "binding already replaced; keeping it"
            );
            return false;
        }
        let Some(record) = entry.take() else {
            return false;
        };

        info!(conversation = %identity, session_id = %record.session_id, "invalidating session");
        if let Err(e) = self
            .store
            .delete_session(identity.external_user_id(), &record.session_id)
            .await
        {
            warn!(
                conversation = %identity,
                session_id = %record.session_id,
                error = %e,
                "best-effort remote session delete failed"
            );
        }
        true
    }

    /// Delete the remote session and drop the binding. Unlike
    /// [`Self::invalidate`], store errors propagate and leave the binding in
    /// place.
    pub async fn delete(&self, identity: &ConversationIdentity) -> Result<Option<SessionRecord>> {
        let Some(slot) = self.existing_slot(identity).await else {
            return Ok(None);
        };
        let mut entry = slot.lock().await;
        let Some(record) = entry.as_ref() else {
            return Ok(None);
        };
        self.store
            .delete_session(identity.external_user_id(), &record.session_id)
            .await?;
        info!(conversation = %identity, session_id = %record.session_id, "deleted session");
        Ok(entry.take())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use {
        super::*,
        async_trait::async_trait,
        relay_agents::RemoteSession,
        relay_common::NormalizedPart,
        serde_json::{Map, Value},
    };

    #[derive(Default)]
    struct CountingStore {
        existing: Vec<String>,
        fail_delete: bool,
        lists: AtomicUsize,
        creates: AtomicUsize,
        deletes: AtomicUsize,
    }

    #[async_trait]
    impl SessionStore for CountingStore {
        async fn list_sessions(&self, user_id: &str) -> relay_agents::Result<Vec<RemoteSession>> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(self
                .existing
                .iter()
                .map(|id| RemoteSession {
                    id: id.clone(),
                    user_id: user_id.to_string(),
                    state: Map::new(),
                    last_update_time: None,
                })
                .collect())
        }

        async fn create_session(&self, _user_id: &str) -> relay_agents::Result<String> {
            let n = self.creates.fetch_add(1, Ordering::SeqCst);
            Ok(format!("created-{n}"))
        }

        async fn get_session(
            &self,
            _user_id: &str,
            _session_id: &str,
        ) -> relay_agents::Result<Option<RemoteSession>> {
            Ok(None)
        }

        async fn delete_session(
            &self,
            _user_id: &str,
            _session_id: &str,
        ) -> relay_agents::Result<()> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            if self.fail_delete {
                return Err(relay_agents::Error::remote(503, "unavailable"));
            }
            Ok(())
        }

        async fn append_state_delta(
            &self,
            _session_id: &str,
            _user_id: &str,
            _delta: Map<String, Value>,
        ) -> relay_agents::Result<()> {
            Ok(())
        }

        async fn append_message(
            &self,
            _session_id: &str,
            _user_id: &str,
            _author: &str,
            _parts: Vec<NormalizedPart>,
        ) -> relay_agents::Result<()> {
            Ok(())
        }
    }

    fn chat(id: i64) -> ConversationIdentity {
        ConversationIdentity::new("Telegram", id)
    }

    #[tokio::test]
    async fn second_resolve_hits_cache() {
        let store = Arc::new(CountingStore::default());
        let cache = SessionCache::new(store.clone());

        let first = cache.resolve(&chat(1)).await.unwrap();
        let second = cache.resolve(&chat(1)).await.unwrap();

        assert_eq!(first.session_id, second.session_id);
        assert_eq!(store.lists.load(Ordering::SeqCst), 1);
        assert_eq!(store.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn adopts_last_listed_session() {
        let store = Arc::new(CountingStore {
            existing: vec!["old".into(), "newest".into()],
            ..Default::default()
        });
        let cache = SessionCache::new(store.clone());

        let record = cache.resolve(&chat(2)).await.unwrap();
        assert_eq!(record.session_id, "newest");
        assert_eq!(store.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn adopt_never_creates() {
        let store = Arc::new(CountingStore::default());
        let cache = SessionCache::new(store.clone());
        assert!(cache.adopt(&chat(10)).await.unwrap().is_none());
        assert!(cache.cached(&chat(10)).await.is_none());
        assert_eq!(store.creates.load(Ordering::SeqCst), 0);

        let store = Arc::new(CountingStore {
            existing: vec!["a".into(), "b".into()],
            ..Default::default()
        });
        let cache = SessionCache::new(store.clone());
        let adopted = cache.adopt(&chat(10)).await.unwrap().unwrap();
        assert_eq!(adopted.session_id, "b");
        assert_eq!(cache.resolve(&chat(10)).await.unwrap().session_id, "b");
        assert_eq!(store.lists.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_resolves_create_once() {
        let store = Arc::new(CountingStore::default());
        let cache = SessionCache::new(store.clone());
        let id = chat(3);

        let (a, b) = tokio::join!(cache.resolve(&id), cache.resolve(&id));
        assert_eq!(a.unwrap().session_id, b.unwrap().session_id);
        assert_eq!(store.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_conversations_get_distinct_sessions() {
        let store = Arc::new(CountingStore::default());
        let cache = SessionCache::new(store.clone());

        let a = cache.resolve(&chat(4)).await.unwrap();
        let b = cache.resolve(&chat(5)).await.unwrap();
        assert_ne!(a.session_id, b.session_id);
    }

    #[tokio::test]
    async fn invalidate_swallows_delete_failures() {
        let store = Arc::new(CountingStore {
            fail_delete: true,
            ..Default::default()
        });
        let cache = SessionCache::new(store.clone());
        let id = chat(6);

        cache.resolve(&id).await.unwrap();
        cache.invalidate(&id).await;

        assert!(cache.cached(&id).await.is_none());
        assert_eq!(store.deletes.load(Ordering::SeqCst), 1);

        let fresh = cache.resolve(&id).await.unwrap();
        assert_eq!(fresh.session_id, "created-1");
    }

    #[tokio::test]
    async fn invalidate_unknown_conversation_is_a_noop() {
        let store = Arc::new(CountingStore::default());
        let cache = SessionCache::new(store.clone());
        cache.invalidate(&chat(7)).await;
        assert_eq!(store.deletes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalidate_if_only_evicts_the_stale_binding() {
        let store = Arc::new(CountingStore::default());
        let cache = SessionCache::new(store.clone());
        let id = chat(11);

        let stale = cache.resolve(&id).await.unwrap();
        assert!(cache.invalidate_if(&id, &stale.session_id).await);
        let fresh = cache.resolve(&id).await.unwrap();
        assert_eq!(fresh.session_id, "created-1");

        // A second report about the old session must not touch the new one.
        assert!(!cache.invalidate_if(&id, &stale.session_id).await);
        assert_eq!(cache.cached(&id).await.unwrap().session_id, "created-1");
        assert_eq!(store.deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_if_on_empty_binding_deletes_nothing() {
        let store = Arc::new(CountingStore::default());
        let cache = SessionCache::new(store.clone());
        let id = chat(12);

        let stale = cache.resolve(&id).await.unwrap();
        cache.invalidate(&id).await;
        assert!(!cache.invalidate_if(&id, &stale.session_id).await);
        assert_eq!(store.deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn strict_delete_keeps_binding_on_failure() {
        let store = Arc::new(CountingStore {
            fail_delete: true,
            ..Default::default()
        });
        let cache = SessionCache::new(store.clone());
        let id = chat(8);

        cache.resolve(&id).await.unwrap();
        assert!(cache.delete(&id).await.is_err());
        assert!(cache.cached(&id).await.is_some());
    }

    #[tokio::test]
    async fn strict_delete_reports_missing_binding() {
        let store = Arc::new(CountingStore::default());
        let cache = SessionCache::new(store.clone());
        let id = chat(9);

        assert!(cache.delete(&id).await.unwrap().is_none());
        cache.resolve(&id).await.unwrap();
        let removed = cache.delete(&id).await.unwrap().unwrap();
        assert_eq!(removed.session_id, "created-0");
        assert!(cache.cached(&id).await.is_none());
    }
}
