use std::fmt;
use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use murmur_shared::clients::redis::RedisClient;
use murmur_shared::errors::AppResult;

use crate::session::Session;

const KEY_PREFIX: &str = "murmur:view:";

/// A page whose anonymous rendering may be cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewPath {
    Home,
    Post(Uuid),
    Profile(String),
    OwnProfile,
}

impl ViewPath {
    pub fn cache_key(&self) -> String {
        format!("{KEY_PREFIX}{self}")
    }

    pub fn after_post_created(author: &str) -> Vec<Self> {
        vec![Self::Home, Self::Profile(author.to_string())]
    }

    pub fn after_reply_created(parent_id: Uuid, author: &str) -> Vec<Self> {
        vec![Self::Home, Self::Post(parent_id), Self::Profile(author.to_string())]
    }

    pub fn after_quote_created(quoted_id: Uuid, author: &str) -> Vec<Self> {
        vec![Self::Home, Self::Post(quoted_id), Self::Profile(author.to_string())]
    }

    /// A reply's like count also shows in its parent's thread, and every
    /// post shows on its author's profile.
    pub fn after_like_toggled(post_id: Uuid, parent_id: Option<Uuid>, author: &str) -> Vec<Self> {
        let mut paths = vec![Self::Home, Self::Post(post_id)];
        paths.extend(parent_id.map(Self::Post));
        paths.push(Self::Profile(author.to_string()));
        paths
    }

    pub fn after_follow_toggled(target: &str) -> Vec<Self> {
        vec![Self::Home, Self::Profile(target.to_string())]
    }

    pub fn after_profile_updated(username: &str) -> Vec<Self> {
        vec![Self::OwnProfile, Self::Profile(username.to_string())]
    }

    /// Identity updates may rename the user; both names are dropped.
    pub fn after_identity_changed(usernames: &[&str]) -> Vec<Self> {
        let mut paths = vec![Self::Home];
        for name in usernames {
            let path = Self::Profile(name.to_string());
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths
    }
}

impl fmt::Display for ViewPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home => f.write_str("/"),
            Self::Post(id) => write!(f, "/posts/{id}"),
            Self::Profile(username) => write!(f, "/profile/{username}"),
            Self::OwnProfile => f.write_str("/profile"),
        }
    }
}

/// Key/value backend behind [`ViewCache`].
pub trait ViewStore: Clone + Send + Sync + 'static {
    fn get(&self, key: &str) -> impl Future<Output = anyhow::Result<Option<String>>> + Send;
    fn set(&self, key: &str, value: &str, ttl_secs: u64) -> impl Future<Output = anyhow::Result<()>> + Send;
    fn del_many(&self, keys: &[String]) -> impl Future<Output = anyhow::Result<usize>> + Send;
}

impl ViewStore for RedisClient {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(RedisClient::get(self, key).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<()> {
        Ok(RedisClient::set(self, key, value, ttl_secs).await?)
    }

    async fn del_many(&self, keys: &[String]) -> anyhow::Result<usize> {
        Ok(RedisClient::del_many(self, keys).await?)
    }
}

/// Short-lived cache of anonymous page views. Every failure is logged
/// and treated as a miss.
#[derive(Clone)]
pub struct ViewCache<S = RedisClient> {
    store: S,
    ttl_secs: u64,
}

impl<S: ViewStore> ViewCache<S> {
    pub fn new(store: S, ttl_secs: u64) -> Self {
        Self { store, ttl_secs }
    }

    /// Serves anonymous callers from the cache and fills it on a miss.
    /// Signed-in views carry per-user state, so they are always loaded
    /// fresh and never stored.
    pub async fn read_through<T, F>(&self, session: &Session, path: &ViewPath, load: F) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> AppResult<T>,
    {
        if !session.is_anonymous() {
            return load();
        }
        if let Some(cached) = self.get(path).await {
            return Ok(cached);
        }
        let view = load()?;
        self.put(path, &view).await;
        Ok(view)
    }

    async fn get<T: DeserializeOwned>(&self, path: &ViewPath) -> Option<T> {
        let raw = match self.store.get(&path.cache_key()).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(error = %e, path = %path, "view cache read failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(view) => {
                metrics::counter!("view_cache_hits_total").increment(1);
                Some(view)
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %path, "discarding unreadable cached view");
                None
            }
        }
    }

    async fn put<T: Serialize>(&self, path: &ViewPath, view: &T) {
        if self.ttl_secs == 0 {
            return;
        }
        let raw = match serde_json::to_string(view) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(error = %e, path = %path, "failed to serialize view");
                return;
            }
        };
        if let Err(e) = self.store.set(&path.cache_key(), &raw, self.ttl_secs).await {
            tracing::warn!(error = %e, path = %path, "view cache write failed");
        }
    }

    pub async fn invalidate(&self, paths: &[ViewPath]) {
        let keys: Vec<String> = paths.iter().map(ViewPath::cache_key).collect();
        match self.store.del_many(&keys).await {
            Ok(removed) => tracing::debug!(paths = ?keys, removed, "views revalidated"),
            Err(e) => tracing::warn!(error = %e, paths = ?keys, "view cache invalidation failed"),
        }
    }
}
