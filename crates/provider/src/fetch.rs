//! Fetchers: a TTL-cached wrapper, a JSON file source and an in-memory source.

#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use cumulus_store::TtlCache;
use metrics::counter;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{CloudObject, Fetcher, ProviderError, ResourceId, Scope};

/// Objects belong to a scope when the scope is the all sentinel, when the object is global
/// (no region), or when the regions match.
pub fn in_scope(obj: &CloudObject, scope: &Scope) -> bool {
    scope.is_all() || obj.region.is_empty() || obj.region == scope.as_str()
}

/// Listing shared by every fetcher of one resource type, keyed `"{rid}:{scope}"`.
pub type ListingCache = TtlCache<Arc<Vec<CloudObject>>>;

/// Serves repeated listings from a [`ListingCache`] until the entry expires.
pub struct CachedFetcher<F> {
    rid: ResourceId,
    inner: F,
    cache: Arc<ListingCache>,
}

impl<F: Fetcher> CachedFetcher<F> {
    pub fn new(rid: ResourceId, inner: F, cache: Arc<ListingCache>) -> Self {
        Self { rid, inner, cache }
    }

    pub fn cache_key(&self, scope: &Scope) -> String {
        format!("{}:{}", self.rid, scope)
    }

    /// Drop every cached listing of this resource type, whatever the scope.
    /// Call after a mutating action so the next read goes to the source.
    pub fn invalidate(&self) -> usize {
        let removed = self.cache.delete_prefix(&format!("{}:", self.rid));
        debug!(rid = %self.rid, removed, "listing cache invalidated");
        removed
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for CachedFetcher<F> {
    async fn fetch(&self, scope: &Scope, cancel: &CancellationToken) -> Result<Vec<CloudObject>, ProviderError> {
        let key = self.cache_key(scope);
        if let Some(hit) = self.cache.get(&key) {
            debug!(%key, objects = hit.len(), "listing served from cache");
            return Ok(hit.as_ref().clone());
        }
        let objs = self.inner.fetch(scope, cancel).await?;
        self.cache.set(key, Arc::new(objs.clone()));
        Ok(objs)
    }
}

/// Reads a JSON array of [`CloudObject`]s from disk on every fetch.
#[derive(Clone, Debug)]
pub struct FileFetcher {
    path: PathBuf,
}

impl FileFetcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> anyhow::Result<Vec<CloudObject>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("reading {}", self.path.display()))?;
        let objs: Vec<CloudObject> = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing {} as a JSON array of objects", self.path.display()))?;
        Ok(objs)
    }
}

#[async_trait]
impl Fetcher for FileFetcher {
    async fn fetch(&self, scope: &Scope, cancel: &CancellationToken) -> Result<Vec<CloudObject>, ProviderError> {
        let objs = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            res = self.load() => res.map_err(ProviderError::Fetch)?,
        };
        let total = objs.len();
        let kept: Vec<CloudObject> = objs.into_iter().filter(|o| in_scope(o, scope)).collect();
        counter!("provider_file_reads_total", 1u64);
        debug!(path = %self.path.display(), %scope, total, kept = kept.len(), "file listing loaded");
        Ok(kept)
    }
}

/// In-memory source with swappable responses.
pub struct StaticFetcher {
    response: Mutex<Result<Vec<CloudObject>, String>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl Default for StaticFetcher {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl StaticFetcher {
    pub fn new(objs: Vec<CloudObject>) -> Self {
        Self { response: Mutex::new(Ok(objs)), delay: Mutex::new(None), calls: AtomicUsize::new(0) }
    }

    pub fn set_objects(&self, objs: Vec<CloudObject>) {
        *self.response.lock() = Ok(objs);
    }

    /// Every following fetch fails with `msg` until `set_objects` is called again.
    pub fn fail_with(&self, msg: impl Into<String>) {
        *self.response.lock() = Err(msg.into());
    }

    /// Simulated latency; a fetch cancelled while waiting returns `Cancelled`.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, scope: &Scope, cancel: &CancellationToken) -> Result<Vec<CloudObject>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        let response = self.response.lock().clone();
        match response {
            Ok(objs) => Ok(objs.into_iter().filter(|o| in_scope(o, scope)).collect()),
            Err(msg) => Err(ProviderError::Fetch(anyhow!(msg))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_membership() {
        let obj = CloudObject::new("i-1", "us-east-1");
        let global = CloudObject::new("bucket", "");
        assert!(in_scope(&obj, &Scope::all()));
        assert!(in_scope(&obj, &Scope::new("us-east-1")));
        assert!(!in_scope(&obj, &Scope::new("eu-west-1")));
        assert!(in_scope(&global, &Scope::new("eu-west-1")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn static_fetcher_scripted_failure() {
        let f = StaticFetcher::new(vec![CloudObject::new("a", "r1")]);
        let cancel = CancellationToken::new();
        assert_eq!(f.fetch(&Scope::all(), &cancel).await.unwrap().len(), 1);
        f.fail_with("boom");
        let err = f.fetch(&Scope::all(), &cancel).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert_eq!(f.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn static_fetcher_honours_cancel_during_delay() {
        let f = StaticFetcher::new(vec![]);
        f.set_delay(Some(Duration::from_secs(30)));
        let cancel = CancellationToken::new();
        let c2 = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            c2.cancel();
        });
        let res = f.fetch(&Scope::all(), &cancel).await;
        assert!(matches!(res, Err(ProviderError::Cancelled)));
    }
}
