//! Avatar images: remote URL → cached blob → revocable local object URL.
//!
//! Blobs are cached in memory under `avatars:<url>`. Each consumer gets its
//! own [`ObjectUrl`], which is revoked when dropped, so an avatar view that
//! unmounts or switches source never leaks registered blobs.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FetchError;
use crate::query::QueryClient;
use crate::resources::ResourceKind;

const OBJECT_URL_SCHEME: &str = "blob:repacked/";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

// == Avatar Blob ==
/// Raw avatar image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarBlob {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

// == Blob Fetcher ==
/// Downloads avatar images.
pub trait BlobFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> BoxFuture<'static, Result<AvatarBlob, FetchError>>;
}

/// [`BlobFetcher`] over HTTP.
#[derive(Debug, Clone, Default)]
pub struct HttpBlobFetcher {
    client: reqwest::Client,
}

impl HttpBlobFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl BlobFetcher for HttpBlobFetcher {
    fn fetch(&self, url: &str) -> BoxFuture<'static, Result<AvatarBlob, FetchError>> {
        let request = self.client.get(url);
        async move {
            let response = request.send().await?.error_for_status()?;
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or(FALLBACK_CONTENT_TYPE)
                .to_string();
            let bytes = response.bytes().await?.to_vec();
            Ok(AvatarBlob {
                content_type,
                bytes,
            })
        }
        .boxed()
    }
}

// == Object URL Registry ==
#[derive(Debug, Default)]
struct RegistryInner {
    blobs: HashMap<String, AvatarBlob>,
    next_id: u64,
}

/// Local URLs standing in for in-memory blobs.
#[derive(Debug, Clone, Default)]
pub struct ObjectUrlRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `blob` and returns the guard owning its URL.
    pub fn create(&self, blob: AvatarBlob) -> ObjectUrl {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let url = format!("{OBJECT_URL_SCHEME}{}", inner.next_id);
        inner.blobs.insert(url.clone(), blob);
        ObjectUrl {
            url,
            registry: self.clone(),
        }
    }

    /// Blob behind a live URL.
    pub fn resolve(&self, url: &str) -> Option<AvatarBlob> {
        self.inner.lock().blobs.get(url).cloned()
    }

    /// Number of URLs not yet revoked.
    pub fn live_count(&self) -> usize {
        self.inner.lock().blobs.len()
    }

    fn revoke(&self, url: &str) {
        if self.inner.lock().blobs.remove(url).is_some() {
            debug!("Revoked object URL {}", url);
        }
    }
}

/// A registered object URL; revoked on drop.
pub struct ObjectUrl {
    url: String,
    registry: ObjectUrlRegistry,
}

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl fmt::Debug for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectUrl").field(&self.url).finish()
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        self.registry.revoke(&self.url);
    }
}

// == Avatar Loader ==
/// Resolves avatar URLs through the cache into object URLs.
#[derive(Clone)]
pub struct AvatarLoader {
    client: QueryClient,
    fetcher: Arc<dyn BlobFetcher>,
    registry: ObjectUrlRegistry,
}

impl AvatarLoader {
    pub fn new(client: QueryClient, fetcher: Arc<dyn BlobFetcher>, registry: ObjectUrlRegistry) -> Self {
        Self {
            client,
            fetcher,
            registry,
        }
    }

    pub fn registry(&self) -> &ObjectUrlRegistry {
        &self.registry
    }

    /// Returns an object URL for the avatar at `source_url`, downloading it
    /// only when no live cached blob exists.
    pub async fn load(&self, source_url: &str) -> Result<ObjectUrl, FetchError> {
        let fetcher = Arc::clone(&self.fetcher);
        let url = source_url.to_string();
        let query = ResourceKind::Avatar
            .query::<AvatarBlob>(&self.client, source_url)
            .fetcher(move || fetcher.fetch(&url))
            .build()
            .map_err(|e| FetchError::new(e.to_string()))?;

        let state = query.load().await;
        if let Some(error) = state.error {
            return Err(error);
        }
        let blob = state
            .data
            .ok_or_else(|| FetchError::new(format!("no avatar data for '{source_url}'")))?;
        Ok(self.registry.create(blob))
    }
}

// == Avatar View ==
/// Holds the object URL of whatever avatar is currently shown.
///
/// Switching the source or dropping the view revokes the previous URL.
pub struct AvatarView {
    loader: AvatarLoader,
    current: Option<(String, ObjectUrl)>,
}

impl AvatarView {
    pub fn new(loader: AvatarLoader) -> Self {
        Self {
            loader,
            current: None,
        }
    }

    /// Shows the avatar at `source`, or nothing for `None` / empty.
    ///
    /// Setting the same source again keeps the current URL.
    pub async fn set_source(&mut self, source: Option<&str>) -> Result<Option<&str>, FetchError> {
        let source = source.filter(|s| !s.is_empty());
        let unchanged = self.source() == source && self.current.is_some();
        if unchanged {
            return Ok(self.object_url());
        }

        self.current = None;
        let Some(source) = source else {
            return Ok(None);
        };

        let object_url = self.loader.load(source).await?;
        self.current = Some((source.to_string(), object_url));
        Ok(self.object_url())
    }

    /// Source URL currently shown.
    pub fn source(&self) -> Option<&str> {
        self.current.as_ref().map(|(source, _)| source.as_str())
    }

    /// Object URL currently shown.
    pub fn object_url(&self) -> Option<&str> {
        self.current.as_ref().map(|(_, url)| url.as_str())
    }

    /// Releases the current object URL.
    pub fn unmount(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, CacheManager, SetOptions};
    use crate::storage::MemoryStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeFetcher {
        calls: AtomicUsize,
    }

    impl BlobFetcher for FakeFetcher {
        fn fetch(&self, url: &str) -> BoxFuture<'static, Result<AvatarBlob, FetchError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let url = url.to_string();
            async move {
                if url.contains("missing") {
                    return Err(FetchError::new("404 Not Found"));
                }
                Ok(AvatarBlob {
                    content_type: "image/png".to_string(),
                    bytes: url.into_bytes(),
                })
            }
            .boxed()
        }
    }

    fn loader() -> (AvatarLoader, Arc<FakeFetcher>) {
        let fetcher = Arc::new(FakeFetcher {
            calls: AtomicUsize::new(0),
        });
        let loader = AvatarLoader::new(
            QueryClient::in_memory(),
            fetcher.clone(),
            ObjectUrlRegistry::new(),
        );
        (loader, fetcher)
    }

    #[test]
    fn test_object_url_revoked_on_drop() {
        let registry = ObjectUrlRegistry::new();
        let blob = AvatarBlob {
            content_type: "image/png".to_string(),
            bytes: vec![1, 2, 3],
        };
        let url = registry.create(blob.clone());
        let name = url.as_str().to_string();
        assert!(name.starts_with(OBJECT_URL_SCHEME));
        assert_eq!(registry.resolve(&name), Some(blob));

        drop(url);
        assert!(registry.resolve(&name).is_none());
        assert_eq!(registry.live_count(), 0);
    }

    #[tokio::test]
    async fn test_loader_caches_blob() {
        let (loader, fetcher) = loader();

        let first = loader.load("https://cdn/a.png").await.unwrap();
        let second = loader.load("https://cdn/a.png").await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_ne!(first.as_str(), second.as_str());
        assert_eq!(loader.registry().live_count(), 2);
    }

    #[tokio::test]
    async fn test_avatar_blobs_are_memory_only() {
        let storage = MemoryStorage::new();
        let cache = Arc::new(CacheManager::with_storage(
            Arc::new(storage.clone()),
            CacheConfig::default(),
        ));
        let fetcher = Arc::new(FakeFetcher {
            calls: AtomicUsize::new(0),
        });
        let loader = AvatarLoader::new(QueryClient::new(Arc::clone(&cache)), fetcher, ObjectUrlRegistry::new());

        let _url = loader.load("https://cdn/a.png").await.unwrap();

        assert!(cache.has("avatars:https://cdn/a.png"));
        assert!(storage.is_empty());

        // Persisted resources still reach the same storage
        cache.set("profiles:1", 1u32, SetOptions::default().persisted());
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn test_view_revokes_on_source_change_and_drop() {
        let (loader, fetcher) = loader();
        let registry = loader.registry().clone();
        let mut view = AvatarView::new(loader);

        let first = view.set_source(Some("https://cdn/a.png")).await.unwrap().map(str::to_string);
        assert!(first.is_some());
        assert_eq!(registry.live_count(), 1);

        // Same source keeps the URL
        let again = view.set_source(Some("https://cdn/a.png")).await.unwrap().map(str::to_string);
        assert_eq!(again, first);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        view.set_source(Some("https://cdn/b.png")).await.unwrap();
        assert_eq!(registry.live_count(), 1);
        assert!(registry.resolve(first.as_deref().unwrap()).is_none());

        drop(view);
        assert_eq!(registry.live_count(), 0);
    }

    #[tokio::test]
    async fn test_view_clear_source() {
        let (loader, _) = loader();
        let registry = loader.registry().clone();
        let mut view = AvatarView::new(loader);

        view.set_source(Some("https://cdn/a.png")).await.unwrap();
        assert_eq!(view.set_source(None).await.unwrap(), None);
        assert_eq!(registry.live_count(), 0);
        assert!(view.source().is_none());
    }

    #[tokio::test]
    async fn test_fetch_failure_surfaces() {
        let (loader, _) = loader();
        let mut view = AvatarView::new(loader);

        let err = view.set_source(Some("https://cdn/missing.png")).await.unwrap_err();
        assert!(err.message().contains("404"));
        assert!(view.object_url().is_none());
    }
}
