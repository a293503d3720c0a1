//! Resource Queries Module
//!
//! Preconfigured cached queries for each kind of marketplace data: the key
//! template, TTL and persistence policy live here so call sites only supply
//! an id and a fetcher.

mod avatar;
mod models;

pub use avatar::{AvatarBlob, AvatarLoader, AvatarView, BlobFetcher, HttpBlobFetcher, ObjectUrl, ObjectUrlRegistry};
pub use models::{ConversationSummary, Message, Post, Profile};

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::cache::namespaced_key;
use crate::error::{FetchError, Result};
use crate::query::{Cacheable, CachedQuery, CachedQueryBuilder, QueryClient};

// == Resource Kind ==
/// Kinds of cached marketplace data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Messages of one conversation
    Messages,
    /// A single listing
    Post,
    /// A filtered list of listings
    PostList,
    /// A single user profile
    Profile,
    /// A user's conversation summaries
    Conversations,
    /// Avatar image bytes
    Avatar,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Messages,
        ResourceKind::Post,
        ResourceKind::PostList,
        ResourceKind::Profile,
        ResourceKind::Conversations,
        ResourceKind::Avatar,
    ];

    /// Cache namespace.
    pub fn namespace(self) -> &'static str {
        match self {
            ResourceKind::Messages => "messages",
            ResourceKind::Post => "posts",
            ResourceKind::PostList => "postLists",
            ResourceKind::Profile => "profiles",
            ResourceKind::Conversations => "conversations",
            ResourceKind::Avatar => "avatars",
        }
    }

    /// Entry lifetime.
    pub fn ttl(self) -> Duration {
        match self {
            ResourceKind::Messages => Duration::from_secs(10 * 60),
            ResourceKind::Post => Duration::from_secs(5 * 60),
            ResourceKind::PostList => Duration::from_secs(2 * 60),
            ResourceKind::Profile => Duration::from_secs(15 * 60),
            ResourceKind::Conversations => Duration::from_secs(5 * 60),
            ResourceKind::Avatar => Duration::from_secs(30 * 60),
        }
    }

    /// Whether entries are mirrored into session storage. Avatar blobs stay
    /// in memory.
    pub fn persist(self) -> bool {
        !matches!(self, ResourceKind::Avatar)
    }

    /// Cache key for `id`.
    pub fn key(self, id: impl Display) -> String {
        namespaced_key(self.namespace(), id)
    }

    /// Query builder preset with this kind's key, TTL and persistence.
    pub fn query<T: Cacheable>(self, client: &QueryClient, id: impl Display) -> CachedQueryBuilder<T> {
        CachedQuery::builder(client, self.key(id))
            .ttl(self.ttl())
            .persist(self.persist())
    }
}

// == Typed Constructors ==
/// Messages of `conversation_id`.
pub fn messages_query<F, Fut>(
    client: &QueryClient,
    conversation_id: &str,
    fetcher: F,
) -> Result<CachedQuery<Vec<Message>>>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Vec<Message>, FetchError>> + Send + 'static,
{
    ResourceKind::Messages
        .query(client, conversation_id)
        .enabled(!conversation_id.is_empty())
        .fetcher(fetcher)
        .build()
}

/// A single listing.
pub fn post_query<F, Fut>(client: &QueryClient, post_id: &str, fetcher: F) -> Result<CachedQuery<Post>>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Post, FetchError>> + Send + 'static,
{
    ResourceKind::Post
        .query(client, post_id)
        .enabled(!post_id.is_empty())
        .fetcher(fetcher)
        .build()
}

/// Listings matching a filter; `filter_key` is a stable encoding of the
/// filter (search text, tags, price range).
pub fn post_list_query<F, Fut>(
    client: &QueryClient,
    filter_key: &str,
    fetcher: F,
) -> Result<CachedQuery<Vec<Post>>>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Vec<Post>, FetchError>> + Send + 'static,
{
    ResourceKind::PostList.query(client, filter_key).fetcher(fetcher).build()
}

/// A single profile.
pub fn profile_query<F, Fut>(client: &QueryClient, user_id: &str, fetcher: F) -> Result<CachedQuery<Profile>>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Profile, FetchError>> + Send + 'static,
{
    ResourceKind::Profile
        .query(client, user_id)
        .enabled(!user_id.is_empty())
        .fetcher(fetcher)
        .build()
}

/// Conversation summaries of `user_id`.
pub fn conversations_query<F, Fut>(
    client: &QueryClient,
    user_id: &str,
    fetcher: F,
) -> Result<CachedQuery<Vec<ConversationSummary>>>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Vec<ConversationSummary>, FetchError>> + Send + 'static,
{
    ResourceKind::Conversations
        .query(client, user_id)
        .enabled(!user_id.is_empty())
        .fetcher(fetcher)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, CacheManager};
    use crate::storage::MemoryStorage;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn message(id: &str) -> Message {
        Message {
            id: id.to_string(),
            conversation_id: "A".to_string(),
            sender_id: "u1".to_string(),
            content: format!("hello {id}"),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            read: false,
        }
    }

    #[test]
    fn test_keys_and_policies() {
        assert_eq!(ResourceKind::Messages.key("A"), "messages:A");
        assert_eq!(ResourceKind::PostList.key("tag=lamp"), "postLists:tag=lamp");
        assert!(ResourceKind::Profile.persist());
        assert!(!ResourceKind::Avatar.persist());

        let namespaces: Vec<_> = ResourceKind::ALL.iter().map(|k| k.namespace()).collect();
        let mut unique = namespaces.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), namespaces.len());
    }

    #[tokio::test]
    async fn test_messages_persist_across_reload() {
        let storage = MemoryStorage::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let fetch = {
            let calls = Arc::clone(&calls);
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(vec![message("m1"), message("m2")]) }
            }
        };

        let client = QueryClient::new(Arc::new(CacheManager::with_storage(
            Arc::new(storage.clone()),
            CacheConfig::default(),
        )));
        messages_query(&client, "A", fetch.clone())
            .unwrap()
            .load()
            .await;
        drop(client);

        let reloaded = QueryClient::new(Arc::new(CacheManager::with_storage(
            Arc::new(storage),
            CacheConfig::default(),
        )));
        let state = messages_query(&reloaded, "A", fetch).unwrap().load().await;

        assert!(state.is_from_cache);
        assert_eq!(state.data, Some(vec![message("m1"), message("m2")]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_id_disables_query() {
        let client = QueryClient::in_memory();
        let query = profile_query(&client, "", || async {
            Err::<Profile, _>(FetchError::new("should not run"))
        })
        .unwrap();

        let state = query.load().await;
        assert!(state.error.is_none());
        assert!(state.data.is_none());
    }

    #[tokio::test]
    async fn test_post_list_uses_short_ttl() {
        let client = QueryClient::in_memory();
        post_list_query(&client, "recent", || async { Ok(Vec::<Post>::new()) })
            .unwrap()
            .load()
            .await;

        let remaining = client.cache().ttl_remaining("postLists:recent").unwrap();
        assert!(remaining <= ResourceKind::PostList.ttl());
        assert!(remaining > Duration::from_secs(60));
    }
}
