//! Realtime Invalidation Module
//!
//! Translates backend row-change notifications into cache invalidations and
//! rebroadcasts them so mounted queries can refetch.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::cache::{in_namespace, namespaced_key, CacheManager};
use crate::resources::ResourceKind;

const BROADCAST_CAPACITY: usize = 256;

// == Row Change ==
/// Kind of change reported for a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeEvent {
    Insert,
    Update,
    Delete,
}

/// A row-change notification from the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowChange {
    /// Table the row belongs to
    pub table: String,
    /// What happened to the row
    #[serde(rename = "eventType", alias = "event")]
    pub event: ChangeEvent,
    /// Row after the change (empty for deletes)
    #[serde(default, rename = "new")]
    pub record: Value,
    /// Row before the change, when the backend sends it
    #[serde(default, rename = "old")]
    pub old_record: Value,
}

impl RowChange {
    /// Builds a change for `table` with the given row.
    pub fn new(table: impl Into<String>, event: ChangeEvent, record: Value) -> Self {
        Self {
            table: table.into(),
            event,
            record,
            old_record: Value::Null,
        }
    }

    /// Reads `field` as an identifier from the new row, falling back to the
    /// old row. Numbers and strings are accepted.
    pub fn field(&self, field: &str) -> Option<String> {
        [&self.record, &self.old_record]
            .into_iter()
            .find_map(|row| id_value(row.get(field)?))
    }

    /// Every distinct value of `field` across the new and old rows.
    fn field_values(&self, field: &str) -> Vec<String> {
        let mut values = Vec::new();
        for row in [&self.record, &self.old_record] {
            if let Some(value) = row.get(field).and_then(id_value) {
                if !values.contains(&value) {
                    values.push(value);
                }
            }
        }
        values
    }
}

fn id_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// == Invalidation ==
/// One cache invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "lowercase")]
pub enum Invalidation {
    /// A single key
    Key(String),
    /// Every key in a namespace
    Namespace(String),
}

impl Invalidation {
    /// True when this invalidation covers `key`.
    pub fn affects(&self, key: &str) -> bool {
        match self {
            Invalidation::Key(k) => k == key,
            Invalidation::Namespace(ns) => in_namespace(key, ns),
        }
    }

    /// Applies the invalidation to `cache`, returning the number of entries
    /// removed.
    pub fn apply(&self, cache: &CacheManager) -> usize {
        match self {
            Invalidation::Key(key) => usize::from(cache.delete(key)),
            Invalidation::Namespace(ns) => cache.clear_namespace(ns),
        }
    }
}

impl fmt::Display for Invalidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invalidation::Key(key) => write!(f, "key {key}"),
            Invalidation::Namespace(ns) => write!(f, "namespace {ns}"),
        }
    }
}

// == Invalidation Router ==
/// Maps row changes to cache invalidations.
pub struct InvalidationRouter {
    cache: Arc<CacheManager>,
    events: broadcast::Sender<Invalidation>,
}

impl InvalidationRouter {
    pub fn new(cache: Arc<CacheManager>) -> Self {
        let (events, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { cache, events }
    }

    /// Receiver of every invalidation the router applies.
    pub fn subscribe(&self) -> broadcast::Receiver<Invalidation> {
        self.events.subscribe()
    }

    /// Invalidations a row change calls for. Unknown tables map to none.
    pub fn plan(change: &RowChange) -> Vec<Invalidation> {
        let mut plan = Vec::new();
        let key = |kind: ResourceKind, id: &str| Invalidation::Key(namespaced_key(kind.namespace(), id));
        let namespace = |kind: ResourceKind| Invalidation::Namespace(kind.namespace().to_string());

        match change.table.as_str() {
            "messages" => {
                for conversation in change.field_values("conversation_id") {
                    plan.push(key(ResourceKind::Messages, &conversation));
                }
                plan.push(namespace(ResourceKind::Conversations));
            }
            "posts" => {
                if let Some(id) = change.field("id") {
                    plan.push(key(ResourceKind::Post, &id));
                }
                plan.push(namespace(ResourceKind::PostList));
            }
            "post_tags" | "tags" => {
                if let Some(id) = change.field("post_id") {
                    plan.push(key(ResourceKind::Post, &id));
                }
                plan.push(namespace(ResourceKind::PostList));
            }
            "profiles" => {
                if let Some(id) = change.field("id") {
                    plan.push(key(ResourceKind::Profile, &id));
                }
                for url in change.field_values("avatar_url") {
                    plan.push(key(ResourceKind::Avatar, &url));
                }
            }
            "conversations" | "conversation_participants" => {
                plan.push(namespace(ResourceKind::Conversations));
            }
            other => debug!("No cache invalidation for table '{}'", other),
        }

        plan
    }

    /// Applies the invalidations for `change` and broadcasts each one.
    pub fn apply(&self, change: &RowChange) -> Vec<Invalidation> {
        let plan = Self::plan(change);
        for invalidation in &plan {
            let removed = invalidation.apply(&self.cache);
            info!(
                "Realtime {:?} on '{}': invalidated {} ({} entries)",
                change.event, change.table, invalidation, removed
            );
            // No subscribers is fine
            let _ = self.events.send(invalidation.clone());
        }
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SetOptions;
    use serde_json::json;

    fn router_with(keys: &[&str]) -> (Arc<CacheManager>, InvalidationRouter) {
        let cache = Arc::new(CacheManager::default());
        for key in keys {
            cache.set(*key, 1u32, SetOptions::default());
        }
        let router = InvalidationRouter::new(Arc::clone(&cache));
        (cache, router)
    }

    #[test]
    fn test_row_change_deserialize() {
        let change: RowChange = serde_json::from_value(json!({
            "table": "messages",
            "eventType": "INSERT",
            "new": {"id": 10, "conversation_id": "A"}
        }))
        .unwrap();
        assert_eq!(change.event, ChangeEvent::Insert);
        assert_eq!(change.field("conversation_id").as_deref(), Some("A"));
        assert_eq!(change.field("id").as_deref(), Some("10"));
        assert!(change.old_record.is_null());
    }

    #[test]
    fn test_message_insert_invalidates_thread_and_summaries() {
        let (cache, router) = router_with(&[
            "messages:A",
            "messages:B",
            "conversations:u1",
            "profiles:u1",
        ]);
        let change = RowChange::new(
            "messages",
            ChangeEvent::Insert,
            json!({"conversation_id": "A"}),
        );

        let applied = router.apply(&change);

        assert_eq!(
            applied,
            vec![
                Invalidation::Key("messages:A".into()),
                Invalidation::Namespace("conversations".into()),
            ]
        );
        assert!(!cache.has("messages:A"));
        assert!(cache.has("messages:B"));
        assert!(!cache.has("conversations:u1"));
        assert!(cache.has("profiles:u1"));
    }

    #[test]
    fn test_post_delete_uses_old_row() {
        let (cache, router) = router_with(&["posts:7", "postLists:recent", "posts:8"]);
        let mut change = RowChange::new("posts", ChangeEvent::Delete, Value::Null);
        change.old_record = json!({"id": 7});

        router.apply(&change);

        assert!(!cache.has("posts:7"));
        assert!(!cache.has("postLists:recent"));
        assert!(cache.has("posts:8"));
    }

    #[test]
    fn test_profile_update_drops_old_and_new_avatar() {
        let (cache, router) = router_with(&["profiles:42", "avatars:old.png", "avatars:new.png"]);
        let mut change = RowChange::new(
            "profiles",
            ChangeEvent::Update,
            json!({"id": 42, "avatar_url": "new.png"}),
        );
        change.old_record = json!({"id": 42, "avatar_url": "old.png"});

        router.apply(&change);

        assert!(cache.is_empty());
    }

    #[test]
    fn test_unknown_table_is_noop() {
        let (cache, router) = router_with(&["posts:1"]);
        let change = RowChange::new("audit_log", ChangeEvent::Insert, json!({"id": 1}));

        assert!(router.apply(&change).is_empty());
        assert!(cache.has("posts:1"));
    }

    #[tokio::test]
    async fn test_invalidations_are_broadcast() {
        let (_cache, router) = router_with(&[]);
        let mut rx = router.subscribe();

        router.apply(&RowChange::new(
            "conversations",
            ChangeEvent::Update,
            json!({"id": "c1"}),
        ));

        assert_eq!(
            rx.recv().await.unwrap(),
            Invalidation::Namespace("conversations".into())
        );
    }

    #[test]
    fn test_invalidation_affects() {
        assert!(Invalidation::Key("posts:1".into()).affects("posts:1"));
        assert!(!Invalidation::Key("posts:1".into()).affects("posts:10"));
        assert!(Invalidation::Namespace("posts".into()).affects("posts:10"));
        assert!(!Invalidation::Namespace("posts".into()).affects("postLists:all"));
    }

    #[test]
    fn test_invalidation_serialize() {
        let json = serde_json::to_value(Invalidation::Namespace("posts".into())).unwrap();
        assert_eq!(json, json!({"kind": "namespace", "target": "posts"}));
    }
}
