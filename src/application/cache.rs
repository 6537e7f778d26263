use dashmap::DashMap;

use crate::domain::{LinkStatus, PlatformUserId};

/// In-process cache of resolved link statuses.
///
/// Backed by a sharded map: lookups for different ids do not contend, and
/// racing writers for the same id simply overwrite each other.
#[derive(Debug, Default)]
pub struct LinkStatusCache {
    entries: DashMap<PlatformUserId, LinkStatus>,
}

impl LinkStatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: PlatformUserId) -> Option<LinkStatus> {
        self.entries.get(&id).map(|entry| entry.value().clone())
    }

    pub fn set(&self, id: PlatformUserId, status: LinkStatus) {
        self.entries.insert(id, status);
    }

    /// Drop the entry for one user, e.g. after their account was merged.
    pub fn clear(&self, id: PlatformUserId) -> Option<LinkStatus> {
        self.entries.remove(&id).map(|(_, status)| status)
    }

    pub fn clear_all(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LinkedIdentityId;
    use std::sync::Arc;

    fn uid(raw: i64) -> PlatformUserId {
        PlatformUserId::new(raw).unwrap()
    }

    #[test]
    fn test_set_get_clear() {
        let cache = LinkStatusCache::new();
        assert!(cache.get(uid(1)).is_none());

        cache.set(uid(1), LinkStatus::Unlinked);
        cache.set(
            uid(2),
            LinkStatus::Linked(LinkedIdentityId::new("auth-2")),
        );
        assert_eq!(cache.get(uid(1)), Some(LinkStatus::Unlinked));
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.clear(uid(1)), Some(LinkStatus::Unlinked));
        assert!(cache.get(uid(1)).is_none());
        assert!(cache.get(uid(2)).is_some());

        cache.clear_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_last_write_wins() {
        let cache = LinkStatusCache::new();
        cache.set(uid(9), LinkStatus::Unlinked);
        cache.set(
            uid(9),
            LinkStatus::Linked(LinkedIdentityId::new("auth-9")),
        );
        assert!(cache.get(uid(9)).unwrap().is_linked());
    }

    #[test]
    fn test_concurrent_writers_for_distinct_ids() {
        let cache = Arc::new(LinkStatusCache::new());
        let handles: Vec<_> = (1..=8)
            .map(|raw| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        cache.set(uid(raw), LinkStatus::Unlinked);
                        assert!(cache.get(uid(raw)).is_some());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 8);
    }
}
