use dashmap::DashMap;
use groupwatch_client::PagedFetcher;
use groupwatch_core::{CacheConfig, GroupId, PlatformApi};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Ally group id to ally group name.
pub type AllyMap = BTreeMap<GroupId, String>;

#[derive(Debug)]
struct CachedAllies {
    allies: Arc<AllyMap>,
    fetched_at: Instant,
}

/// Allies of each group seen so far, shared across scans in one process.
///
/// Only complete listings are stored. A listing cut short by a failed page
/// is used for the current lookup and fetched again next time.
#[derive(Debug, Clone, Default)]
pub struct AllyCache {
    entries: Arc<DashMap<GroupId, CachedAllies>>,
    max_age: Option<Duration>,
}

impl AllyCache {
    /// `max_age` of `None` keeps entries for the life of the cache.
    pub fn new(max_age: Option<Duration>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            max_age,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ally_max_age())
    }

    pub fn get(&self, group: GroupId) -> Option<Arc<AllyMap>> {
        let stale = match self.entries.get(&group) {
            Some(entry) if !self.is_stale(&entry) => return Some(entry.allies.clone()),
            Some(_) => true,
            None => false,
        };
        if stale {
            debug!("Ally cache entry for group {} expired", group);
            self.entries.remove(&group);
        }
        None
    }

    pub fn insert(&self, group: GroupId, allies: AllyMap) -> Arc<AllyMap> {
        let allies = Arc::new(allies);
        self.entries.insert(
            group,
            CachedAllies {
                allies: allies.clone(),
                fetched_at: Instant::now(),
            },
        );
        allies
    }

    /// Drop one group's entry. Returns whether it was cached.
    pub fn invalidate(&self, group: GroupId) -> bool {
        self.entries.remove(&group).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached allies of `group`, fetching every page on a miss.
    pub async fn get_or_fetch(
        &self,
        group: GroupId,
        api: &dyn PlatformApi,
        fetcher: &PagedFetcher,
    ) -> Arc<AllyMap> {
        if let Some(hit) = self.get(group) {
            return hit;
        }

        let what = format!("allies of group {}", group);
        let listing = fetcher
            .fetch_all(&what, None, |page| api.get_allies(group, page))
            .await;
        let complete = listing.is_complete();
        let allies: AllyMap = listing
            .into_items()
            .into_iter()
            .map(|ally| (ally.id, ally.name))
            .collect();

        if complete {
            debug!("Cached {} allies of group {}", allies.len(), group);
            self.insert(group, allies)
        } else {
            warn!(
                "Allies of group {} incomplete ({} fetched), not caching",
                group,
                allies.len()
            );
            Arc::new(allies)
        }
    }

    fn is_stale(&self, entry: &CachedAllies) -> bool {
        self.max_age
            .is_some_and(|max_age| entry.fetched_at.elapsed() > max_age)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allies(ids: &[u64]) -> AllyMap {
        ids.iter()
            .map(|&id| (GroupId(id), format!("g{}", id)))
            .collect()
    }

    #[test]
    fn insert_then_get() {
        let cache = AllyCache::new(None);
        assert!(cache.get(GroupId(1)).is_none());
        cache.insert(GroupId(1), allies(&[2, 3]));
        let hit = cache.get(GroupId(1)).unwrap();
        assert_eq!(hit.len(), 2);
        assert!(hit.contains_key(&GroupId(3)));
    }

    #[test]
    fn invalidate_and_clear() {
        let cache = AllyCache::new(None);
        cache.insert(GroupId(1), allies(&[2]));
        cache.insert(GroupId(5), allies(&[]));
        assert!(cache.invalidate(GroupId(1)));
        assert!(!cache.invalidate(GroupId(1)));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn entries_expire_after_max_age() {
        let cache = AllyCache::new(Some(Duration::ZERO));
        cache.insert(GroupId(1), allies(&[2]));
        std::thread::sleep(Duration::from_millis(2));
        assert!(cache.get(GroupId(1)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn clones_share_entries() {
        let cache = AllyCache::new(None);
        let other = cache.clone();
        cache.insert(GroupId(9), allies(&[10]));
        assert!(other.get(GroupId(9)).is_some());
    }
}
