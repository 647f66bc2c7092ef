use crate::ally_cache::{AllyCache, AllyMap};
use groupwatch_client::PagedFetcher;
use groupwatch_core::{
    AllyCluster, GroupId, GroupMembership, Identity, MembershipSet, PlatformApi, Relation,
    ScanResult, WatchList,
};
use std::sync::Arc;

/// Memberships in watch-list groups, in membership order.
pub fn core_matches(memberships: &MembershipSet, watch_list: &WatchList) -> Vec<GroupMembership> {
    memberships
        .iter()
        .filter(|m| watch_list.contains(m.group_id))
        .cloned()
        .collect()
}

/// Memberships in any group of `allies`, in membership order.
pub fn ally_matches(memberships: &MembershipSet, allies: &AllyMap) -> Vec<GroupMembership> {
    memberships
        .iter()
        .filter(|m| allies.contains_key(&m.group_id))
        .cloned()
        .collect()
}

/// Matches one person's memberships against the watch list and the allies
/// of every matched watch-list group.
pub struct Intersector {
    api: Arc<dyn PlatformApi>,
    fetcher: PagedFetcher,
    cache: AllyCache,
}

impl Intersector {
    pub fn new(api: Arc<dyn PlatformApi>, fetcher: PagedFetcher, cache: AllyCache) -> Self {
        Self {
            api,
            fetcher,
            cache,
        }
    }

    pub fn cache(&self) -> &AllyCache {
        &self.cache
    }

    pub async fn allies_of(&self, group: GroupId) -> Arc<AllyMap> {
        self.cache
            .get_or_fetch(group, self.api.as_ref(), &self.fetcher)
            .await
    }

    /// Returns a result when the memberships hit the watch list, or, with a
    /// `scanned_group`, when they hit that group's allies.
    ///
    /// Ally memberships are listed once per cluster; a group allied to two
    /// matched watch-list groups appears twice in `ally_groups`.
    pub async fn intersect(
        &self,
        identity: &Identity,
        relation: Relation,
        memberships: &MembershipSet,
        watch_list: &WatchList,
        scanned_group: Option<GroupId>,
    ) -> Option<ScanResult> {
        if memberships.is_empty() {
            return None;
        }

        let core_groups = core_matches(memberships, watch_list);
        let scanned_group_allies = match scanned_group {
            Some(group) => ally_matches(memberships, &*self.allies_of(group).await),
            None => Vec::new(),
        };
        if core_groups.is_empty() && scanned_group_allies.is_empty() {
            return None;
        }

        let mut clusters = Vec::with_capacity(core_groups.len());
        for core in &core_groups {
            let allies = self.allies_of(core.group_id).await;
            clusters.push(AllyCluster {
                core: core.clone(),
                allies: ally_matches(memberships, &allies),
            });
        }
        let ally_groups = clusters
            .iter()
            .flat_map(|cluster| cluster.allies.iter().cloned())
            .collect();

        Some(ScanResult {
            identity: identity.clone(),
            relation,
            core_groups,
            ally_groups,
            clusters,
            scanned_group_allies,
            profile: None,
            avatar_url: None,
        })
    }
}
