use crate::ally_cache::AllyCache;
use crate::intersect::Intersector;
use crate::report::{ScanReport, ScanSubject};
use crate::resolver::Resolver;
use groupwatch_client::{PagedFetcher, RateLimitRetry};
use groupwatch_core::{
    GroupId, GroupInfo, GroupRole, Identity, PlatformApi, Relation, RelationKind, Result,
    ScanConfig, ScanError, ScanResult, Settings, WatchList,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Scan parameters fixed for the lifetime of a `Scanner`.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub watch_list: WatchList,
    pub relations: Vec<RelationKind>,
    /// Per-list cap on friends, followers and followings
    pub relation_cap: Option<usize>,
    /// Per-role cap on roster size
    pub member_cap: Option<usize>,
    pub include_target: bool,
    pub enrich_profiles: bool,
}

impl ScannerConfig {
    pub fn from_scan_config(config: &ScanConfig) -> Self {
        Self {
            watch_list: config.watch_list(),
            relations: config.relations.clone(),
            relation_cap: config.effective_relation_cap(),
            member_cap: config.member_cap,
            include_target: config.include_target,
            enrich_profiles: config.enrich_profiles,
        }
    }
}

/// Which roles of a group to scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleSelection {
    All,
    /// Inclusive positions in the rank-sorted role list
    Indices { from: usize, to: usize },
    /// Inclusive rank bounds
    Ranks { min: u8, max: u8 },
}

impl RoleSelection {
    /// Index range in either order.
    pub fn indices(a: usize, b: usize) -> Self {
        RoleSelection::Indices {
            from: a.min(b),
            to: a.max(b),
        }
    }

    /// Rank range in either order.
    pub fn ranks(a: u8, b: u8) -> Self {
        RoleSelection::Ranks {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Pick roles out of a rank-sorted list.
    pub fn select(&self, roles: &[GroupRole]) -> Result<Vec<GroupRole>> {
        match *self {
            RoleSelection::All => Ok(roles.to_vec()),
            RoleSelection::Indices { from, to } => {
                let (from, to) = (from.min(to), from.max(to));
                if to >= roles.len() {
                    return Err(ScanError::RoleIndexOutOfRange {
                        index: to,
                        count: roles.len(),
                    });
                }
                Ok(roles[from..=to].to_vec())
            }
            RoleSelection::Ranks { min, max } => {
                let (min, max) = (min.min(max), min.max(max));
                let selected: Vec<GroupRole> = roles
                    .iter()
                    .filter(|role| (min..=max).contains(&role.rank))
                    .cloned()
                    .collect();
                if selected.is_empty() {
                    return Err(ScanError::EmptyRankRange { min, max });
                }
                Ok(selected)
            }
        }
    }
}

/// Drives person and group traversals.
///
/// Both are depth one: the subject plus its direct relations, or a group's
/// roster. Work is strictly sequential.
pub struct Scanner {
    api: Arc<dyn PlatformApi>,
    config: ScannerConfig,
    fetcher: PagedFetcher,
    resolver: Resolver,
    intersector: Intersector,
}

impl Scanner {
    pub fn new(
        api: Arc<dyn PlatformApi>,
        config: ScannerConfig,
        fetcher: PagedFetcher,
        cache: AllyCache,
    ) -> Self {
        let resolver = Resolver::new(api.clone(), fetcher.retry().clone());
        let intersector = Intersector::new(api.clone(), fetcher.clone(), cache);
        Self {
            api,
            config,
            fetcher,
            resolver,
            intersector,
        }
    }

    pub fn from_settings(api: Arc<dyn PlatformApi>, settings: &Settings) -> Self {
        Self::new(
            api,
            ScannerConfig::from_scan_config(&settings.scan),
            PagedFetcher::from_config(&settings.paging),
            AllyCache::from_config(&settings.cache),
        )
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn ally_cache(&self) -> &AllyCache {
        self.intersector.cache()
    }

    fn retry(&self) -> &RateLimitRetry {
        self.fetcher.retry()
    }

    pub async fn resolve(&self, input: &str) -> Option<Identity> {
        self.resolver.resolve(input).await
    }

    /// Scan a user and their friends, followers and followings.
    ///
    /// An unresolvable target yields an empty report rather than an error.
    pub async fn scan_user(&self, input: &str) -> Result<ScanReport> {
        self.ensure_watch_list()?;

        let Some(target) = self.resolver.resolve(input).await else {
            info!("Scan target {:?} not found", input);
            return Ok(ScanReport::not_found());
        };
        info!("Scanning {} against {} watched groups", target, self.config.watch_list.len());

        let mut report = ScanReport::for_subject(ScanSubject::User(target.clone()));

        if self.config.include_target {
            self.scan_identity(&mut report, &target, Relation::Target, "target", None)
                .await;
        }

        for &kind in &self.config.relations {
            let what = format!("{} of {}", kind, target);
            let listing = self
                .fetcher
                .fetch_all(&what, self.config.relation_cap, |page| {
                    self.api.get_relations(target.id, kind, page)
                })
                .await;
            report.note_truncated(what, listing.items.len(), &listing.stop);
            info!("Scanning {} {} of {}", listing.items.len(), kind, target);

            for identity in listing.into_items() {
                self.scan_identity(&mut report, &identity, kind.into(), kind.as_str(), None)
                    .await;
            }
        }

        self.log_summary(&report);
        Ok(report)
    }

    /// Roles of a group, lowest rank first.
    pub async fn list_roles(&self, group: GroupId) -> Result<Vec<GroupRole>> {
        let mut roles = self
            .retry()
            .run("group roles", || self.api.get_group_roles(group))
            .await
            .map_err(|e| not_found_as_group(e, group))?;
        if roles.is_empty() {
            return Err(ScanError::NoRoles(group));
        }
        roles.sort_by_key(|role| role.rank);
        Ok(roles)
    }

    pub async fn group_info(&self, group: GroupId) -> Result<GroupInfo> {
        self.retry()
            .run("group lookup", || self.api.get_group(group))
            .await
            .map_err(|e| not_found_as_group(e, group))
    }

    /// Scan the members of the selected roles of a group.
    ///
    /// Members are also matched against the scanned group's own allies.
    pub async fn scan_group(&self, group_id: GroupId, selection: RoleSelection) -> Result<ScanReport> {
        self.ensure_watch_list()?;

        let group = self.group_info(group_id).await?;
        let roles = self.list_roles(group_id).await?;
        let selected = selection.select(&roles)?;
        info!(
            "Scanning {} roles of group {} ({})",
            selected.len(),
            group.name,
            group.id
        );

        let mut report = ScanReport::for_subject(ScanSubject::Group {
            group: group.clone(),
            roles: selected.clone(),
        });

        let mut members = Vec::new();
        for role in &selected {
            let what = format!("members of {} in group {}", role.name, group.id);
            let listing = self
                .fetcher
                .fetch_all(&what, self.config.member_cap, |page| {
                    self.api.get_role_members(group_id, role.id, page)
                })
                .await;
            report.note_truncated(what, listing.items.len(), &listing.stop);
            debug!("{} members at rank {} ({})", listing.items.len(), role.rank, role.name);
            members.extend(listing.into_items().into_iter().map(|member| (member, role)));
        }
        info!("Scanning {} members of group {}", members.len(), group.id);

        for (member, role) in members {
            let relation = Relation::GroupMember {
                role: role.name.clone(),
                rank: role.rank,
            };
            self.scan_identity(&mut report, &member, relation, &role.name, Some(group_id))
                .await;
        }

        self.log_summary(&report);
        Ok(report)
    }

    fn ensure_watch_list(&self) -> Result<()> {
        if self.config.watch_list.is_empty() {
            return Err(ScanError::EmptyWatchList);
        }
        Ok(())
    }

    /// Evaluate one identity. Fetch failures skip it without failing the scan.
    async fn scan_identity(
        &self,
        report: &mut ScanReport,
        identity: &Identity,
        relation: Relation,
        label: &str,
        scanned_group: Option<GroupId>,
    ) {
        report.count_examined(label);

        let memberships = match self
            .retry()
            .run("group memberships", || self.api.get_user_groups(identity.id))
            .await
        {
            Ok(memberships) => memberships,
            Err(e) => {
                warn!("Skipping {}: {}", identity, e);
                report.skipped += 1;
                return;
            }
        };
        report.scanned += 1;

        let Some(mut result) = self
            .intersector
            .intersect(
                identity,
                relation,
                &memberships,
                &self.config.watch_list,
                scanned_group,
            )
            .await
        else {
            return;
        };

        if result.is_alert() {
            info!(
                "Flagged {} ({}): {} watched, {} allied",
                identity,
                result.relation,
                result.core_groups.len(),
                result.ally_groups.len()
            );
        }
        if self.config.enrich_profiles {
            self.enrich(&mut result).await;
        }
        report.results.push(result);
    }

    async fn enrich(&self, result: &mut ScanResult) {
        let id = result.identity.id;
        match self.retry().run("profile", || self.api.get_user(id)).await {
            Ok(profile) => result.profile = Some(profile),
            Err(e) => debug!("No profile for {}: {}", id, e),
        }
        match self.retry().run("avatar", || self.api.get_avatar_url(id)).await {
            Ok(url) => result.avatar_url = url,
            Err(e) => debug!("No avatar for {}: {}", id, e),
        }
    }

    fn log_summary(&self, report: &ScanReport) {
        info!(
            "Scan finished: {} scanned, {} flagged, {} skipped",
            report.scanned,
            report.flagged(),
            report.skipped
        );
    }
}

fn not_found_as_group(e: groupwatch_core::ApiError, group: GroupId) -> ScanError {
    if e.is_not_found() {
        ScanError::GroupNotFound(group)
    } else {
        ScanError::Api(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groupwatch_core::RoleId;

    fn roles() -> Vec<GroupRole> {
        [(0u8, "Guest"), (1, "Member"), (50, "Officer"), (255, "Owner")]
            .iter()
            .enumerate()
            .map(|(i, &(rank, name))| GroupRole {
                id: RoleId(i as u64 + 1),
                name: name.to_string(),
                rank,
                member_count: 0,
            })
            .collect()
    }

    fn names(roles: &[GroupRole]) -> Vec<&str> {
        roles.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn index_selection_is_order_independent() {
        let roles = roles();
        let forward = RoleSelection::indices(1, 2).select(&roles).unwrap();
        let backward = RoleSelection::indices(2, 1).select(&roles).unwrap();
        assert_eq!(forward, backward);
        assert_eq!(names(&forward), vec!["Member", "Officer"]);
    }

    #[test]
    fn unnormalized_indices_still_select() {
        let roles = roles();
        let selected = RoleSelection::Indices { from: 3, to: 2 }.select(&roles).unwrap();
        assert_eq!(names(&selected), vec!["Officer", "Owner"]);
    }

    #[test]
    fn index_past_end_is_rejected() {
        let err = RoleSelection::indices(0, 4).select(&roles()).unwrap_err();
        assert!(matches!(
            err,
            ScanError::RoleIndexOutOfRange { index: 4, count: 4 }
        ));
    }

    #[test]
    fn rank_selection_filters_inclusive() {
        let roles = roles();
        let selected = RoleSelection::ranks(255, 1).select(&roles).unwrap();
        assert_eq!(names(&selected), vec!["Member", "Officer", "Owner"]);

        let err = RoleSelection::ranks(2, 49).select(&roles).unwrap_err();
        assert!(matches!(err, ScanError::EmptyRankRange { min: 2, max: 49 }));
    }

    #[test]
    fn config_maps_no_cap() {
        let scan = ScanConfig {
            no_cap: true,
            watch_list: vec![GroupId(100)],
            ..ScanConfig::default()
        };
        let config = ScannerConfig::from_scan_config(&scan);
        assert_eq!(config.relation_cap, None);
        assert!(config.watch_list.contains(GroupId(100)));
    }
}
