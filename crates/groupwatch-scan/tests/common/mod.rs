//! In-memory `PlatformApi` used by the scan tests.

#![allow(dead_code)]

use async_trait::async_trait;
use groupwatch_client::{PagedFetcher, RateLimitRetry};
use groupwatch_core::{
    AllyGroup, ApiError, ApiResult, GroupId, GroupInfo, GroupMembership, GroupRole, Identity,
    MembershipSet, Page, PageCursor, PageRequest, PlatformApi, RelationKind, RoleId, UserId,
    UserProfile,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct Calls {
    pub lookups: AtomicUsize,
    pub user_lookups: AtomicUsize,
    pub memberships: AtomicUsize,
    pub relation_pages: AtomicUsize,
    pub allies: Mutex<Vec<GroupId>>,
}

#[derive(Default)]
pub struct FakePlatform {
    users: HashMap<UserId, UserProfile>,
    memberships: HashMap<UserId, Vec<GroupMembership>>,
    relations: HashMap<(UserId, RelationKind), Vec<Identity>>,
    groups: HashMap<GroupId, GroupInfo>,
    roles: HashMap<GroupId, Vec<GroupRole>>,
    role_members: HashMap<(GroupId, RoleId), Vec<Identity>>,
    allies: HashMap<GroupId, Vec<AllyGroup>>,
    failing: HashSet<UserId>,
    ally_outages: HashMap<GroupId, u64>,
    throttled: AtomicUsize,
    pub calls: Calls,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, id: u64, name: &str) -> Self {
        self.users.insert(
            UserId(id),
            UserProfile {
                id: UserId(id),
                name: name.to_string(),
                display_name: Some(name.to_uppercase()),
                created: None,
                is_banned: false,
            },
        );
        self
    }

    pub fn member_of(mut self, user: u64, group: u64, role: &str, rank: u8) -> Self {
        self.memberships
            .entry(UserId(user))
            .or_default()
            .push(GroupMembership::new(group, format!("Group {}", group), role, rank));
        self
    }

    pub fn relations(mut self, user: u64, kind: RelationKind, ids: impl IntoIterator<Item = u64>) -> Self {
        let list = ids
            .into_iter()
            .map(|id| Identity::new(id, format!("user{}", id)))
            .collect();
        self.relations.insert((UserId(user), kind), list);
        self
    }

    pub fn group(mut self, id: u64, name: &str) -> Self {
        self.groups.insert(
            GroupId(id),
            GroupInfo {
                id: GroupId(id),
                name: name.to_string(),
                member_count: 0,
            },
        );
        self
    }

    pub fn role(mut self, group: u64, role: u64, name: &str, rank: u8, members: &[u64]) -> Self {
        self.roles.entry(GroupId(group)).or_default().push(GroupRole {
            id: RoleId(role),
            name: name.to_string(),
            rank,
            member_count: members.len() as u64,
        });
        self.role_members.insert(
            (GroupId(group), RoleId(role)),
            members
                .iter()
                .map(|&id| Identity::new(id, format!("user{}", id)))
                .collect(),
        );
        self
    }

    pub fn allies(mut self, group: u64, allies: &[u64]) -> Self {
        self.allies.insert(
            GroupId(group),
            allies
                .iter()
                .map(|&id| AllyGroup {
                    id: GroupId(id),
                    name: format!("Group {}", id),
                })
                .collect(),
        );
        self
    }

    /// Membership lookups for `user` fail with a server error.
    pub fn failing(mut self, user: u64) -> Self {
        self.failing.insert(UserId(user));
        self
    }

    /// Ally pages of `group` starting at or past `offset` fail with a server error.
    pub fn failing_allies(mut self, group: u64, offset: u64) -> Self {
        self.ally_outages.insert(GroupId(group), offset);
        self
    }

    /// The next `count` membership lookups answer 429.
    pub fn throttle_memberships(self, count: usize) -> Self {
        self.throttled.store(count, Ordering::SeqCst);
        self
    }

    pub fn ally_fetches(&self) -> Vec<GroupId> {
        self.calls.allies.lock().unwrap().clone()
    }

    pub fn membership_calls(&self) -> usize {
        self.calls.memberships.load(Ordering::SeqCst)
    }
}

fn cursor_page<T: Clone>(items: &[T], page: &PageRequest) -> Page<T> {
    let start: usize = page.token().and_then(|t| t.parse().ok()).unwrap_or(0);
    let end = (start + page.limit as usize).min(items.len());
    let next = (end < items.len()).then(|| PageCursor::Token(end.to_string()));
    Page {
        items: items.get(start..end).unwrap_or_default().to_vec(),
        next,
    }
}

#[async_trait]
impl PlatformApi for FakePlatform {
    async fn lookup_usernames(&self, names: &[String]) -> ApiResult<Vec<Identity>> {
        self.calls.lookups.fetch_add(1, Ordering::SeqCst);
        let mut found: Vec<Identity> = self
            .users
            .values()
            .filter(|u| names.iter().any(|n| n.eq_ignore_ascii_case(&u.name)))
            .map(|u| u.identity())
            .collect();
        found.sort_by_key(|identity| identity.id);
        Ok(found)
    }

    async fn get_user(&self, id: UserId) -> ApiResult<UserProfile> {
        self.calls.user_lookups.fetch_add(1, Ordering::SeqCst);
        self.users
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("user {}", id)))
    }

    async fn get_avatar_url(&self, id: UserId) -> ApiResult<Option<String>> {
        Ok(self
            .users
            .contains_key(&id)
            .then(|| format!("https://img.test/{}.png", id)))
    }

    async fn get_user_groups(&self, id: UserId) -> ApiResult<MembershipSet> {
        self.calls.memberships.fetch_add(1, Ordering::SeqCst);
        if self
            .throttled
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ApiError::RateLimited);
        }
        if self.failing.contains(&id) {
            return Err(ApiError::Unavailable("HTTP 500".into()));
        }
        Ok(MembershipSet::new(
            self.memberships.get(&id).cloned().unwrap_or_default(),
        ))
    }

    async fn get_relations(
        &self,
        id: UserId,
        kind: RelationKind,
        page: PageRequest,
    ) -> ApiResult<Page<Identity>> {
        self.calls.relation_pages.fetch_add(1, Ordering::SeqCst);
        let list = self.relations.get(&(id, kind)).cloned().unwrap_or_default();
        Ok(cursor_page(&list, &page))
    }

    async fn get_group(&self, id: GroupId) -> ApiResult<GroupInfo> {
        self.groups
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("group {}", id)))
    }

    async fn get_group_roles(&self, id: GroupId) -> ApiResult<Vec<GroupRole>> {
        self.roles
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("roles of group {}", id)))
    }

    async fn get_role_members(
        &self,
        group: GroupId,
        role: RoleId,
        page: PageRequest,
    ) -> ApiResult<Page<Identity>> {
        let list = self
            .role_members
            .get(&(group, role))
            .cloned()
            .unwrap_or_default();
        Ok(cursor_page(&list, &page))
    }

    async fn get_allies(&self, group: GroupId, page: PageRequest) -> ApiResult<Page<AllyGroup>> {
        self.calls.allies.lock().unwrap().push(group);
        if self
            .ally_outages
            .get(&group)
            .is_some_and(|&from| page.offset() >= from)
        {
            return Err(ApiError::Unavailable("HTTP 503".into()));
        }
        let list = self.allies.get(&group).cloned().unwrap_or_default();
        let start = page.offset() as usize;
        let end = (start + page.limit as usize).min(list.len());
        let next = (end < list.len()).then_some(PageCursor::Offset(end as u64));
        Ok(Page {
            items: list.get(start..end).unwrap_or_default().to_vec(),
            next,
        })
    }
}

pub fn fetcher() -> PagedFetcher {
    fetcher_with_page_size(100)
}

pub fn fetcher_with_page_size(page_size: u32) -> PagedFetcher {
    PagedFetcher::new(
        page_size,
        Duration::ZERO,
        1_000,
        RateLimitRetry::new(Duration::ZERO, 3),
    )
}
