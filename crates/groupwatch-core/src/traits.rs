use crate::error::ApiResult;
use crate::types::{
    AllyGroup, GroupId, GroupInfo, GroupRole, Identity, MembershipSet, RelationKind, RoleId,
    UserId, UserProfile,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Position within a paged listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageCursor {
    /// Opaque continuation token returned by cursor-paged endpoints
    Token(String),
    /// Row offset for endpoints paged by start index
    Offset(u64),
}

/// Request for a single page. A `None` cursor asks for the first page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub cursor: Option<PageCursor>,
    pub limit: u32,
}

impl PageRequest {
    pub fn first(limit: u32) -> Self {
        Self {
            cursor: None,
            limit,
        }
    }

    pub fn token(&self) -> Option<&str> {
        match &self.cursor {
            Some(PageCursor::Token(token)) => Some(token.as_str()),
            _ => None,
        }
    }

    /// Row offset of this page; token cursors and the first page start at 0.
    pub fn offset(&self) -> u64 {
        match &self.cursor {
            Some(PageCursor::Offset(offset)) => *offset,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<PageCursor>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

/// Read-only view of the platform's public web API.
///
/// Every method is a single request. Pagination and rate-limit retries are
/// layered on top by the caller.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Batch name lookup. Unknown names are simply absent from the result.
    async fn lookup_usernames(&self, names: &[String]) -> ApiResult<Vec<Identity>>;

    async fn get_user(&self, id: UserId) -> ApiResult<UserProfile>;

    /// Headshot image URL, if the thumbnail has been rendered.
    async fn get_avatar_url(&self, id: UserId) -> ApiResult<Option<String>>;

    async fn get_user_groups(&self, id: UserId) -> ApiResult<MembershipSet>;

    async fn get_relations(
        &self,
        id: UserId,
        kind: RelationKind,
        page: PageRequest,
    ) -> ApiResult<Page<Identity>>;

    async fn get_group(&self, id: GroupId) -> ApiResult<GroupInfo>;

    async fn get_group_roles(&self, id: GroupId) -> ApiResult<Vec<GroupRole>>;

    async fn get_role_members(
        &self,
        group: GroupId,
        role: RoleId,
        page: PageRequest,
    ) -> ApiResult<Page<Identity>>;

    /// Allied groups, paged by row offset.
    async fn get_allies(&self, group: GroupId, page: PageRequest) -> ApiResult<Page<AllyGroup>>;
}
