//! Wire shapes of the platform's JSON endpoints.

use chrono::{DateTime, Utc};
use groupwatch_core::{
    AllyGroup, GroupInfo, GroupMembership, GroupRole, Identity, PageCursor, RoleId, UserProfile,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub(crate) struct DataEnvelope<T> {
    #[serde(default)]
    pub data: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub(crate) struct CursorPage<T> {
    #[serde(default)]
    pub data: Vec<T>,
    #[serde(default)]
    pub next_page_cursor: Option<String>,
}

impl<T> CursorPage<T> {
    /// The API signals the last page with either `null` or an empty string.
    pub fn next_cursor(&self) -> Option<PageCursor> {
        self.next_page_cursor
            .as_deref()
            .filter(|cursor| !cursor.is_empty())
            .map(|cursor| PageCursor::Token(cursor.to_string()))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UsernameLookupRequest<'a> {
    pub usernames: &'a [String],
    pub exclude_banned_users: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserDto {
    pub id: u64,
    pub name: String,
}

impl From<UserDto> for Identity {
    fn from(dto: UserDto) -> Self {
        Identity::new(dto.id, dto.name)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserDetailDto {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_banned: bool,
}

impl From<UserDetailDto> for UserProfile {
    fn from(dto: UserDetailDto) -> Self {
        UserProfile {
            id: dto.id.into(),
            name: dto.name,
            display_name: dto.display_name,
            created: dto.created,
            is_banned: dto.is_banned,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ThumbnailDto {
    #[allow(dead_code)]
    pub target_id: u64,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GroupRefDto {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoleRefDto {
    pub name: String,
    pub rank: u8,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GroupRoleEntryDto {
    pub group: GroupRefDto,
    pub role: RoleRefDto,
}

impl From<GroupRoleEntryDto> for GroupMembership {
    fn from(dto: GroupRoleEntryDto) -> Self {
        GroupMembership::new(dto.group.id, dto.group.name, dto.role.name, dto.role.rank)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GroupDto {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub member_count: u64,
}

impl From<GroupDto> for GroupInfo {
    fn from(dto: GroupDto) -> Self {
        GroupInfo {
            id: dto.id.into(),
            name: dto.name,
            member_count: dto.member_count,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RolesDto {
    #[serde(default)]
    pub roles: Vec<RoleDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RoleDto {
    pub id: u64,
    pub name: String,
    pub rank: u8,
    #[serde(default)]
    pub member_count: u64,
}

impl From<RoleDto> for GroupRole {
    fn from(dto: RoleDto) -> Self {
        GroupRole {
            id: RoleId(dto.id),
            name: dto.name,
            rank: dto.rank,
            member_count: dto.member_count,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RoleMemberDto {
    pub user_id: u64,
    pub username: String,
}

impl From<RoleMemberDto> for Identity {
    fn from(dto: RoleMemberDto) -> Self {
        Identity::new(dto.user_id, dto.username)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AlliesDto {
    #[serde(default)]
    pub related_groups: Vec<GroupRefDto>,
    #[serde(default)]
    pub next_row_index: Option<u64>,
    #[serde(default)]
    pub total_group_count: Option<u64>,
}

impl AlliesDto {
    /// Offset of the next page, or `None` once the listing is exhausted.
    pub fn next_offset(&self, start: u64, limit: u32) -> Option<u64> {
        let received = self.related_groups.len() as u64;
        if received == 0 {
            return None;
        }
        let next = self.next_row_index.unwrap_or(start + received);
        if next <= start {
            return None;
        }
        match self.total_group_count {
            Some(total) if next >= total => None,
            None if received < u64::from(limit) => None,
            _ => Some(next),
        }
    }

    pub fn into_allies(self) -> Vec<AllyGroup> {
        self.related_groups
            .into_iter()
            .map(|g| AllyGroup {
                id: g.id.into(),
                name: g.name,
            })
            .collect()
    }
}
