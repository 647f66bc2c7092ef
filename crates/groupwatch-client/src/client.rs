use crate::dto::*;
use anyhow::{Context, Result};
use async_trait::async_trait;
use groupwatch_core::{
    AllyGroup, ApiConfig, ApiError, ApiResult, GroupId, GroupInfo, GroupRole, Identity,
    MembershipSet, Page, PageCursor, PageRequest, PlatformApi, RelationKind, RoleId, UserId,
    UserProfile,
};
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Map an HTTP status onto the API error taxonomy. `None` means success.
pub fn classify_status(status: StatusCode, what: &str) -> Option<ApiError> {
    match status {
        s if s.is_success() => None,
        StatusCode::TOO_MANY_REQUESTS => Some(ApiError::RateLimited),
        // Lookups by id answer 400 for malformed or unknown ids
        StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => Some(ApiError::NotFound(what.to_string())),
        s => Some(ApiError::Unavailable(format!("{} returned HTTP {}", what, s))),
    }
}

/// `PlatformApi` over the public Roblox web API.
pub struct RobloxClient {
    config: ApiConfig,
    client: Client,
}

impl RobloxClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn users_url(&self, path: &str) -> String {
        format!("{}{}", self.config.users_base_url, path)
    }

    fn friends_url(&self, path: &str) -> String {
        format!("{}{}", self.config.friends_base_url, path)
    }

    fn groups_url(&self, path: &str) -> String {
        format!("{}{}", self.config.groups_base_url, path)
    }

    fn thumbnails_url(&self, path: &str) -> String {
        format!("{}{}", self.config.thumbnails_base_url, path)
    }

    fn with_session(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.session_cookie {
            Some(cookie) => request.header(
                header::COOKIE,
                format!(".ROBLOSECURITY={}", cookie.expose_secret()),
            ),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        what: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> ApiResult<T> {
        debug!("GET {} {:?}", url, query);
        let request = self.with_session(self.client.get(url).query(query));
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Unavailable(format!("{} request failed: {}", what, e)))?;
        Self::decode(what, response).await
    }

    async fn post_json<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        what: &str,
        url: &str,
        body: &B,
    ) -> ApiResult<T> {
        debug!("POST {}", url);
        let request = self.with_session(self.client.post(url).json(body));
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Unavailable(format!("{} request failed: {}", what, e)))?;
        Self::decode(what, response).await
    }

    async fn decode<T: DeserializeOwned>(what: &str, response: Response) -> ApiResult<T> {
        if let Some(err) = classify_status(response.status(), what) {
            debug!("{}: {}", what, err);
            return Err(err);
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Unavailable(format!("Failed to parse {} response: {}", what, e)))
    }

    fn cursor_query(page: &PageRequest) -> Vec<(&'static str, String)> {
        let mut query = vec![("limit", page.limit.to_string())];
        if let Some(token) = page.token() {
            query.push(("cursor", token.to_string()));
        }
        query
    }
}

#[async_trait]
impl PlatformApi for RobloxClient {
    async fn lookup_usernames(&self, names: &[String]) -> ApiResult<Vec<Identity>> {
        let body = UsernameLookupRequest {
            usernames: names,
            exclude_banned_users: false,
        };
        let envelope: DataEnvelope<UserDto> = self
            .post_json("username lookup", &self.users_url("/v1/usernames/users"), &body)
            .await?;
        Ok(envelope.data.into_iter().map(Identity::from).collect())
    }

    async fn get_user(&self, id: UserId) -> ApiResult<UserProfile> {
        let user: UserDetailDto = self
            .get_json(
                &format!("user {}", id),
                &self.users_url(&format!("/v1/users/{}", id)),
                &[],
            )
            .await?;
        Ok(user.into())
    }

    async fn get_avatar_url(&self, id: UserId) -> ApiResult<Option<String>> {
        let envelope: DataEnvelope<ThumbnailDto> = self
            .get_json(
                &format!("avatar of {}", id),
                &self.thumbnails_url("/v1/users/avatar-headshot"),
                &[
                    ("userIds", id.to_string()),
                    ("size", "150x150".to_string()),
                    ("format", "Png".to_string()),
                    ("isCircular", "false".to_string()),
                ],
            )
            .await?;
        Ok(envelope
            .data
            .into_iter()
            .find(|thumb| thumb.state.as_deref().map_or(true, |s| s == "Completed"))
            .and_then(|thumb| thumb.image_url))
    }

    async fn get_user_groups(&self, id: UserId) -> ApiResult<MembershipSet> {
        let envelope: DataEnvelope<GroupRoleEntryDto> = self
            .get_json(
                &format!("groups of {}", id),
                &self.groups_url(&format!("/v2/users/{}/groups/roles", id)),
                &[],
            )
            .await?;
        Ok(envelope.data.into_iter().map(Into::into).collect())
    }

    async fn get_relations(
        &self,
        id: UserId,
        kind: RelationKind,
        page: PageRequest,
    ) -> ApiResult<Page<Identity>> {
        let mut query = Self::cursor_query(&page);
        if kind != RelationKind::Friends {
            query.push(("sortOrder", "Desc".to_string()));
        }
        let body: CursorPage<UserDto> = self
            .get_json(
                &format!("{} of {}", kind, id),
                &self.friends_url(&format!("/v1/users/{}/{}", id, kind.as_str())),
                &query,
            )
            .await?;
        let next = body.next_cursor();
        Ok(Page {
            items: body.data.into_iter().map(Identity::from).collect(),
            next,
        })
    }

    async fn get_group(&self, id: GroupId) -> ApiResult<GroupInfo> {
        let group: GroupDto = self
            .get_json(
                &format!("group {}", id),
                &self.groups_url(&format!("/v1/groups/{}", id)),
                &[],
            )
            .await?;
        Ok(group.into())
    }

    async fn get_group_roles(&self, id: GroupId) -> ApiResult<Vec<GroupRole>> {
        let roles: RolesDto = self
            .get_json(
                &format!("roles of group {}", id),
                &self.groups_url(&format!("/v1/groups/{}/roles", id)),
                &[],
            )
            .await?;
        Ok(roles.roles.into_iter().map(Into::into).collect())
    }

    async fn get_role_members(
        &self,
        group: GroupId,
        role: RoleId,
        page: PageRequest,
    ) -> ApiResult<Page<Identity>> {
        let mut query = Self::cursor_query(&page);
        query.push(("sortOrder", "Asc".to_string()));
        let body: CursorPage<RoleMemberDto> = self
            .get_json(
                &format!("members of role {} in group {}", role, group),
                &self.groups_url(&format!("/v1/groups/{}/roles/{}/users", group, role)),
                &query,
            )
            .await?;
        let next = body.next_cursor();
        Ok(Page {
            items: body.data.into_iter().map(Identity::from).collect(),
            next,
        })
    }

    async fn get_allies(&self, group: GroupId, page: PageRequest) -> ApiResult<Page<AllyGroup>> {
        let start = page.offset();
        let body: AlliesDto = self
            .get_json(
                &format!("allies of group {}", group),
                &self.groups_url(&format!("/v1/groups/{}/relationships/allies", group)),
                &[
                    ("model.startRowIndex", start.to_string()),
                    ("model.maxRows", page.limit.to_string()),
                ],
            )
            .await?;
        let next = body.next_offset(start, page.limit).map(PageCursor::Offset);
        Ok(Page {
            items: body.into_allies(),
            next,
        })
    }
}
