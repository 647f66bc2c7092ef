use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

macro_rules! numeric_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map($name)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                $name(id)
            }
        }
    };
}

numeric_id!(UserId);
numeric_id!(GroupId);
numeric_id!(RoleId);

/// A platform user. The id is the durable key; the name is presentation only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub name: String,
}

impl Identity {
    pub fn new(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Profile details fetched on demand for flagged users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub display_name: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub is_banned: bool,
}

impl UserProfile {
    pub fn identity(&self) -> Identity {
        Identity::new(self.id, self.name.clone())
    }
}

/// A user's membership in one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
    pub group_id: GroupId,
    pub group_name: String,
    pub role_name: String,
    pub rank: u8,
}

impl GroupMembership {
    pub fn new(
        group_id: impl Into<GroupId>,
        group_name: impl Into<String>,
        role_name: impl Into<String>,
        rank: u8,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            group_name: group_name.into(),
            role_name: role_name.into(),
            rank,
        }
    }
}

/// All of a user's group memberships, in the order the API returned them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MembershipSet {
    entries: Vec<GroupMembership>,
}

impl MembershipSet {
    pub fn new(entries: Vec<GroupMembership>) -> Self {
        Self { entries }
    }

    pub fn get(&self, group_id: GroupId) -> Option<&GroupMembership> {
        self.entries.iter().find(|m| m.group_id == group_id)
    }

    pub fn contains(&self, group_id: GroupId) -> bool {
        self.get(group_id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroupMembership> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<GroupMembership> for MembershipSet {
    fn from_iter<I: IntoIterator<Item = GroupMembership>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: GroupId,
    pub name: String,
    pub member_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRole {
    pub id: RoleId,
    pub name: String,
    pub rank: u8,
    pub member_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllyGroup {
    pub id: GroupId,
    pub name: String,
}

/// Operator-supplied set of high-risk group ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatchList {
    groups: BTreeSet<GroupId>,
}

impl WatchList {
    pub fn new(groups: impl IntoIterator<Item = GroupId>) -> Self {
        Self {
            groups: groups.into_iter().collect(),
        }
    }

    pub fn contains(&self, group_id: GroupId) -> bool {
        self.groups.contains(&group_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroupId> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl FromStr for WatchList {
    type Err = std::num::ParseIntError;

    /// Parses a comma-separated list of group ids. Blank entries are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let groups = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(GroupId::from_str)
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Self { groups })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Friends,
    Followers,
    Followings,
}

impl RelationKind {
    pub const ALL: [RelationKind; 3] = [
        RelationKind::Friends,
        RelationKind::Followers,
        RelationKind::Followings,
    ];

    /// Path segment used by the friends API.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Friends => "friends",
            RelationKind::Followers => "followers",
            RelationKind::Followings => "followings",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a scanned identity was reached from the scan subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Relation {
    Target,
    Friend,
    Follower,
    Following,
    GroupMember { role: String, rank: u8 },
}

impl From<RelationKind> for Relation {
    fn from(kind: RelationKind) -> Self {
        match kind {
            RelationKind::Friends => Relation::Friend,
            RelationKind::Followers => Relation::Follower,
            RelationKind::Followings => Relation::Following,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Target => write!(f, "target"),
            Relation::Friend => write!(f, "friend"),
            Relation::Follower => write!(f, "follower"),
            Relation::Following => write!(f, "following"),
            Relation::GroupMember { role, rank } => {
                write!(f, "group member at rank {} ({})", rank, role)
            }
        }
    }
}

/// One watch-list match and the memberships that hit that group's allies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllyCluster {
    pub core: GroupMembership,
    pub allies: Vec<GroupMembership>,
}

/// A flagged identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub identity: Identity,
    pub relation: Relation,
    /// Memberships in watch-list groups
    pub core_groups: Vec<GroupMembership>,
    /// Memberships in allies of the matched watch-list groups, flattened
    /// across clusters without de-duplication
    pub ally_groups: Vec<GroupMembership>,
    pub clusters: Vec<AllyCluster>,
    /// Memberships in allies of the group being scanned (roster scans only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scanned_group_allies: Vec<GroupMembership>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ScanResult {
    /// Whether the identity belongs to a watch-list group. Results carrying only
    /// the scanned group's ally signal are informational.
    pub fn is_alert(&self) -> bool {
        !self.core_groups.is_empty()
    }
}
