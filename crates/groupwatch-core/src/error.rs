use crate::types::GroupId;
use thiserror::Error;

/// Outcome of a single remote call that did not yield data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited by remote API")]
    RateLimited,

    #[error("Remote API unavailable: {0}")]
    Unavailable(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(String),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Errors that abort a scan. Per-member failures never surface here.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Watch list is empty")]
    EmptyWatchList,

    #[error("Group not found: {0}")]
    GroupNotFound(GroupId),

    #[error("Group {0} has no roles")]
    NoRoles(GroupId),

    #[error("Role index {index} is out of range (group has {count} roles)")]
    RoleIndexOutOfRange { index: usize, count: usize },

    #[error("No roles with rank between {min} and {max}")]
    EmptyRankRange { min: u8, max: u8 },

    #[error("Group lookup failed: {0}")]
    Api(#[from] ApiError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, ScanError>;
