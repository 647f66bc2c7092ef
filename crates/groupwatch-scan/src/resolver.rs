use groupwatch_client::RateLimitRetry;
use groupwatch_core::{Identity, PlatformApi, UserId};
use std::sync::Arc;
use tracing::debug;

/// Turns operator input into a user identity.
///
/// The input is first treated as a username. Only when that finds nothing
/// and the input is numeric is it tried as a user id. Any failure along the
/// way is reported as "not found".
pub struct Resolver {
    api: Arc<dyn PlatformApi>,
    retry: RateLimitRetry,
}

impl Resolver {
    pub fn new(api: Arc<dyn PlatformApi>, retry: RateLimitRetry) -> Self {
        Self { api, retry }
    }

    pub async fn resolve(&self, input: &str) -> Option<Identity> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        if let Some(identity) = self.by_name(input).await {
            return Some(identity);
        }

        let id: UserId = match input.parse() {
            Ok(id) => id,
            Err(_) => {
                debug!("{:?} matched no username and is not a user id", input);
                return None;
            }
        };
        self.by_id(id).await
    }

    async fn by_name(&self, name: &str) -> Option<Identity> {
        let names = [name.to_string()];
        match self
            .retry
            .run("username lookup", || self.api.lookup_usernames(&names))
            .await
        {
            // The lookup is case-insensitive; prefer an exact-case match
            Ok(mut found) => match found.iter().position(|identity| identity.name == name) {
                Some(index) => Some(found.swap_remove(index)),
                None => found.into_iter().next(),
            },
            Err(e) => {
                debug!("Username lookup for {:?} failed: {}", name, e);
                None
            }
        }
    }

    async fn by_id(&self, id: UserId) -> Option<Identity> {
        match self
            .retry
            .run("user lookup", || self.api.get_user(id))
            .await
        {
            Ok(profile) => Some(profile.identity()),
            Err(e) => {
                debug!("User id {} did not resolve: {}", id, e);
                None
            }
        }
    }
}
