use anyhow::Result;
use async_trait::async_trait;

use crate::Authorizer;

#[async_trait]
/// Resolves chat-platform identities to display names.
pub trait MemberDirectory: Send + Sync {
    /// Returns `Ok(None)` when the member has left and can no longer be resolved.
    async fn display_name(&self, user_id: u64) -> Result<Option<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Display-time view of an [`Authorizer`].
pub enum AuthorizerDisplay {
    Admin,
    /// The authorizing member is no longer resolvable. Never persisted.
    Unknown,
    Member(String),
}

impl AuthorizerDisplay {
    /// True for the two sentinel outcomes that listings render as "not applicable".
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Self::Admin | Self::Unknown)
    }
}

pub async fn resolve_authorizer(
    directory: &dyn MemberDirectory,
    authorizer: Authorizer,
) -> AuthorizerDisplay {
    let user_id = match authorizer {
        Authorizer::Admin => return AuthorizerDisplay::Admin,
        Authorizer::User(user_id) => user_id,
    };
    match directory.display_name(user_id).await {
        Ok(Some(name)) => AuthorizerDisplay::Member(name),
        Ok(None) => AuthorizerDisplay::Unknown,
        Err(error) => {
            tracing::warn!(user_id, error = %format!("{error:#}"), "member lookup failed");
            AuthorizerDisplay::Unknown
        }
    }
}
