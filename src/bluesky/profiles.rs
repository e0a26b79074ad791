// Profile lookups — follower check for the optional follow gate.
//
// `app.bsky.actor.getProfile` includes a `viewer` block describing the
// relationship between the authenticated account and the actor. A non-null
// `viewer.followedBy` means the actor follows the bot.

use serde::Deserialize;
use tracing::debug;

use super::client::BlueskyClient;
use crate::error::SocialError;

#[derive(Debug, Deserialize)]
struct ProfileView {
    did: String,
    #[serde(default)]
    viewer: Option<ViewerState>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViewerState {
    followed_by: Option<String>,
}

impl BlueskyClient {
    /// Whether `actor` (handle or DID) follows the authenticated account.
    pub async fn is_followed_by(&self, actor: &str) -> Result<bool, SocialError> {
        let raw: serde_json::Value = self
            .xrpc_get("app.bsky.actor.getProfile", &[("actor", actor)])
            .await?;
        let follows = parse_followed_by(raw)?;
        debug!(actor = actor, follows = follows, "Checked follower status");
        Ok(follows)
    }
}

/// Read `viewer.followedBy` out of a getProfile response.
pub fn parse_followed_by(raw: serde_json::Value) -> Result<bool, SocialError> {
    let profile: ProfileView = serde_json::from_value(raw)
        .map_err(|e| SocialError::Malformed(format!("getProfile response: {e}")))?;
    if profile.did.is_empty() {
        return Err(SocialError::Malformed("getProfile returned empty did".into()));
    }
    Ok(profile
        .viewer
        .and_then(|v| v.followed_by)
        .is_some_and(|uri| !uri.is_empty()))
}
