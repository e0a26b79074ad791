// Authenticated AT Protocol client — XRPC over HTTP with an app-password session.
//
// The bot needs a session for everything it does: notifications are private,
// and replies are writes. Every request goes through the shared RateLimiter
// and every failure is classified into a SocialError kind here, so nothing
// above this module ever looks at an HTTP status.

use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::rate_limit::RateLimiter;
use crate::error::SocialError;

/// Default PDS entryway for app-password sessions.
pub const DEFAULT_PDS_URL: &str = "https://bsky.social";

const USER_AGENT: &str = "tallybot/0.1 (engagement-stats bot)";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// XRPC error names that mean "this will never work for this account".
const PERMANENT_ERRORS: &[&str] = &[
    "AccountTakedown",
    "AccountDeactivated",
    "AccountSuspended",
    "BlockedActor",
    "BlockedByActor",
    "ActorNotFound",
    "NotFound",
    "AuthFactorTokenRequired",
];

/// An authenticated session as returned by createSession / refreshSession.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_jwt: String,
    pub refresh_jwt: String,
    pub did: String,
    pub handle: String,
}

/// An author as embedded in notification and post views.
#[derive(Debug, Clone, Deserialize)]
pub struct ActorView {
    pub did: String,
    pub handle: String,
}

/// XRPC error body: `{"error": "...", "message": "..."}`.
#[derive(Debug, Default, Deserialize)]
struct XrpcErrorBody {
    error: Option<String>,
    message: Option<String>,
}

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

pub struct BlueskyClient {
    http: reqwest::Client,
    base_url: String,
    session: RwLock<Session>,
    rate_limiter: RateLimiter,
}

impl BlueskyClient {
    /// Log in with an app password and return a ready client.
    pub async fn login(base_url: &str, identifier: &str, password: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let nsid = "com.atproto.server.createSession";
        let response = http
            .post(format!("{base_url}/xrpc/{nsid}"))
            .json(&CreateSessionRequest {
                identifier,
                password,
            })
            .send()
            .await
            .with_context(|| format!("Failed to reach {base_url}"))?;

        let status = response.status();
        let body = response.text().await.context("Failed to read login response")?;
        if !status.is_success() {
            let err = classify_response(nsid, status, &body, None);
            return Err(anyhow::Error::new(err).context(format!("Login as {identifier} failed")));
        }

        let session: Session =
            serde_json::from_str(&body).context("Failed to parse createSession response")?;
        info!(handle = %session.handle, did = %session.did, "Authenticated with Bluesky");

        Ok(Self {
            http,
            base_url,
            session: RwLock::new(session),
            rate_limiter: RateLimiter::default(),
        })
    }

    /// The bot's own DID.
    pub async fn did(&self) -> String {
        self.session.read().await.did.clone()
    }

    /// The bot's own handle.
    pub async fn handle(&self) -> String {
        self.session.read().await.handle.clone()
    }

    /// GET an XRPC query and deserialize the response.
    pub async fn xrpc_get<T: DeserializeOwned>(
        &self,
        nsid: &str,
        params: &[(&str, &str)],
    ) -> Result<T, SocialError> {
        let url = self.url(nsid);
        let body = self
            .execute(nsid, |http, token| {
                http.get(&url).query(params).bearer_auth(token)
            })
            .await?;
        parse_body(nsid, &body)
    }

    /// POST an XRPC procedure and deserialize the response.
    pub async fn xrpc_post<B, T>(&self, nsid: &str, input: &B) -> Result<T, SocialError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(nsid);
        let body = self
            .execute(nsid, |http, token| {
                http.post(&url).json(input).bearer_auth(token)
            })
            .await?;
        parse_body(nsid, &body)
    }

    /// POST an XRPC procedure whose response body we don't need.
    pub async fn xrpc_post_unit<B>(&self, nsid: &str, input: &B) -> Result<(), SocialError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = self.url(nsid);
        self.execute(nsid, |http, token| {
            http.post(&url).json(input).bearer_auth(token)
        })
        .await
        .map(|_| ())
    }

    fn url(&self, nsid: &str) -> String {
        format!("{}/xrpc/{}", self.base_url, nsid)
    }

    /// Send a request built by `build`, refreshing the session once if the
    /// access token has expired. Returns the raw success body.
    async fn execute<F>(&self, nsid: &str, build: F) -> Result<String, SocialError>
    where
        F: Fn(&reqwest::Client, &str) -> RequestBuilder,
    {
        let mut refreshed = false;

        loop {
            self.rate_limiter.acquire().await;

            // Clone the token so no lock is held across the request
            let token = self.session.read().await.access_jwt.clone();

            debug!(nsid = nsid, "XRPC request");
            let response = build(&self.http, &token).send().await?;

            let status = response.status();
            let retry_after = retry_after_hint(response.headers(), Utc::now());
            let body = response.text().await?;

            if status.is_success() {
                return Ok(body);
            }

            if !refreshed && is_expired_token(status, &body) {
                refreshed = true;
                self.refresh_session().await?;
                continue;
            }

            let err = classify_response(nsid, status, &body, retry_after);
            if status == StatusCode::TOO_MANY_REQUESTS {
                let pause = retry_after.unwrap_or(Duration::from_secs(60));
                warn!(nsid = nsid, pause_secs = pause.as_secs(), "Rate limited by server");
                self.rate_limiter.pause_for(pause);
            }
            return Err(err);
        }
    }

    async fn refresh_session(&self) -> Result<(), SocialError> {
        let nsid = "com.atproto.server.refreshSession";
        let refresh_jwt = self.session.read().await.refresh_jwt.clone();

        self.rate_limiter.acquire().await;
        let response = self
            .http
            .post(self.url(nsid))
            .bearer_auth(refresh_jwt)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            // A refresh token that no longer works needs a human
            return Err(match classify_response(nsid, status, &body, None) {
                SocialError::Transient { message, .. } => SocialError::transient(message),
                _ => SocialError::Permanent(format!("session refresh rejected: {status}")),
            });
        }

        let session: Session = parse_body(nsid, &body)?;
        debug!(did = %session.did, "Refreshed session");
        *self.session.write().await = session;
        Ok(())
    }
}

fn parse_body<T: DeserializeOwned>(nsid: &str, body: &str) -> Result<T, SocialError> {
    serde_json::from_str(body)
        .map_err(|e| SocialError::Malformed(format!("{nsid} response did not match schema: {e}")))
}

fn is_expired_token(status: StatusCode, body: &str) -> bool {
    matches!(status, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED)
        && serde_json::from_str::<XrpcErrorBody>(body)
            .ok()
            .and_then(|b| b.error)
            .is_some_and(|e| e == "ExpiredToken")
}

/// Map a non-success XRPC response to an error kind.
pub fn classify_response(
    nsid: &str,
    status: StatusCode,
    body: &str,
    retry_after: Option<Duration>,
) -> SocialError {
    let parsed: XrpcErrorBody = serde_json::from_str(body).unwrap_or_default();
    let name = parsed.error.unwrap_or_default();
    let detail = parsed.message.unwrap_or_else(|| body.chars().take(200).collect());
    let message = if name.is_empty() {
        format!("XRPC {nsid} returned {status}: {detail}")
    } else {
        format!("XRPC {nsid} returned {status} {name}: {detail}")
    };

    if status == StatusCode::TOO_MANY_REQUESTS {
        return SocialError::Transient {
            message,
            retry_after,
        };
    }
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status.as_u16() == 425
        || name == "ExpiredToken"
    {
        return SocialError::transient(message);
    }
    if status.is_client_error() || PERMANENT_ERRORS.contains(&name.as_str()) {
        return SocialError::Permanent(message);
    }
    SocialError::transient(message)
}

/// Server hint for how long to back off: `Retry-After` seconds, or the
/// `ratelimit-reset` epoch Bluesky sends.
pub fn retry_after_hint(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    parse_retry_after(header("retry-after"), header("ratelimit-reset"), now)
}

pub fn parse_retry_after(
    retry_after: Option<&str>,
    ratelimit_reset: Option<&str>,
    now: DateTime<Utc>,
) -> Option<Duration> {
    if let Some(secs) = retry_after.and_then(|v| v.trim().parse::<u64>().ok()) {
        return Some(Duration::from_secs(secs));
    }
    let reset = ratelimit_reset.and_then(|v| v.trim().parse::<i64>().ok())?;
    let wait = reset - now.timestamp();
    (wait > 0).then(|| Duration::from_secs(wait as u64))
}
