use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Url};
use serde::Deserialize;

use crate::model::UserInfo;
use crate::{Error, Result};

const USER_AGENT: &str = "Instagram 269.0.0.18.75 Android (26/8.0.0; 480dpi; 1080x1920; \
                          OnePlus; 6T Dev; devitron; qcom; en_US; 314665256)";
const APP_ID: &str = "567067343352427";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Longest provider message kept in an error, in chars. Error pages can be huge.
pub const MAX_ERROR_MESSAGE: usize = 1_000;

/// Session credential for the provider. Only ever supplied from outside the binary.
#[derive(Clone)]
pub struct Credentials {
    session_id: String,
}

impl Credentials {
    pub fn new(session_id: impl Into<String>) -> Result<Self> {
        let session_id = session_id.into().trim().to_string();
        if session_id.is_empty() {
            return Err(Error::MissingSession);
        }
        Ok(Self { session_id })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The numeric user id the session belongs to, i.e. everything before the first `:`/`%3A`.
    pub fn user_id(&self) -> Result<u64> {
        let prefix = self
            .session_id
            .split(|c: char| c == ':' || c == '%')
            .next()
            .unwrap_or_default();
        prefix.parse().map_err(|_| Error::InvalidSession)
    }
}

// Never print the token itself.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("session_id", &"<redacted>")
            .finish()
    }
}

/// Something that can open an authenticated session.
#[async_trait]
pub trait ProfileProvider: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<Box<dyn ProviderSession>>;
}

/// An authenticated session that can look users up.
#[async_trait]
pub trait ProviderSession: Send + Sync {
    async fn user_info_by_username(&self, username: &str) -> Result<UserInfo>;
}

/// The private mobile API.
#[derive(Debug, Clone)]
pub struct InstagramApi {
    base_url: Url,
}

impl InstagramApi {
    pub fn new(base_url: &str) -> Result<Self> {
        let invalid = || Error::InvalidApiBase(base_url.to_string());
        let base_url = Url::parse(base_url).map_err(|_| invalid())?;
        if base_url.cannot_be_a_base() {
            return Err(invalid());
        }
        Ok(Self { base_url })
    }

    /// `base/seg1/seg2/.../` with every segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Can't fail, `new` rejects cannot-be-a-base urls.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments).push("");
        }
        url
    }
}

#[async_trait]
impl ProfileProvider for InstagramApi {
    /// Builds an authenticated client and checks the session against the account it belongs to.
    /// Transport failures and rejected sessions are raised.
    async fn login(&self, credentials: &Credentials) -> Result<Box<dyn ProviderSession>> {
        let user_id = credentials.user_id()?;

        let mut headers = header::HeaderMap::new();
        let cookie = format!(
            "sessionid={}; ds_user_id={user_id}",
            credentials.session_id()
        );
        let mut cookie =
            header::HeaderValue::from_str(&cookie).map_err(|_| Error::InvalidSession)?;
        cookie.set_sensitive(true);
        headers.insert(header::COOKIE, cookie);
        headers.insert("x-ig-app-id", header::HeaderValue::from_static(APP_ID));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let user_id = user_id.to_string();
        let res = client
            .get(self.endpoint(&["api", "v1", "users", &user_id, "info"]))
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await?;
            return Err(provider_status_error(status, &body));
        }

        Ok(Box::new(InstagramSession {
            client,
            api: self.clone(),
        }))
    }
}

struct InstagramSession {
    client: Client,
    api: InstagramApi,
}

#[derive(Deserialize)]
struct UsernameInfoResponse {
    user: Option<UserInfo>,
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    message: Option<String>,
}

#[async_trait]
impl ProviderSession for InstagramSession {
    async fn user_info_by_username(&self, username: &str) -> Result<UserInfo> {
        let res = self
            .client
            .get(self.api.endpoint(&["api", "v1", "users", username, "usernameinfo"]))
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            return Err(provider_status_error(status, &body));
        }

        let parsed: UsernameInfoResponse = serde_json::from_str(&body)?;
        parsed
            .user
            .ok_or_else(|| Error::UserNotFound(username.to_string()))
    }
}

/// Prefers the provider's own `message`, falls back to the raw body.
/// Either way the text is cut to [`MAX_ERROR_MESSAGE`] chars.
fn provider_status_error(status: reqwest::StatusCode, body: &str) -> Error {
    let message = serde_json::from_str::<ProviderErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| body.trim().to_string());
    let message = match message.char_indices().nth(MAX_ERROR_MESSAGE) {
        Some((cut, _)) => format!("{}...", &message[..cut]),
        None => message,
    };
    Error::ProviderStatus { status, message }
}
