//! Session state — auth token, anti-forgery token, continuity triple.
//!
//! Owned by exactly one [`BardClient`](crate::client::BardClient). Nothing here
//! does I/O; the client fetches the token page and hands the body to
//! [`extract_anti_forgery_token`].

use std::sync::LazyLock;

use bard_config::{HttpConfig, ServiceConfig};
use regex::Regex;

use crate::error::{BardError, BardResult};

const X_SAME_DOMAIN: &str = "1";
const CONTENT_TYPE: &str = "application/x-www-form-urlencoded;charset=UTF-8";

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"SNlM0e":"(.*?)""#).expect("invalid token regex"));

/// Mutable per-conversation state.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    auth_token: String,
    pub anti_forgery_token: String,
    pub conversation_id: String,
    pub response_id: String,
    pub choice_id: String,
}

// Hand-written so the secrets never end up in logs.
impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("auth_token", &"<redacted>")
            .field("has_anti_forgery_token", &self.has_anti_forgery_token())
            .field("conversation_id", &self.conversation_id)
            .field("response_id", &self.response_id)
            .field("choice_id", &self.choice_id)
            .finish()
    }
}

impl SessionState {
    /// Create an empty session for a validated auth token.
    pub fn new(auth_token: impl Into<String>) -> BardResult<Self> {
        let auth_token = auth_token.into();
        validate_auth_token(&auth_token)?;
        Ok(Self {
            auth_token,
            ..Default::default()
        })
    }

    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    pub fn has_anti_forgery_token(&self) -> bool {
        !self.anti_forgery_token.is_empty()
    }

    /// Adopt the continuity triple of a successful answer.
    pub fn advance(&mut self, conversation_id: &str, response_id: &str, choice_id: &str) {
        self.conversation_id = conversation_id.to_string();
        self.response_id = response_id.to_string();
        self.choice_id = choice_id.to_string();
    }

    /// Forget the conversation and the anti-forgery token. Keeps the auth token.
    pub fn reset(&mut self) {
        self.anti_forgery_token.clear();
        self.conversation_id.clear();
        self.response_id.clear();
        self.choice_id.clear();
    }

    pub fn has_continuity(&self) -> bool {
        !(self.conversation_id.is_empty() && self.response_id.is_empty() && self.choice_id.is_empty())
    }

    /// Browser header set sent on both the token fetch and the answer fetch,
    /// followed by any extra headers from the HTTP config.
    pub fn headers(&self, service: &ServiceConfig, http: &HttpConfig) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = vec![
            ("Host".into(), service.host.clone()),
            ("User-Agent".into(), service.user_agent.clone()),
            ("Referer".into(), service.root_url.clone()),
            ("X-Same-Domain".into(), X_SAME_DOMAIN.into()),
            ("Content-Type".into(), CONTENT_TYPE.into()),
            ("Origin".into(), service.root_url.clone()),
            (
                "Cookie".into(),
                format!("{}={}", service.cookie_name, self.auth_token),
            ),
        ];
        headers.extend(http.headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        headers
    }
}

/// The session cookie value always ends in exactly one `.`.
pub fn validate_auth_token(token: &str) -> BardResult<()> {
    if token.ends_with('.') && !token.ends_with("..") {
        Ok(())
    } else {
        Err(BardError::InvalidInput(
            "auth token must end with a single '.'; check the session cookie value".into(),
        ))
    }
}

/// Pull the anti-forgery token out of the service root page. First match wins.
pub fn extract_anti_forgery_token(body: &str) -> BardResult<String> {
    TOKEN_RE
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            BardError::TokenExtractionFailed(
                "SNlM0e marker missing from page; check the auth token".into(),
            )
        })
}
