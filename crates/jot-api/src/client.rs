use crate::gate::{DEFAULT_REFRESH_THRESHOLD_MS, TokenRefreshGate, TokenRefresher};
use crate::response::ApiResponse;
use jot_core::{JotError, JotResult, now_millis};
use jot_store::{LocalState, SessionExpireReason};
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode, Url};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const SESSION_INVALIDATION_CODES: [&str; 5] = [
    "DB_RESET",
    "DB_INITIALIZED",
    "USER_NOT_FOUND",
    "AUTH_EXPIRED",
    "INVALID_TOKEN",
];

const REFRESH_PATH: &str = "/api/auth/refresh-token";

/// Issues one logical REST operation with bearer auth and a single
/// refresh-and-retry cycle on 401.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: Client,
    state: LocalState,
    gate: Arc<TokenRefreshGate>,
}

enum Classified {
    Done(ApiResponse),
    Unauthorized(JotError),
}

struct HttpRefresher {
    base_url: String,
    client: Client,
}

impl ApiClient {
    pub fn new(base_url: &str, state: LocalState) -> JotResult<Self> {
        Self::with_refresh_threshold(base_url, state, DEFAULT_REFRESH_THRESHOLD_MS)
    }

    pub fn with_refresh_threshold(
        base_url: &str,
        state: LocalState,
        refresh_threshold_ms: i64,
    ) -> JotResult<Self> {
        let trimmed = base_url.trim().trim_end_matches('/').to_string();
        if trimmed.is_empty() {
            return Err(JotError::usage("server URL cannot be empty"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(format!("jot/{}", env!("CARGO_PKG_VERSION")))
            .cookie_store(true)
            .build()
            .map_err(|err| JotError::io(format!("failed to construct API client: {err}")))?;

        let refresher = Arc::new(HttpRefresher {
            base_url: trimmed.clone(),
            client: client.clone(),
        });
        let gate = Arc::new(TokenRefreshGate::new(
            state.clone(),
            refresher,
            refresh_threshold_ms,
        ));

        Ok(Self {
            base_url: trimmed,
            client,
            state,
            gate,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn state(&self) -> &LocalState {
        &self.state
    }

    pub fn gate(&self) -> &TokenRefreshGate {
        &self.gate
    }

    pub fn request(&self, method: Method, path: &str, body: Option<&Value>) -> JotResult<ApiResponse> {
        self.execute(method, path, &[], body, true)
    }

    pub fn get(&self, path: &str, query: &[(&str, String)]) -> JotResult<ApiResponse> {
        self.execute(Method::GET, path, query, None, true)
    }

    /// Like [`ApiClient::request`] but a 401 is returned as-is, for
    /// credential exchanges where refreshing makes no sense.
    pub fn request_without_refresh(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> JotResult<ApiResponse> {
        self.execute(method, path, &[], body, false)
    }

    /// Clears auth state and records why; returns the error to surface.
    pub fn expire_session(&self, code: Option<&str>, message: Option<&str>) -> JotError {
        self.gate.clear();
        let reason = SessionExpireReason::from_code(code);
        let expiration = self.state.expire_session(reason, message, now_millis());
        warn!(reason = reason.as_str(), "session expired");
        JotError::session_expired(expiration.message)
    }

    fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        refresh_on_401: bool,
    ) -> JotResult<ApiResponse> {
        let url = self.url(path, query)?;
        let token = self.gate.get_token();

        let response = self.send(&method, &url, body, token.as_deref())?;
        match self.classify(&url, response)? {
            Classified::Done(response) => Ok(response),
            Classified::Unauthorized(err) if !refresh_on_401 => Err(err),
            Classified::Unauthorized(_) => {
                debug!(%method, path, "request unauthorized; refreshing token once");
                let fresh = match self.gate.refresh() {
                    Ok(Some(token)) => token,
                    Ok(None) => {
                        return Err(self.expire_session(
                            Some("AUTH_EXPIRED"),
                            Some("authentication expired, please sign in again"),
                        ));
                    }
                    Err(err) if err.is_terminal_auth() => {
                        return Err(self.expire_session(Some("AUTH_EXPIRED"), Some(&err.message)));
                    }
                    Err(err) => {
                        return Err(JotError::auth(format!(
                            "token refresh failed: {}",
                            err.message
                        ))
                        .with_status(401));
                    }
                };

                let retry = self.send(&method, &url, body, Some(&fresh))?;
                match self.classify(&url, retry)? {
                    Classified::Done(response) => Ok(response),
                    Classified::Unauthorized(_) => Err(self.expire_session(
                        Some("AUTH_EXPIRED"),
                        Some("authentication expired, please sign in again"),
                    )),
                }
            }
        }
    }

    fn send(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> JotResult<Response> {
        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().map_err(network_error)
    }

    fn classify(&self, requested: &Url, response: Response) -> JotResult<Classified> {
        let status = response.status();
        let final_url = response.url().clone();

        if final_url.path() != requested.path() && is_login_page(&final_url) {
            warn!(url = %final_url, "request redirected to a login page");
            return Err(self.expire_session(None, None));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let body_text = response.text().map_err(network_error)?;

        if !status.is_success() {
            let parsed = serde_json::from_str::<Value>(&body_text).ok();
            let code = parsed
                .as_ref()
                .and_then(|value| value.get("code"))
                .and_then(Value::as_str);

            if let Some(code) = code
                && SESSION_INVALIDATION_CODES.contains(&code)
            {
                let message = parsed
                    .as_ref()
                    .and_then(|value| value.get("message"))
                    .and_then(Value::as_str);
                return Err(self.expire_session(Some(code), message));
            }

            if status == StatusCode::UNAUTHORIZED {
                return Ok(Classified::Unauthorized(parse_error_response(
                    status,
                    &body_text,
                    parsed.as_ref(),
                )));
            }

            return Err(parse_error_response(status, &body_text, parsed.as_ref()));
        }

        if content_type.contains("text/html") {
            return Err(JotError::parse("server returned an HTML page instead of API data")
                .with_status(status.as_u16()));
        }

        if status == StatusCode::NO_CONTENT || body_text.trim().is_empty() {
            return Ok(Classified::Done(ApiResponse::empty(status.as_u16())));
        }

        let mut value = serde_json::from_str::<Value>(&body_text).map_err(|err| {
            JotError::parse(format!("server returned malformed JSON: {err}"))
                .with_status(status.as_u16())
        })?;
        if let Value::Object(map) = &mut value {
            map.entry("success").or_insert(Value::Bool(true));
        }

        Ok(Classified::Done(ApiResponse::new(status.as_u16(), value)))
    }

    pub(crate) fn url(&self, path: &str, query: &[(&str, String)]) -> JotResult<Url> {
        let raw = format!("{}{}", self.base_url, path);
        let mut url = Url::parse(&raw)
            .map_err(|err| JotError::usage(format!("invalid request URL '{raw}': {err}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

impl TokenRefresher for HttpRefresher {
    fn refresh_token(&self, current: &str) -> JotResult<String> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, REFRESH_PATH))
            .bearer_auth(current)
            .json(&Value::Object(Map::new()))
            .send()
            .map_err(network_error)?;

        let status = response.status();
        let body_text = response.text().map_err(network_error)?;
        let parsed = serde_json::from_str::<Value>(&body_text).ok();

        if !status.is_success() {
            return Err(parse_error_response(status, &body_text, parsed.as_ref()));
        }

        parsed
            .as_ref()
            .and_then(|value| value.get("token"))
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                JotError::server(status.as_u16(), "refresh response did not include a token")
            })
    }
}

fn is_login_page(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    path.contains("login") || path.contains("auth")
}

fn parse_error_response(status: StatusCode, body_text: &str, parsed: Option<&Value>) -> JotError {
    let body_trimmed = body_text.trim();
    let looks_like_html = body_trimmed.contains("<!DOCTYPE") || body_trimmed.contains("<html");

    let message = parsed
        .and_then(|value| {
            value
                .get("message")
                .and_then(Value::as_str)
                .or_else(|| value.get("error").and_then(Value::as_str))
        })
        .map(|message| truncate_for_error(message, 240))
        .unwrap_or_else(|| {
            if looks_like_html {
                format!(
                    "server returned HTML instead of API data (status {})",
                    status.as_u16()
                )
            } else if body_trimmed.is_empty() {
                format!("request failed with status {}", status.as_u16())
            } else {
                truncate_for_error(body_trimmed, 240)
            }
        });

    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        JotError::auth(message).with_status(status.as_u16())
    } else {
        JotError::server(status.as_u16(), message)
    }
}

fn truncate_for_error(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }

    let truncated: String = input.chars().take(max_chars).collect();
    format!("{truncated}...")
}

fn network_error(err: reqwest::Error) -> JotError {
    JotError::network(format!("network request failed: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_message_then_error_then_body() {
        let with_message = serde_json::json!({"message": "bad", "error": "worse"});
        let err = parse_error_response(StatusCode::BAD_REQUEST, "", Some(&with_message));
        assert_eq!(err.message, "bad");

        let with_error = serde_json::json!({"error": "worse"});
        let err = parse_error_response(StatusCode::BAD_REQUEST, "", Some(&with_error));
        assert_eq!(err.message, "worse");

        let err = parse_error_response(StatusCode::BAD_GATEWAY, "upstream down", None);
        assert_eq!(err.message, "upstream down");
        assert_eq!(err.status, Some(502));
    }

    #[test]
    fn html_error_bodies_get_a_readable_message() {
        let err = parse_error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "<!DOCTYPE html><html><body>oops</body></html>",
            None,
        );
        assert_eq!(
            err.message,
            "server returned HTML instead of API data (status 500)"
        );
    }

    #[test]
    fn forbidden_is_an_auth_error() {
        let err = parse_error_response(StatusCode::FORBIDDEN, "{}", None);
        assert_eq!(err.kind, jot_core::ErrorKind::Auth);
        assert_eq!(err.status, Some(403));
    }

    #[test]
    fn long_messages_are_truncated() {
        let long = "x".repeat(300);
        assert_eq!(truncate_for_error(&long, 10), "xxxxxxxxxx...");
    }
}
