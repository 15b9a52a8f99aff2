use crate::client::ApiClient;
use crate::response::ApiResponse;
use jot_core::{JotError, JotResult, Note, now_millis};
use reqwest::Method;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct LoginData {
    pub token: String,
    pub user: Option<Value>,
}

impl ApiClient {
    /// `GET /api/notes` with the given filter pairs.
    pub fn list_notes(&self, filters: &[(&str, String)]) -> JotResult<Vec<Note>> {
        Ok(self.get("/api/notes", filters)?.ensure_success()?.notes())
    }

    pub fn list_trashed_notes(&self) -> JotResult<Vec<Note>> {
        Ok(self.get("/api/notes/trash", &[])?.ensure_success()?.notes())
    }

    pub fn list_starred_notes(&self) -> JotResult<Vec<Note>> {
        Ok(self.get("/api/notes/starred", &[])?.ensure_success()?.notes())
    }

    pub fn list_tag_notes(&self, tag_id: &str) -> JotResult<Vec<Note>> {
        let path = format!("/api/tags/{}/notes", path_segment(tag_id)?);
        Ok(self.get(&path, &[])?.ensure_success()?.notes())
    }

    pub fn trash_note(&self, note_id: &str) -> JotResult<ApiResponse> {
        let path = format!("/api/notes/{}/trash", path_segment(note_id)?);
        self.request(Method::PUT, &path, None)?.ensure_success()
    }

    pub fn restore_note(&self, note_id: &str) -> JotResult<ApiResponse> {
        let path = format!("/api/notes/{}/restore", path_segment(note_id)?);
        self.request(Method::POST, &path, None)?.ensure_success()
    }

    pub fn toggle_star(&self, note_id: &str) -> JotResult<ApiResponse> {
        let path = format!("/api/notes/{}/star", path_segment(note_id)?);
        self.request(Method::PUT, &path, None)?.ensure_success()
    }

    pub fn login(&self, username: &str, password: &str, remember: bool) -> JotResult<LoginData> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(JotError::usage("username and password are required"));
        }

        let body = json!({
            "username": username.trim(),
            "password": password,
            "remember": remember,
        });
        let response = self
            .request_without_refresh(Method::POST, "/api/auth/login", Some(&body))?
            .ensure_success()?;

        let token = response
            .get("token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| JotError::auth("login response did not include a token"))?
            .to_string();
        let user = response.get("user").cloned();

        self.gate().set_token(&token, now_millis());
        if let Some(user) = &user {
            self.state().set_user(user);
        }
        info!(username = username.trim(), "signed in");

        Ok(LoginData { token, user })
    }

    pub fn current_user(&self) -> JotResult<Value> {
        let response = self.get("/api/auth/me", &[])?.ensure_success()?;
        Ok(response
            .get("user")
            .or_else(|| response.get("data"))
            .cloned()
            .unwrap_or(response.body))
    }

    /// Signs out remotely when possible; local auth state is always dropped.
    pub fn logout(&self) -> JotResult<()> {
        let remote = self.request_without_refresh(Method::POST, "/api/auth/logout", None);
        self.gate().clear();
        self.state().clear_auth();
        self.state().clear_user();
        remote.map(|_| ())
    }
}

fn path_segment(id: &str) -> JotResult<&str> {
    let id = id.trim();
    if id.is_empty() || id.contains(['/', '?', '#', '%']) || id.chars().any(char::is_whitespace) {
        return Err(JotError::usage(format!("'{id}' is not a valid identifier")));
    }
    Ok(id)
}
