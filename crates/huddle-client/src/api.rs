//! HTTP API client.
//!
//! Thin wrapper over reqwest that speaks JSON, injects the CSRF token into
//! mutating requests, and normalizes every failure into [`ApiError`] at this
//! boundary — callers never see a raw transport error or a non-JSON body.

use std::sync::RwLock;
use std::time::Duration;

use anyhow::Result;
use chrono::Duration as ChronoDuration;
use reqwest::header::{CONTENT_TYPE, SET_COOKIE};
use reqwest::{Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use huddle_cache::Cache;
use huddle_types::api::{
    ApiErrorBody, CreateRoomRequest, CreateRoomResponse, InviteRequest, LoginRequest,
    LoginResponse, OnlineUsersResponse, ProfileUpdateRequest, ReactionToggleResponse,
    RegisterRequest, RenameRoomRequest, RoomInfoResponse, RoomListResponse,
    RoomMessagesResponse, SearchResponse, SessionResponse, UploadResponse,
};
use huddle_types::models::{Room, User};

/// Client-side cap on upload round trips.
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Cached static assets younger than this are served without a fetch.
const ASSET_MAX_AGE_DAYS: i64 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("server returned a non-JSON response")]
    NotJson,
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

#[derive(Default)]
struct AuthState {
    csrf_token: Option<String>,
    session_cookie: Option<String>,
}

pub struct ApiClient {
    http: reqwest::Client,
    base: String,
    auth: RwLock<AuthState>,
}

impl ApiClient {
    pub fn new(server_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self {
            http,
            base: server_url.trim_end_matches('/').to_string(),
            auth: RwLock::new(AuthState::default()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn csrf_token(&self) -> Option<String> {
        self.auth
            .read()
            .ok()
            .and_then(|auth| auth.csrf_token.clone())
    }

    /// The session cookie captured at login, for the gateway handshake.
    pub fn session_cookie(&self) -> Option<String> {
        self.auth
            .read()
            .ok()
            .and_then(|auth| auth.session_cookie.clone())
    }

    fn builder(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method.clone(), self.url(path));
        if method != Method::GET {
            if let Some(token) = self.csrf_token() {
                builder = builder.header("X-CSRFToken", token);
            }
        }
        builder
    }

    async fn send(
        &self,
        path: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<Response, ApiError> {
        builder.send().await.map_err(|e| {
            warn!("API error: {} {}", path, e);
            ApiError::from(e)
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let res = self.send(path, self.builder(Method::GET, path)).await?;
        read_json(path, res).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let res = self
            .send(path, self.builder(Method::POST, path).json(body))
            .await?;
        read_json(path, res).await
    }

    /// POST with no payload and no interesting response body.
    async fn post_empty(&self, path: &str) -> Result<(), ApiError> {
        let res = self.send(path, self.builder(Method::POST, path)).await?;
        expect_ok(path, res).await
    }

    // -- Auth --

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let path = "/api/login";
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let res = self
            .send(path, self.builder(Method::POST, path).json(&body))
            .await?;

        // The session cookie must be captured before the body consumes the
        // response; the gateway handshake reuses it.
        let session_cookie = res
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("session="))
            .map(|v| v.split(';').next().unwrap_or(v).to_string());

        let parsed: LoginResponse = read_json(path, res).await?;

        if let Ok(mut auth) = self.auth.write() {
            auth.csrf_token = Some(parsed.csrf_token.clone());
            if session_cookie.is_some() {
                auth.session_cookie = session_cookie;
            }
        }
        Ok(parsed)
    }

    pub async fn register(
        &self,
        username: &str,
        password: &str,
        nickname: &str,
    ) -> Result<(), ApiError> {
        let path = "/api/register";
        let body = RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
            nickname: nickname.to_string(),
        };
        let res = self
            .send(path, self.builder(Method::POST, path).json(&body))
            .await?;
        expect_ok(path, res).await
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        self.post_empty("/api/logout").await?;
        if let Ok(mut auth) = self.auth.write() {
            *auth = AuthState::default();
        }
        Ok(())
    }

    /// Session check; errors with 401 when not logged in.
    pub async fn me(&self) -> Result<SessionResponse, ApiError> {
        self.get_json("/api/me").await
    }

    // -- Rooms --

    pub async fn rooms(&self) -> Result<Vec<Room>, ApiError> {
        let res: RoomListResponse = self.get_json("/api/rooms").await?;
        Ok(res.rooms)
    }

    pub async fn create_room(&self, req: &CreateRoomRequest) -> Result<Room, ApiError> {
        let res: CreateRoomResponse = self.post_json("/api/rooms", req).await?;
        Ok(res.room)
    }

    pub async fn rename_room(&self, room_id: i64, name: &str) -> Result<(), ApiError> {
        let path = format!("/api/rooms/{}/name", room_id);
        let body = RenameRoomRequest { name: name.to_string() };
        let res = self
            .send(&path, self.builder(Method::PUT, &path).json(&body))
            .await?;
        expect_ok(&path, res).await
    }

    pub async fn pin_room(&self, room_id: i64) -> Result<(), ApiError> {
        self.post_empty(&format!("/api/rooms/{}/pin", room_id)).await
    }

    pub async fn mute_room(&self, room_id: i64) -> Result<(), ApiError> {
        self.post_empty(&format!("/api/rooms/{}/mute", room_id)).await
    }

    pub async fn leave_room(&self, room_id: i64) -> Result<(), ApiError> {
        self.post_empty(&format!("/api/rooms/{}/leave", room_id)).await
    }

    pub async fn invite(&self, room_id: i64, user_ids: Vec<i64>) -> Result<(), ApiError> {
        let path = format!("/api/rooms/{}/members", room_id);
        let body = InviteRequest { user_ids };
        let res = self
            .send(&path, self.builder(Method::POST, &path).json(&body))
            .await?;
        expect_ok(&path, res).await
    }

    pub async fn room_info(&self, room_id: i64) -> Result<RoomInfoResponse, ApiError> {
        self.get_json(&format!("/api/rooms/{}/info", room_id)).await
    }

    // -- Messages --

    /// Message page for a room. `before_id` asks for strictly older history;
    /// without it the server returns the newest page plus the room key and
    /// member read marks.
    pub async fn room_messages(
        &self,
        room_id: i64,
        before_id: Option<i64>,
        limit: Option<u32>,
    ) -> Result<RoomMessagesResponse, ApiError> {
        let path = format!("/api/rooms/{}/messages", room_id);
        let mut builder = self.builder(Method::GET, &path);
        if let Some(before_id) = before_id {
            builder = builder.query(&[("before_id", before_id)]);
        }
        if let Some(limit) = limit {
            builder = builder.query(&[("limit", u64::from(limit))]);
        }
        let res = self.send(&path, builder).await?;
        read_json(&path, res).await
    }

    pub async fn delete_message(&self, message_id: i64) -> Result<(), ApiError> {
        let path = format!("/api/messages/{}", message_id);
        let res = self.send(&path, self.builder(Method::DELETE, &path)).await?;
        expect_ok(&path, res).await
    }

    pub async fn toggle_reaction(
        &self,
        message_id: i64,
        emoji: &str,
    ) -> Result<ReactionToggleResponse, ApiError> {
        let path = format!("/api/messages/{}/reactions", message_id);
        self.post_json(&path, &serde_json::json!({ "emoji": emoji })).await
    }

    pub async fn search(
        &self,
        room_id: Option<i64>,
        query: &str,
        limit: u32,
    ) -> Result<SearchResponse, ApiError> {
        let path = "/api/search";
        let mut builder = self
            .builder(Method::GET, path)
            .query(&[("q", query)])
            .query(&[("limit", u64::from(limit))]);
        if let Some(room_id) = room_id {
            builder = builder.query(&[("room_id", room_id)]);
        }
        let res = self.send(path, builder).await?;
        read_json(path, res).await
    }

    // -- Uploads --

    pub async fn upload(
        &self,
        room_id: i64,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse, ApiError> {
        let path = "/api/upload";
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)?;
        let form = reqwest::multipart::Form::new()
            .text("room_id", room_id.to_string())
            .part("file", part);

        let res = self
            .send(
                path,
                self.builder(Method::POST, path)
                    .multipart(form)
                    .timeout(UPLOAD_TIMEOUT),
            )
            .await?;
        read_json(path, res).await
    }

    // -- Profile / presence --

    pub async fn update_profile(&self, req: &ProfileUpdateRequest) -> Result<(), ApiError> {
        let path = "/api/profile";
        let res = self
            .send(path, self.builder(Method::PUT, path).json(req))
            .await?;
        expect_ok(path, res).await
    }

    pub async fn online_users(&self) -> Result<Vec<User>, ApiError> {
        let res: OnlineUsersResponse = self.get_json("/api/users/online").await?;
        Ok(res.users)
    }

    // -- Static assets --

    /// Cache-first fetch for non-API GET resources (avatars, uploaded
    /// images). Fresh cache entries skip the network; a failed refresh falls
    /// back to whatever stale copy exists.
    pub async fn fetch_asset(
        &self,
        cache: &Cache,
        path: &str,
    ) -> Result<(Option<String>, Vec<u8>), ApiError> {
        if let Ok(Some(asset)) = cache.asset(path) {
            if asset.is_fresh(ChronoDuration::days(ASSET_MAX_AGE_DAYS)) {
                return Ok((asset.content_type, asset.body));
            }
        }

        let network = async {
            let res = self.send(path, self.builder(Method::GET, path)).await?;
            let status = res.status();
            if !status.is_success() {
                return Err(ApiError::Http {
                    status: status.as_u16(),
                    message: status.canonical_reason().unwrap_or("request failed").into(),
                });
            }
            let content_type = res
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = res.bytes().await?.to_vec();
            Ok::<_, ApiError>((content_type, body))
        }
        .await;

        match network {
            Ok((content_type, body)) => {
                if let Err(e) = cache.store_asset(path, content_type.as_deref(), &body) {
                    warn!("asset cache store failed: {}", e);
                }
                Ok((content_type, body))
            }
            Err(e) => match cache.asset(path) {
                Ok(Some(asset)) => {
                    debug!("serving stale cached asset for {}", path);
                    Ok((asset.content_type, asset.body))
                }
                _ => Err(e),
            },
        }
    }
}

async fn read_json<T: DeserializeOwned>(path: &str, res: Response) -> Result<T, ApiError> {
    let status = res.status();
    let is_json = res
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"));

    if !status.is_success() {
        let message = if is_json {
            res.json::<ApiErrorBody>()
                .await
                .map(|body| body.error)
                .ok()
        } else {
            None
        };
        let err = ApiError::Http {
            status: status.as_u16(),
            message: message
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").into()),
        };
        warn!("API error: {} {}", path, err);
        return Err(err);
    }

    if !is_json {
        warn!("API error: {} non-JSON success response", path);
        return Err(ApiError::NotJson);
    }
    res.json::<T>().await.map_err(|e| {
        warn!("API error: {} unreadable body: {}", path, e);
        ApiError::NotJson
    })
}

async fn expect_ok(path: &str, res: Response) -> Result<(), ApiError> {
    let status = res.status();
    if status.is_success() {
        return Ok(());
    }
    let message = res
        .json::<ApiErrorBody>()
        .await
        .map(|body| body.error)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("request failed").into());
    let err = ApiError::Http {
        status: status.as_u16(),
        message,
    };
    warn!("API error: {} {}", path, err);
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let api = ApiClient::new("http://chat.corp.local:8080/").unwrap();
        assert_eq!(api.url("/api/rooms"), "http://chat.corp.local:8080/api/rooms");
    }

    #[test]
    fn session_cookie_is_empty_before_login() {
        let api = ApiClient::new("http://localhost:8080").unwrap();
        assert!(api.session_cookie().is_none());
    }
}
