//! services/checkin/src/session/api.rs
//!
//! The authenticated client every backend call goes through.
//!
//! Each call names the role it acts for. A 401 triggers one refresh-and-retry
//! using that role's refresh token; refreshes for the same role are
//! single-flight, so parallel callers that all saw the same stale token wait for
//! one `/api/auth/refresh` call and reuse its result. A 401 after the retry (or a
//! refused refresh token) clears the role's credentials and sends the UI to the
//! login route. A refresh that fails in transit keeps the credentials and
//! reports the network error. A 403 is reported as `Forbidden` and never
//! refreshes.

use attendance_core::ports::{
    HttpRequest, HttpResponse, HttpTransport, PortError, SessionStore, UserInterface,
};
use attendance_core::{Role, Route, SessionUser};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

pub const REFRESH_PATH: &str = "/api/auth/refresh";
pub const PROFILE_PATH: &str = "/api/auth/me-enhanced";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Not signed in as {0}")]
    NotAuthenticated(Role),
    #[error("Your {0} session has expired, please sign in again")]
    SessionExpired(Role),
    #[error("You do not have permission to do that")]
    Forbidden,
    #[error("Request failed ({status}): {message}")]
    Status { status: u16, message: String },
    #[error("Unexpected response: {0}")]
    Decode(String),
    #[error("Storage error: {0}")]
    Storage(#[from] PortError),
}

/// Why a refresh did not produce a token.
enum RefreshFailure {
    /// No answer from the backend; the stored credentials are untouched.
    Kept(ApiError),
    /// The backend refused the refresh token and the role was signed out.
    Rejected,
    /// Another caller signed the role out while this one waited.
    SignedOut,
}

impl From<PortError> for RefreshFailure {
    fn from(e: PortError) -> Self {
        RefreshFailure::Kept(ApiError::Storage(e))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct ProfileResponse {
    user: SessionUser,
}

/// Pulls a human-readable message out of an error body, whatever its shape.
pub fn error_message(body: &Value) -> Option<String> {
    match body {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Object(map) => ["message", "error", "detail"]
            .iter()
            .filter_map(|k| map.get(*k))
            .find_map(|v| v.as_str().map(str::to_string)),
        _ => None,
    }
}

//=========================================================================================
// The Client
//=========================================================================================

pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    sessions: Arc<dyn SessionStore>,
    ui: Arc<dyn UserInterface>,
    refresh_locks: Mutex<HashMap<Role, Arc<tokio::sync::Mutex<()>>>>,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        sessions: Arc<dyn SessionStore>,
        ui: Arc<dyn UserInterface>,
    ) -> Self {
        Self {
            transport,
            sessions,
            ui,
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Sends `request` as `role`. Any status other than 401/403 is returned to
    /// the caller untouched.
    pub async fn fetch(&self, role: Role, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let token = self
            .sessions
            .token(role)
            .await?
            .ok_or(ApiError::NotAuthenticated(role))?;

        let response = self.send_as(&request, &token).await?;
        match response.status {
            401 => {}
            403 => return Err(ApiError::Forbidden),
            _ => return Ok(response),
        }

        info!(%role, path = %request.path, "Received 401, refreshing token.");
        let fresh = match self.refresh(role, &token).await {
            Ok(fresh) => fresh,
            // Credentials survive a refresh that never got an answer.
            Err(RefreshFailure::Kept(e)) => {
                warn!(%role, "Token refresh did not complete: {}", e);
                return Err(e);
            }
            Err(RefreshFailure::Rejected) | Err(RefreshFailure::SignedOut) => {
                return Err(ApiError::SessionExpired(role));
            }
        };

        let retried = self.send_as(&request, &fresh).await?;
        match retried.status {
            401 => {
                warn!(%role, "Still unauthorized after refresh, signing out.");
                self.force_logout(role).await;
                Err(ApiError::SessionExpired(role))
            }
            403 => Err(ApiError::Forbidden),
            _ => Ok(retried),
        }
    }

    /// Like `fetch`, but treats every non-2xx status as an error.
    pub async fn fetch_json(&self, role: Role, request: HttpRequest) -> Result<Value, ApiError> {
        let response = self.fetch(role, request).await?;
        if response.is_success() {
            Ok(response.body)
        } else {
            Err(ApiError::Status {
                status: response.status,
                message: error_message(&response.body)
                    .unwrap_or_else(|| "Request failed".to_string()),
            })
        }
    }

    /// Reloads the signed-in user from the backend and stores it for `role`.
    pub async fn refresh_profile(&self, role: Role) -> Result<SessionUser, ApiError> {
        let body = self.fetch_json(role, HttpRequest::get(PROFILE_PATH)).await?;
        let profile: ProfileResponse =
            serde_json::from_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.sessions.update_user(role, &profile.user).await?;
        Ok(profile.user)
    }

    /// Signs `role` out of this device.
    pub async fn logout(&self, role: Role) -> Result<(), ApiError> {
        self.sessions.clear(role).await?;
        info!(%role, "Signed out.");
        self.ui.navigate(Route::Login(role));
        Ok(())
    }

    async fn send_as(&self, request: &HttpRequest, token: &str) -> Result<HttpResponse, ApiError> {
        let mut request = request.clone();
        request.bearer = Some(token.to_string());
        self.transport
            .send(request)
            .await
            .map_err(|e| ApiError::Network(e.to_string()))
    }

    fn refresh_lock(&self, role: Role) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.refresh_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(role).or_default().clone()
    }

    /// Exchanges the refresh token for a new access token, unless another
    /// caller already replaced `stale_token` while this one waited. A rejected
    /// refresh signs the role out before the lock is released, so callers
    /// queued behind it see `SignedOut` and do not sign out again.
    async fn refresh(&self, role: Role, stale_token: &str) -> Result<String, RefreshFailure> {
        let lock = self.refresh_lock(role);
        let _guard = lock.lock().await;

        match self.sessions.token(role).await? {
            Some(current) if current != stale_token => return Ok(current),
            Some(_) => {}
            None => return Err(RefreshFailure::SignedOut),
        }

        let Some(refresh_token) = self.sessions.refresh_token(role).await? else {
            warn!(%role, "No refresh token stored, signing out.");
            return Err(self.reject_refresh(role).await);
        };

        let response = self
            .transport
            .send(HttpRequest::post(
                REFRESH_PATH,
                json!({ "refreshToken": refresh_token }),
            ))
            .await
            .map_err(|e| RefreshFailure::Kept(ApiError::Network(e.to_string())))?;

        match response.status {
            401 | 403 => {
                warn!(%role, status = response.status, "Refresh token rejected, signing out.");
                return Err(self.reject_refresh(role).await);
            }
            _ if !response.is_success() => {
                return Err(RefreshFailure::Kept(ApiError::Status {
                    status: response.status,
                    message: error_message(&response.body)
                        .unwrap_or_else(|| "Token refresh failed".to_string()),
                }));
            }
            _ => {}
        }
        let refreshed: RefreshResponse = serde_json::from_value(response.body)
            .map_err(|e| RefreshFailure::Kept(ApiError::Decode(e.to_string())))?;

        self.sessions
            .update_tokens(role, &refreshed.token, refreshed.refresh_token.as_deref())
            .await?;
        info!(%role, "Token refreshed.");
        Ok(refreshed.token)
    }

    async fn reject_refresh(&self, role: Role) -> RefreshFailure {
        self.force_logout(role).await;
        RefreshFailure::Rejected
    }

    async fn force_logout(&self, role: Role) {
        if let Err(e) = self.sessions.clear(role).await {
            error!(%role, "Failed to clear credentials: {}", e);
        }
        self.ui.navigate(Route::Login(role));
    }
}
