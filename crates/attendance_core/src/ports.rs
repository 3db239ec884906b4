//! crates/attendance_core/src/ports.rs
//!
//! Defines the service contracts (traits) for attendance capture.
//! These traits form the boundary of the hexagonal architecture, keeping the
//! scanner, router and pipeline independent of camera drivers, HTTP clients,
//! device storage and the UI toolkit.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::domain::{
    AuthSession, CameraDevice, Coordinates, Frame, Role, Route, SessionUser, Toast, VideoSource,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage Ports
//=========================================================================================

/// Durable key/value storage local to the device.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> PortResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> PortResult<()>;
    async fn remove(&self, key: &str) -> PortResult<()>;
}

/// Role-namespaced credentials plus the role bound to the current tab.
#[async_trait]
pub trait SessionStore: Send + Sync {
    fn active_role(&self) -> Option<Role>;
    fn set_active_role(&self, role: Role);

    async fn session(&self, role: Role) -> PortResult<Option<AuthSession>>;
    async fn token(&self, role: Role) -> PortResult<Option<String>>;
    async fn refresh_token(&self, role: Role) -> PortResult<Option<String>>;
    async fn user(&self, role: Role) -> PortResult<Option<SessionUser>>;

    async fn save_session(&self, role: Role, session: &AuthSession) -> PortResult<()>;
    async fn update_tokens(
        &self,
        role: Role,
        token: &str,
        refresh_token: Option<&str>,
    ) -> PortResult<()>;
    async fn update_user(&self, role: Role, user: &SessionUser) -> PortResult<()>;
    async fn clear(&self, role: Role) -> PortResult<()>;
}

//=========================================================================================
// Network Port
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            bearer: None,
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            bearer: None,
            body: Some(body),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a request to the backend. Only transport failures are errors; every
/// HTTP status comes back as a response.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> PortResult<HttpResponse>;
}

//=========================================================================================
// Camera Ports
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackCapabilities {
    pub torch: bool,
}

/// A single hardware track of an open stream.
#[async_trait]
pub trait VideoTrack: Send + Sync {
    fn id(&self) -> String;
    fn is_live(&self) -> bool;
    /// Releases the hardware. Stopping an ended track is a no-op.
    fn stop(&self);
    fn capabilities(&self) -> TrackCapabilities;
    async fn apply_torch(&self, on: bool) -> PortResult<()>;
}

/// An open hardware video stream.
#[async_trait]
pub trait CameraStream: Send + Sync {
    fn tracks(&self) -> Vec<Arc<dyn VideoTrack>>;
    /// Waits for the next frame. Errors once the stream has ended.
    async fn next_frame(&self) -> PortResult<Frame>;
}

#[async_trait]
pub trait CameraBackend: Send + Sync {
    async fn enumerate_devices(&self) -> PortResult<Vec<CameraDevice>>;
    async fn open_stream(&self, source: &VideoSource) -> PortResult<Arc<dyn CameraStream>>;
}

/// Finds and decodes a QR code. `Ok(None)` means nothing was found.
pub trait QrDecoder: Send + Sync {
    fn decode_frame(&self, frame: &Frame) -> PortResult<Option<String>>;
    fn decode_image(&self, image: &[u8]) -> PortResult<Option<String>>;
}

//=========================================================================================
// Device and UI Ports
//=========================================================================================

#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn current_position(&self) -> PortResult<Coordinates>;
}

/// The presentation layer as seen by the subsystem.
pub trait UserInterface: Send + Sync {
    fn show_toast(&self, toast: &Toast);
    fn dismiss_toast(&self, toast_id: uuid::Uuid);
    fn show_error(&self, message: &str);
    /// Status line under the video surface; `None` clears it.
    fn set_status(&self, status: Option<&str>);
    fn navigate(&self, route: Route);
}
