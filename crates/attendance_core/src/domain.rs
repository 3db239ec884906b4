//! crates/attendance_core/src/domain.rs
//!
//! Defines the pure, core data structures for attendance capture.
//! These structs carry no I/O; the serde derives describe how they are laid out
//! in device storage and on the wire to the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Identity
//=========================================================================================

/// The identity a tab acts as. Credentials and notifications are namespaced by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Lecturer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Lecturer => "lecturer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("'{0}' is not a known role")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "lecturer" => Ok(Role::Lecturer),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// The user profile stored next to a role's token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    #[serde(default, alias = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centre: Option<String>,
}

impl SessionUser {
    /// The identifier submitted with a check-in. Falls back to the account id
    /// for profiles that predate the dedicated student number.
    pub fn checkin_id(&self) -> Option<&str> {
        self.student_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| Some(self.id.as_str()).filter(|s| !s.trim().is_empty()))
    }
}

// Represents the credentials held for a single role
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSession {
    pub token: String,
    pub refresh_token: Option<String>,
    pub user: SessionUser,
}

//=========================================================================================
// Camera
//=========================================================================================

/// A camera listed by the platform's media device enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FacingMode {
    #[default]
    Environment,
    User,
}

impl FacingMode {
    pub fn flipped(self) -> Self {
        match self {
            FacingMode::Environment => FacingMode::User,
            FacingMode::User => FacingMode::Environment,
        }
    }
}

/// The constraint a stream is requested with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    Device(String),
    Facing(FacingMode),
}

/// Where the camera session manager is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanPhase {
    #[default]
    Idle,
    Scanning,
    ImageScanning,
    ResumingLive,
}

/// A snapshot of the scanner view's state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanSession {
    pub active: bool,
    pub phase: ScanPhase,
    pub selected_device_index: usize,
    pub facing_mode: FacingMode,
    pub torch_on: bool,
    pub torch_supported: bool,
    pub last_error: Option<String>,
}

/// A single greyscale video frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub luma: Vec<u8>,
}

impl Frame {
    /// Returns the centred square of side `size`, clamped to the frame bounds.
    pub fn center_crop(&self, size: u32) -> Frame {
        let side = size.min(self.width).min(self.height);
        if side == self.width && side == self.height {
            return self.clone();
        }
        let x0 = (self.width - side) / 2;
        let y0 = (self.height - side) / 2;
        let mut luma = Vec::with_capacity((side * side) as usize);
        for y in y0..y0 + side {
            let start = (y * self.width + x0) as usize;
            let end = start + side as usize;
            match self.luma.get(start..end) {
                Some(row) => luma.extend_from_slice(row),
                None => break,
            }
        }
        Frame {
            width: side,
            height: side,
            luma,
        }
    }
}

//=========================================================================================
// Check-in
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Optional descriptive fields carried by a JSON QR payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanMetadata {
    pub course: Option<String>,
    pub course_code: Option<String>,
    pub lecturer: Option<String>,
    pub student_name: Option<String>,
}

impl ScanMetadata {
    /// "CODE - Course" when both are known, whichever exists otherwise.
    pub fn course_label(&self) -> Option<String> {
        match (self.course_code.as_deref(), self.course.as_deref()) {
            (Some(code), Some(course)) => Some(format!("{} - {}", code, course)),
            (Some(code), None) => Some(code.to_string()),
            (None, Some(course)) => Some(course.to_string()),
            (None, None) => None,
        }
    }
}

/// The result of interpreting decoded QR text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPayload {
    pub session_code: String,
    pub metadata: Option<ScanMetadata>,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CheckInRequestError {
    #[error("A session code is required")]
    EmptySessionCode,
    #[error("No student id is available for the active session")]
    MissingStudentId,
}

/// The body posted to the check-in endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRequest {
    pub student_id: String,
    pub session_code: String,
    pub centre: String,
    pub timestamp: String,
    #[serde(rename = "location")]
    pub coordinates: Option<Coordinates>,
}

impl CheckInRequest {
    pub fn new(
        student_id: &str,
        session_code: &str,
        centre: &str,
        at: DateTime<Utc>,
        coordinates: Option<Coordinates>,
    ) -> Result<Self, CheckInRequestError> {
        let session_code = session_code.trim();
        if session_code.is_empty() {
            return Err(CheckInRequestError::EmptySessionCode);
        }
        if student_id.trim().is_empty() {
            return Err(CheckInRequestError::MissingStudentId);
        }
        Ok(Self {
            student_id: student_id.to_string(),
            session_code: session_code.to_string(),
            centre: centre.to_string(),
            timestamp: at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            coordinates,
        })
    }
}

//=========================================================================================
// Notifications
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationCategory {
    Deadline,
    General,
    Completed,
}

/// A notification persisted to device storage, newest first per role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub time_ago: String,
    pub category: NotificationCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_button: Option<String>,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// UI
//=========================================================================================

/// Hard navigations the core may request of the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login(Role),
    Notifications { tab: NotificationCategory },
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Login(role) => format!("/{}/login", role),
            Route::Notifications { tab } => {
                let tab = match tab {
                    NotificationCategory::Deadline => "deadline",
                    NotificationCategory::General => "general",
                    NotificationCategory::Completed => "completed",
                };
                format!("/notifications?tab={}", tab)
            }
        }
    }
}

/// A transient message shown over the current view.
#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub category: NotificationCategory,
}
