//! services/checkin/src/pipeline.rs
//!
//! Submits a check-in and turns the answer into user feedback.
//!
//! The backend's reply is decoded into an explicit `CheckInResult`. On success a
//! `completed` notification is persisted first, and only then is the toast
//! shown, so following the toast to the notifications view always finds the
//! record. Failures surface a readable message and write nothing.

use crate::notifications::NotificationService;
use crate::session::api::{error_message, ApiClient, ApiError};
use crate::toast::ToastCenter;
use attendance_core::ports::{HttpRequest, HttpResponse, PortError, UserInterface};
use attendance_core::{
    CheckInRequest, CheckInRequestError, NotificationCategory, NotificationRecord, Role,
    ScanMetadata, Toast,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const CHECK_IN_PATH: &str = "/api/attendance/check-in";

//=========================================================================================
// Result and Error Types
//=========================================================================================

/// What the backend said about a check-in.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckInResult {
    Confirmed { message: Option<String>, data: Value },
    Rejected { reason: String },
}

#[derive(Deserialize, Default)]
struct CheckInResponseBody {
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

impl CheckInResult {
    pub fn from_response(response: &HttpResponse) -> Self {
        if !response.is_success() {
            let reason = error_message(&response.body)
                .unwrap_or_else(|| format!("Check-in failed ({})", response.status));
            return CheckInResult::Rejected { reason };
        }

        let body: CheckInResponseBody = match &response.body {
            Value::Null => CheckInResponseBody::default(),
            Value::String(text) => CheckInResponseBody {
                message: Some(text.clone()),
                ..Default::default()
            },
            other =>match serde_json::from_value(other.clone()) {
                Ok(body) => body,
                Err(e) => {
                    return CheckInResult::Rejected {
                        reason: format!("Unexpected check-in response: {}", e),
                    }
                }
            },
        };

        let flagged = match &body.error {
            None | Some(Value::Null) | Some(Value::Bool(false)) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => Some(String::new()),
        };
        match flagged {
            Some(detail) => CheckInResult::Rejected {
                reason: body
                    .message
                    .filter(|m| !m.trim().is_empty())
                    .or(Some(detail).filter(|d| !d.is_empty()))
                    .unwrap_or_else(|| "Check-in was not accepted".to_string()),
            },
            None => CheckInResult::Confirmed {
                message: body.message,
                data: body.data.unwrap_or(Value::Null),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheckInError {
    #[error(transparent)]
    Request(#[from] CheckInRequestError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("{0}")]
    Rejected(String),
    #[error("No role is active in this session")]
    NoActiveRole,
    #[error("Attendance was recorded but the confirmation could not be saved: {0}")]
    Storage(PortError),
    #[error("The check-in task stopped unexpectedly: {0}")]
    Interrupted(String),
}

/// Everything produced by a successful check-in.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckInConfirmation {
    pub notification_id: Uuid,
    pub toast_id: Uuid,
    pub message: String,
    pub unread: u32,
}

pub type CheckInOutcome = Result<CheckInConfirmation, CheckInError>;

//=========================================================================================
// The Pipeline
//=========================================================================================

pub struct CheckInPipeline {
    api: Arc<ApiClient>,
    notifications: Arc<NotificationService>,
    toasts: Arc<ToastCenter>,
    ui: Arc<dyn UserInterface>,
}

impl CheckInPipeline {
    pub fn new(
        api: Arc<ApiClient>,
        notifications: Arc<NotificationService>,
        toasts: Arc<ToastCenter>,
        ui: Arc<dyn UserInterface>,
    ) -> Self {
        Self {
            api,
            notifications,
            toasts,
            ui,
        }
    }

    pub async fn submit(
        &self,
        role: Role,
        request: &CheckInRequest,
        metadata: Option<&ScanMetadata>,
    ) -> CheckInOutcome {
        info!(%role, session_code = %request.session_code, "Submitting check-in.");

        let body = serde_json::to_value(request)
            .map_err(|e| ApiError::Decode(format!("Failed to encode check-in: {}", e)))?;
        let response = match self.api.fetch(role, HttpRequest::post(CHECK_IN_PATH, body)).await {
            Ok(response) => response,
            Err(e) => {
                warn!(%role, "Check-in request failed: {}", e);
                self.ui.show_error(&e.to_string());
                return Err(CheckInError::Api(e));
            }
        };

        match CheckInResult::from_response(&response) {
            CheckInResult::Rejected { reason } => {
                warn!(%role, status = response.status, "Check-in rejected: {}", reason);
                self.ui.show_error(&reason);
                Err(CheckInError::Rejected(reason))
            }
            CheckInResult::Confirmed { .. } => self.confirm(role, request, metadata).await,
        }
    }

    async fn confirm(
        &self,
        role: Role,
        request: &CheckInRequest,
        metadata: Option<&ScanMetadata>,
    ) -> CheckInOutcome {
        let label = metadata
            .and_then(ScanMetadata::course_label)
            .unwrap_or_else(|| "Attendance".to_string());
        let message = format!("{}: check-in recorded", label);

        let record = NotificationRecord {
            id: Uuid::new_v4(),
            kind: "Attendance".to_string(),
            message: message.clone(),
            time_ago: "Just now".to_string(),
            category: NotificationCategory::Completed,
            details: Some(details(request, metadata)),
            action_button: Some("View attendance".to_string()),
            read: false,
            created_at: Utc::now(),
        };
        let notification_id = record.id;

        // 1. Persist the record.
        let unread = match self.notifications.push(role, record).await {
            Ok(unread) => unread,
            Err(e) => {
                error!(%role, "Failed to store check-in notification: {}", e);
                let err = CheckInError::Storage(e);
                self.ui.show_error(&err.to_string());
                return Err(err);
            }
        };

        // 2. Only now tell the user.
        let toast_id = self.toasts.show(Toast {
            id: Uuid::new_v4(),
            title: "Check-in successful".to_string(),
            message: message.clone(),
            category: NotificationCategory::Completed,
        });

        info!(%role, %notification_id, "Check-in confirmed.");
        Ok(CheckInConfirmation {
            notification_id,
            toast_id,
            message,
            unread,
        })
    }
}

fn details(request: &CheckInRequest, metadata: Option<&ScanMetadata>) -> String {
    let mut parts = vec![format!("Session {}", request.session_code)];
    if let Some(meta) = metadata {
        if let Some(lecturer) = &meta.lecturer {
            parts.push(format!("Lecturer: {}", lecturer));
        }
        if let Some(name) = &meta.student_name {
            parts.push(format!("Student: {}", name));
        }
    }
    parts.push(format!("Centre: {}", request.centre));
    parts.push(format!("At {}", request.timestamp));
    parts.join(" | ")
}
