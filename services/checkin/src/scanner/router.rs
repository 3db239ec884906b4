//! services/checkin/src/scanner/router.rs
//!
//! Turns decoded QR text (or a typed code) into a check-in request and hands it
//! to the pipeline. A QR payload is either a JSON session descriptor or the raw
//! session code; anything that is not a JSON object carrying `sessionCode` or
//! `qrCode` is taken verbatim.

use crate::pipeline::{CheckInError, CheckInOutcome, CheckInPipeline};
use attendance_core::ports::{Geolocator, SessionStore, UserInterface};
use attendance_core::{CheckInRequest, CheckInRequestError, Coordinates, Role, ScanMetadata, ScanPayload};
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const CODE_KEYS: [&str; 2] = ["sessionCode", "qrCode"];

fn text_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|k| map.get(*k)).find_map(|v| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

pub fn parse_payload(decoded: &str) -> ScanPayload {
    let text = decoded.trim();
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
        if let Some(session_code) = text_field(&map, &CODE_KEYS) {
            let metadata = ScanMetadata {
                course: text_field(&map, &["course", "courseName"]),
                course_code: text_field(&map, &["courseCode"]),
                lecturer: text_field(&map, &["lecturer", "lecturerName"]),
                student_name: text_field(&map, &["name", "studentName"]),
            };
            return ScanPayload {
                session_code,
                metadata: Some(metadata),
            };
        }
    }
    ScanPayload {
        session_code: text.to_string(),
        metadata: None,
    }
}

/// Resolves the role for a call: the explicit one, else the tab's active role.
pub fn resolve_role(sessions: &dyn SessionStore, explicit: Option<Role>) -> Result<Role, CheckInError> {
    explicit
        .or_else(|| sessions.active_role())
        .ok_or(CheckInError::NoActiveRole)
}

pub struct ScanResultRouter {
    sessions: Arc<dyn SessionStore>,
    pipeline: Arc<CheckInPipeline>,
    geolocator: Arc<dyn Geolocator>,
    ui: Arc<dyn UserInterface>,
    default_centre: String,
    geolocation_timeout: Duration,
}

impl ScanResultRouter {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        pipeline: Arc<CheckInPipeline>,
        geolocator: Arc<dyn Geolocator>,
        ui: Arc<dyn UserInterface>,
        default_centre: String,
        geolocation_timeout: Duration,
    ) -> Self {
        Self {
            sessions,
            pipeline,
            geolocator,
            ui,
            default_centre,
            geolocation_timeout,
        }
    }

    /// Routes one decoded QR text. At most one submission per call.
    pub async fn route(&self, role: Role, decoded: &str) -> CheckInOutcome {
        let payload = parse_payload(decoded);
        debug!(
            session_code = %payload.session_code,
            json = payload.metadata.is_some(),
            "QR payload parsed"
        );
        self.submit_payload(role, payload).await
    }

    /// Routes a code typed into the manual entry field.
    pub async fn submit_code(&self, role: Role, code: &str) -> CheckInOutcome {
        self.submit_payload(
            role,
            ScanPayload {
                session_code: code.trim().to_string(),
                metadata: None,
            },
        )
        .await
    }

    pub async fn build_request(
        &self,
        role: Role,
        payload: &ScanPayload,
    ) -> Result<CheckInRequest, CheckInError> {
        if payload.session_code.trim().is_empty() {
            return Err(CheckInRequestError::EmptySessionCode.into());
        }
        let user = self
            .sessions
            .user(role)
            .await
            .map_err(CheckInError::Storage)?
            .unwrap_or_default();
        let student_id = user
            .checkin_id()
            .ok_or(CheckInRequestError::MissingStudentId)?
            .to_string();
        let centre = user
            .centre
            .clone()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| self.default_centre.clone());
        let coordinates = self.locate().await;

        Ok(CheckInRequest::new(
            &student_id,
            &payload.session_code,
            &centre,
            Utc::now(),
            coordinates,
        )?)
    }

    async fn submit_payload(&self, role: Role, payload: ScanPayload) -> CheckInOutcome {
        let request = match self.build_request(role, &payload).await {
            Ok(request) => request,
            Err(e) => {
                self.ui.show_error(&e.to_string());
                return Err(e);
            }
        };
        info!(%role, session_code = %request.session_code, "Routing check-in.");
        self.pipeline
            .submit(role, &request, payload.metadata.as_ref())
            .await
    }

    /// Best effort; a slow or failing lookup just means no coordinates.
    async fn locate(&self) -> Option<Coordinates> {
        match tokio::time::timeout(self.geolocation_timeout, self.geolocator.current_position())
            .await
        {
            Ok(Ok(position)) => Some(position),
            Ok(Err(e)) => {
                debug!("Location unavailable: {}", e);
                None
            }
            Err(_) => {
                debug!("Location lookup timed out");
                None
            }
        }
    }
}
