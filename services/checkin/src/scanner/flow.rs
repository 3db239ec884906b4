//! services/checkin/src/scanner/flow.rs
//!
//! The scanner view: open the camera, wait for the first decoded or typed code,
//! route it, and close. Closing always releases the camera, including while a
//! submission is still in flight; the submission itself is left to finish on its own.

use crate::pipeline::{CheckInError, CheckInOutcome};
use crate::scanner::camera::{CameraError, CameraSessionManager, StillImageOutcome};
use crate::scanner::router::ScanResultRouter;
use attendance_core::Role;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// A check-in that has been handed off and may still be running.
pub struct PendingCheckIn {
    handle: JoinHandle<CheckInOutcome>,
}

impl PendingCheckIn {
    pub async fn outcome(self) -> CheckInOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Check-in task failed: {}", e);
                Err(CheckInError::Interrupted(e.to_string()))
            }
        }
    }
}

/// Closes a scanner from outside the task driving it (close or cancel buttons).
#[derive(Clone)]
pub struct ScanFlowCloser {
    closed: CancellationToken,
    camera: CameraSessionManager,
}

impl ScanFlowCloser {
    pub async fn close(&self) {
        self.closed.cancel();
        self.camera.stop().await;
    }
}

pub struct ScanFlow {
    role: Role,
    camera: CameraSessionManager,
    decoded: mpsc::UnboundedReceiver<String>,
    /// Codes from the view's `ManualEntry` field.
    typed: mpsc::UnboundedReceiver<String>,
    router: Arc<ScanResultRouter>,
    closed: CancellationToken,
}

impl ScanFlow {
    pub fn new(
        role: Role,
        camera: CameraSessionManager,
        decoded: mpsc::UnboundedReceiver<String>,
        typed: mpsc::UnboundedReceiver<String>,
        router: Arc<ScanResultRouter>,
    ) -> Self {
        Self {
            role,
            camera,
            decoded,
            typed,
            router,
            closed: CancellationToken::new(),
        }
    }

    pub fn camera(&self) -> &CameraSessionManager {
        &self.camera
    }

    pub fn closer(&self) -> ScanFlowCloser {
        ScanFlowCloser {
            closed: self.closed.clone(),
            camera: self.camera.clone(),
        }
    }

    /// Picks a camera and starts live scanning. A failure leaves the view open
    /// with the error in the session status, so a code can still be typed.
    pub async fn open(&self) -> Result<(), CameraError> {
        let source = self.camera.enumerate_devices().await;
        self.camera.start(source).await
    }

    /// Waits for the first decoded or typed code, hands it off, and closes the
    /// scanner. Returns `None` if the scanner was closed first.
    pub async fn run(&mut self) -> Option<PendingCheckIn> {
        let input = tokio::select! {
            _ = self.closed.cancelled() => None,
            decoded = self.decoded.recv() => decoded.map(RouteInput::Decoded),
            // A dropped entry field just disables this arm.
            Some(code) = self.typed.recv() => Some(RouteInput::Typed(code)),
        };
        let pending = input.map(|input| self.dispatch(input));
        self.close().await;
        pending
    }

    /// Decodes a picked image file. A found code is handed off and the scanner
    /// closes; otherwise live scanning resumes on its own.
    pub async fn scan_image(&mut self, image: Bytes) -> (StillImageOutcome, Option<PendingCheckIn>) {
        let outcome = self.camera.scan_still_image(image).await;
        let pending = match &outcome {
            StillImageOutcome::Decoded(text) => {
                let pending = self.dispatch(RouteInput::Decoded(text.clone()));
                self.close().await;
                Some(pending)
            }
            _ => None,
        };
        (outcome, pending)
    }

    /// Submits a typed code and closes the scanner.
    pub async fn submit_code(&mut self, code: String) -> PendingCheckIn {
        let pending = self.dispatch(RouteInput::Typed(code));
        self.close().await;
        pending
    }

    pub async fn close(&self) {
        self.closed.cancel();
        self.camera.stop().await;
        info!("Scanner closed.");
    }

    fn dispatch(&self, input: RouteInput) -> PendingCheckIn {
        let router = self.router.clone();
        let role = self.role;
        let handle = tokio::spawn(async move {
            match input {
                RouteInput::Decoded(text) => router.route(role, &text).await,
                RouteInput::Typed(code) => router.submit_code(role, &code).await,
            }
        });
        PendingCheckIn { handle }
    }
}

impl Drop for ScanFlow {
    fn drop(&mut self) {
        // Unmounting without an explicit close still releases the camera.
        self.closed.cancel();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let camera = self.camera.clone();
            runtime.spawn(async move { camera.stop().await });
        }
    }
}

enum RouteInput {
    Decoded(String),
    Typed(String),
}
