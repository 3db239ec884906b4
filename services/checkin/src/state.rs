//! services/checkin/src/state.rs
//!
//! Defines the shared application state, created once at startup and handed to
//! every front end (the binary, a UI shell, or tests).

use crate::config::Config;
use crate::notifications::NotificationService;
use crate::pipeline::CheckInPipeline;
use crate::scanner::manual::AUTO_SUBMIT_DEBOUNCE;
use crate::scanner::{CameraSessionManager, ManualEntry, ScanFlow, ScanResultRouter};
use crate::session::{ApiClient, RoleSessionStore};
use crate::toast::ToastCenter;
use attendance_core::ports::{
    CameraBackend, Geolocator, HttpTransport, KeyValueStore, QrDecoder, SessionStore,
    UserInterface,
};
use attendance_core::Role;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<dyn SessionStore>,
    pub api: Arc<ApiClient>,
    pub notifications: Arc<NotificationService>,
    pub toasts: Arc<ToastCenter>,
    pub pipeline: Arc<CheckInPipeline>,
    pub router: Arc<ScanResultRouter>,
    pub ui: Arc<dyn UserInterface>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        storage: Arc<dyn KeyValueStore>,
        transport: Arc<dyn HttpTransport>,
        ui: Arc<dyn UserInterface>,
        geolocator: Arc<dyn Geolocator>,
    ) -> Self {
        let sessions: Arc<dyn SessionStore> = Arc::new(RoleSessionStore::new(storage.clone()));
        let api = Arc::new(ApiClient::new(transport, sessions.clone(), ui.clone()));
        let notifications = Arc::new(NotificationService::new(storage));
        let toasts = Arc::new(ToastCenter::new(ui.clone()));
        let pipeline = Arc::new(CheckInPipeline::new(
            api.clone(),
            notifications.clone(),
            toasts.clone(),
            ui.clone(),
        ));
        let router = Arc::new(ScanResultRouter::new(
            sessions.clone(),
            pipeline.clone(),
            geolocator,
            ui.clone(),
            config.default_centre.clone(),
            config.geolocation_timeout,
        ));

        Self {
            config,
            sessions,
            api,
            notifications,
            toasts,
            pipeline,
            router,
            ui,
        }
    }

    /// Opens a scanner view for `role` on the given camera, together with the
    /// view's manual code field. Codes the field submits are routed by the flow.
    pub fn scan_flow(
        &self,
        role: Role,
        backend: Arc<dyn CameraBackend>,
        decoder: Arc<dyn QrDecoder>,
    ) -> (ScanFlow, ManualEntry) {
        let (camera, decoded) =
            CameraSessionManager::new(backend, decoder, self.ui.clone(), self.config.scanner);
        let (manual, typed) = ManualEntry::new(AUTO_SUBMIT_DEBOUNCE);
        let flow = ScanFlow::new(role, camera, decoded, typed, self.router.clone());
        (flow, manual)
    }
}
