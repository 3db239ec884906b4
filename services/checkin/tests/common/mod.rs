//! Fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use attendance_core::ports::{
    CameraBackend, CameraStream, Geolocator, HttpRequest, HttpResponse, HttpTransport,
    KeyValueStore, PortError, PortResult, QrDecoder, TrackCapabilities,
    UserInterface, VideoTrack,
};
use attendance_core::{
    AuthSession, CameraDevice, Coordinates, Frame, Role, Route, SessionUser, Toast, VideoSource,
};
use checkin_lib::adapters::MemoryStore;
use checkin_lib::config::Config;
use checkin_lib::AppState;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

//=========================================================================================
// Camera
//=========================================================================================

pub struct FakeTrack {
    id: String,
    live: AtomicBool,
    torch: bool,
    /// Needs two stops before it really ends, like some camera drivers.
    sticky: bool,
    pub stop_calls: AtomicUsize,
    pub torch_on: AtomicBool,
}

#[async_trait]
impl VideoTrack for FakeTrack {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        let calls = self.stop_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.sticky || calls >= 2 {
            self.live.store(false, Ordering::SeqCst);
        }
    }

    fn capabilities(&self) -> TrackCapabilities {
        TrackCapabilities { torch: self.torch }
    }

    async fn apply_torch(&self, on: bool) -> PortResult<()> {
        if !self.torch {
            return Err(PortError::Unexpected("torch not available".into()));
        }
        self.torch_on.store(on, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeStream {
    track: Arc<FakeTrack>,
}

#[async_trait]
impl CameraStream for FakeStream {
    fn tracks(&self) -> Vec<Arc<dyn VideoTrack>> {
        vec![self.track.clone() as Arc<dyn VideoTrack>]
    }

    async fn next_frame(&self) -> PortResult<Frame> {
        if !self.track.is_live() {
            return Err(PortError::Unavailable("stream ended".into()));
        }
        Ok(Frame {
            width: 4,
            height: 4,
            luma: vec![128; 16],
        })
    }
}

#[derive(Default)]
pub struct FakeCamera {
    pub devices: Vec<CameraDevice>,
    pub enumerate_fails: bool,
    pub torch: bool,
    pub sticky: bool,
    /// Sources that fail to open, with the error they fail with.
    pub failing: Vec<(VideoSource, PortError)>,
    pub fail_all: Option<PortError>,
    pub opened: Mutex<Vec<VideoSource>>,
    pub tracks: Mutex<Vec<Arc<FakeTrack>>>,
    pub max_live: AtomicUsize,
}

impl FakeCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_tracks(&self) -> usize {
        self.tracks.lock().unwrap().iter().filter(|t| t.is_live()).count()
    }

    pub fn opened(&self) -> Vec<VideoSource> {
        self.opened.lock().unwrap().clone()
    }

    pub fn last_track(&self) -> Option<Arc<FakeTrack>> {
        self.tracks.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CameraBackend for FakeCamera {
    async fn enumerate_devices(&self) -> PortResult<Vec<CameraDevice>> {
        if self.enumerate_fails {
            return Err(PortError::PermissionDenied("not yet granted".into()));
        }
        Ok(self.devices.clone())
    }

    async fn open_stream(&self, source: &VideoSource) -> PortResult<Arc<dyn CameraStream>> {
        self.opened.lock().unwrap().push(source.clone());
        if let Some(err) = &self.fail_all {
            return Err(err.clone());
        }
        if let Some((_, err)) = self.failing.iter().find(|(s, _)| s == source) {
            return Err(err.clone());
        }

        let track = Arc::new(FakeTrack {
            id: format!("track-{}", self.tracks.lock().unwrap().len()),
            live: AtomicBool::new(true),
            torch: self.torch,
            sticky: self.sticky,
            stop_calls: AtomicUsize::new(0),
            torch_on: AtomicBool::new(false),
        });
        self.tracks.lock().unwrap().push(track.clone());
        let live = self.live_tracks();
        self.max_live.fetch_max(live, Ordering::SeqCst);
        Ok(Arc::new(FakeStream { track }))
    }
}

pub fn device(id: &str, label: &str) -> CameraDevice {
    CameraDevice {
        id: id.to_string(),
        label: label.to_string(),
    }
}

/// Answers frames from a script: one entry per frame, `None` once it runs out.
#[derive(Default)]
pub struct ScriptedDecoder {
    pub frames: Mutex<VecDeque<Option<String>>>,
    pub image: Mutex<Option<PortResult<Option<String>>>>,
}

impl ScriptedDecoder {
    pub fn frames(frames: Vec<Option<&str>>) -> Self {
        Self {
            frames: Mutex::new(frames.into_iter().map(|f| f.map(str::to_string)).collect()),
            image: Mutex::new(None),
        }
    }

    pub fn image(result: PortResult<Option<&str>>) -> Self {
        Self {
            frames: Mutex::new(VecDeque::new()),
            image: Mutex::new(Some(result.map(|r| r.map(str::to_string)))),
        }
    }
}

impl QrDecoder for ScriptedDecoder {
    fn decode_frame(&self, _frame: &Frame) -> PortResult<Option<String>> {
        Ok(self.frames.lock().unwrap().pop_front().flatten())
    }

    fn decode_image(&self, _image: &[u8]) -> PortResult<Option<String>> {
        self.image.lock().unwrap().clone().unwrap_or(Ok(None))
    }
}

//=========================================================================================
// Network
//=========================================================================================

type Responder = Box<dyn Fn(&HttpRequest) -> PortResult<HttpResponse> + Send + Sync>;

pub struct FakeTransport {
    responder: Responder,
    pub requests: Mutex<Vec<HttpRequest>>,
    /// Applied to every request whose path matches.
    pub delays: Vec<(String, Duration)>,
}

impl FakeTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&HttpRequest) -> PortResult<HttpResponse> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
            delays: Vec::new(),
        }
    }

    pub fn with_delay(mut self, path: &str, delay: Duration) -> Self {
        self.delays.push((path.to_string(), delay));
        self
    }

    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> PortResult<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some((_, delay)) = self.delays.iter().find(|(p, _)| *p == request.path) {
            tokio::time::sleep(*delay).await;
        }
        (self.responder)(&request)
    }
}

pub fn ok(body: serde_json::Value) -> PortResult<HttpResponse> {
    Ok(HttpResponse { status: 200, body })
}

pub fn status(status: u16, body: serde_json::Value) -> PortResult<HttpResponse> {
    Ok(HttpResponse { status, body })
}

//=========================================================================================
// UI and Location
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Toast(Toast),
    Dismiss(Uuid),
    Error(String),
    Status(Option<String>),
    Navigate(Route),
}

type ToastHook = Box<dyn Fn(&Toast) + Send + Sync>;

#[derive(Default)]
pub struct RecordingUi {
    pub events: Mutex<Vec<UiEvent>>,
    on_toast: Mutex<Option<ToastHook>>,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_toast<F>(&self, hook: F)
    where
        F: Fn(&Toast) + Send + Sync + 'static,
    {
        *self.on_toast.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::Error(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::Toast(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn navigations(&self) -> Vec<Route> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::Navigate(r) => Some(r),
                _ => None,
            })
            .collect()
    }
}

impl UserInterface for RecordingUi {
    fn show_toast(&self, toast: &Toast) {
        if let Some(hook) = self.on_toast.lock().unwrap().as_ref() {
            hook(toast);
        }
        self.events.lock().unwrap().push(UiEvent::Toast(toast.clone()));
    }

    fn dismiss_toast(&self, toast_id: Uuid) {
        self.events.lock().unwrap().push(UiEvent::Dismiss(toast_id));
    }

    fn show_error(&self, message: &str) {
        self.events.lock().unwrap().push(UiEvent::Error(message.to_string()));
    }

    fn set_status(&self, status: Option<&str>) {
        self.events
            .lock()
            .unwrap()
            .push(UiEvent::Status(status.map(str::to_string)));
    }

    fn navigate(&self, route: Route) {
        self.events.lock().unwrap().push(UiEvent::Navigate(route));
    }
}

/// Never answers; exercises the lookup timeout.
pub struct HangingLocator;

#[async_trait]
impl Geolocator for HangingLocator {
    async fn current_position(&self) -> PortResult<Coordinates> {
        std::future::pending().await
    }
}

//=========================================================================================
// Wiring
//=========================================================================================

pub fn test_config() -> Config {
    Config::from_lookup(|_| None).expect("defaults are valid")
}

pub struct Harness {
    pub app: AppState,
    pub storage: Arc<MemoryStore>,
    pub transport: Arc<FakeTransport>,
    pub ui: Arc<RecordingUi>,
}

pub fn harness_with(transport: FakeTransport, geolocator: Arc<dyn Geolocator>) -> Harness {
    let storage = Arc::new(MemoryStore::new());
    let transport = Arc::new(transport);
    let ui = Arc::new(RecordingUi::new());
    let app = AppState::new(
        Arc::new(test_config()),
        storage.clone(),
        transport.clone(),
        ui.clone(),
        geolocator,
    );
    Harness {
        app,
        storage,
        transport,
        ui,
    }
}

pub fn harness(transport: FakeTransport) -> Harness {
    harness_with(transport, Arc::new(checkin_lib::adapters::NoLocator))
}

pub async fn sign_in_student(app: &AppState, student_id: &str) {
    app.sessions.set_active_role(Role::Student);
    app.sessions
        .save_session(
            Role::Student,
            &AuthSession {
                token: "token-old".into(),
                refresh_token: Some("refresh-1".into()),
                user: SessionUser {
                    id: "user-1".into(),
                    student_id: Some(student_id.into()),
                    name: Some("Jane".into()),
                    ..Default::default()
                },
            },
        )
        .await
        .unwrap();
}

pub async fn stored(storage: &MemoryStore, key: &str) -> Option<String> {
    storage.get(key).await.unwrap()
}
