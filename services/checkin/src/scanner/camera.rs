//! services/checkin/src/scanner/camera.rs
//!
//! The camera session manager: acquires, reconfigures and releases the camera
//! for QR decoding.
//!
//! The manager is the sole owner of every stream it opens. At most one stream is
//! open at a time; `start` always releases the current one before asking the
//! backend for another. Still-image scans run through an explicit state machine
//! (`Scanning -> ImageScanning -> ResumingLive -> Scanning`) with one resume
//! timer owned here, cancelled by any `stop` or `start`.

use crate::config::ScannerSettings;
use crate::scanner::devices::{fallback_source, ids_usable, preferred_device_index};
use attendance_core::ports::{CameraBackend, CameraStream, PortError, QrDecoder, UserInterface};
use attendance_core::{CameraDevice, FacingMode, ScanPhase, ScanSession, VideoSource};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

//=========================================================================================
// Errors and Outcomes
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CameraError {
    #[error("Camera permission was denied")]
    PermissionDenied,
    #[error("No camera was found on this device")]
    NoCamera,
    #[error("Unable to start the camera: {0}")]
    Acquisition(String),
    #[error("This camera has no torch")]
    TorchUnsupported,
    #[error("Failed to switch the torch: {0}")]
    Torch(String),
    #[error("The camera is not running")]
    NotActive,
}

impl From<PortError> for CameraError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::PermissionDenied(_) => CameraError::PermissionDenied,
            PortError::NotFound(_) => CameraError::NoCamera,
            other => CameraError::Acquisition(other.to_string()),
        }
    }
}

/// The result of decoding a still image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StillImageOutcome {
    Decoded(String),
    NotFound,
    Failed(String),
}

//=========================================================================================
// Internal State
//=========================================================================================

struct DecodeLoop {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct CameraState {
    phase: ScanPhase,
    devices: Vec<CameraDevice>,
    selected_device_index: usize,
    facing_mode: FacingMode,
    /// The source of the last successful start, reused when live scanning resumes.
    source: Option<VideoSource>,
    stream: Option<Arc<dyn CameraStream>>,
    decode_loop: Option<DecodeLoop>,
    resume: Option<CancellationToken>,
    torch_on: bool,
    torch_supported: bool,
    last_error: Option<String>,
}

impl CameraState {
    fn cancel_resume(&mut self) {
        if let Some(token) = self.resume.take() {
            token.cancel();
        }
    }
}

struct Shared {
    backend: Arc<dyn CameraBackend>,
    decoder: Arc<dyn QrDecoder>,
    ui: Arc<dyn UserInterface>,
    settings: ScannerSettings,
    decoded_tx: mpsc::UnboundedSender<String>,
    state: Mutex<CameraState>,
}

//=========================================================================================
// The Manager
//=========================================================================================

/// A cheap handle; clones drive the same camera session.
#[derive(Clone)]
pub struct CameraSessionManager {
    shared: Arc<Shared>,
}

impl CameraSessionManager {
    /// Creates an idle manager and the receiver its decode loop publishes to.
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        decoder: Arc<dyn QrDecoder>,
        ui: Arc<dyn UserInterface>,
        settings: ScannerSettings,
    ) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (decoded_tx, decoded_rx) = mpsc::unbounded_channel();
        let manager = Self {
            shared: Arc::new(Shared {
                backend,
                decoder,
                ui,
                settings,
                decoded_tx,
                state: Mutex::new(CameraState::default()),
            }),
        };
        (manager, decoded_rx)
    }

    /// A snapshot of the session for rendering.
    pub async fn session(&self) -> ScanSession {
        let state = self.shared.state.lock().await;
        ScanSession {
            active: state.stream.is_some(),
            phase: state.phase,
            selected_device_index: state.selected_device_index,
            facing_mode: state.facing_mode,
            torch_on: state.torch_on,
            torch_supported: state.torch_supported,
            last_error: state.last_error.clone(),
        }
    }

    pub async fn devices(&self) -> Vec<CameraDevice> {
        self.shared.state.lock().await.devices.clone()
    }

    /// Lists cameras and returns the source to start with: the preferred
    /// device, or the rear facing mode when ids are unusable or listing fails.
    pub async fn enumerate_devices(&self) -> VideoSource {
        let listed = self.shared.backend.enumerate_devices().await;
        let mut state = self.shared.state.lock().await;
        match listed {
            Ok(devices) if ids_usable(&devices) => {
                let index = preferred_device_index(&devices);
                let source = VideoSource::Device(devices[index].id.clone());
                debug!(count = devices.len(), index, "cameras enumerated");
                state.devices = devices;
                state.selected_device_index = index;
                source
            }
            Ok(_) => {
                debug!("camera ids unavailable, falling back to facing mode");
                state.devices.clear();
                state.selected_device_index = 0;
                fallback_source()
            }
            Err(e) => {
                debug!("camera enumeration failed: {}", e);
                state.devices.clear();
                state.selected_device_index = 0;
                fallback_source()
            }
        }
    }

    /// Starts live scanning from `source`, releasing any open stream first.
    pub async fn start(&self, source: VideoSource) -> Result<(), CameraError> {
        let mut state = self.shared.state.lock().await;
        self.start_locked(&mut state, source).await
    }

    /// Moves to the next camera, or flips the facing mode when there is only one.
    pub async fn switch_device(&self) -> Result<(), CameraError> {
        let mut state = self.shared.state.lock().await;
        let source = if state.devices.len() > 1 {
            state.selected_device_index = (state.selected_device_index + 1) % state.devices.len();
            VideoSource::Device(state.devices[state.selected_device_index].id.clone())
        } else {
            state.facing_mode = state.facing_mode.flipped();
            VideoSource::Facing(state.facing_mode)
        };
        self.start_locked(&mut state, source).await
    }

    /// Flips between the rear and front camera by facing mode.
    pub async fn toggle_facing(&self) -> Result<(), CameraError> {
        let mut state = self.shared.state.lock().await;
        state.facing_mode = state.facing_mode.flipped();
        let source = VideoSource::Facing(state.facing_mode);
        self.start_locked(&mut state, source).await
    }

    /// Re-reads torch capability from the running track.
    pub async fn query_torch_support(&self) -> bool {
        let mut state = self.shared.state.lock().await;
        let supported = torch_capable(state.stream.as_deref());
        state.torch_supported = supported;
        supported
    }

    pub async fn set_torch(&self, on: bool) -> Result<(), CameraError> {
        let mut state = self.shared.state.lock().await;
        let Some(stream) = state.stream.clone() else {
            return Err(CameraError::NotActive);
        };
        if !state.torch_supported {
            return Err(CameraError::TorchUnsupported);
        }
        let Some(track) = stream.tracks().into_iter().find(|t| t.is_live()) else {
            return Err(CameraError::NotActive);
        };
        track
            .apply_torch(on)
            .await
            .map_err(|e| CameraError::Torch(e.to_string()))?;
        state.torch_on = on;
        Ok(())
    }

    /// Stops live scanning, decodes `image`, then resumes live scanning after
    /// the configured delay whatever the outcome, unless stopped meanwhile.
    /// A manager that was idle stays idle.
    pub async fn scan_still_image(&self, image: Bytes) -> StillImageOutcome {
        let resume = {
            let mut state = self.shared.state.lock().await;
            let was_live = state.stream.is_some() || state.resume.is_some();
            state.cancel_resume();
            self.release(&mut state).await;
            state.phase = ScanPhase::ImageScanning;
            was_live
        };

        let decoder = self.shared.decoder.clone();
        let decoded = tokio::task::spawn_blocking(move || decoder.decode_image(&image)).await;
        let outcome = match decoded {
            Ok(Ok(Some(text))) => StillImageOutcome::Decoded(text),
            Ok(Ok(None)) => {
                self.shared.ui.show_error("No QR code found in that image");
                StillImageOutcome::NotFound
            }
            Ok(Err(e)) => {
                self.shared
                    .ui
                    .show_error(&format!("Could not read that image: {}", e));
                StillImageOutcome::Failed(e.to_string())
            }
            Err(e) => StillImageOutcome::Failed(e.to_string()),
        };

        let mut state = self.shared.state.lock().await;
        if state.phase == ScanPhase::ImageScanning && !resume {
            state.phase = ScanPhase::Idle;
        } else if state.phase == ScanPhase::ImageScanning {
            state.phase = ScanPhase::ResumingLive;
            let token = CancellationToken::new();
            state.resume = Some(token.clone());
            let manager = self.clone();
            let delay = self.shared.settings.resume_delay;
            tokio::spawn(async move {
                let resume_token = token.clone();
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(delay) => manager.resume_live(resume_token).await,
                }
            });
        }
        outcome
    }

    /// Releases the camera. Safe to call any number of times, in any phase.
    pub async fn stop(&self) {
        let mut state = self.shared.state.lock().await;
        state.cancel_resume();
        self.release(&mut state).await;
        state.phase = ScanPhase::Idle;
    }

    //-------------------------------------------------------------------------------------
    // Internals (all called with the state lock held)
    //-------------------------------------------------------------------------------------

    async fn start_locked(
        &self,
        state: &mut CameraState,
        source: VideoSource,
    ) -> Result<(), CameraError> {
        state.cancel_resume();
        self.release(state).await;

        let first = match self.shared.backend.open_stream(&source).await {
            Ok(stream) => {
                self.bind(state, stream, source);
                return Ok(());
            }
            Err(e) => CameraError::from(e),
        };

        // A denied permission will not be granted by asking for another lens.
        let err = if first == CameraError::PermissionDenied {
            first
        } else {
            let retry = match &source {
                VideoSource::Facing(mode) => VideoSource::Facing(mode.flipped()),
                VideoSource::Device(_) => VideoSource::Facing(state.facing_mode.flipped()),
            };
            warn!(?source, ?retry, "Camera start failed ({}), retrying once.", first);
            match self.shared.backend.open_stream(&retry).await {
                Ok(stream) => {
                    self.bind(state, stream, retry);
                    return Ok(());
                }
                Err(e) => CameraError::from(e),
            }
        };

        warn!("Unable to start camera: {}", err);
        let status = err.to_string();
        self.shared.ui.set_status(Some(&status));
        state.last_error = Some(status);
        state.phase = ScanPhase::Idle;
        Err(err)
    }

    fn bind(&self, state: &mut CameraState, stream: Arc<dyn CameraStream>, source: VideoSource) {
        if let VideoSource::Facing(mode) = &source {
            state.facing_mode = *mode;
        }
        state.torch_on = false;
        state.torch_supported = torch_capable(Some(stream.as_ref()));
        state.last_error = None;
        self.shared.ui.set_status(None);

        state.decode_loop = Some(self.spawn_decode_loop(stream.clone()));
        state.stream = Some(stream);
        state.source = Some(source);
        state.phase = ScanPhase::Scanning;
        info!(torch = state.torch_supported, "Camera started.");
    }

    fn spawn_decode_loop(&self, stream: Arc<dyn CameraStream>) -> DecodeLoop {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let decoder = self.shared.decoder.clone();
        let decoded_tx = self.shared.decoded_tx.clone();
        let qr_box = self.shared.settings.qr_box;
        let period = Duration::from_millis(1000 / u64::from(self.shared.settings.fps.max(1)));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let frame = tokio::select! {
                    _ = cancelled.cancelled() => break,
                    frame = stream.next_frame() => frame,
                };
                let frame = match frame {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("Camera stream ended: {}", e);
                        break;
                    }
                };
                let cropped = frame.center_crop(qr_box);
                let frame_decoder = decoder.clone();
                let decoded =
                    tokio::task::spawn_blocking(move || frame_decoder.decode_frame(&cropped)).await;
                match decoded {
                    Ok(Ok(Some(text))) => {
                        if decoded_tx.send(text).is_err() {
                            break;
                        }
                    }
                    Ok(Ok(None)) => {}
                    // Misreads are routine while the code is moving into view.
                    Ok(Err(e)) => trace!("frame decode failed: {}", e),
                    Err(e) => {
                        warn!("Frame decode task failed: {}", e);
                        break;
                    }
                }
            }
        });

        DecodeLoop { token, handle }
    }

    /// Stops the decode loop, then every track of the bound stream.
    async fn release(&self, state: &mut CameraState) {
        if let Some(decode_loop) = state.decode_loop.take() {
            decode_loop.token.cancel();
            if let Err(e) = decode_loop.handle.await {
                if !e.is_cancelled() {
                    warn!("Decode loop ended abnormally: {}", e);
                }
            }
        }

        if let Some(stream) = state.stream.take() {
            let tracks = stream.tracks();
            for track in &tracks {
                track.stop();
            }
            // Some drivers keep the camera lit after the first stop.
            for track in tracks.iter().filter(|t| t.is_live()) {
                warn!(track = %track.id(), "Track still live after stop, stopping again.");
                track.stop();
            }
            debug!(tracks = tracks.len(), "Camera released.");
        }

        state.torch_on = false;
        state.torch_supported = false;
    }

    async fn resume_live(&self, token: CancellationToken) {
        let mut state = self.shared.state.lock().await;
        if token.is_cancelled() || state.phase != ScanPhase::ResumingLive {
            return;
        }
        state.resume = None;
        let source = state
            .source
            .clone()
            .unwrap_or(VideoSource::Facing(state.facing_mode));
        if let Err(e) = self.start_locked(&mut state, source).await {
            warn!("Failed to resume live scanning: {}", e);
        }
    }
}

fn torch_capable(stream: Option<&dyn CameraStream>) -> bool {
    stream
        .map(|s| {
            s.tracks()
                .iter()
                .any(|t| t.is_live() && t.capabilities().torch)
        })
        .unwrap_or(false)
}
