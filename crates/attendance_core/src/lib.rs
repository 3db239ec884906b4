pub mod domain;
pub mod ports;

pub use domain::{
    AuthSession, CameraDevice, CheckInRequest, CheckInRequestError, Coordinates, FacingMode,
    Frame, NotificationCategory, NotificationRecord, Role, Route, ScanMetadata, ScanPayload,
    ScanPhase, ScanSession, SessionUser, Toast, VideoSource,
};
pub use ports::{
    CameraBackend, CameraStream, Geolocator, HttpMethod, HttpRequest, HttpResponse,
    HttpTransport, KeyValueStore, PortError, PortResult, QrDecoder, SessionStore,
    TrackCapabilities, UserInterface, VideoTrack,
};
