pub mod camera;
pub mod devices;
pub mod flow;
pub mod manual;
pub mod router;

pub use camera::{CameraError, CameraSessionManager, StillImageOutcome};
pub use flow::{PendingCheckIn, ScanFlow, ScanFlowCloser};
pub use manual::ManualEntry;
pub use router::{parse_payload, ScanResultRouter};
