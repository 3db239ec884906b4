//! services/checkin/src/scanner/devices.rs
//!
//! Picks which enumerated camera to open first.

use attendance_core::{CameraDevice, FacingMode, VideoSource};

const REAR_HINTS: [&str; 2] = ["back", "environment"];

/// Index of the first rear-facing camera by label, or 0.
pub fn preferred_device_index(devices: &[CameraDevice]) -> usize {
    devices
        .iter()
        .position(|d| {
            let label = d.label.to_lowercase();
            REAR_HINTS.iter().any(|hint| label.contains(hint))
        })
        .unwrap_or(0)
}

/// Device ids are blank until the camera permission has been granted.
pub fn ids_usable(devices: &[CameraDevice]) -> bool {
    !devices.is_empty() && devices.iter().all(|d| !d.id.trim().is_empty())
}

pub fn fallback_source() -> VideoSource {
    VideoSource::Facing(FacingMode::Environment)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, label: &str) -> CameraDevice {
        CameraDevice {
            id: id.to_string(),
            label: label.to_string(),
        }
    }

    #[test]
    fn rear_camera_is_preferred() {
        let devices = vec![
            device("a", "FaceTime HD Camera (front)"),
            device("b", "Camera 2, facing BACK"),
        ];
        assert_eq!(preferred_device_index(&devices), 1);
    }

    #[test]
    fn environment_label_matches() {
        let devices = vec![device("a", "user"), device("b", "Environment Facing")];
        assert_eq!(preferred_device_index(&devices), 1);
    }

    #[test]
    fn first_device_when_no_hint_matches() {
        let devices = vec![device("a", "USB Webcam"), device("b", "Virtual Camera")];
        assert_eq!(preferred_device_index(&devices), 0);
        assert_eq!(preferred_device_index(&[]), 0);
    }

    #[test]
    fn blank_ids_are_not_usable() {
        assert!(!ids_usable(&[device("", "Camera")]));
        assert!(!ids_usable(&[]));
        assert!(ids_usable(&[device("x", "")]));
    }
}
