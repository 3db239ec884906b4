//! services/checkin/src/adapters/location.rs
//!
//! `Geolocator` adapters for hosts without a positioning service.

use async_trait::async_trait;
use attendance_core::ports::{Geolocator, PortError, PortResult};
use attendance_core::Coordinates;

/// Reports a position configured up front (e.g. a kiosk bolted to a wall).
#[derive(Clone, Copy, Debug)]
pub struct FixedLocator {
    position: Coordinates,
}

impl FixedLocator {
    pub fn new(position: Coordinates) -> Self {
        Self { position }
    }
}

#[async_trait]
impl Geolocator for FixedLocator {
    async fn current_position(&self) -> PortResult<Coordinates> {
        Ok(self.position)
    }
}

/// Always unavailable; check-ins go out without coordinates.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLocator;

#[async_trait]
impl Geolocator for NoLocator {
    async fn current_position(&self) -> PortResult<Coordinates> {
        Err(PortError::Unavailable("no positioning service".to_string()))
    }
}
