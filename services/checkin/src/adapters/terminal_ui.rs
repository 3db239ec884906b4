//! services/checkin/src/adapters/terminal_ui.rs
//!
//! A `UserInterface` for the command line: toasts and errors go to the
//! terminal, navigations are printed as the route the user should open next.

use attendance_core::ports::UserInterface;
use attendance_core::{Route, Toast};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalUi;

impl TerminalUi {
    pub fn new() -> Self {
        Self
    }
}

impl UserInterface for TerminalUi {
    fn show_toast(&self, toast: &Toast) {
        info!(toast_id = %toast.id, "toast shown");
        println!("[{}] {}", toast.title, toast.message);
    }

    fn dismiss_toast(&self, toast_id: Uuid) {
        debug!(%toast_id, "toast dismissed");
    }

    fn show_error(&self, message: &str) {
        warn!("{}", message);
        eprintln!("error: {}", message);
    }

    fn set_status(&self, status: Option<&str>) {
        if let Some(status) = status {
            eprintln!("camera: {}", status);
        }
    }

    fn navigate(&self, route: Route) {
        info!(path = %route.path(), "navigation requested");
        println!("-> {}", route.path());
    }
}
