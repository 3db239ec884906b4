//! services/checkin/src/toast.rs
//!
//! Transient confirmations. A toast dismisses itself after its lifetime; clicking
//! it dismisses it early and opens the notifications view on the toast's tab.

use attendance_core::ports::UserInterface;
use attendance_core::{NotificationCategory, Route, Toast};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

pub const TOAST_LIFETIME: Duration = Duration::from_millis(4500);

type ActiveToasts = Arc<Mutex<HashMap<Uuid, (CancellationToken, NotificationCategory)>>>;

pub struct ToastCenter {
    ui: Arc<dyn UserInterface>,
    lifetime: Duration,
    active: ActiveToasts,
}

impl ToastCenter {
    pub fn new(ui: Arc<dyn UserInterface>) -> Self {
        Self::with_lifetime(ui, TOAST_LIFETIME)
    }

    pub fn with_lifetime(ui: Arc<dyn UserInterface>, lifetime: Duration) -> Self {
        Self {
            ui,
            lifetime,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Shows `toast` and arms its auto-dismiss timer.
    pub fn show(&self, toast: Toast) -> Uuid {
        let id = toast.id;
        let token = CancellationToken::new();
        lock(&self.active).insert(id, (token.clone(), toast.category));
        self.ui.show_toast(&toast);

        let ui = self.ui.clone();
        let active = self.active.clone();
        let lifetime = self.lifetime;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(lifetime) => {
                    if lock(&active).remove(&id).is_some() {
                        debug!(toast_id = %id, "toast expired");
                        ui.dismiss_toast(id);
                    }
                }
            }
        });
        id
    }

    /// Handles a click on a visible toast. Returns false if it had already gone.
    pub fn click(&self, id: Uuid) -> bool {
        let Some((token, category)) = lock(&self.active).remove(&id) else {
            return false;
        };
        token.cancel();
        self.ui.dismiss_toast(id);
        self.ui.navigate(Route::Notifications { tab: category });
        true
    }

    pub fn is_visible(&self, id: Uuid) -> bool {
        lock(&self.active).contains_key(&id)
    }
}

fn lock(
    active: &ActiveToasts,
) -> std::sync::MutexGuard<'_, HashMap<Uuid, (CancellationToken, NotificationCategory)>> {
    active.lock().unwrap_or_else(|e| e.into_inner())
}
