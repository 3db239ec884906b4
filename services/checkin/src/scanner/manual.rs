//! services/checkin/src/scanner/manual.rs
//!
//! The manual session-code field. Once the typed code reaches
//! `AUTO_SUBMIT_LENGTH` characters it is submitted automatically after a short
//! debounce: once per crossing of the threshold, not once per keystroke after it.
//! Deleting back below the threshold re-arms the field.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const AUTO_SUBMIT_LENGTH: usize = 6;
pub const AUTO_SUBMIT_DEBOUNCE: Duration = Duration::from_millis(400);

pub struct ManualEntry {
    value: Arc<Mutex<String>>,
    crossed: bool,
    pending: Option<CancellationToken>,
    debounce: Duration,
    submissions: mpsc::UnboundedSender<String>,
}

impl ManualEntry {
    /// Creates the field and the receiver its submissions arrive on.
    pub fn new(debounce: Duration) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (submissions, rx) = mpsc::unbounded_channel();
        let entry = Self {
            value: Arc::new(Mutex::new(String::new())),
            crossed: false,
            pending: None,
            debounce,
            submissions,
        };
        (entry, rx)
    }

    pub fn value(&self) -> String {
        self.value.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Called with the field's full contents after every edit.
    pub fn input(&mut self, text: &str) {
        let code = text.trim().to_string();
        let long_enough = code.chars().count() >= AUTO_SUBMIT_LENGTH;
        *self.value.lock().unwrap_or_else(|e| e.into_inner()) = code;

        if !long_enough {
            if self.crossed {
                self.cancel_pending();
                self.crossed = false;
            }
            return;
        }
        if self.crossed {
            return;
        }
        self.crossed = true;

        let token = CancellationToken::new();
        self.pending = Some(token.clone());
        let value = self.value.clone();
        let submissions = self.submissions.clone();
        let debounce = self.debounce;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(debounce) => {
                    let code = value.lock().unwrap_or_else(|e| e.into_inner()).clone();
                    if code.chars().count() >= AUTO_SUBMIT_LENGTH {
                        debug!(code = %code, "auto-submitting session code");
                        let _ = submissions.send(code);
                    }
                }
            }
        });
    }

    /// The explicit submit button. Supersedes a pending auto-submit.
    pub fn submit(&mut self) -> bool {
        self.cancel_pending();
        let code = self.value();
        if code.is_empty() {
            return false;
        }
        self.crossed = code.chars().count() >= AUTO_SUBMIT_LENGTH;
        self.submissions.send(code).is_ok()
    }

    fn cancel_pending(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }
}

impl Drop for ManualEntry {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
