pub mod adapters;
pub mod config;
pub mod error;
pub mod notifications;
pub mod pipeline;
pub mod scanner;
pub mod session;
pub mod state;
pub mod toast;

pub use state::AppState;
