pub mod http;
pub mod location;
pub mod memory_store;
pub mod qr_decoder;
pub mod sqlite_store;
pub mod terminal_ui;

pub use http::ReqwestTransport;
pub use location::{FixedLocator, NoLocator};
pub use memory_store::MemoryStore;
pub use qr_decoder::RqrrDecoder;
pub use sqlite_store::SqliteStore;
pub use terminal_ui::TerminalUi;
