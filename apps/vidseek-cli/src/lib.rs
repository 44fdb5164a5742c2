//! Front ends for vidseek: wiring from settings, terminal output, and the
//! HTTP search service.

pub mod app;
pub mod render;
pub mod server;

pub use app::App;
pub use server::{router, AppState};
