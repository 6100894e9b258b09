pub mod server;
pub mod view;

pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
