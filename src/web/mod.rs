pub mod api;
pub mod server;
pub mod state;

pub use server::{router, start_server};
pub use state::AppState;
