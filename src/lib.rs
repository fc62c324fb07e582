pub mod api;
pub mod app;

pub use api::{create_router, ApiState};
pub use app::App;
