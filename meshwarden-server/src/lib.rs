pub mod app_state;
pub mod auth;
pub mod errors;
pub mod routes;
pub mod scheduler_loop;

pub use app_state::AppState;
pub use routes::build_router;
