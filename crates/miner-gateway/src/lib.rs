pub mod app;
pub mod http;

pub use app::{build_router, spawn_background_tasks, NodeState};
