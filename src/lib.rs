pub mod app;
pub mod config;
pub mod display;
pub mod errors;
pub mod export;
pub mod handlers;
pub mod models;
pub mod refresh;
pub mod revenue;
pub mod session;
pub mod state;
pub mod storage;
pub mod ui;

pub use app::router;
pub use config::Config;
pub use state::AppState;
