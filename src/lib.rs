pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod queries;
pub mod router;
pub mod services;
pub mod state;
pub mod utils;
pub mod validation;

pub use config::Config;
pub use database::{Database, DbConn, DbContext, DbPool};
pub use error::{Error, Result};
pub use models::ApiResponse;
pub use router::{build_app, build_router};
pub use services::BaseManager;
pub use state::AppState;

/// Load configuration from environment variables
pub fn load_config() -> Result<Config> {
    Ok(Config::load()?)
}
