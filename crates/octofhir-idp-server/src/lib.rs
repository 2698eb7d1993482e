pub mod config;
pub mod observability;
pub mod seed;
pub mod server;

pub use config::AppConfig;
pub use server::{IdpServer, ServerBuilder, build_app};
