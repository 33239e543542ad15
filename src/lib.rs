pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod server;
pub mod session;
pub mod state;
pub mod uploads;
pub mod utils;
