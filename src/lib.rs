pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod retry;
pub mod util;
