pub mod codec;
pub mod commands;
pub mod config;
pub mod connection;
pub mod frame;
pub mod reply;
pub mod server;
pub mod store;
pub mod time;
pub mod timer;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
