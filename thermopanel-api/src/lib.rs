#[macro_use]
extern crate log;

pub mod client;
pub mod server;
pub mod types;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000";
