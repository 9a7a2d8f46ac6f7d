#![forbid(unsafe_code)]
#![warn(clippy::all, rust_2018_idioms)]

#[macro_use]
extern crate log;

mod app;
pub mod panel;
pub mod worker;

pub use app::ThermostatApp;
