#[macro_use]
extern crate log;

use thiserror::Error;

pub mod lcd;
pub mod sensor;

#[derive(Error, Clone, Debug)]
pub enum GpioError {
    #[error("Could not initialize gpio")]
    Initialization,
    #[error("Could not get pin {0}")]
    Pin(u8),
}
