mod error;
mod main_loop;

pub use error::{DriverError, DriverResult};
pub use main_loop::start;
