mod desktop;

pub use desktop::{start, DriverError, DriverResult};
