pub mod error;
pub mod wait_times;

pub use error::{Error, Result};
pub use wait_times::WaitTimes;
