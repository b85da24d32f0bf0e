pub mod logger;
pub mod logging;

pub use logger::Logger;
pub use logging::{build_logger, init_logging};
