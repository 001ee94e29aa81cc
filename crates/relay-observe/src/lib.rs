mod logger;
pub use logger::{
    LogTimer, LoggerConfig, LoggerError, LoggerFormat, LoggerLevel, LoggerTimeZone, init_local_offset,
    init_logger,
};

#[cfg(feature = "subscriber")]
mod events;
#[cfg(feature = "subscriber")]
pub use events::EventLogger;
