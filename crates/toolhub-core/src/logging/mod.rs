//! Logging abstractions for runtime-agnostic logging
//!
//! Every component takes an `Arc<dyn Logger>` so the host decides where
//! connection lifecycle messages end up.

mod traits;
mod noop;
mod console;
mod recording;

pub use traits::{LogLevel, Logger, LoggerExt, SharedLogger};
pub use noop::NoOpLogger;
pub use console::ConsoleLogger;
pub use recording::{RecordingLogger, LogRecord};
