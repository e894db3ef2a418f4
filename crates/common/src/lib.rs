//! Cross-cutting utilities: logging setup and cancellation.

mod cancel;
mod logging;

pub use cancel::CancellationFlag;
pub use logging::{init_logging, LogFormat};
