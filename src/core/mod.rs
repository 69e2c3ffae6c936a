pub mod error;
pub mod lock;
pub mod logging;
pub mod timestamp;

pub use error::{ReplayError, ReplayResult};
pub use lock::lock_mutex;
pub use logging::{ComponentLogger, LogContext};
pub use timestamp::{clip_stem, utc_ns_now};
