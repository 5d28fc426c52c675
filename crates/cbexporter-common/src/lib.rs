pub mod error;
pub mod retry;
pub mod status;

pub use error::{ExporterError, Result};
pub use retry::{RetryPolicy, retry};
pub use status::{CollectorStatus, StatusSnapshot};
