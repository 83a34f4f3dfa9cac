pub mod config;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod retry;

pub use config::{AppConfig, ConfigLoader, RetryConfig, SessionConfig};
pub use engine::{AccountEngine, OrderOutcome, SyncReport};
pub use error::{EngineError, Result};
pub use fallback::{FallbackQuoteSource, QuotePath};
pub use retry::{retry_with_backoff, RetryPolicy};
