pub mod atomic_write;
pub mod cache;
pub mod canonicalization;
pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod paths;
pub mod redaction;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use cache::{CacheEntry, CacheStats, ResultCache};
pub use canonicalization::CacheKey;
pub use error::{
    CacheError, ConfigError, ErrorCategory, ItineraError, LlmError, ProviderError,
    UserFriendlyError,
};
