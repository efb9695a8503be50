//! Tunables for the [`Resolver`](crate::resolver::Resolver).

use std::{num::NonZeroUsize, time::Duration};

/// Bulk-resolve endpoint used unless another one is configured
pub const DEFAULT_ENDPOINT: &str =
    "https://api.radwarecloud.app/api/v1/sdcc/threat/core/insight/_bulkResolve";
pub const DEFAULT_BATCH_SIZE: usize = 70;
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(5);
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Credentials passed through to the API with every request
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credentials {
    /// Sent in the `x-api-key` header
    pub api_key: String,
    /// Sent in the `Context` header, identifies the tenant
    pub context: String,
}

// Keep the key out of debug logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("context", &self.context)
            .finish()
    }
}

impl Credentials {
    /// Build credentials from the two raw values, if both are present and non-empty
    pub fn from_values(api_key: Option<String>, context: Option<String>) -> Option<Credentials> {
        match (api_key, context) {
            (Some(api_key), Some(context)) if !api_key.is_empty() && !context.is_empty() => {
                Some(Credentials { api_key, context })
            }
            _ => None,
        }
    }
}

/// Configuration for the resolver client. Must be supplied when creating a
/// [`Resolver`](crate::resolver::Resolver) or an [`HttpTransport`](crate::resolver::HttpTransport).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolverConfig {
    /// URL of the bulk-resolve endpoint
    pub endpoint: String,
    /// Maximum number of addresses sent in a single request
    pub batch_size: NonZeroUsize,
    /// Total number of attempts per batch, including the first one
    pub max_retries: u32,
    /// Pause after the first failed attempt. Doubles after every further failure
    pub initial_backoff: Duration,
    /// Pause after every batch, whether it succeeded or not
    pub per_batch_delay: Duration,
    /// Timeout for a single request
    pub timeout: Duration,
    /// Whether to verify the TLS certificate of the endpoint
    pub verify_tls: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            batch_size: NonZeroUsize::new(DEFAULT_BATCH_SIZE).unwrap_or(NonZeroUsize::MIN),
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            per_batch_delay: DEFAULT_BATCH_DELAY,
            timeout: DEFAULT_TIMEOUT,
            verify_tls: false,
        }
    }
}

impl ResolverConfig {
    /// Backoff to wait after the given failed attempt (1-based).
    /// Saturates instead of overflowing for absurd attempt counts.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor)
    }
}
