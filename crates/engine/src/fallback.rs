//! Primary/fallback quote sourcing.

use tracing::warn;
use veris_core::{ExchangeCapability, Quote, Result};

use crate::retry::{retry_with_backoff, RetryPolicy};

/// Which source ultimately served a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotePath {
    Primary,
    Fallback,
}

/// Two-step quote source. Any primary failure, after the primary's own
/// bounded retries, routes the request to the fallback; the served path is
/// part of the answer so degraded sourcing is visible to callers.
pub struct FallbackQuoteSource<P, F> {
    primary: P,
    fallback: F,
    policy: RetryPolicy,
}

impl<P, F> FallbackQuoteSource<P, F>
where
    P: ExchangeCapability,
    F: ExchangeCapability,
{
    pub fn new(primary: P, fallback: F) -> Self {
        Self {
            primary,
            fallback,
            policy: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fetches a quote, preferring the primary source.
    ///
    /// # Errors
    ///
    /// Only when both sources fail; the fallback's error is the one
    /// surfaced.
    pub async fn quote(&self, market_id: &str) -> Result<(Quote, QuotePath)> {
        let primary = retry_with_backoff(&self.policy, "quote_primary", || {
            self.primary.get_market_quote(market_id)
        })
        .await;

        match primary {
            Ok(quote) => Ok((quote, QuotePath::Primary)),
            Err(error) => {
                warn!(market_id, %error, "primary quote source failed, using fallback");
                let quote = retry_with_backoff(&self.policy, "quote_fallback", || {
                    self.fallback.get_market_quote(market_id)
                })
                .await?;
                Ok((quote, QuotePath::Fallback))
            }
        }
    }
}
