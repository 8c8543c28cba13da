use crate::core::source::FetchError;
use crate::TaxaTreeError;
use std::time::Duration;
use tracing::{debug, warn};

/// How failed fetches are retried.
///
/// Rate limits are never fatal: the caller sleeps for `rate_limit_cooldown`
/// and repeats the exact request until it goes through. Transient network
/// failures get `max_transient_attempts` tries in total before the whole
/// operation fails.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub rate_limit_cooldown: Duration,
    pub max_transient_attempts: u32,
    pub transient_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rate_limit_cooldown: Duration::from_secs(60),
            max_transient_attempts: 3,
            transient_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Policy without waits, for tests and local fakes
    pub fn immediate() -> Self {
        Self {
            rate_limit_cooldown: Duration::ZERO,
            max_transient_attempts: 3,
            transient_backoff: Duration::ZERO,
        }
    }

    /// Run `op` until it succeeds or fails in a way the policy does not retry
    pub fn run<T, F>(&self, subject: &str, mut op: F) -> crate::Result<T>
    where
        F: FnMut() -> Result<T, FetchError>,
    {
        let mut transient_failures = 0u32;
        let mut rate_limit_waits = 0u64;

        loop {
            match op() {
                Ok(value) => {
                    if rate_limit_waits > 0 || transient_failures > 0 {
                        debug!(
                            "{} succeeded after {} rate-limit waits and {} transient failures",
                            subject, rate_limit_waits, transient_failures
                        );
                    }
                    return Ok(value);
                }
                Err(FetchError::RateLimited) => {
                    rate_limit_waits += 1;
                    warn!(
                        "Rate limited while fetching {}, cooling down for {:?}",
                        subject, self.rate_limit_cooldown
                    );
                    std::thread::sleep(self.rate_limit_cooldown);
                }
                Err(FetchError::Transient(reason)) => {
                    transient_failures += 1;
                    if transient_failures >= self.max_transient_attempts.max(1) {
                        return Err(TaxaTreeError::Network(format!(
                            "{}: {} (gave up after {} attempts)",
                            subject, reason, transient_failures
                        )));
                    }
                    warn!(
                        "Attempt {} for {} failed: {}",
                        transient_failures, subject, reason
                    );
                    std::thread::sleep(self.transient_backoff);
                }
                Err(FetchError::Malformed(reason)) => {
                    return Err(TaxaTreeError::Malformed {
                        subject: subject.to_string(),
                        reason,
                    });
                }
                Err(FetchError::Status { status, url }) => {
                    return Err(TaxaTreeError::Http { status, url });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_rate_limit_is_waited_out() {
        let calls = Cell::new(0);
        let result = RetryPolicy::immediate().run("taxon 7", || {
            calls.set(calls.get() + 1);
            if calls.get() <= 5 {
                Err(FetchError::RateLimited)
            } else {
                Ok(7)
            }
        });

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 6);
    }

    #[test]
    fn test_transient_failures_are_capped() {
        let calls = Cell::new(0);
        let result: crate::Result<()> = RetryPolicy::immediate().run("taxon 7", || {
            calls.set(calls.get() + 1);
            Err(FetchError::Transient("connection reset".to_string()))
        });

        assert!(matches!(result, Err(TaxaTreeError::Network(_))));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_transient_then_success() {
        let calls = Cell::new(0);
        let result = RetryPolicy::immediate().run("page 2", || {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                Err(FetchError::Transient("timeout".to_string()))
            } else {
                Ok("page")
            }
        });

        assert_eq!(result.unwrap(), "page");
    }

    #[test]
    fn test_malformed_is_not_retried() {
        let calls = Cell::new(0);
        let result: crate::Result<()> = RetryPolicy::immediate().run("taxon 9", || {
            calls.set(calls.get() + 1);
            Err(FetchError::Malformed("missing rank_level".to_string()))
        });

        match result {
            Err(TaxaTreeError::Malformed { subject, reason }) => {
                assert_eq!(subject, "taxon 9");
                assert_eq!(reason, "missing rank_level");
            }
            other => panic!("Expected malformed error, got {:?}", other),
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_http_status_is_not_retried() {
        let result: crate::Result<()> = RetryPolicy::immediate().run("taxon 9", || {
            Err(FetchError::Status {
                status: 404,
                url: "http://localhost/taxa/9".to_string(),
            })
        });

        assert!(matches!(result, Err(TaxaTreeError::Http { status: 404, .. })));
    }
}
