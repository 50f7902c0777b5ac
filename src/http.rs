use anyhow::Result;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Build a blocking agent with a global request timeout
#[inline]
pub fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// Run `request_fn` up to `attempts` times.
///
/// Server errors (5xx) and transport failures are retried with exponential
/// backoff; client errors (4xx) and anything else fail immediately.
#[inline]
pub fn with_retry<T, F>(base_url: &Url, attempts: u32, mut request_fn: F) -> Result<T>
where
    F: FnMut() -> Result<T, ureq::Error>,
{
    let mut last_error = None;
    let attempts = attempts.max(1);

    for attempt in 1..=attempts {
        debug!("HTTP request attempt {}/{}", attempt, attempts);

        match request_fn() {
            Ok(response) => {
                debug!("Request succeeded on attempt {}", attempt);
                return Ok(response);
            }
            Err(error) => {
                let should_retry = match &error {
                    ureq::Error::StatusCode(status) => {
                        if *status >= 500 {
                            warn!(
                                "Server error (status {}), attempt {}/{}",
                                status, attempt, attempts
                            );
                            true
                        } else {
                            warn!("Client error (status {}), not retrying", status);
                            return Err(anyhow::anyhow!("Client error: HTTP {}", status));
                        }
                    }
                    ureq::Error::ConnectionFailed
                    | ureq::Error::HostNotFound
                    | ureq::Error::Timeout(_)
                    | ureq::Error::Io(_) => {
                        warn!(
                            "Transport error: {}, attempt {}/{}",
                            error, attempt, attempts
                        );
                        true
                    }
                    _ => {
                        warn!("Non-retryable error: {}", error);
                        false
                    }
                };

                if !should_retry {
                    return Err(anyhow::anyhow!("Non-retryable error: {}", error));
                }

                last_error = Some(anyhow::anyhow!("Request error: {}", error));

                if attempt < attempts {
                    let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                    let delay = Duration::from_millis(delay_ms);
                    debug!("Waiting {:?} before retry", delay);
                    std::thread::sleep(delay);
                }
            }
        }
    }

    error!("All retry attempts failed for request to {}", base_url);

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
}

/// POST a JSON body and return the response for reading
#[inline]
pub fn post_json(
    agent: &ureq::Agent,
    url: &Url,
    body: &str,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    agent
        .post(url.as_str())
        .header("Content-Type", "application/json")
        .send(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn base() -> Url {
        Url::parse("http://localhost:1").expect("url should parse")
    }

    #[test]
    fn first_success_is_returned() {
        let calls = Cell::new(0);
        let result = with_retry(&base(), 3, || {
            calls.set(calls.get() + 1);
            Ok::<_, ureq::Error>("ok")
        });

        assert_eq!(result.expect("should succeed"), "ok");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn client_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<()> = with_retry(&base(), 3, || {
            calls.set(calls.get() + 1);
            Err(ureq::Error::StatusCode(404))
        });

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn server_errors_exhaust_attempts() {
        let calls = Cell::new(0);
        let result: Result<()> = with_retry(&base(), 1, || {
            calls.set(calls.get() + 1);
            Err(ureq::Error::StatusCode(503))
        });

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let calls = Cell::new(0);
        let result = with_retry(&base(), 0, || {
            calls.set(calls.get() + 1);
            Ok::<_, ureq::Error>(())
        });

        assert!(result.is_ok());
        assert_eq!(calls.get(), 1);
    }
}
