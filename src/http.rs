use std::io::Read;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{FetchError, PlaybackError};

const MAX_FEED_BYTES: u64 = 32 * 1024 * 1024;
const MAX_REDIRECTS: u32 = 10;

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking feed download. Any HTTP status is returned as a response;
/// only network-level failures are errors.
pub trait FeedTransport {
    fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError>;
}

/// Follows redirects from a feed-declared media link to the final location.
pub trait StreamResolver {
    fn resolve(&self, url: &str) -> Result<String, PlaybackError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: usize,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(3),
        }
    }
}

pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(read_timeout)
            .timeout_write(read_timeout)
            .redirects(MAX_REDIRECTS)
            .user_agent(concat!("termcast/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(20))
    }
}

impl FeedTransport for HttpTransport {
    fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let response = match self.agent.get(url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                return Ok(FetchResponse {
                    status,
                    body: read_body(response).unwrap_or_default(),
                });
            }
            Err(ureq::Error::Transport(err)) => {
                return Err(FetchError::Transport {
                    url: url.to_string(),
                    message: err.to_string(),
                });
            }
        };

        let status = response.status();
        let body = read_body(response).map_err(|err| FetchError::Transport {
            url: url.to_string(),
            message: format!("response read failed: {err}"),
        })?;
        Ok(FetchResponse { status, body })
    }
}

impl StreamResolver for HttpTransport {
    fn resolve(&self, url: &str) -> Result<String, PlaybackError> {
        match self.agent.get(url).call() {
            // The body is the audio itself; only the final location matters.
            Ok(response) => {
                let resolved = response.get_url().to_string();
                if resolved != url {
                    debug!(from = url, to = %resolved, "resolved stream redirect");
                }
                Ok(resolved)
            }
            Err(ureq::Error::Status(status, _)) => Err(PlaybackError::Unreachable {
                url: url.to_string(),
                message: format!("HTTP status {status}"),
            }),
            Err(ureq::Error::Transport(err)) => Err(PlaybackError::Unreachable {
                url: url.to_string(),
                message: err.to_string(),
            }),
        }
    }
}

fn read_body(response: ureq::Response) -> std::io::Result<Vec<u8>> {
    let mut body = Vec::new();
    response
        .into_reader()
        .take(MAX_FEED_BYTES)
        .read_to_end(&mut body)?;
    Ok(body)
}

pub fn sleep_blocking(duration: Duration) {
    thread::sleep(duration);
}

/// Fetches `url` until a 2xx response arrives or `policy.attempts` are used
/// up, sleeping `policy.backoff` between attempts. Returns the last failure.
pub fn fetch_with_retries<T>(
    transport: &T,
    url: &str,
    policy: RetryPolicy,
    sleep: &mut dyn FnMut(Duration),
) -> Result<Vec<u8>, FetchError>
where
    T: FeedTransport + ?Sized,
{
    let attempts = policy.attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        if attempt > 1 {
            sleep(policy.backoff);
        }

        let error = match transport.fetch(url) {
            Ok(response) if response.is_success() => return Ok(response.body),
            Ok(response) => FetchError::Status {
                url: url.to_string(),
                status: response.status,
            },
            Err(err) => err,
        };
        warn!(url, attempt, attempts, "feed fetch failed: {error}");
        last_error = Some(error);
    }

    Err(last_error.unwrap_or_else(|| FetchError::Transport {
        url: url.to_string(),
        message: "exhausted attempts without a concrete error".to_string(),
    }))
}
