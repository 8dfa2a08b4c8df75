use std::time::Duration;
use anyhow::Context;
use reqwest::header::RANGE;
use crate::error::{Error, Result};
use crate::object::RemoteObject;

/// 403 bodies containing one of these are rate limiting, not a denial.
const THROTTLE_INDICATORS: [&str; 4] = [
    "dailyLimitExceeded",
    "userRateLimitExceeded",
    "rateLimitExceeded",
    "backendError",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// One ranged GET against a download url. Errors are transport failures only;
/// any HTTP status is returned as a response.
#[async_trait::async_trait]
pub trait RangeFetcher: Send + Sync + 'static {
    async fn get_range(&self, url: &str, start: u64, end: u64) -> anyhow::Result<RangeResponse>;
}

/// [`RangeFetcher`] over a `reqwest::Client`. Authentication is whatever the
/// client was built with.
#[derive(Clone)]
pub struct HttpRangeFetcher {
    client: reqwest::Client,
}

impl HttpRangeFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn with_timeout(timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::new(builder.build()?))
    }
}

#[async_trait::async_trait]
impl RangeFetcher for HttpRangeFetcher {
    async fn get_range(&self, url: &str, start: u64, end: u64) -> anyhow::Result<RangeResponse> {
        let resp = self.client.get(url)
            .header(RANGE, format!("bytes={}-{}", start, end))
            .send()
            .await
            .with_context(|| format!("send request to {}", url))?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await
            .with_context(|| format!("read response body from {}", url))?;
        Ok(RangeResponse {
            status,
            body: body.to_vec(),
        })
    }
}

pub fn is_throttled(body: &str) -> bool {
    THROTTLE_INDICATORS.iter().any(|indicator| body.contains(indicator))
}

/// Doubling delay for throttled requests: 1, 2, 4 ... `max_units` units, then
/// exhausted.
#[derive(Debug, Clone)]
pub struct ThrottleBackoff {
    unit: Duration,
    max_units: u64,
    units: u64,
}

impl ThrottleBackoff {
    pub fn new(unit: Duration, max_units: u64) -> Self {
        Self {
            unit,
            max_units,
            units: 0,
        }
    }

    pub fn next_delay(&mut self) -> Option<Duration> {
        let next = if self.units == 0 { 1 } else { self.units.saturating_mul(2) };
        if next > self.max_units {
            return None;
        }
        self.units = next;
        Some(self.unit.saturating_mul(next as u32))
    }
}

/// Downloads the whole chunk starting at `chunk_start`, sleeping and retrying
/// while the API reports rate limiting.
pub async fn fetch_chunk<F: RangeFetcher + ?Sized>(
    fetcher: &F,
    object: &RemoteObject,
    chunk_start: u64,
    chunk_size: u64,
    mut backoff: ThrottleBackoff,
    high_priority: bool,
) -> Result<Vec<u8>> {
    // the last chunk of a huge object may end past u64::MAX
    let chunk_end = chunk_start.saturating_add(chunk_size.saturating_sub(1));
    loop {
        log::debug!(
            "requesting object {} bytes {} - {} from API (high priority: {})",
            object, chunk_start, chunk_end, high_priority
        );
        let resp = fetcher.get_range(&object.download_url, chunk_start, chunk_end).await
            .map_err(|e| {
                log::debug!("{:?}", e);
                Error::Transport {
                    object: object.to_string(),
                    source: e,
                }
            })?;

        match resp.status {
            206 => return Ok(resp.body),
            403 => {
                let body = String::from_utf8_lossy(&resp.body);
                if !is_throttled(&body) {
                    log::debug!("{}", body);
                    return Err(Error::Forbidden {
                        object: object.to_string(),
                        body: body.into_owned(),
                    });
                }
                match backoff.next_delay() {
                    Some(delay) => {
                        log::debug!("object {} throttled, retry in {:?}", object, delay);
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(Error::ThrottleExhausted {
                        object: object.to_string(),
                    }),
                }
            }
            status => {
                log::debug!("object {} bytes {} - {}: status {}", object, chunk_start, chunk_end, status);
                return Err(Error::Status {
                    object: object.to_string(),
                    status,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use parking_lot::Mutex;
    use tokio::time::Instant;

    /// Replays canned responses and records when each request arrived.
    struct ScriptedFetcher {
        responses: Mutex<VecDeque<anyhow::Result<RangeResponse>>>,
        calls: Mutex<Vec<(Instant, u64, u64)>>,
    }

    impl ScriptedFetcher {
        fn new(responses: Vec<anyhow::Result<RangeResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait::async_trait]
    impl RangeFetcher for ScriptedFetcher {
        async fn get_range(&self, _url: &str, start: u64, end: u64) -> anyhow::Result<RangeResponse> {
            self.calls.lock().push((Instant::now(), start, end));
            self.responses.lock().pop_front().unwrap_or_else(|| Err(anyhow::anyhow!("no more responses")))
        }
    }

    fn partial(body: &[u8]) -> anyhow::Result<RangeResponse> {
        Ok(RangeResponse { status: 206, body: body.to_vec() })
    }

    fn throttled() -> anyhow::Result<RangeResponse> {
        Ok(RangeResponse {
            status: 403,
            body: br#"{"error":{"errors":[{"domain":"usageLimits","reason":"rateLimitExceeded"}]}}"#.to_vec(),
        })
    }

    fn object() -> RemoteObject {
        RemoteObject::new("obj", "video.mp4", 1 << 20, "http://localhost/obj")
    }

    fn backoff() -> ThrottleBackoff {
        ThrottleBackoff::new(Duration::from_secs(1), 8)
    }

    #[test]
    fn test_backoff_sequence() {
        let mut backoff = backoff();
        let delays: Vec<_> = std::iter::from_fn(|| backoff.next_delay()).collect();
        assert_eq!(delays, vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(8),
        ]);
    }

    #[test]
    fn test_throttle_indicators() {
        assert!(is_throttled("reason: dailyLimitExceeded"));
        assert!(is_throttled("userRateLimitExceeded"));
        assert!(is_throttled("{\"reason\":\"backendError\"}"));
        assert!(!is_throttled("{\"reason\":\"forbidden\"}"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_then_success() {
        let fetcher = ScriptedFetcher::new(vec![throttled(), throttled(), throttled(), partial(b"chunk")]);
        let started = Instant::now();
        let data = fetch_chunk(&fetcher, &object(), 0, 1024, backoff(), true).await.unwrap();
        assert_eq!(data, b"chunk");

        let calls = fetcher.calls.lock();
        let gaps: Vec<_> = calls.windows(2).map(|w| w[1].0 - w[0].0).collect();
        assert_eq!(gaps, vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]);
        assert_eq!(started.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_exhausted() {
        let fetcher = ScriptedFetcher::new((0..10).map(|_| throttled()).collect());
        let err = fetch_chunk(&fetcher, &object(), 0, 1024, backoff(), false).await.unwrap_err();
        assert!(matches!(err, Error::ThrottleExhausted { .. }));

        let calls = fetcher.calls.lock();
        assert_eq!(calls.len(), 5);
        let gaps: Vec<_> = calls.windows(2).map(|w| (w[1].0 - w[0].0).as_secs()).collect();
        assert_eq!(gaps, vec![1, 2, 4, 8]);
    }

    #[tokio::test]
    async fn test_forbidden_not_retried() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(RangeResponse { status: 403, body: b"insufficientPermissions".to_vec() }),
            partial(b"never"),
        ]);
        let err = fetch_chunk(&fetcher, &object(), 0, 1024, backoff(), true).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden { ref body, .. } if body == "insufficientPermissions"));
        assert_eq!(fetcher.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_unexpected_status() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(RangeResponse { status: 500, body: vec![] }),
        ]);
        let err = fetch_chunk(&fetcher, &object(), 0, 1024, backoff(), true).await.unwrap_err();
        assert!(matches!(err, Error::Status { status: 500, .. }));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_transport_error_not_retried() {
        let fetcher = ScriptedFetcher::new(vec![Err(anyhow::anyhow!("connection refused")), partial(b"x")]);
        let err = fetch_chunk(&fetcher, &object(), 0, 1024, backoff(), true).await.unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
        assert_eq!(fetcher.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_inclusive_range() {
        let fetcher = ScriptedFetcher::new(vec![partial(b"x")]);
        fetch_chunk(&fetcher, &object(), 2048, 1024, backoff(), true).await.unwrap();
        let calls = fetcher.calls.lock();
        assert_eq!((calls[0].1, calls[0].2), (2048, 3071));
    }

    #[tokio::test]
    async fn test_range_end_clamped_at_u64_max() {
        let fetcher = ScriptedFetcher::new(vec![partial(b"x")]);
        let start = u64::MAX - 100;
        fetch_chunk(&fetcher, &object(), start, 1024, backoff(), true).await.unwrap();
        let calls = fetcher.calls.lock();
        assert_eq!((calls[0].1, calls[0].2), (start, u64::MAX));
    }

    #[tokio::test]
    async fn test_http_range_header() -> anyhow::Result<()> {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/download/obj")
            .match_header("range", "bytes=1024-2047")
            .with_status(206)
            .with_body("partial content")
            .create_async()
            .await;

        let fetcher = HttpRangeFetcher::with_timeout(Some(Duration::from_secs(5)))?;
        let resp = fetcher.get_range(&format!("{}/download/obj", server.url()), 1024, 2047).await?;
        assert_eq!(resp.status, 206);
        assert_eq!(resp.body, b"partial content");
        mock.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_http_forbidden_body() -> anyhow::Result<()> {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("GET", "/download/obj")
            .with_status(403)
            .with_body(r#"{"error":{"errors":[{"reason":"fileNotDownloadable"}]}}"#)
            .create_async()
            .await;

        let fetcher = HttpRangeFetcher::new(reqwest::Client::new());
        let object = RemoteObject::new("obj", "doc", 10, format!("{}/download/obj", server.url()));
        let err = fetch_chunk(&fetcher, &object, 0, 16, backoff(), true).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden { .. }));
        Ok(())
    }
}
