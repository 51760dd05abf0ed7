//! Timed, cancellable download of the fixed-size probe file

pub mod cancel;

#[cfg(test)]
mod integration_tests;

pub use cancel::{cancel_pair, CancelHandle, CancelToken};

use crate::{
    error::{AppError, ProbeError, Result},
    logging::Logger,
    models::{Config, Measurement, ProbeTarget},
};
use async_trait::async_trait;
use chrono::Utc;
use futures::{Stream, StreamExt};
use reqwest::{
    header::{CACHE_CONTROL, PRAGMA},
    Client,
};
use std::time::{Duration, Instant};

/// Byte counts reported after every received chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub received_bytes: u64,
    pub expected_bytes: u64,
}

impl TransferProgress {
    /// Completed fraction in `[0, 1]`
    pub fn fraction(&self) -> f64 {
        progress_fraction(self.received_bytes, self.expected_bytes)
    }
}

/// Progress callback invoked once per received chunk
pub type ProgressFn = dyn Fn(TransferProgress) + Send + Sync;

/// One probe attempt: download the target and derive a measurement
#[async_trait]
pub trait Probe: Send + Sync {
    /// Download `target` once.
    ///
    /// `on_progress` is called at least once per received chunk and never
    /// after this returns. A signalled `cancel` token yields
    /// [`ProbeError::Cancelled`].
    async fn run(
        &self,
        target: &ProbeTarget,
        cancel: &CancelToken,
        on_progress: &ProgressFn,
    ) -> std::result::Result<Measurement, ProbeError>;
}

/// HTTP implementation of [`Probe`]
pub struct SpeedProbe {
    client: Client,
    logger: Logger,
}

impl SpeedProbe {
    /// Create a probe whose requests give up after `timeout`
    pub fn new(timeout: Duration, logger: Logger) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("{}/{}", crate::PKG_NAME, crate::VERSION))
            .build()
            .map_err(|e| AppError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            logger: logger.named("PROBE"),
        })
    }

    pub fn from_config(config: &Config, logger: Logger) -> Result<Self> {
        Self::new(config.timeout(), logger)
    }
}

#[async_trait]
impl Probe for SpeedProbe {
    async fn run(
        &self,
        target: &ProbeTarget,
        cancel: &CancelToken,
        on_progress: &ProgressFn,
    ) -> std::result::Result<Measurement, ProbeError> {
        let url = target
            .cache_busted_url(Utc::now().timestamp_millis())
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        self.logger
            .debug("Issuing probe request")
            .field("url", url.as_str())
            .field("expected_bytes", target.expected_size_bytes)
            .log()
            .await;

        let started = Instant::now();
        let request = self
            .client
            .get(url)
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
            response = request => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::HttpStatus { status: status.as_u16() });
        }

        let received = read_body(
            response.bytes_stream(),
            target.expected_size_bytes,
            cancel,
            on_progress,
        )
        .await?;
        let duration = started.elapsed();

        check_transfer(received, target.expected_size_bytes, duration)?;

        self.logger
            .debug("Probe transfer finished")
            .field("bytes", received)
            .field("duration_ms", duration.as_secs_f64() * 1000.0)
            .log()
            .await;

        Ok(Measurement::from_transfer(
            Utc::now().timestamp_millis(),
            received,
            duration,
        ))
    }
}

/// Drain a body stream, reporting progress after every chunk.
///
/// Returns the number of bytes received once the stream ends. Cancellation
/// is checked before every read and wins over a ready chunk.
pub async fn read_body<S, B, E>(
    stream: S,
    expected_size_bytes: u64,
    cancel: &CancelToken,
    on_progress: &ProgressFn,
) -> std::result::Result<u64, ProbeError>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ProbeError>,
{
    futures::pin_mut!(stream);
    let mut received: u64 = 0;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
            next = stream.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                received += chunk.as_ref().len() as u64;
                on_progress(TransferProgress {
                    received_bytes: received,
                    expected_bytes: expected_size_bytes,
                });
            }
            Some(Err(e)) => return Err(e.into()),
            None => return Ok(received),
        }
    }
}

/// Completed fraction, capped at 1.0
pub fn progress_fraction(received: u64, expected_size_bytes: u64) -> f64 {
    if expected_size_bytes == 0 {
        return 1.0;
    }
    (received as f64 / expected_size_bytes as f64).min(1.0)
}

/// Decide whether a finished transfer counts as a measurement.
///
/// Only an exact byte count with a non-zero duration succeeds.
pub fn check_transfer(
    received: u64,
    expected_size_bytes: u64,
    duration: Duration,
) -> std::result::Result<(), ProbeError> {
    if !duration.is_zero() && received == expected_size_bytes {
        Ok(())
    } else if received != expected_size_bytes {
        Err(ProbeError::IncompleteTransfer {
            got: received,
            expected: expected_size_bytes,
        })
    } else {
        Err(ProbeError::Timing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<f64>>>, impl Fn(TransferProgress) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |progress: TransferProgress| {
            sink.lock().unwrap().push(progress.fraction())
        })
    }

    #[tokio::test]
    async fn test_read_body_reports_progress_per_chunk() {
        let chunks: Vec<std::result::Result<Vec<u8>, ProbeError>> =
            vec![Ok(vec![0; 25]), Ok(vec![0; 25]), Ok(vec![0; 50])];
        let (seen, on_progress) = recorder();

        let received = read_body(stream::iter(chunks), 100, &CancelToken::never(), &on_progress)
            .await
            .unwrap();

        assert_eq!(received, 100);
        assert_eq!(*seen.lock().unwrap(), vec![0.25, 0.5, 1.0]);
    }

    #[tokio::test]
    async fn test_progress_is_capped() {
        let chunks: Vec<std::result::Result<Vec<u8>, ProbeError>> =
            vec![Ok(vec![0; 80]), Ok(vec![0; 80])];
        let (seen, on_progress) = recorder();

        let received = read_body(stream::iter(chunks), 100, &CancelToken::never(), &on_progress)
            .await
            .unwrap();

        assert_eq!(received, 160);
        assert_eq!(*seen.lock().unwrap(), vec![0.8, 1.0]);
    }

    #[tokio::test]
    async fn test_stream_error_is_propagated() {
        let chunks: Vec<std::result::Result<Vec<u8>, ProbeError>> =
            vec![Ok(vec![0; 10]), Err(ProbeError::Protocol("reset".into()))];
        let (_, on_progress) = recorder();

        let result = read_body(stream::iter(chunks), 100, &CancelToken::never(), &on_progress).await;
        assert_eq!(result, Err(ProbeError::Protocol("reset".into())));
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_unblocks_read() {
        let (handle, token) = cancel_pair();
        let first: std::result::Result<Vec<u8>, ProbeError> = Ok(vec![0; 10]);
        // One chunk, then a read that never completes
        let body = stream::iter(vec![first]).chain(stream::pending());

        let calls = Arc::new(Mutex::new(0usize));
        let counter = calls.clone();
        let on_progress = move |_progress: TransferProgress| {
            *counter.lock().unwrap() += 1;
            handle.cancel();
        };

        let result = tokio::time::timeout(
            Duration::from_secs(1),
            read_body(body, 100, &token, &on_progress),
        )
        .await
        .expect("cancellation should unblock the pending read");

        assert_eq!(result, Err(ProbeError::Cancelled));
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cancel_wins_over_ready_chunk() {
        let (handle, token) = cancel_pair();
        handle.cancel();
        let chunks: Vec<std::result::Result<Vec<u8>, ProbeError>> = vec![Ok(vec![0; 10])];
        let (seen, on_progress) = recorder();

        let result = read_body(stream::iter(chunks), 10, &token, &on_progress).await;
        assert_eq!(result, Err(ProbeError::Cancelled));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_check_transfer_exact_size() {
        assert!(check_transfer(100, 100, Duration::from_millis(5)).is_ok());
    }

    #[test]
    fn test_check_transfer_size_mismatch() {
        assert_eq!(
            check_transfer(99, 100, Duration::from_secs(1)),
            Err(ProbeError::IncompleteTransfer { got: 99, expected: 100 })
        );
        assert_eq!(
            check_transfer(101, 100, Duration::from_secs(1)),
            Err(ProbeError::IncompleteTransfer { got: 101, expected: 100 })
        );
        // Size mismatch is reported even when timing is also unusable
        assert_eq!(
            check_transfer(0, 100, Duration::ZERO),
            Err(ProbeError::IncompleteTransfer { got: 0, expected: 100 })
        );
    }

    #[test]
    fn test_check_transfer_zero_duration() {
        assert_eq!(check_transfer(100, 100, Duration::ZERO), Err(ProbeError::Timing));
    }

    #[test]
    fn test_progress_fraction() {
        assert_eq!(progress_fraction(0, 100), 0.0);
        assert_eq!(progress_fraction(50, 100), 0.5);
        assert_eq!(progress_fraction(150, 100), 1.0);
        assert_eq!(progress_fraction(5, 0), 1.0);
    }
}
