//! Waits for a freshly created file to become openable.
//!
//! Upstream writers may still hold the file (or not have flushed it) when
//! the creation event arrives. The probe retries a plain read-open at a
//! fixed interval until it succeeds or the deadline passes.

use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

use crate::config::ConversionSettings;
use crate::error::{ConverterError, Result};

/// Bounded retry loop around opening a file for reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessProbe {
    /// Delay between open attempts
    pub poll_interval: Duration,
    /// Total time allowed before giving up
    pub timeout: Duration,
}

impl Default for ReadinessProbe {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            timeout: Duration::from_secs(10),
        }
    }
}

impl ReadinessProbe {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }

    pub fn from_settings(settings: &ConversionSettings) -> Self {
        Self::new(settings.poll_interval(), settings.readiness_timeout())
    }

    /// Resolve once `path` can be opened for reading.
    ///
    /// Fails with [`ConverterError::ReadinessTimeout`] when no attempt
    /// succeeds before the deadline.
    pub async fn await_ready(&self, path: &Path) -> Result<()> {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            match File::open(path).await {
                Ok(_) => {
                    debug!(
                        "{} ready after {} attempt(s) ({:?})",
                        path.display(),
                        attempts,
                        started.elapsed()
                    );
                    return Ok(());
                }
                Err(e) => trace!("{} not ready yet: {}", path.display(), e),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ConverterError::ReadinessTimeout {
                    path: path.to_path_buf(),
                    timeout: self.timeout,
                });
            }

            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_existing_file_is_ready_immediately() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("photo.jxr");
        std::fs::write(&path, b"II\xbc\x01").unwrap();

        let probe = ReadinessProbe::default();
        assert!(probe.await_ready(&path).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_at_deadline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("never.jxr");

        let probe = ReadinessProbe::new(Duration::from_millis(100), Duration::from_secs(10));
        let started = Instant::now();
        let result = probe.await_ready(&path).await;
        let elapsed = started.elapsed();

        assert!(matches!(
            result,
            Err(ConverterError::ReadinessTimeout { timeout, .. }) if timeout == Duration::from_secs(10)
        ));
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(10) + Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_file_appearing_late_becomes_ready() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("late.jxr");

        let writer_path = path.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(250)).await;
            std::fs::write(writer_path, b"data").unwrap();
        });

        let probe = ReadinessProbe::new(Duration::from_millis(100), Duration::from_secs(2));
        let started = Instant::now();
        probe.await_ready(&path).await.unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(250));
        assert!(elapsed < Duration::from_secs(1));
    }
}
