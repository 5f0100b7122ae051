//! Retrying file operations against locked targets

use std::future::Future;
use std::io;
use std::path::Path;
use std::time::Duration;
use updkit_config::InstallConfig;
use updkit_errors::{Error, InstallError};

#[cfg(windows)]
const ERROR_SHARING_VIOLATION: i32 = 32;
#[cfg(windows)]
const ERROR_LOCK_VIOLATION: i32 = 33;

/// Fixed-delay retry policy for locked files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRetry {
    /// Total attempts, including the first
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for LockRetry {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_millis(50),
        }
    }
}

impl From<&InstallConfig> for LockRetry {
    fn from(config: &InstallConfig) -> Self {
        Self {
            attempts: config.lock_retry_attempts,
            delay: Duration::from_millis(config.lock_retry_delay_ms),
        }
    }
}

impl LockRetry {
    /// Run `op` until it succeeds, fails for a reason other than a lock, or
    /// runs out of attempts
    ///
    /// `on_retry` is called with the number of the failed attempt before
    /// each wait.
    ///
    /// # Errors
    ///
    /// Returns `InstallError::LockedResource` once every attempt hit a lock,
    /// or the I/O error of the first non-lock failure.
    pub async fn run<T, F, Fut, R>(&self, path: &Path, mut op: F, mut on_retry: R) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = io::Result<T>>,
        R: FnMut(u32),
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if is_locked(&e) => {
                    if attempt >= attempts {
                        return Err(InstallError::LockedResource {
                            path: path.display().to_string(),
                            attempts,
                        }
                        .into());
                    }
                    tracing::debug!(path = %path.display(), attempt, error = %e, "target locked, retrying");
                    on_retry(attempt);
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(Error::io_with_path(&e, path)),
            }
        }
    }
}

/// Whether an I/O error means another process holds the file
#[must_use]
pub fn is_locked(error: &io::Error) -> bool {
    is_sharing_violation(error)
        || matches!(
            error.kind(),
            io::ErrorKind::PermissionDenied | io::ErrorKind::ResourceBusy
        )
}

#[cfg(windows)]
fn is_sharing_violation(error: &io::Error) -> bool {
    matches!(
        error.raw_os_error(),
        Some(ERROR_SHARING_VIOLATION | ERROR_LOCK_VIOLATION)
    )
}

#[cfg(not(windows))]
fn is_sharing_violation(_error: &io::Error) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast(attempts: u32) -> LockRetry {
        LockRetry {
            attempts,
            delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_gives_up_after_configured_attempts() {
        let calls = Cell::new(0);
        let mut retries = Vec::new();
        let result: Result<(), Error> = fast(4)
            .run(
                Path::new("app.exe"),
                || {
                    calls.set(calls.get() + 1);
                    async { Err(io::Error::from(io::ErrorKind::PermissionDenied)) }
                },
                |attempt| retries.push(attempt),
            )
            .await;

        assert_eq!(calls.get(), 4);
        assert_eq!(retries, vec![1, 2, 3]);
        match result {
            Err(Error::Install(InstallError::LockedResource { path, attempts })) => {
                assert_eq!(path, "app.exe");
                assert_eq!(attempts, 4);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_succeeds_once_released() {
        let calls = Cell::new(0);
        let value = fast(10)
            .run(
                Path::new("app.dll"),
                || {
                    calls.set(calls.get() + 1);
                    let locked = calls.get() < 3;
                    async move {
                        if locked {
                            Err(io::Error::from(io::ErrorKind::ResourceBusy))
                        } else {
                            Ok(7)
                        }
                    }
                },
                |_| {},
            )
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), Error> = fast(10)
            .run(
                Path::new("missing"),
                || {
                    calls.set(calls.get() + 1);
                    async { Err(io::Error::from(io::ErrorKind::NotFound)) }
                },
                |_| {},
            )
            .await;
        assert_eq!(calls.get(), 1);
        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[cfg(windows)]
    #[test]
    fn test_sharing_violation_is_locked() {
        assert!(is_locked(&io::Error::from_raw_os_error(32)));
        assert!(is_locked(&io::Error::from_raw_os_error(33)));
    }
}
