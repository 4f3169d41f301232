//! Bounded retry around a single upload.

use std::time::Duration;

use merchant_sync_core::{RetryPolicy, TargetPayload};

use crate::error::UploadError;
use crate::upload::{RemoteId, UploadClient};

/// Blocks the current thread. Swapped out in tests.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Remembers requested delays instead of sleeping.
#[derive(Debug, Default, Clone)]
pub struct RecordingSleeper {
    pub slept: Vec<Duration>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&mut self, duration: Duration) {
        self.slept.push(duration);
    }
}

/// Final result of an upload plus how many calls it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted {
    pub result: Result<RemoteId, UploadError>,
    pub attempts: u32,
}

/// Call `client.upload` until it succeeds, fails terminally, or
/// `policy.max_attempts` calls have been made.
///
/// Between attempts the delay is the server's `Retry-After` hint when given
/// (clamped to `policy.max_delay`), otherwise exponential backoff.
pub fn upload_with_retry(
    client: &mut dyn UploadClient,
    payload: &TargetPayload,
    policy: &RetryPolicy,
    sleeper: &mut dyn Sleeper,
) -> Attempted {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0;
    loop {
        attempts += 1;
        tracing::debug!("{}: upload attempt {attempts}/{max_attempts}", payload.offer_id);
        let err = match client.upload(payload) {
            Ok(remote_id) => {
                return Attempted {
                    result: Ok(remote_id),
                    attempts,
                }
            }
            Err(err) => err,
        };

        if !err.is_retryable() || attempts >= max_attempts {
            return Attempted {
                result: Err(err),
                attempts,
            };
        }

        let retry_after = match &err {
            UploadError::RateLimited { retry_after } => *retry_after,
            _ => None,
        };
        let delay = policy.delay_for(attempts, retry_after);
        tracing::warn!(
            "{}: {err}; retrying in {}ms",
            payload.offer_id,
            delay.as_millis()
        );
        sleeper.sleep(delay);
    }
}
