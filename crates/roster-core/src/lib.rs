//! Low-level helpers shared by the roster runtimes.
//!
//! Holds wall-clock helpers, HTTP retry/backoff helpers for the adapters, and
//! the atomic JSON state-file primitives used by the polling runner to persist
//! its update offset across restarts.

pub mod retry;
pub mod state_file;
pub mod time_utils;

pub use retry::{
    is_retryable_status, parse_retry_after, retry_delay, truncate_for_error,
    RETRY_ATTEMPT_HEADER,
};
pub use state_file::{load_json_or_default, write_json_atomic, write_text_atomic};
pub use time_utils::current_unix_timestamp_ms;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_timestamp_is_after_2024() {
        assert!(current_unix_timestamp_ms() > 1_704_067_200_000);
    }
}
