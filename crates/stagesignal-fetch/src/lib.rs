//! Ethical HTTP fetch layer for the stagesignal collectors.
//!
//! Every outbound request goes through [`FetchClient`]: robots.txt is
//! consulted per origin (cached for the client's lifetime), a randomized
//! politeness delay runs before the request, and transient failures (429,
//! 5xx, timeouts, connection errors) are retried with exponential backoff.
//! Failures come back as typed [`FetchError`] values carrying the error
//! category, attempt count, and cumulative wait, never as panics.

pub mod client;
pub mod error;
pub mod retry;
pub mod robots;

pub use client::{FetchClient, FetchResponse};
pub use error::{ErrorCategory, FetchError};
pub use retry::RetryPolicy;
pub use robots::{RobotsCache, RobotsPolicy};
