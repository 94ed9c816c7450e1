//! Bouncer - Embeddable Admission Control
//!
//! This crate decides, per request, whether an identifier (a client IP or an
//! authenticated user key) may proceed. It enforces minute, hour and day
//! quotas over bucketed sliding windows, keeps an explicit block list, records
//! violations, scores abusive traffic and can block offenders automatically.
//! All state is in-memory and process-local.
//!
//! Hosts construct one [`RateLimiter`](ratelimit::RateLimiter), share it via
//! `Arc`, and call it through a [`FailSafe`](ratelimit::FailSafe) boundary.

pub mod analytics;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod ratelimit;
pub mod retention;
