//! Demonstration HTTP server for the load-breaker crate
//!
//! One breaker is shared by every route:
//! - `GET /ping` answers 200 while the breaker is closed, 503 while open
//! - `GET|POST /trip-breaker` increments up to the threshold, ignoring rejections
//! - `GET /status` reports a breaker snapshot as JSON
//! - `POST /reset` and `POST /cap-reset` run the matching recovery

pub mod app;
pub mod config;
