//! HTTP probe payloads for the load test runner.
//!
//! Each [`HttpProbe`] fetches one URL and succeeds only when the response
//! status is a success and the body contains a match for its pattern.

pub mod client;
pub mod error;
pub mod http_probe;

pub use client::ProbeClient;
pub use error::ProbeError;
pub use http_probe::HttpProbe;
