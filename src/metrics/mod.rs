pub mod registry;
pub mod sink;
pub mod summary;

pub use registry::*;
pub use sink::*;
pub use summary::*;

/// Request duration as measured by the HTTP probe, in milliseconds.
pub const HTTP_REQ_DURATION: &str = "http_req_duration";
/// Share of requests that failed at transport level or returned a non-2xx/3xx status.
pub const HTTP_REQ_FAILED: &str = "http_req_failed";
pub const HTTP_REQS: &str = "http_reqs";
pub const ITERATIONS: &str = "iterations";

/// Wall-clock latency of a burn request as timed by the iteration itself.
pub const BURN_LATENCY: &str = "burn_latency";
/// Iterations whose response failed validation.
pub const BURN_ERRORS: &str = "burn_errors";
