// HTTP middleware implementations

pub mod rate_limit; // Fixed-window admission control
pub mod request_metrics; // Per-route request counters and latency
