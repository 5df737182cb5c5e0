//! Telemetry metric name constants.
//!
//! Centralised metric names for the demand protocol. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `demandflow_`. Counters end in `_total`.
//!
//! # Common labels
//!
//! - `status` — how a stream ended: "completed", "errored" or "cancelled"

/// Total accepted `request(n)` calls.
pub const DEMAND_REQUESTS_TOTAL: &str = "demandflow_demand_requests_total";

/// Total demand units granted across all accepted requests.
pub const DEMAND_UNITS_TOTAL: &str = "demandflow_demand_units_total";

/// Total `request(n)` calls rejected with `InvalidDemand`.
pub const INVALID_DEMAND_TOTAL: &str = "demandflow_invalid_demand_total";

/// Total items delivered through `on_next`.
pub const ITEMS_EMITTED_TOTAL: &str = "demandflow_items_emitted_total";

/// Total streams that reached a terminal state.
///
/// Labels: `status` ("completed" | "errored" | "cancelled").
pub const STREAMS_TERMINATED_TOTAL: &str = "demandflow_streams_terminated_total";
