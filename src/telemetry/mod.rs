// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Logging and metrics.
//!
//! All modules log through `tracing`; [`init_telemetry`] installs the
//! subscriber once at startup. Operation timings and backend outcomes are
//! recorded in [`GLOBAL_METRICS`] when the `telemetry` feature is enabled.
//!
//! ```rust,ignore
//! use traceback::telemetry::{init_telemetry, TelemetryConfig};
//!
//! init_telemetry(&TelemetryConfig::default())?;
//! ```

mod init;
pub mod metrics;

pub use init::{init_telemetry, TelemetryConfig};
pub use metrics::{BackendMetrics, Histogram, Metrics, MetricsSnapshot, OperationMetrics, GLOBAL_METRICS};
