//! wadas-metrics: telemetry collection for the WADAS scheduler.
//!
//! Scrapes the Prometheus-style text endpoints that every worker node
//! exposes and normalizes them into a [`wadas_core::NodeLoad`].
//!
//! # Architecture
//!
//! ```text
//! NodeProber
//!   ├── MetricsClient::try_scrape() ← http://{ip}:{metrics_port}/metrics
//!   └── DeviceProbe (Npu :8000, Gpu :8002, Network :8004)
//!         └── MetricsClient::try_scrape() → 0 on failure
//!
//! MetricsClient
//!   ├── MetricsTransport (HttpTransport over hyper, or a test fake)
//!   └── ExpositionParser → MetricSnapshot
//! ```

pub mod client;
pub mod exposition;
pub mod probe;

pub use client::{
    FetchFuture, HttpTransport, MetricsClient, MetricsTransport, ScrapeError, ScrapeResult,
    http_get,
};
pub use exposition::{ExpositionParser, MetricSnapshot, render_exposition};
pub use probe::{DeviceProbe, NodeProber};
