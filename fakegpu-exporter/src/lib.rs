//! Prometheus exporter for simulated GPU telemetry.
//!
//! This crate samples GPU devices (from the in-process profile engine or
//! from `dcgmi dmon`), renders DCGM-compatible metrics into a cached
//! document, and serves that document over HTTP `/metrics` and, optionally,
//! a Unix domain socket.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ Profile engine  │────>│    Refresher    │────>│   HTTP Server   │
//! │  or dcgmi dmon  │     │  (MetricCache)  │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └────────┬────────┘
//!                                                          │
//!                                                 ┌────────┴────────┐
//!                                                 │   Unix socket   │
//!                                                 │     (proxy)     │
//!                                                 └─────────────────┘
//! ```
//!
//! # Usage
//!
//! Run the exporter binary with a configuration file:
//!
//! ```bash
//! fakegpu-exporter --config config.json5
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod cache;
pub mod collector;
pub mod config;
pub mod dcgmi;
pub mod http;
pub mod mapping;
pub mod retry;
pub mod uds;

pub use cache::{MetricCache, Refresher, RenderedDocument, SharedCache};
pub use collector::{CollectError, DeviceDirectory, DeviceSource, MetricCollector};
pub use config::ExporterConfig;
pub use dcgmi::DcgmiSource;
pub use http::HttpServer;
pub use retry::RetryPolicy;
pub use uds::{MetricsProxy, UdsServer};
