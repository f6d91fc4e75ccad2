//! Browser front end for the due diligence agent: a form, a live reasoning
//! log streamed over SSE, and the rendered report.

pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod stream;
pub mod telemetry;
pub mod templates;
