pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod plan;
pub mod redact;
pub mod scheduler;
pub mod server;
pub mod source;
pub mod state;
