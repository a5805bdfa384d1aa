pub mod apis;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod server;
pub mod types;

// Layered boundaries: ports the adapters depend on, infrastructure behind them
pub mod app;
pub mod infra;
