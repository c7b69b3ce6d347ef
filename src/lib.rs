// Library root module for rabbitmq-stream-exporter
// This file defines the public API and module structure of the exporter:
// management API client, stream consumer metrics, refresh loop and HTTP API
//
// Numan Thabit 2025 Nov

pub mod config;
pub mod consumer;
pub mod errors;
pub mod metrics;
pub mod scrape;
pub mod server;
pub mod state;
pub mod transport;
