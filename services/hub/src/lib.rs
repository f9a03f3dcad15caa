//! Telemetry hub service
//!
//! Wires the channel store, the relay engine, and the HTTP surface into
//! one server: WebSocket upgrade endpoints for producers and
//! subscribers, the channel CRUD API, and health reporting.

pub mod api;
pub mod config;
pub mod server;

pub use config::HubConfig;
pub use server::HubServer;
